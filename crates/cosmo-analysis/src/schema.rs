//! Sampling-based schema summary.
//!
//! Walks every sampled document to a fixed depth, recording for each dotted
//! field path how often it occurs, which value types it holds, how often it
//! is null, and a few example values.

use cosmo_core::{CosmoError, CosmoResult, DocValue, TypeTag};
use cosmo_runtime::DocumentBackend;
use serde::Serialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

pub const DEFAULT_SCHEMA_SAMPLE_SIZE: usize = 100;

/// Nesting levels visited; top-level fields are level 1.
pub const MAX_DEPTH: usize = 3;
pub const MAX_PROPERTIES: usize = 50;
pub const MAX_EXAMPLES: usize = 5;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaAnalysis {
    pub sample_size: usize,
    pub common_properties: Vec<PropertyAnalysis>,
    pub data_types: BTreeMap<TypeTag, u64>,
    pub nested_structures: Vec<Value>,
}

impl SchemaAnalysis {
    pub fn empty() -> Self {
        Self {
            sample_size: 0,
            common_properties: Vec::new(),
            data_types: BTreeMap::new(),
            nested_structures: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyAnalysis {
    pub name: String,
    /// Observed type tags joined with `" | "`, first seen first.
    #[serde(rename = "type")]
    pub type_name: String,
    pub frequency: f64,
    pub null_count: u64,
    pub examples: Vec<Value>,
}

#[derive(Default)]
struct PropertyStat {
    count: u64,
    types: Vec<TypeTag>,
    null_count: u64,
    examples: Vec<Value>,
}

#[derive(Default)]
struct Profile {
    order: Vec<String>,
    properties: HashMap<String, PropertyStat>,
    data_types: BTreeMap<TypeTag, u64>,
}

impl Profile {
    fn visit(&mut self, object: DocValue<'_>, prefix: &str, budget: usize) {
        for (key, value) in object.fields() {
            let path = if prefix.is_empty() {
                key.to_string()
            } else {
                format!("{}.{}", prefix, key)
            };
            let tag = value.type_tag();
            *self.data_types.entry(tag).or_insert(0) += 1;

            if !self.properties.contains_key(&path) {
                self.order.push(path.clone());
            }
            let stat = self.properties.entry(path.clone()).or_default();
            stat.count += 1;
            if !stat.types.contains(&tag) {
                stat.types.push(tag);
            }
            if value.is_null() {
                stat.null_count += 1;
            } else if stat.examples.len() < MAX_EXAMPLES {
                stat.examples.push(value.to_json());
            }

            if tag == TypeTag::Object && budget > 1 {
                self.visit(value, &path, budget - 1);
            }
        }
    }

    fn finish(mut self, sample_size: usize) -> SchemaAnalysis {
        let mut common_properties: Vec<PropertyAnalysis> = self
            .order
            .iter()
            .filter_map(|name| {
                let stat = self.properties.remove(name)?;
                Some(PropertyAnalysis {
                    name: name.clone(),
                    type_name: stat
                        .types
                        .iter()
                        .map(TypeTag::as_str)
                        .collect::<Vec<_>>()
                        .join(" | "),
                    frequency: stat.count as f64 / sample_size as f64,
                    null_count: stat.null_count,
                    examples: stat.examples,
                })
            })
            .collect();

        // Stable: ties keep first-seen order.
        common_properties.sort_by(|a, b| b.frequency.total_cmp(&a.frequency));
        common_properties.truncate(MAX_PROPERTIES);

        SchemaAnalysis {
            sample_size,
            common_properties,
            data_types: self.data_types,
            nested_structures: Vec::new(),
        }
    }
}

/// Profiles field structure over a sample.
#[derive(Debug, Clone, Copy)]
pub struct SchemaAnalyzer {
    sample_size: usize,
}

impl Default for SchemaAnalyzer {
    fn default() -> Self {
        Self::new(DEFAULT_SCHEMA_SAMPLE_SIZE)
    }
}

impl SchemaAnalyzer {
    pub fn new(sample_size: usize) -> Self {
        Self { sample_size }
    }

    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    pub async fn analyze(
        &self,
        backend: &dyn DocumentBackend,
        container_id: &str,
    ) -> CosmoResult<SchemaAnalysis> {
        let sample = backend
            .sample(container_id, self.sample_size)
            .await
            .map_err(|e| CosmoError::container(container_id, e))?;
        let analysis = analyze_documents(&sample);
        debug!(
            container_id = %container_id,
            sampled = analysis.sample_size,
            properties = analysis.common_properties.len(),
            "Analyzed schema"
        );
        Ok(analysis)
    }
}

/// Profile a set of documents. Non-object documents contribute nothing but
/// still count toward the sample size. Values are classified only down to
/// [`MAX_DEPTH`]; arrays are never entered.
pub fn analyze_documents(documents: &[Value]) -> SchemaAnalysis {
    if documents.is_empty() {
        return SchemaAnalysis::empty();
    }

    let mut profile = Profile::default();
    for document in documents {
        profile.visit(DocValue::from(document), "", MAX_DEPTH);
    }
    profile.finish(documents.len())
}
