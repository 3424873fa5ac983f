//! Container statistics.
//!
//! The document count is exact. Sizes and the partition distribution are
//! estimated from a sample of at most `sample_size` documents.

use cosmo_core::{CosmoError, CosmoResult};
use cosmo_runtime::{DocumentBackend, value_at_path};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

/// Bucket for documents whose partition value is missing or null.
pub const UNDEFINED_PARTITION: &str = "undefined";

pub const DEFAULT_STATS_SAMPLE_SIZE: usize = 1000;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerStats {
    pub document_count: u64,
    #[serde(rename = "sizeInKB")]
    pub size_in_kb: u64,
    pub sampled_documents: usize,
    pub partition_key_path: String,
    pub partition_key_statistics: Vec<PartitionKeyStats>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PartitionKeyStats {
    pub partition_key_value: String,
    /// Extrapolated to the whole container.
    pub document_count: u64,
    /// Bytes seen in the sample only, not extrapolated.
    #[serde(rename = "sizeInKB")]
    pub size_in_kb: u64,
    pub sampled_documents: usize,
    /// Sampled bytes scaled up to the whole container.
    #[serde(rename = "estimatedSizeInKB")]
    pub estimated_size_in_kb: u64,
}

struct PartitionStat {
    key: String,
    count: usize,
    bytes: u64,
}

/// Estimates container size and partition distribution.
#[derive(Debug, Clone, Copy)]
pub struct StatsSampler {
    sample_size: usize,
}

impl Default for StatsSampler {
    fn default() -> Self {
        Self::new(DEFAULT_STATS_SAMPLE_SIZE)
    }
}

impl StatsSampler {
    pub fn new(sample_size: usize) -> Self {
        Self { sample_size }
    }

    pub fn sample_size(&self) -> usize {
        self.sample_size
    }

    pub async fn collect(
        &self,
        backend: &dyn DocumentBackend,
        container_id: &str,
    ) -> CosmoResult<ContainerStats> {
        let document_count = backend
            .count(container_id)
            .await
            .map_err(|e| CosmoError::container(container_id, e))?;

        let container = backend
            .read_container(container_id)
            .await
            .map_err(|e| CosmoError::container(container_id, e))?;
        let partition_key_path = container
            .partition_key_path()
            .ok_or_else(|| {
                CosmoError::Schema(format!(
                    "container '{}' does not have a valid partition key defined",
                    container_id
                ))
            })?
            .to_string();

        let sample = backend
            .sample(container_id, self.sample_size)
            .await
            .map_err(|e| CosmoError::container(container_id, e))?;

        let stats = summarize(document_count, &partition_key_path, &sample);
        debug!(
            container_id = %container_id,
            document_count,
            sampled = stats.sampled_documents,
            partitions = stats.partition_key_statistics.len(),
            "Computed container stats"
        );
        Ok(stats)
    }
}

/// Fold a sample into container statistics.
pub fn summarize(document_count: u64, partition_key_path: &str, sample: &[Value]) -> ContainerStats {
    let mut partitions: Vec<PartitionStat> = Vec::new();
    let mut total_bytes: u64 = 0;

    for document in sample {
        let bytes = serialized_size(document);
        total_bytes += bytes;

        let key = partition_label(value_at_path(document, partition_key_path));
        match partitions.iter_mut().find(|p| p.key == key) {
            Some(stat) => {
                stat.count += 1;
                stat.bytes += bytes;
            }
            None => partitions.push(PartitionStat {
                key,
                count: 1,
                bytes,
            }),
        }
    }

    let sampled = sample.len();
    let avg_size = if sampled == 0 {
        0.0
    } else {
        total_bytes as f64 / sampled as f64
    };
    let scale = if sampled == 0 {
        0.0
    } else {
        document_count as f64 / sampled as f64
    };

    let partition_key_statistics = partitions
        .into_iter()
        .map(|p| PartitionKeyStats {
            partition_key_value: p.key,
            document_count: (p.count as f64 * scale).round() as u64,
            size_in_kb: (p.bytes as f64 / 1024.0).round() as u64,
            sampled_documents: p.count,
            estimated_size_in_kb: (p.bytes as f64 * scale / 1024.0).round() as u64,
        })
        .collect();

    ContainerStats {
        document_count,
        size_in_kb: (document_count as f64 * avg_size / 1024.0).round() as u64,
        sampled_documents: sampled,
        partition_key_path: partition_key_path.to_string(),
        partition_key_statistics,
    }
}

fn serialized_size(document: &Value) -> u64 {
    serde_json::to_vec(document)
        .map(|bytes| bytes.len() as u64)
        .unwrap_or(0)
}

fn partition_label(value: Option<&Value>) -> String {
    match value {
        None | Some(Value::Null) => UNDEFINED_PARTITION.to_string(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    }
}
