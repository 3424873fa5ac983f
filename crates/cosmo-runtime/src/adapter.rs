//! Backend capability interface.
//!
//! The registry, the analysis engine and the tool executor only ever talk to
//! a backend through [`DocumentBackend`]. Drivers plug in by implementing it
//! together with a [`BackendConnector`] that builds handles from a
//! [`ConnectionConfig`].

use async_trait::async_trait;
use cosmo_core::{BackendError, ConnectionConfig};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

/// Database metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatabaseInfo {
    pub id: String,
    #[serde(rename = "_etag", default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(rename = "_ts", default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

/// Partition key definition of a container.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PartitionKeyDefinition {
    #[serde(default)]
    pub paths: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

impl PartitionKeyDefinition {
    pub fn hash(path: impl Into<String>) -> Self {
        Self {
            paths: vec![path.into()],
            kind: Some("Hash".to_string()),
        }
    }

    /// The first key path, if any.
    pub fn primary_path(&self) -> Option<&str> {
        self.paths.first().map(String::as_str).filter(|p| !p.is_empty())
    }
}

/// Walk a `/`-separated key path (`/address/city`) into a document.
/// Returns `None` when a segment is missing or crosses a non-object.
pub fn value_at_path<'a>(document: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .try_fold(document, |current, segment| current.as_object()?.get(segment))
}

/// Container metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContainerInfo {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub partition_key: Option<PartitionKeyDefinition>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indexing_policy: Option<Value>,
    #[serde(rename = "_etag", default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(rename = "_ts", default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<i64>,
}

impl ContainerInfo {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            partition_key: None,
            indexing_policy: None,
            etag: None,
            timestamp: None,
        }
    }

    pub fn with_partition_key(mut self, path: impl Into<String>) -> Self {
        self.partition_key = Some(PartitionKeyDefinition::hash(path));
        self
    }

    pub fn partition_key_path(&self) -> Option<&str> {
        self.partition_key
            .as_ref()
            .and_then(PartitionKeyDefinition::primary_path)
    }
}

/// A named query parameter (`@name`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryParameter {
    pub name: String,
    pub value: Value,
}

/// Query text plus parameters, passed to the backend verbatim.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuerySpec {
    pub query: String,
    #[serde(default)]
    pub parameters: Vec<QueryParameter>,
}

impl QuerySpec {
    pub fn new(query: impl Into<String>) -> Self {
        Self {
            query: query.into(),
            parameters: Vec::new(),
        }
    }

    /// Add a parameter. A missing `@` prefix is added.
    pub fn param(mut self, name: impl Into<String>, value: Value) -> Self {
        let name = name.into();
        let name = if name.starts_with('@') {
            name
        } else {
            format!("@{}", name)
        };
        self.parameters.push(QueryParameter { name, value });
        self
    }
}

/// Per-query driver options.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryOptions {
    /// Stop after this many items. `None` drains every page.
    pub max_items: Option<usize>,
    /// `None` uses the driver default.
    pub enable_cross_partition: Option<bool>,
    /// Restrict the query to one logical partition.
    pub partition_key: Option<Value>,
}

impl QueryOptions {
    pub fn max_items(max_items: usize) -> Self {
        Self {
            max_items: Some(max_items),
            ..Self::default()
        }
    }
}

/// Result of a query.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct QueryPage {
    pub items: Vec<Value>,
    /// Request units consumed, summed over pages.
    pub request_charge: f64,
}

/// An established handle to one account/database pair.
#[async_trait]
pub trait DocumentBackend: Send + Sync {
    /// Read database metadata. Used to verify a new connection.
    async fn probe(&self) -> Result<DatabaseInfo, BackendError>;

    async fn list_databases(&self) -> Result<Vec<DatabaseInfo>, BackendError>;

    async fn list_containers(&self) -> Result<Vec<ContainerInfo>, BackendError>;

    /// Read a container definition. Absent containers are a 404.
    async fn read_container(&self, container_id: &str) -> Result<ContainerInfo, BackendError>;

    /// Provisioned throughput, `None` when the container has no offer
    /// (serverless or shared throughput).
    async fn read_throughput(&self, container_id: &str) -> Result<Option<Value>, BackendError>;

    /// Exact document count.
    async fn count(&self, container_id: &str) -> Result<u64, BackendError>;

    /// Up to `n` documents, in no particular order.
    async fn sample(&self, container_id: &str, n: usize) -> Result<Vec<Value>, BackendError>;

    async fn query(
        &self,
        container_id: &str,
        spec: &QuerySpec,
        options: &QueryOptions,
    ) -> Result<QueryPage, BackendError>;

    /// Point read. A missing document is `Ok(None)`.
    async fn point_read(
        &self,
        container_id: &str,
        id: &str,
        partition_key: &Value,
    ) -> Result<Option<Value>, BackendError>;

    async fn create(&self, container_id: &str, document: &Value) -> Result<Value, BackendError>;

    async fn replace(
        &self,
        container_id: &str,
        id: &str,
        partition_key: &Value,
        document: &Value,
    ) -> Result<Value, BackendError>;

    async fn delete(
        &self,
        container_id: &str,
        id: &str,
        partition_key: &Value,
    ) -> Result<(), BackendError>;

    async fn upsert(&self, container_id: &str, document: &Value) -> Result<Value, BackendError>;

    /// Release driver resources. Called once when the registry closes the
    /// connection.
    async fn dispose(&self) {}
}

/// Builds backend handles from connection configs.
#[async_trait]
pub trait BackendConnector: Send + Sync {
    async fn connect(
        &self,
        config: &ConnectionConfig,
    ) -> Result<Arc<dyn DocumentBackend>, BackendError>;
}
