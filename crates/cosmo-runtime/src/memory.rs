//! In-memory backend.
//!
//! Holds containers and documents in process. Query text is recorded but not
//! interpreted: a query returns the container's documents (restricted to the
//! requested partition, capped at `max_items`), except `SELECT VALUE COUNT(1)`
//! which returns the document count.

use crate::adapter::{
    BackendConnector, ContainerInfo, DatabaseInfo, DocumentBackend, QueryOptions, QueryPage,
    QuerySpec, value_at_path,
};
use async_trait::async_trait;
use cosmo_core::{BackendError, ConnectionConfig};
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, RwLock};
use std::time::Duration;

struct MemoryContainer {
    info: ContainerInfo,
    throughput: Option<Value>,
    documents: Vec<Value>,
}

impl MemoryContainer {
    fn partition_value<'a>(&self, document: &'a Value) -> Option<&'a Value> {
        self.info
            .partition_key_path()
            .and_then(|path| value_at_path(document, path))
    }

    fn position(&self, id: &str, partition_key: Option<&Value>) -> Option<usize> {
        self.documents.iter().position(|doc| {
            doc.get("id").and_then(Value::as_str) == Some(id)
                && match partition_key {
                    Some(pk) if self.info.partition_key.is_some() => {
                        self.partition_value(doc).unwrap_or(&Value::Null) == pk
                    }
                    _ => true,
                }
        })
    }
}

/// A single database held in memory.
pub struct MemoryBackend {
    database_id: String,
    containers: RwLock<Vec<MemoryContainer>>,
    queries: Mutex<Vec<QuerySpec>>,
    probes: AtomicUsize,
    disposed: AtomicBool,
    fail_probe: AtomicBool,
    probe_delay: Option<Duration>,
}

impl MemoryBackend {
    pub fn new(database_id: impl Into<String>) -> Self {
        Self {
            database_id: database_id.into(),
            containers: RwLock::new(Vec::new()),
            queries: Mutex::new(Vec::new()),
            probes: AtomicUsize::new(0),
            disposed: AtomicBool::new(false),
            fail_probe: AtomicBool::new(false),
            probe_delay: None,
        }
    }

    /// Make every probe sleep first, so concurrent connects overlap.
    pub fn with_probe_delay(mut self, delay: Duration) -> Self {
        self.probe_delay = Some(delay);
        self
    }

    /// Add (or replace) a container.
    pub fn with_container(self, info: ContainerInfo, documents: Vec<Value>) -> Self {
        self.add_container(info, documents);
        self
    }

    pub fn add_container(&self, info: ContainerInfo, documents: Vec<Value>) {
        let mut containers = self.containers.write().unwrap();
        containers.retain(|c| c.info.id != info.id);
        containers.push(MemoryContainer {
            info,
            throughput: None,
            documents,
        });
    }

    pub fn set_throughput(&self, container_id: &str, throughput: Value) {
        let mut containers = self.containers.write().unwrap();
        if let Some(c) = containers.iter_mut().find(|c| c.info.id == container_id) {
            c.throughput = Some(throughput);
        }
    }

    pub fn set_fail_probe(&self, fail: bool) {
        self.fail_probe.store(fail, Ordering::SeqCst);
    }

    pub fn probe_count(&self) -> usize {
        self.probes.load(Ordering::SeqCst)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::SeqCst)
    }

    /// Queries received so far, in order.
    pub fn recorded_queries(&self) -> Vec<QuerySpec> {
        self.queries.lock().unwrap().clone()
    }

    pub fn documents(&self, container_id: &str) -> Vec<Value> {
        self.containers
            .read()
            .unwrap()
            .iter()
            .find(|c| c.info.id == container_id)
            .map(|c| c.documents.clone())
            .unwrap_or_default()
    }

    fn with_container_ref<T>(
        &self,
        container_id: &str,
        f: impl FnOnce(&MemoryContainer) -> T,
    ) -> Result<T, BackendError> {
        let containers = self.containers.read().unwrap();
        containers
            .iter()
            .find(|c| c.info.id == container_id)
            .map(f)
            .ok_or_else(|| container_missing(container_id))
    }

    fn with_container_mut<T>(
        &self,
        container_id: &str,
        f: impl FnOnce(&mut MemoryContainer) -> Result<T, BackendError>,
    ) -> Result<T, BackendError> {
        let mut containers = self.containers.write().unwrap();
        let container = containers
            .iter_mut()
            .find(|c| c.info.id == container_id)
            .ok_or_else(|| container_missing(container_id))?;
        f(container)
    }
}

fn container_missing(container_id: &str) -> BackendError {
    BackendError::with_status(404, format!("container '{}' not found", container_id))
}

fn document_id(document: &Value) -> Result<&str, BackendError> {
    document
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| BackendError::with_status(400, "document is missing a string 'id'"))
}

fn is_count_query(query: &str) -> bool {
    query
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_ascii_uppercase()
        .starts_with("SELECT VALUE COUNT(1)")
}

#[async_trait]
impl DocumentBackend for MemoryBackend {
    async fn probe(&self) -> Result<DatabaseInfo, BackendError> {
        self.probes.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.probe_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_probe.load(Ordering::SeqCst) {
            return Err(BackendError::with_status(
                404,
                format!("database '{}' not found", self.database_id),
            ));
        }
        Ok(DatabaseInfo {
            id: self.database_id.clone(),
            etag: None,
            timestamp: None,
        })
    }

    async fn list_databases(&self) -> Result<Vec<DatabaseInfo>, BackendError> {
        Ok(vec![DatabaseInfo {
            id: self.database_id.clone(),
            etag: None,
            timestamp: None,
        }])
    }

    async fn list_containers(&self) -> Result<Vec<ContainerInfo>, BackendError> {
        Ok(self
            .containers
            .read()
            .unwrap()
            .iter()
            .map(|c| c.info.clone())
            .collect())
    }

    async fn read_container(&self, container_id: &str) -> Result<ContainerInfo, BackendError> {
        self.with_container_ref(container_id, |c| c.info.clone())
    }

    async fn read_throughput(&self, container_id: &str) -> Result<Option<Value>, BackendError> {
        self.with_container_ref(container_id, |c| c.throughput.clone())
    }

    async fn count(&self, container_id: &str) -> Result<u64, BackendError> {
        self.with_container_ref(container_id, |c| c.documents.len() as u64)
    }

    async fn sample(&self, container_id: &str, n: usize) -> Result<Vec<Value>, BackendError> {
        self.with_container_ref(container_id, |c| {
            c.documents.iter().take(n).cloned().collect()
        })
    }

    async fn query(
        &self,
        container_id: &str,
        spec: &QuerySpec,
        options: &QueryOptions,
    ) -> Result<QueryPage, BackendError> {
        self.queries.lock().unwrap().push(spec.clone());

        let items = self.with_container_ref(container_id, |c| {
            if is_count_query(&spec.query) {
                return vec![json!(c.documents.len())];
            }
            c.documents
                .iter()
                .filter(|doc| match &options.partition_key {
                    Some(pk) => c.partition_value(doc).unwrap_or(&Value::Null) == pk,
                    None => true,
                })
                .take(options.max_items.unwrap_or(usize::MAX))
                .cloned()
                .collect()
        })?;

        Ok(QueryPage {
            request_charge: 1.0 + items.len() as f64 * 0.1,
            items,
        })
    }

    async fn point_read(
        &self,
        container_id: &str,
        id: &str,
        partition_key: &Value,
    ) -> Result<Option<Value>, BackendError> {
        self.with_container_ref(container_id, |c| {
            c.position(id, Some(partition_key))
                .map(|i| c.documents[i].clone())
        })
    }

    async fn create(&self, container_id: &str, document: &Value) -> Result<Value, BackendError> {
        let id = document_id(document)?.to_string();
        self.with_container_mut(container_id, |c| {
            let pk = c.partition_value(document).cloned().unwrap_or(Value::Null);
            if c.position(&id, Some(&pk)).is_some() {
                return Err(BackendError::with_status(
                    409,
                    format!("Entity with the specified id '{}' already exists", id),
                ));
            }
            c.documents.push(document.clone());
            Ok(document.clone())
        })
    }

    async fn replace(
        &self,
        container_id: &str,
        id: &str,
        partition_key: &Value,
        document: &Value,
    ) -> Result<Value, BackendError> {
        self.with_container_mut(container_id, |c| {
            let index = c.position(id, Some(partition_key)).ok_or_else(|| {
                BackendError::with_status(404, format!("document '{}' not found", id))
            })?;
            c.documents[index] = document.clone();
            Ok(document.clone())
        })
    }

    async fn delete(
        &self,
        container_id: &str,
        id: &str,
        partition_key: &Value,
    ) -> Result<(), BackendError> {
        self.with_container_mut(container_id, |c| {
            let index = c.position(id, Some(partition_key)).ok_or_else(|| {
                BackendError::with_status(404, format!("document '{}' not found", id))
            })?;
            c.documents.remove(index);
            Ok(())
        })
    }

    async fn upsert(&self, container_id: &str, document: &Value) -> Result<Value, BackendError> {
        let id = document_id(document)?.to_string();
        self.with_container_mut(container_id, |c| {
            let pk = c.partition_value(document).cloned().unwrap_or(Value::Null);
            match c.position(&id, Some(&pk)) {
                Some(index) => c.documents[index] = document.clone(),
                None => c.documents.push(document.clone()),
            }
            Ok(document.clone())
        })
    }

    async fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
    }
}

/// Hands out pre-built [`MemoryBackend`]s by connection id.
#[derive(Default)]
pub struct MemoryConnector {
    backends: RwLock<HashMap<String, Arc<MemoryBackend>>>,
    connects: AtomicUsize,
}

impl MemoryConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Serve `backend` for connection `id`.
    pub fn insert(&self, id: impl Into<String>, backend: Arc<MemoryBackend>) {
        self.backends.write().unwrap().insert(id.into(), backend);
    }

    pub fn backend(&self, id: &str) -> Option<Arc<MemoryBackend>> {
        self.backends.read().unwrap().get(id).cloned()
    }

    /// Number of `connect` calls received.
    pub fn connect_count(&self) -> usize {
        self.connects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BackendConnector for MemoryConnector {
    async fn connect(
        &self,
        config: &ConnectionConfig,
    ) -> Result<Arc<dyn DocumentBackend>, BackendError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        let backend: Arc<dyn DocumentBackend> = self.backend(&config.id).ok_or_else(|| {
            BackendError::new(format!("no in-memory backend for connection '{}'", config.id))
        })?;
        Ok(backend)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> MemoryBackend {
        MemoryBackend::new("db").with_container(
            ContainerInfo::new("people").with_partition_key("/team"),
            vec![
                json!({"id": "1", "team": "red"}),
                json!({"id": "2", "team": "blue"}),
                json!({"id": "3", "team": "red"}),
            ],
        )
    }

    #[tokio::test]
    async fn test_count_query_and_partition_filter() {
        let backend = backend();
        let page = backend
            .query(
                "people",
                &QuerySpec::new("SELECT VALUE COUNT(1) FROM c"),
                &QueryOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(page.items, vec![json!(3)]);

        let options = QueryOptions {
            partition_key: Some(json!("red")),
            ..QueryOptions::default()
        };
        let page = backend
            .query("people", &QuerySpec::new("SELECT * FROM c"), &options)
            .await
            .unwrap();
        assert_eq!(page.items.len(), 2);
        assert_eq!(backend.recorded_queries().len(), 2);
    }

    #[tokio::test]
    async fn test_create_conflict_and_missing_delete() {
        let backend = backend();
        let err = backend
            .create("people", &json!({"id": "1", "team": "red"}))
            .await
            .unwrap_err();
        assert!(err.is_conflict());

        // Same id, different partition: a distinct document.
        backend
            .create("people", &json!({"id": "1", "team": "green"}))
            .await
            .unwrap();

        let err = backend
            .delete("people", "9", &json!("red"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_point_read_respects_partition() {
        let backend = backend();
        assert!(backend.point_read("people", "2", &json!("blue")).await.unwrap().is_some());
        assert!(backend.point_read("people", "2", &json!("red")).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_container_is_404() {
        let err = backend().count("nope").await.unwrap_err();
        assert!(err.is_not_found());
    }
}
