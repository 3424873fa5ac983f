//! Cosmos DB backend over the REST gateway API.
//!
//! Every request is signed with the account master key (see [`auth`]).
//! Queries follow continuation tokens until `max_items` is reached or the
//! result set is drained.

pub mod auth;
pub mod client;
pub mod connection_string;

use async_trait::async_trait;
use client::{GatewayClient, GatewayRequest, encode_segment};
use connection_string::AccountCredentials;
use cosmo_core::{BackendError, ConnectionConfig, DriverOptions};
use cosmo_runtime::{
    BackendConnector, ContainerInfo, DatabaseInfo, DocumentBackend, QueryOptions, QueryPage,
    QuerySpec, value_at_path,
};
use reqwest::Method;
use serde_json::{Value, json};
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use tracing::debug;

const QUERY_CONTENT_TYPE: &str = "application/query+json";
const JSON_CONTENT_TYPE: &str = "application/json";

/// Builds [`RestBackend`]s, sharing one HTTP client.
pub struct RestConnector {
    http: reqwest::Client,
    options: DriverOptions,
}

impl RestConnector {
    pub fn new(options: DriverOptions) -> Self {
        Self {
            http: reqwest::Client::new(),
            options,
        }
    }
}

#[async_trait]
impl BackendConnector for RestConnector {
    async fn connect(
        &self,
        config: &ConnectionConfig,
    ) -> Result<Arc<dyn DocumentBackend>, BackendError> {
        let credentials = AccountCredentials::parse(&config.connection_string)?;
        debug!(
            connection_id = %config.id,
            endpoint = %credentials.endpoint,
            "Creating gateway client"
        );
        let client = GatewayClient::new(
            self.http.clone(),
            credentials.endpoint,
            credentials.key,
            self.options,
        );
        Ok(Arc::new(RestBackend::new(client, config.database_id.clone())))
    }
}

/// One database reached through the gateway.
pub struct RestBackend {
    client: GatewayClient,
    database_id: String,
    /// Partition key paths by container, filled on first write.
    partition_paths: RwLock<HashMap<String, Option<String>>>,
}

impl RestBackend {
    pub fn new(client: GatewayClient, database_id: String) -> Self {
        Self {
            client,
            database_id,
            partition_paths: RwLock::new(HashMap::new()),
        }
    }

    fn db_link(&self) -> String {
        format!("dbs/{}", self.database_id)
    }

    fn db_path(&self) -> String {
        format!("dbs/{}", encode_segment(&self.database_id))
    }

    fn coll_link(&self, container_id: &str) -> String {
        format!("{}/colls/{}", self.db_link(), container_id)
    }

    fn coll_path(&self, container_id: &str) -> String {
        format!("{}/colls/{}", self.db_path(), encode_segment(container_id))
    }

    fn doc_link(&self, container_id: &str, id: &str) -> String {
        format!("{}/docs/{}", self.coll_link(container_id), id)
    }

    fn doc_path(&self, container_id: &str, id: &str) -> String {
        format!("{}/docs/{}", self.coll_path(container_id), encode_segment(id))
    }

    async fn read_container_raw(&self, container_id: &str) -> Result<Value, BackendError> {
        let request = GatewayRequest::new(
            Method::GET,
            self.coll_path(container_id),
            "colls",
            self.coll_link(container_id),
        );
        Ok(self.client.send(&request).await?.body)
    }

    async fn partition_path(&self, container_id: &str) -> Result<Option<String>, BackendError> {
        let cached = self.partition_paths.read().unwrap().get(container_id).cloned();
        if let Some(path) = cached {
            return Ok(path);
        }
        let container = self.read_container(container_id).await?;
        let path = container.partition_key_path().map(str::to_string);
        self.partition_paths
            .write()
            .unwrap()
            .insert(container_id.to_string(), path.clone());
        Ok(path)
    }

    /// Partition key value of a document about to be written.
    async fn document_partition_key(
        &self,
        container_id: &str,
        document: &Value,
    ) -> Result<Option<Value>, BackendError> {
        Ok(self
            .partition_path(container_id)
            .await?
            .map(|path| value_at_path(document, &path).cloned().unwrap_or(Value::Null)))
    }

    /// Page through a query, stopping at `max_items`.
    async fn query_pages(
        &self,
        container_id: &str,
        spec: &QuerySpec,
        options: &QueryOptions,
    ) -> Result<QueryPage, BackendError> {
        let cross_partition = options
            .enable_cross_partition
            .unwrap_or(self.client.options().enable_cross_partition_query);
        let mut page = QueryPage::default();
        let mut continuation: Option<String> = None;

        loop {
            let mut request = GatewayRequest::new(
                Method::POST,
                format!("{}/docs", self.coll_path(container_id)),
                "docs",
                self.coll_link(container_id),
            )
            .header("content-type", QUERY_CONTENT_TYPE)
            .header("x-ms-documentdb-isquery", "True")
            .body(json!({
                "query": spec.query,
                "parameters": spec.parameters,
            }));

            if let Some(pk) = &options.partition_key {
                request = request.header("x-ms-documentdb-partitionkey", partition_header(pk));
            } else if cross_partition {
                request = request.header("x-ms-documentdb-query-enablecrosspartition", "True");
            }
            if let Some(max) = options.max_items {
                let remaining = max.saturating_sub(page.items.len());
                request = request.header("x-ms-max-item-count", remaining.to_string());
            }
            if let Some(token) = &continuation {
                request = request.header("x-ms-continuation", token.clone());
            }

            let response = self.client.send(&request).await?;
            page.request_charge += response.request_charge;
            if let Some(documents) = response.body.get("Documents").and_then(Value::as_array) {
                page.items.extend(documents.iter().cloned());
            }

            let full = options.max_items.is_some_and(|max| page.items.len() >= max);
            match response.continuation {
                Some(token) if !full => continuation = Some(token),
                _ => break,
            }
        }

        if let Some(max) = options.max_items {
            page.items.truncate(max);
        }
        debug!(
            container_id = %container_id,
            items = page.items.len(),
            request_charge = page.request_charge,
            "Query completed"
        );
        Ok(page)
    }

    async fn write_document(
        &self,
        container_id: &str,
        document: &Value,
        upsert: bool,
    ) -> Result<Value, BackendError> {
        let mut request = GatewayRequest::new(
            Method::POST,
            format!("{}/docs", self.coll_path(container_id)),
            "docs",
            self.coll_link(container_id),
        )
        .header("content-type", JSON_CONTENT_TYPE)
        .body(document.clone());
        if let Some(pk) = self.document_partition_key(container_id, document).await? {
            request = request.header("x-ms-documentdb-partitionkey", partition_header(&pk));
        }
        if upsert {
            request = request.header("x-ms-documentdb-is-upsert", "True");
        }
        Ok(self.client.send(&request).await?.body)
    }
}

/// The partition key header is a JSON array holding the value.
fn partition_header(value: &Value) -> String {
    Value::Array(vec![value.clone()]).to_string()
}

fn parse_list<T: serde::de::DeserializeOwned>(body: &Value, field: &str) -> Result<Vec<T>, BackendError> {
    let items = body.get(field).cloned().unwrap_or_else(|| json!([]));
    serde_json::from_value(items)
        .map_err(|e| BackendError::new(format!("cannot decode {}: {}", field, e)))
}

#[async_trait]
impl DocumentBackend for RestBackend {
    async fn probe(&self) -> Result<DatabaseInfo, BackendError> {
        let request = GatewayRequest::new(Method::GET, self.db_path(), "dbs", self.db_link());
        let body = self.client.send(&request).await?.body;
        serde_json::from_value(body)
            .map_err(|e| BackendError::new(format!("cannot decode database: {}", e)))
    }

    async fn list_databases(&self) -> Result<Vec<DatabaseInfo>, BackendError> {
        let request = GatewayRequest::new(Method::GET, "dbs", "dbs", "");
        parse_list(&self.client.send(&request).await?.body, "Databases")
    }

    async fn list_containers(&self) -> Result<Vec<ContainerInfo>, BackendError> {
        let request = GatewayRequest::new(
            Method::GET,
            format!("{}/colls", self.db_path()),
            "colls",
            self.db_link(),
        );
        parse_list(&self.client.send(&request).await?.body, "DocumentCollections")
    }

    async fn read_container(&self, container_id: &str) -> Result<ContainerInfo, BackendError> {
        let body = self.read_container_raw(container_id).await?;
        serde_json::from_value(body)
            .map_err(|e| BackendError::new(format!("cannot decode container: {}", e)))
    }

    async fn read_throughput(&self, container_id: &str) -> Result<Option<Value>, BackendError> {
        let container = self.read_container_raw(container_id).await?;
        let Some(rid) = container.get("_rid").and_then(Value::as_str) else {
            return Ok(None);
        };

        let request = GatewayRequest::new(Method::POST, "offers", "offers", "")
            .header("content-type", QUERY_CONTENT_TYPE)
            .header("x-ms-documentdb-isquery", "True")
            .body(json!({
                "query": "SELECT * FROM root r WHERE r.offerResourceId = @rid",
                "parameters": [{"name": "@rid", "value": rid}],
            }));
        let body = self.client.send(&request).await?.body;
        Ok(body
            .get("Offers")
            .and_then(Value::as_array)
            .and_then(|offers| offers.first())
            .cloned())
    }

    async fn count(&self, container_id: &str) -> Result<u64, BackendError> {
        // Cross-partition aggregates come back as one partial count per
        // partition range.
        let page = self
            .query_pages(
                container_id,
                &QuerySpec::new("SELECT VALUE COUNT(1) FROM c"),
                &QueryOptions::default(),
            )
            .await?;
        Ok(page.items.iter().filter_map(Value::as_u64).sum())
    }

    async fn sample(&self, container_id: &str, n: usize) -> Result<Vec<Value>, BackendError> {
        let page = self
            .query_pages(
                container_id,
                &QuerySpec::new(format!("SELECT TOP {} * FROM c", n)),
                &QueryOptions::max_items(n),
            )
            .await?;
        Ok(page.items)
    }

    async fn query(
        &self,
        container_id: &str,
        spec: &QuerySpec,
        options: &QueryOptions,
    ) -> Result<QueryPage, BackendError> {
        self.query_pages(container_id, spec, options).await
    }

    async fn point_read(
        &self,
        container_id: &str,
        id: &str,
        partition_key: &Value,
    ) -> Result<Option<Value>, BackendError> {
        let request = GatewayRequest::new(
            Method::GET,
            self.doc_path(container_id, id),
            "docs",
            self.doc_link(container_id, id),
        )
        .header("x-ms-documentdb-partitionkey", partition_header(partition_key));
        match self.client.send(&request).await {
            Ok(response) => Ok(Some(response.body)),
            Err(e) if e.is_not_found() => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn create(&self, container_id: &str, document: &Value) -> Result<Value, BackendError> {
        self.write_document(container_id, document, false).await
    }

    async fn replace(
        &self,
        container_id: &str,
        id: &str,
        partition_key: &Value,
        document: &Value,
    ) -> Result<Value, BackendError> {
        let request = GatewayRequest::new(
            Method::PUT,
            self.doc_path(container_id, id),
            "docs",
            self.doc_link(container_id, id),
        )
        .header("content-type", JSON_CONTENT_TYPE)
        .header("x-ms-documentdb-partitionkey", partition_header(partition_key))
        .body(document.clone());
        Ok(self.client.send(&request).await?.body)
    }

    async fn delete(
        &self,
        container_id: &str,
        id: &str,
        partition_key: &Value,
    ) -> Result<(), BackendError> {
        let request = GatewayRequest::new(
            Method::DELETE,
            self.doc_path(container_id, id),
            "docs",
            self.doc_link(container_id, id),
        )
        .header("x-ms-documentdb-partitionkey", partition_header(partition_key));
        self.client.send(&request).await?;
        Ok(())
    }

    async fn upsert(&self, container_id: &str, document: &Value) -> Result<Value, BackendError> {
        self.write_document(container_id, document, true).await
    }
}
