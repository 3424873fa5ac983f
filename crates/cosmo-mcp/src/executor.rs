//! Tool executor.
//!
//! One handler per tool. Each handler parses its arguments, resolves (and if
//! needed connects) the target connection, and calls the backend, the
//! analysis engine or, for writes, the modification guard first. Every
//! failure becomes an error result; nothing escapes to the transport.

use crate::catalog;
use crate::error::McpError;
use crate::protocol::ToolContent;
use chrono::{DateTime, Utc};
use cosmo_analysis::{SchemaAnalyzer, StatsSampler};
use cosmo_core::{BackendError, CosmoError, SamplingConfig};
use cosmo_policy::{ModificationGuard, WriteOperation};
use cosmo_runtime::{
    ActiveConnection, ConnectionRegistry, ContainerInfo, DatabaseInfo, PartitionKeyDefinition,
    QueryOptions, QuerySpec, value_at_path,
};
use serde::de::{self, DeserializeOwned, Deserializer};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value, json};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Result of a tool execution.
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionResult {
    /// Whether the execution was successful.
    pub success: bool,
    /// The result content.
    pub content: Vec<ToolContent>,
    /// Error message if failed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ExecutionResult {
    /// A successful result rendered as pretty-printed JSON text.
    pub fn success_json(value: Value) -> Self {
        let text = serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string());
        Self {
            success: true,
            content: vec![ToolContent::Text { text }],
            error: None,
        }
    }

    /// An error result. The text is prefixed with `Error: `.
    pub fn error(message: impl Into<String>) -> Self {
        let msg = message.into();
        Self {
            success: false,
            content: vec![ToolContent::Text {
                text: format!("Error: {}", msg),
            }],
            error: Some(msg),
        }
    }

    /// The first text block.
    pub fn text(&self) -> &str {
        self.content.first().map(ToolContent::text).unwrap_or_default()
    }

    /// Parse the text of a successful result back into JSON.
    pub fn json(&self) -> Option<Value> {
        if !self.success {
            return None;
        }
        serde_json::from_str(self.text()).ok()
    }
}

// ---------------------------------------------------------------------------
// Arguments
// ---------------------------------------------------------------------------

/// Accept any non-negative integral JSON number (clients often send `10.0`).
fn count<'de, D>(deserializer: D) -> Result<Option<usize>, D::Error>
where
    D: Deserializer<'de>,
{
    match Option::<f64>::deserialize(deserializer)? {
        None => Ok(None),
        Some(n) if n.is_finite() && n >= 0.0 && n.fract() == 0.0 => Ok(Some(n as usize)),
        Some(n) => Err(de::Error::custom(format!(
            "expected a non-negative integer, got {}",
            n
        ))),
    }
}

#[derive(Debug, Deserialize)]
struct ConnectionArgs {
    connection_id: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ContainerArgs {
    connection_id: Option<String>,
    container_id: String,
}

#[derive(Debug, Deserialize)]
struct SampleArgs {
    connection_id: Option<String>,
    container_id: String,
    #[serde(default, deserialize_with = "count")]
    sample_size: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct QueryArgs {
    connection_id: Option<String>,
    container_id: String,
    query: String,
    parameters: Option<Map<String, Value>>,
    #[serde(default, deserialize_with = "count")]
    max_items: Option<usize>,
    enable_cross_partition: Option<bool>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum OrderDirection {
    #[default]
    #[serde(rename = "ASC", alias = "asc")]
    Asc,
    #[serde(rename = "DESC", alias = "desc")]
    Desc,
}

impl OrderDirection {
    fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

#[derive(Debug, Deserialize)]
struct GetDocumentsArgs {
    connection_id: Option<String>,
    container_id: String,
    #[serde(default, deserialize_with = "count")]
    limit: Option<usize>,
    partition_key: Option<Value>,
    filter_conditions: Option<Map<String, Value>>,
    order_by: Option<String>,
    #[serde(default)]
    order_direction: OrderDirection,
}

#[derive(Debug, Deserialize)]
struct DocumentRefArgs {
    connection_id: Option<String>,
    container_id: String,
    document_id: String,
    partition_key: Value,
}

#[derive(Debug, Deserialize)]
struct WriteArgs {
    connection_id: Option<String>,
    container_id: String,
    document: Value,
    partition_key: Value,
}

#[derive(Debug, Deserialize)]
struct UpdateArgs {
    connection_id: Option<String>,
    container_id: String,
    document_id: String,
    document: Value,
    partition_key: Value,
}

fn parse<T: DeserializeOwned>(tool: &str, arguments: Value) -> Result<T, McpError> {
    // Clients may send `null` or omit arguments for tools without required fields.
    let arguments = match arguments {
        Value::Null => json!({}),
        other => other,
    };
    serde_json::from_value(arguments).map_err(|e| McpError::InvalidArguments {
        tool: tool.to_string(),
        reason: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// Validation and query building
// ---------------------------------------------------------------------------

/// `a`, `a_b`, `address.city`: `[A-Za-z0-9_]` segments joined by `.`.
pub fn is_identifier_path(path: &str) -> bool {
    !path.is_empty()
        && path.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
        })
}

fn require_identifier_path(what: &str, path: &str) -> Result<(), CosmoError> {
    if is_identifier_path(path) {
        Ok(())
    } else {
        Err(CosmoError::validation(format!(
            "invalid {} '{}': use letters, digits and '_' separated by '.'",
            what, path
        )))
    }
}

fn require_partition_key_value(value: &Value) -> Result<(), CosmoError> {
    match value {
        Value::String(_) | Value::Number(_) | Value::Bool(_) => Ok(()),
        other => Err(CosmoError::validation(format!(
            "partition_key must be a string, number or boolean, got {}",
            other
        ))),
    }
}

/// The document's `id`, which must be a non-empty string on an object.
fn require_document_id(document: &Value) -> Result<&str, CosmoError> {
    if !document.is_object() {
        return Err(CosmoError::validation("document must be a JSON object"));
    }
    match document.get("id").and_then(Value::as_str) {
        Some(id) if !id.trim().is_empty() => Ok(id),
        _ => Err(CosmoError::validation(
            "document must have a non-empty string 'id' field",
        )),
    }
}

/// Build the `mcp_get_documents` query. Filter values are bound as
/// `@param0`, `@param1`, ... in the order the filters were given.
pub fn build_documents_query(
    limit: usize,
    filters: &Map<String, Value>,
    order_by: Option<&str>,
    direction: OrderDirection,
) -> Result<QuerySpec, CosmoError> {
    let mut clauses = Vec::with_capacity(filters.len());
    let mut parameters = Vec::with_capacity(filters.len());
    for (index, (field, value)) in filters.iter().enumerate() {
        require_identifier_path("filter field", field)?;
        let name = format!("@param{}", index);
        clauses.push(format!("c.{} = {}", field, name));
        parameters.push((name, value.clone()));
    }

    let mut query = format!("SELECT TOP {} * FROM c", limit);
    if !clauses.is_empty() {
        query.push_str(" WHERE ");
        query.push_str(&clauses.join(" AND "));
    }
    if let Some(field) = order_by {
        require_identifier_path("order_by field", field)?;
        query.push_str(&format!(" ORDER BY c.{} {}", field, direction.as_sql()));
    }

    Ok(parameters
        .into_iter()
        .fold(QuerySpec::new(query), |spec, (name, value)| spec.param(name, value)))
}

// ---------------------------------------------------------------------------
// Output views
// ---------------------------------------------------------------------------

fn timestamp(ts: Option<i64>) -> Option<DateTime<Utc>> {
    ts.and_then(|ts| DateTime::from_timestamp(ts, 0))
}

#[derive(Debug, Serialize)]
struct DatabaseView {
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    etag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<DateTime<Utc>>,
}

impl From<DatabaseInfo> for DatabaseView {
    fn from(info: DatabaseInfo) -> Self {
        Self {
            id: info.id,
            etag: info.etag,
            timestamp: timestamp(info.timestamp),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ContainerView {
    id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    partition_key: Option<PartitionKeyDefinition>,
    #[serde(skip_serializing_if = "Option::is_none")]
    indexing_policy: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    etag: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    timestamp: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    throughput_info: Option<Value>,
}

impl From<ContainerInfo> for ContainerView {
    fn from(info: ContainerInfo) -> Self {
        Self {
            id: info.id,
            partition_key: info.partition_key,
            indexing_policy: info.indexing_policy,
            etag: info.etag,
            timestamp: timestamp(info.timestamp),
            throughput_info: None,
        }
    }
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, McpError> {
    Ok(serde_json::to_value(value)?)
}

// ---------------------------------------------------------------------------
// Executor
// ---------------------------------------------------------------------------

/// Executes tool calls against the connection registry.
#[derive(Clone)]
pub struct ToolExecutor {
    registry: Arc<ConnectionRegistry>,
    guard: ModificationGuard,
    sampling: SamplingConfig,
}

impl ToolExecutor {
    pub fn new(
        registry: Arc<ConnectionRegistry>,
        guard: ModificationGuard,
        sampling: SamplingConfig,
    ) -> Self {
        Self {
            registry,
            guard,
            sampling,
        }
    }

    pub fn registry(&self) -> &Arc<ConnectionRegistry> {
        &self.registry
    }

    pub fn guard(&self) -> &ModificationGuard {
        &self.guard
    }

    /// Execute a tool by name.
    pub async fn execute(&self, tool: &str, arguments: Value) -> ExecutionResult {
        let started = Instant::now();
        debug!(tool = %tool, "Executing tool");

        match self.dispatch(tool, arguments).await {
            Ok(value) => {
                info!(
                    tool = %tool,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Tool succeeded"
                );
                ExecutionResult::success_json(value)
            }
            Err(e) => {
                let code = match &e {
                    McpError::Cosmo(inner) => inner.code(),
                    McpError::ToolNotFound { .. } => "TOOL_NOT_FOUND",
                    McpError::InvalidArguments { .. } => "INVALID_ARGUMENTS",
                    _ => "INTERNAL_ERROR",
                };
                warn!(tool = %tool, code, error = %e, "Tool failed");
                ExecutionResult::error(e.to_string())
            }
        }
    }

    async fn dispatch(&self, tool: &str, arguments: Value) -> Result<Value, McpError> {
        match tool {
            catalog::LIST_CONNECTIONS => self.list_connections(),
            catalog::LIST_DATABASES => self.list_databases(parse(tool, arguments)?).await,
            catalog::LIST_CONTAINERS => self.list_containers(parse(tool, arguments)?).await,
            catalog::GET_CONTAINER_DEFINITION => {
                self.container_definition(parse(tool, arguments)?).await
            }
            catalog::GET_CONTAINER_STATS => self.container_stats(parse(tool, arguments)?).await,
            catalog::COSMOS_QUERY => self.query(parse(tool, arguments)?).await,
            catalog::GET_DOCUMENTS => self.get_documents(parse(tool, arguments)?).await,
            catalog::GET_DOCUMENT_BY_ID => self.get_document(parse(tool, arguments)?).await,
            catalog::ANALYZE_SCHEMA => self.analyze_schema(parse(tool, arguments)?).await,
            catalog::CREATE_DOCUMENT => {
                self.write(WriteOperation::Create, parse(tool, arguments)?)
                    .await
            }
            catalog::UPSERT_DOCUMENT => {
                self.write(WriteOperation::Upsert, parse(tool, arguments)?)
                    .await
            }
            catalog::UPDATE_DOCUMENT => self.update(parse(tool, arguments)?).await,
            catalog::DELETE_DOCUMENT => self.delete(parse(tool, arguments)?).await,
            _ => Err(McpError::ToolNotFound {
                name: tool.to_string(),
                available: catalog::definitions().into_iter().map(|t| t.name).collect(),
            }),
        }
    }

    async fn connection(&self, id: Option<&str>) -> Result<Arc<ActiveConnection>, McpError> {
        Ok(self.registry.ensure_connected(id).await?)
    }

    fn list_connections(&self) -> Result<Value, McpError> {
        let connections = self.registry.summaries(&self.guard);
        Ok(json!({
            "defaultConnection": self.registry.default_id(),
            "connections": to_json(&connections)?,
        }))
    }

    async fn list_databases(&self, args: ConnectionArgs) -> Result<Value, McpError> {
        let connection = self.connection(args.connection_id.as_deref()).await?;
        let databases = connection
            .backend
            .list_databases()
            .await
            .map_err(CosmoError::from)?;
        let views: Vec<DatabaseView> = databases.into_iter().map(DatabaseView::from).collect();
        to_json(&views)
    }

    async fn list_containers(&self, args: ConnectionArgs) -> Result<Value, McpError> {
        let connection = self.connection(args.connection_id.as_deref()).await?;
        let containers = connection
            .backend
            .list_containers()
            .await
            .map_err(CosmoError::from)?;
        let views: Vec<ContainerView> = containers.into_iter().map(ContainerView::from).collect();
        to_json(&views)
    }

    async fn container_definition(&self, args: ContainerArgs) -> Result<Value, McpError> {
        let connection = self.connection(args.connection_id.as_deref()).await?;
        let backend = &connection.backend;
        let info = backend
            .read_container(&args.container_id)
            .await
            .map_err(|e| CosmoError::container(&args.container_id, e))?;

        let mut view = ContainerView::from(info);
        // Containers on shared database throughput have no offer of their own.
        view.throughput_info = match backend.read_throughput(&args.container_id).await {
            Ok(offer) => offer,
            Err(e) => {
                debug!(container_id = %args.container_id, error = %e, "No container throughput");
                None
            }
        };
        to_json(&view)
    }

    async fn container_stats(&self, args: SampleArgs) -> Result<Value, McpError> {
        let connection = self.connection(args.connection_id.as_deref()).await?;
        let sampler =
            StatsSampler::new(args.sample_size.unwrap_or(self.sampling.stats_sample_size));
        let stats = sampler
            .collect(connection.backend.as_ref(), &args.container_id)
            .await?;
        to_json(&stats)
    }

    async fn analyze_schema(&self, args: SampleArgs) -> Result<Value, McpError> {
        let connection = self.connection(args.connection_id.as_deref()).await?;
        let analyzer =
            SchemaAnalyzer::new(args.sample_size.unwrap_or(self.sampling.schema_sample_size));
        let analysis = analyzer
            .analyze(connection.backend.as_ref(), &args.container_id)
            .await?;
        to_json(&analysis)
    }

    async fn query(&self, args: QueryArgs) -> Result<Value, McpError> {
        if args.query.trim().is_empty() {
            return Err(CosmoError::validation("query must not be empty").into());
        }
        let max_items = args.max_items.unwrap_or(self.sampling.default_max_items);
        if max_items == 0 {
            return Err(CosmoError::validation("max_items must be at least 1").into());
        }

        let connection = self.connection(args.connection_id.as_deref()).await?;
        let spec = args
            .parameters
            .unwrap_or_default()
            .into_iter()
            .fold(QuerySpec::new(args.query), |spec, (name, value)| {
                spec.param(name, value)
            });
        let options = QueryOptions {
            max_items: Some(max_items),
            enable_cross_partition: Some(args.enable_cross_partition.unwrap_or(true)),
            partition_key: None,
        };

        let started = Instant::now();
        let page = connection
            .backend
            .query(&args.container_id, &spec, &options)
            .await
            .map_err(|e| CosmoError::container(&args.container_id, e))?;
        let execution_time_ms = started.elapsed().as_millis() as u64;

        Ok(json!({
            "documents": page.items,
            "stats": {
                "requestCharge": page.request_charge,
                "executionTimeMs": execution_time_ms,
                "documentCount": page.items.len(),
            }
        }))
    }

    async fn get_documents(&self, args: GetDocumentsArgs) -> Result<Value, McpError> {
        let limit = args.limit.unwrap_or(self.sampling.default_max_items);
        if limit == 0 {
            return Err(CosmoError::validation("limit must be at least 1").into());
        }
        if let Some(pk) = &args.partition_key {
            require_partition_key_value(pk)?;
        }
        let spec = build_documents_query(
            limit,
            &args.filter_conditions.unwrap_or_default(),
            args.order_by.as_deref(),
            args.order_direction,
        )?;

        let connection = self.connection(args.connection_id.as_deref()).await?;
        let options = QueryOptions {
            max_items: Some(limit),
            enable_cross_partition: None,
            partition_key: args.partition_key,
        };
        let page = connection
            .backend
            .query(&args.container_id, &spec, &options)
            .await
            .map_err(|e| CosmoError::container(&args.container_id, e))?;
        Ok(Value::Array(page.items))
    }

    async fn get_document(&self, args: DocumentRefArgs) -> Result<Value, McpError> {
        require_partition_key_value(&args.partition_key)?;
        let connection = self.connection(args.connection_id.as_deref()).await?;
        let document = connection
            .backend
            .point_read(&args.container_id, &args.document_id, &args.partition_key)
            .await
            .map_err(|e| CosmoError::container(&args.container_id, e))?;

        document.ok_or_else(|| {
            CosmoError::not_found(format!(
                "document '{}' not found in container '{}'",
                args.document_id, args.container_id
            ))
            .into()
        })
    }

    /// Check the write policy, then connect.
    async fn writable(
        &self,
        operation: WriteOperation,
        connection_id: Option<&str>,
    ) -> Result<Arc<ActiveConnection>, McpError> {
        let resolved = self.guard.validate(operation, connection_id)?;
        self.connection(Some(&resolved)).await
    }

    /// Reject a document whose partition key value differs from the one
    /// given. Containers without a partition key definition are not checked.
    async fn check_partition_key(
        &self,
        connection: &ActiveConnection,
        container_id: &str,
        document: &Value,
        partition_key: &Value,
    ) -> Result<(), McpError> {
        let info = connection
            .backend
            .read_container(container_id)
            .await
            .map_err(|e| CosmoError::container(container_id, e))?;
        let Some(path) = info.partition_key_path() else {
            return Ok(());
        };
        match value_at_path(document, path) {
            Some(value) if value == partition_key => Ok(()),
            Some(value) => Err(CosmoError::validation(format!(
                "partition_key {} does not match document value {} at {}",
                partition_key, value, path
            ))
            .into()),
            None => Err(CosmoError::validation(format!(
                "document has no value at partition key path {}",
                path
            ))
            .into()),
        }
    }

    async fn write(&self, operation: WriteOperation, args: WriteArgs) -> Result<Value, McpError> {
        let connection = self
            .writable(operation, args.connection_id.as_deref())
            .await?;
        let id = require_document_id(&args.document)?.to_string();
        require_partition_key_value(&args.partition_key)?;
        self.check_partition_key(&connection, &args.container_id, &args.document, &args.partition_key)
            .await?;

        let backend = &connection.backend;
        let written = match operation {
            WriteOperation::Upsert => backend.upsert(&args.container_id, &args.document).await,
            _ => backend.create(&args.container_id, &args.document).await,
        }
        .map_err(|e| {
            if e.is_conflict() {
                CosmoError::Backend(BackendError::with_status(
                    409,
                    format!(
                        "document '{}' already exists in container '{}'",
                        id, args.container_id
                    ),
                ))
            } else {
                CosmoError::container(&args.container_id, e)
            }
        })?;

        info!(
            connection_id = %connection.id(),
            container_id = %args.container_id,
            document_id = %id,
            operation = %operation,
            "Document written"
        );
        Ok(written)
    }

    async fn update(&self, args: UpdateArgs) -> Result<Value, McpError> {
        let connection = self
            .writable(WriteOperation::Update, args.connection_id.as_deref())
            .await?;
        let id = require_document_id(&args.document)?;
        if id != args.document_id {
            return Err(CosmoError::validation(format!(
                "document.id '{}' does not match document_id '{}'",
                id, args.document_id
            ))
            .into());
        }
        require_partition_key_value(&args.partition_key)?;

        let written = connection
            .backend
            .replace(
                &args.container_id,
                &args.document_id,
                &args.partition_key,
                &args.document,
            )
            .await
            .map_err(|e| missing_document(e, &args.document_id, &args.container_id))?;

        info!(
            connection_id = %connection.id(),
            container_id = %args.container_id,
            document_id = %args.document_id,
            "Document replaced"
        );
        Ok(written)
    }

    async fn delete(&self, args: DocumentRefArgs) -> Result<Value, McpError> {
        let connection = self
            .writable(WriteOperation::Delete, args.connection_id.as_deref())
            .await?;
        require_partition_key_value(&args.partition_key)?;

        connection
            .backend
            .delete(&args.container_id, &args.document_id, &args.partition_key)
            .await
            .map_err(|e| missing_document(e, &args.document_id, &args.container_id))?;

        info!(
            connection_id = %connection.id(),
            container_id = %args.container_id,
            document_id = %args.document_id,
            "Document deleted"
        );
        Ok(json!({
            "deleted": true,
            "id": args.document_id,
            "containerId": args.container_id,
        }))
    }
}

/// 404 on replace/delete: the document (or its container) is missing.
fn missing_document(err: BackendError, document_id: &str, container_id: &str) -> CosmoError {
    if err.is_not_found() {
        CosmoError::not_found(format!(
            "document '{}' not found in container '{}'",
            document_id, container_id
        ))
    } else {
        CosmoError::Backend(err)
    }
}
