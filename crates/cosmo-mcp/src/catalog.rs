//! The fixed tool surface.
//!
//! Every tool except `mcp_list_connections` accepts an optional
//! `connection_id`; omitting it targets the default connection.

use crate::protocol::{ToolAnnotations, ToolDefinition};
use crate::tools::ToolRegistry;
use serde_json::{Map, Value, json};

pub const LIST_CONNECTIONS: &str = "mcp_list_connections";
pub const LIST_DATABASES: &str = "mcp_list_databases";
pub const LIST_CONTAINERS: &str = "mcp_list_containers";
pub const GET_CONTAINER_DEFINITION: &str = "mcp_get_container_definition";
pub const GET_CONTAINER_STATS: &str = "mcp_get_container_stats";
pub const COSMOS_QUERY: &str = "mcp_cosmos_query";
pub const GET_DOCUMENTS: &str = "mcp_get_documents";
pub const GET_DOCUMENT_BY_ID: &str = "mcp_get_document_by_id";
pub const ANALYZE_SCHEMA: &str = "mcp_analyze_schema";
pub const CREATE_DOCUMENT: &str = "mcp_create_document";
pub const UPDATE_DOCUMENT: &str = "mcp_update_document";
pub const DELETE_DOCUMENT: &str = "mcp_delete_document";
pub const UPSERT_DOCUMENT: &str = "mcp_upsert_document";

fn connection_id() -> Value {
    json!({
        "type": "string",
        "description": "ID of the connection to use. Use mcp_list_connections to see available connections. If omitted, the default connection is used."
    })
}

fn container_id() -> Value {
    json!({"type": "string", "description": "ID of the container"})
}

fn document_id() -> Value {
    json!({"type": "string", "description": "ID of the document"})
}

fn partition_key(description: &str) -> Value {
    json!({"type": ["string", "number", "boolean"], "description": description})
}

/// Object schema with the shared `connection_id` property appended.
fn object_schema(properties: Value, required: &[&str]) -> Value {
    let mut properties = match properties {
        Value::Object(map) => map,
        _ => Map::new(),
    };
    properties.insert("connection_id".to_string(), connection_id());
    json!({
        "type": "object",
        "properties": properties,
        "required": required,
    })
}

fn tool(name: &str, description: &str, input_schema: Value, read_only: bool) -> ToolDefinition {
    ToolDefinition {
        name: name.to_string(),
        description: Some(description.to_string()),
        input_schema,
        annotations: Some(ToolAnnotations {
            read_only: Some(read_only),
            destructive: (!read_only).then_some(true),
        }),
    }
}

/// All tool definitions, in listing order.
pub fn definitions() -> Vec<ToolDefinition> {
    vec![
        tool(
            LIST_CONNECTIONS,
            "List every configured database connection with its database, write policy and whether it is the default or currently connected.",
            json!({"type": "object", "properties": {}, "required": []}),
            true,
        ),
        tool(
            LIST_DATABASES,
            "List all databases in the account behind a connection.",
            object_schema(json!({}), &[]),
            true,
        ),
        tool(
            LIST_CONTAINERS,
            "List all containers in the connection's database.",
            object_schema(json!({}), &[]),
            true,
        ),
        tool(
            GET_CONTAINER_DEFINITION,
            "Get a container's definition: partition key, indexing policy and provisioned throughput when available.",
            object_schema(json!({"container_id": container_id()}), &["container_id"]),
            true,
        ),
        tool(
            GET_CONTAINER_STATS,
            "Get approximate container statistics: exact document count plus sampled size and partition key distribution.",
            object_schema(
                json!({
                    "container_id": container_id(),
                    "sample_size": {
                        "type": "number",
                        "description": "Number of documents to sample (default: 1000, higher is more accurate but slower)",
                        "default": 1000
                    }
                }),
                &["container_id"],
            ),
            true,
        ),
        tool(
            COSMOS_QUERY,
            "Run a SQL query against a container. Parameters are given as an object and referenced as @name in the query.\n\nExample: query=\"SELECT TOP 10 c.id, c.type FROM c WHERE c.type = @type\", parameters={type: \"order\"}",
            object_schema(
                json!({
                    "container_id": container_id(),
                    "query": {"type": "string", "description": "SQL query text"},
                    "parameters": {
                        "type": "object",
                        "description": "Query parameters as key-value pairs; each key is bound as @key"
                    },
                    "max_items": {
                        "type": "number",
                        "description": "Maximum number of items to return (default: 100)",
                        "default": 100
                    },
                    "enable_cross_partition": {
                        "type": "boolean",
                        "description": "Allow the query to span partitions (default: true)",
                        "default": true
                    }
                }),
                &["container_id", "query"],
            ),
            true,
        ),
        tool(
            GET_DOCUMENTS,
            "Fetch documents with optional equality filters, partition key and ordering, without writing SQL.",
            object_schema(
                json!({
                    "container_id": container_id(),
                    "limit": {
                        "type": "number",
                        "description": "Maximum number of documents to return (default: 100)",
                        "default": 100
                    },
                    "partition_key": partition_key("Restrict the read to one partition"),
                    "filter_conditions": {
                        "type": "object",
                        "description": "Equality filters as key-value pairs, e.g. {status: 'active', type: 'premium'}"
                    },
                    "order_by": {"type": "string", "description": "Field to order by"},
                    "order_direction": {
                        "type": "string",
                        "enum": ["ASC", "DESC"],
                        "description": "Order direction (default: ASC)",
                        "default": "ASC"
                    }
                }),
                &["container_id"],
            ),
            true,
        ),
        tool(
            GET_DOCUMENT_BY_ID,
            "Point-read one document. Both document_id and partition_key are required.",
            object_schema(
                json!({
                    "container_id": container_id(),
                    "document_id": document_id(),
                    "partition_key": partition_key("Partition key value of the document")
                }),
                &["container_id", "document_id", "partition_key"],
            ),
            true,
        ),
        tool(
            ANALYZE_SCHEMA,
            "Infer a container's document structure from a sample: field paths, types, frequency and example values.",
            object_schema(
                json!({
                    "container_id": container_id(),
                    "sample_size": {
                        "type": "number",
                        "description": "Number of documents to sample (default: 100)",
                        "default": 100
                    }
                }),
                &["container_id"],
            ),
            true,
        ),
        tool(
            CREATE_DOCUMENT,
            "Create a new document. Fails if a document with the same id already exists in the partition. Requires modifications to be enabled for the connection.",
            object_schema(
                json!({
                    "container_id": container_id(),
                    "document": {"type": "object", "description": "Document to create; must include a string 'id'"},
                    "partition_key": partition_key("Partition key value of the document")
                }),
                &["container_id", "document", "partition_key"],
            ),
            false,
        ),
        tool(
            UPDATE_DOCUMENT,
            "Replace an existing document. The document's id must equal document_id. Requires modifications to be enabled for the connection.",
            object_schema(
                json!({
                    "container_id": container_id(),
                    "document_id": document_id(),
                    "document": {"type": "object", "description": "Full replacement document"},
                    "partition_key": partition_key("Partition key value of the document")
                }),
                &["container_id", "document_id", "document", "partition_key"],
            ),
            false,
        ),
        tool(
            DELETE_DOCUMENT,
            "Delete a document. Requires modifications to be enabled for the connection.",
            object_schema(
                json!({
                    "container_id": container_id(),
                    "document_id": document_id(),
                    "partition_key": partition_key("Partition key value of the document")
                }),
                &["container_id", "document_id", "partition_key"],
            ),
            false,
        ),
        tool(
            UPSERT_DOCUMENT,
            "Create a document or replace it if it already exists. Requires modifications to be enabled for the connection.",
            object_schema(
                json!({
                    "container_id": container_id(),
                    "document": {"type": "object", "description": "Document to write; must include a string 'id'"},
                    "partition_key": partition_key("Partition key value of the document")
                }),
                &["container_id", "document", "partition_key"],
            ),
            false,
        ),
    ]
}

/// A registry holding the full tool surface.
pub fn registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    for definition in definitions() {
        registry.register(definition);
    }
    registry
}
