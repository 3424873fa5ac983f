//! # cosmo-mcp
//!
//! MCP (Model Context Protocol) server that exposes registered Cosmos DB
//! connections as a fixed set of tools.
//!
//! ```text
//! AI agent
//!    │  tools/list, tools/call (stdio or HTTP)
//!    ▼
//! McpServer ── ToolRegistry (catalog)
//!    │
//!    ▼
//! ToolExecutor ── ModificationGuard (writes)
//!    │         └─ StatsSampler / SchemaAnalyzer
//!    ▼
//! ConnectionRegistry ── DocumentBackend (per connection)
//! ```
//!
//! Every tool except `mcp_list_connections` takes an optional
//! `connection_id`; the default connection is used when it is omitted, and
//! connections are established on first use.

pub mod catalog;
pub mod error;
pub mod executor;
pub mod http_transport;
pub mod protocol;
pub mod server;
pub mod tools;

pub use error::McpError;
pub use executor::{ExecutionResult, OrderDirection, ToolExecutor};
pub use protocol::{
    CallToolParams, CallToolResponse, JsonRpcRequest, JsonRpcResponse, ToolAnnotations,
    ToolContent, ToolDefinition,
};
pub use server::McpServer;
pub use tools::ToolRegistry;
