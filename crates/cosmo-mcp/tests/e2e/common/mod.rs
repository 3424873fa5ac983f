//! Shared test infrastructure for Cosmo MCP end-to-end tests.
//!
//! Builds an in-memory account per connection, registers the connections
//! and wires a server around them.

use cosmo_core::{ConnectionConfig, McpConfig, SamplingConfig};
use cosmo_mcp::executor::{ExecutionResult, ToolExecutor};
use cosmo_mcp::{JsonRpcRequest, McpServer};
use cosmo_policy::ModificationGuard;
use cosmo_runtime::{ConnectionRegistry, ContainerInfo, MemoryBackend, MemoryConnector};
use serde_json::{Value, json};
use std::sync::Arc;

// =============================================================================
// FIXTURES
// =============================================================================

/// Read-mostly connection, no explicit write policy. Default connection.
pub const PRIMARY: &str = "primary";
/// Connection with `allowModifications: true`.
pub const SANDBOX: &str = "sandbox";
/// Registered, but its database probe always fails.
pub const BROKEN: &str = "broken";

pub const CONNECTION_STRING: &str = "AccountEndpoint=https://localhost:8081/;AccountKey=a2V5;";

pub fn products() -> Vec<Value> {
    vec![
        json!({"id": "p1", "category": "tools", "name": "Hammer", "price": 12.5, "stock": {"warehouse": "north", "count": 3}}),
        json!({"id": "p2", "category": "tools", "name": "Wrench", "price": 9.0, "stock": {"warehouse": "south", "count": 0}}),
        json!({"id": "p3", "category": "garden", "name": "Rake", "price": 15.0, "discontinued": true}),
        json!({"id": "p4", "category": "garden", "name": "Hose", "price": null}),
        json!({"id": "p5", "name": "Gift card"}),
    ]
}

/// The four documents from the mixed-type schema scenario.
pub fn mixed() -> Vec<Value> {
    vec![json!({"x": 1}), json!({"x": "s"}), json!({"x": null}), json!({})]
}

fn primary_backend() -> MemoryBackend {
    let backend = MemoryBackend::new("inventory")
        .with_container(ContainerInfo::new("products").with_partition_key("/category"), products())
        .with_container(ContainerInfo::new("mixed").with_partition_key("/x"), mixed())
        .with_container(ContainerInfo::new("empty").with_partition_key("/pk"), vec![])
        .with_container(ContainerInfo::new("unpartitioned"), vec![json!({"id": "u1"})]);
    backend.set_throughput("products", json!({"offerType": "Invalid", "content": {"offerThroughput": 400}}));
    backend
}

fn sandbox_backend() -> MemoryBackend {
    MemoryBackend::new("scratch").with_container(
        ContainerInfo::new("notes").with_partition_key("/owner"),
        vec![json!({"id": "n1", "owner": "ana", "text": "hello"})],
    )
}

// =============================================================================
// TEST CONTEXT
// =============================================================================

pub struct TestContext {
    pub connector: Arc<MemoryConnector>,
    pub registry: Arc<ConnectionRegistry>,
    pub server: McpServer,
}

impl TestContext {
    /// Standard fixture: writes disabled globally, `primary` has no policy
    /// of its own, `sandbox` opts in.
    pub fn setup() -> Self {
        Self::with_policy(None, false)
    }

    /// Fixture with a chosen policy on `primary` and a chosen global default.
    pub fn with_policy(primary_allow: Option<bool>, global_default: bool) -> Self {
        let connector = Arc::new(MemoryConnector::new());
        connector.insert(PRIMARY, Arc::new(primary_backend()));
        connector.insert(SANDBOX, Arc::new(sandbox_backend()));
        let broken = MemoryBackend::new("gone");
        broken.set_fail_probe(true);
        connector.insert(BROKEN, Arc::new(broken));

        let registry = Arc::new(ConnectionRegistry::new(connector.clone()));

        let mut primary = ConnectionConfig::new(PRIMARY, CONNECTION_STRING, "inventory")
            .with_description("Inventory account");
        primary.allow_modifications = primary_allow;
        registry.register(primary).unwrap();
        registry
            .register(
                ConnectionConfig::new(SANDBOX, CONNECTION_STRING, "scratch")
                    .with_allow_modifications(true),
            )
            .unwrap();
        registry
            .register(ConnectionConfig::new(BROKEN, CONNECTION_STRING, "gone"))
            .unwrap();

        let guard = ModificationGuard::new(registry.clone(), global_default);
        let executor = ToolExecutor::new(registry.clone(), guard, SamplingConfig::default());
        let server = McpServer::new(McpConfig::default(), executor);

        Self {
            connector,
            registry,
            server,
        }
    }

    pub fn executor(&self) -> &ToolExecutor {
        self.server.executor()
    }

    pub async fn call(&self, tool: &str, arguments: Value) -> ExecutionResult {
        self.executor().execute(tool, arguments).await
    }

    /// Call a tool through the JSON-RPC surface and return the `result`.
    pub async fn rpc_call(&self, tool: &str, arguments: Value) -> Value {
        let response = self
            .server
            .handle_request(JsonRpcRequest::new(
                1,
                "tools/call",
                Some(json!({"name": tool, "arguments": arguments})),
            ))
            .await;
        assert!(response.error.is_none(), "unexpected rpc error: {:?}", response.error);
        response.result.unwrap()
    }

    pub fn backend(&self, id: &str) -> Arc<MemoryBackend> {
        self.connector.backend(id).unwrap()
    }
}

// =============================================================================
// ASSERTIONS
// =============================================================================

/// Extract JSON from a successful result.
pub fn extract_json(result: &ExecutionResult) -> Value {
    result
        .json()
        .unwrap_or_else(|| panic!("expected JSON result, got {:?}", result))
}

/// Assert that a result is successful.
pub fn assert_success(result: &ExecutionResult, msg: &str) {
    assert!(result.success, "{}: {:?}", msg, result);
}

/// Assert that a result is a failure whose text contains `needle`.
pub fn assert_failure(result: &ExecutionResult, needle: &str) {
    assert!(!result.success, "expected failure, got {:?}", result);
    assert!(
        result.text().starts_with("Error: "),
        "error text must be prefixed: {}",
        result.text()
    );
    assert!(
        result.text().contains(needle),
        "expected '{}' in '{}'",
        needle,
        result.text()
    );
}
