//! Connection registry behaviour seen through the tools: listing, default
//! resolution, lazy connect and failures.

use super::common::*;
use cosmo_mcp::catalog::*;
use serde_json::json;

pub async fn test_list_connections(ctx: &TestContext) {
    println!("  🧪 test_list_connections");

    let result = ctx.call(LIST_CONNECTIONS, json!({})).await;
    assert_success(&result, "list connections should succeed");

    let data = extract_json(&result);
    assert_eq!(data["defaultConnection"], PRIMARY);
    let connections = data["connections"].as_array().unwrap();
    assert_eq!(connections.len(), 3);

    assert_eq!(connections[0]["id"], PRIMARY);
    assert_eq!(connections[0]["databaseId"], "inventory");
    assert_eq!(connections[0]["description"], "Inventory account");
    assert_eq!(connections[0]["isDefault"], true);
    assert_eq!(connections[0]["allowModifications"], false);

    assert_eq!(connections[1]["id"], SANDBOX);
    assert_eq!(connections[1]["allowModifications"], true);
    assert_eq!(connections[1]["isDefault"], false);

    for connection in connections {
        assert!(connection.get("connectionString").is_none());
    }

    println!("     ✓ Connections listed in registration order with effective policy");
}

pub async fn test_lazy_connect_probes_once(ctx: &TestContext) {
    println!("  🧪 test_lazy_connect_probes_once");

    let backend = ctx.backend(SANDBOX);
    let before = backend.probe_count();
    assert!(!ctx.registry.is_active(SANDBOX));

    for _ in 0..3 {
        let result = ctx
            .call(LIST_CONTAINERS, json!({"connection_id": SANDBOX}))
            .await;
        assert_success(&result, "list containers on sandbox");
    }

    assert!(ctx.registry.is_active(SANDBOX));
    assert_eq!(backend.probe_count(), before + 1);

    let data = extract_json(&ctx.call(LIST_CONNECTIONS, json!({})).await);
    assert_eq!(data["connections"][1]["connected"], true);

    println!("     ✓ First call connects, later calls reuse the live handle");
}

pub async fn test_omitted_id_uses_default(ctx: &TestContext) {
    println!("  🧪 test_omitted_id_uses_default");

    let result = ctx.call(LIST_DATABASES, json!({})).await;
    assert_success(&result, "list databases on default");
    let data = extract_json(&result);
    assert_eq!(data, json!([{"id": "inventory"}]));

    let result = ctx.call(LIST_DATABASES, json!(null)).await;
    assert_success(&result, "null arguments are treated as empty");

    println!("     ✓ Default connection used when connection_id is omitted");
}

pub async fn test_unknown_connection(ctx: &TestContext) {
    println!("  🧪 test_unknown_connection");

    let result = ctx
        .call(LIST_CONTAINERS, json!({"connection_id": "nope"}))
        .await;
    assert_failure(&result, "connection 'nope' not found");
    assert_failure(&result, "primary, sandbox, broken");

    println!("     ✓ Unknown connection id lists the registered ids");
}

pub async fn test_failed_connect_is_reported(ctx: &TestContext) {
    println!("  🧪 test_failed_connect_is_reported");

    let result = ctx
        .call(LIST_CONTAINERS, json!({"connection_id": BROKEN}))
        .await;
    assert_failure(&result, "database 'gone' not found");
    assert!(!ctx.registry.is_active(BROKEN));
    assert!(ctx.backend(BROKEN).is_disposed());

    // Other connections are unaffected.
    let result = ctx.call(LIST_CONTAINERS, json!({})).await;
    assert_success(&result, "primary still usable");

    println!("     ✓ Probe failure surfaces as a tool error and leaves no live handle");
}

pub async fn run_all_tests(ctx: &TestContext) {
    println!("\n🔌 Running Connection Tests\n");

    test_list_connections(ctx).await;
    test_lazy_connect_probes_once(ctx).await;
    test_omitted_id_uses_default(ctx).await;
    test_unknown_connection(ctx).await;
    test_failed_connect_is_reported(ctx).await;

    println!("\n✅ All Connection tests passed!\n");
}
