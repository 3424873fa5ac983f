//! The JSON-RPC surface: tool listing and `tools/call` result shapes.

use super::common::*;
use cosmo_mcp::JsonRpcRequest;
use cosmo_mcp::catalog::*;
use serde_json::{Value, json};

pub async fn test_tools_list(ctx: &TestContext) {
    println!("  🧪 test_tools_list");

    let response = ctx
        .server
        .handle_request(JsonRpcRequest::new(1, "tools/list", None))
        .await;
    let result = response.result.unwrap();
    let names: Vec<_> = result["tools"]
        .as_array()
        .unwrap()
        .iter()
        .map(|t| t["name"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(names.len(), 13);
    for expected in [LIST_CONNECTIONS, COSMOS_QUERY, GET_DOCUMENTS, UPSERT_DOCUMENT] {
        assert!(names.iter().any(|n| n == expected), "{expected} missing");
    }

    println!("     ✓ All tools advertised");
}

pub async fn test_call_success_shape(ctx: &TestContext) {
    println!("  🧪 test_call_success_shape");

    let result = ctx.rpc_call(LIST_CONTAINERS, json!({})).await;
    assert!(result.get("isError").is_none());
    assert_eq!(result["content"][0]["type"], "text");
    let text = result["content"][0]["text"].as_str().unwrap();
    let parsed: Value = serde_json::from_str(text).unwrap();
    assert!(parsed.is_array());

    println!("     ✓ Success is a single pretty JSON text block");
}

pub async fn test_call_error_shape(ctx: &TestContext) {
    println!("  🧪 test_call_error_shape");

    let result = ctx
        .rpc_call(GET_CONTAINER_DEFINITION, json!({"container_id": "missing"}))
        .await;
    assert_eq!(result["isError"], true);
    assert_eq!(
        result["content"][0]["text"],
        "Error: container 'missing' not found"
    );

    let result = ctx.rpc_call("mcp_drop_everything", json!({})).await;
    assert_eq!(result["isError"], true);
    let text = result["content"][0]["text"].as_str().unwrap();
    assert!(text.starts_with("Error: Tool 'mcp_drop_everything' not found. Available tools: "));
    assert!(text.contains(ANALYZE_SCHEMA));

    println!("     ✓ Failures are isError results, never protocol errors");
}

pub async fn run_all_tests(ctx: &TestContext) {
    println!("\n📡 Running Protocol Tests\n");

    test_tools_list(ctx).await;
    test_call_success_shape(ctx).await;
    test_call_error_shape(ctx).await;

    println!("\n✅ All Protocol tests passed!\n");
}
