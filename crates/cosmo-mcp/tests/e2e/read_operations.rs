//! Read-only passthrough tools: containers, queries and point reads.

use super::common::*;
use cosmo_mcp::catalog::*;
use serde_json::json;

pub async fn test_list_containers(ctx: &TestContext) {
    println!("  🧪 test_list_containers");

    let result = ctx.call(LIST_CONTAINERS, json!({"connection_id": PRIMARY})).await;
    assert_success(&result, "list containers");

    let data = extract_json(&result);
    let ids: Vec<_> = data
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["products", "mixed", "empty", "unpartitioned"]);
    assert_eq!(data[0]["partitionKey"]["paths"], json!(["/category"]));
    assert!(data[3].get("partitionKey").is_none());

    println!("     ✓ Containers listed with partition key definitions");
}

pub async fn test_container_definition(ctx: &TestContext) {
    println!("  🧪 test_container_definition");

    let result = ctx
        .call(GET_CONTAINER_DEFINITION, json!({"container_id": "products"}))
        .await;
    assert_success(&result, "container definition");
    let data = extract_json(&result);
    assert_eq!(data["id"], "products");
    assert_eq!(data["partitionKey"]["kind"], "Hash");
    assert_eq!(data["throughputInfo"]["content"]["offerThroughput"], 400);

    // No dedicated throughput: the field is simply absent.
    let data = extract_json(
        &ctx.call(GET_CONTAINER_DEFINITION, json!({"container_id": "mixed"}))
            .await,
    );
    assert!(data.get("throughputInfo").is_none());

    let result = ctx
        .call(GET_CONTAINER_DEFINITION, json!({"container_id": "missing"}))
        .await;
    assert_failure(&result, "container 'missing' not found");

    let result = ctx.call(GET_CONTAINER_DEFINITION, json!({})).await;
    assert_failure(&result, "container_id");

    println!("     ✓ Definition includes throughput when available");
}

pub async fn test_cosmos_query(ctx: &TestContext) {
    println!("  🧪 test_cosmos_query");

    let result = ctx
        .call(
            COSMOS_QUERY,
            json!({
                "container_id": "products",
                "query": "SELECT * FROM c WHERE c.category = @category",
                "parameters": {"category": "tools"},
                "max_items": 2
            }),
        )
        .await;
    assert_success(&result, "raw query");

    let data = extract_json(&result);
    assert_eq!(data["documents"].as_array().unwrap().len(), 2);
    assert_eq!(data["stats"]["documentCount"], 2);
    assert!(data["stats"]["requestCharge"].as_f64().unwrap() > 0.0);
    assert!(data["stats"]["executionTimeMs"].is_u64());

    let recorded = ctx.backend(PRIMARY).recorded_queries();
    let last = recorded.last().unwrap();
    assert_eq!(last.query, "SELECT * FROM c WHERE c.category = @category");
    assert_eq!(last.parameters.len(), 1);
    assert_eq!(last.parameters[0].name, "@category");
    assert_eq!(last.parameters[0].value, json!("tools"));

    let result = ctx
        .call(COSMOS_QUERY, json!({"container_id": "products", "query": "  "}))
        .await;
    assert_failure(&result, "query must not be empty");

    println!("     ✓ Query passed through verbatim with @-prefixed parameters");
}

pub async fn test_get_documents_builds_query(ctx: &TestContext) {
    println!("  🧪 test_get_documents_builds_query");

    let result = ctx
        .call(
            GET_DOCUMENTS,
            json!({
                "container_id": "products",
                "limit": 10,
                "partition_key": "garden",
                "filter_conditions": {"name": "Rake", "stock.warehouse": "north"},
                "order_by": "price",
                "order_direction": "DESC"
            }),
        )
        .await;
    assert_success(&result, "get documents");

    // The in-memory backend applies the partition key but not the SQL.
    let data = extract_json(&result);
    let ids: Vec<_> = data
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec!["p3", "p4"]);

    let recorded = ctx.backend(PRIMARY).recorded_queries();
    let last = recorded.last().unwrap();
    assert_eq!(
        last.query,
        "SELECT TOP 10 * FROM c WHERE c.name = @param0 AND c.stock.warehouse = @param1 ORDER BY c.price DESC"
    );
    assert_eq!(last.parameters[1].name, "@param1");
    assert_eq!(last.parameters[1].value, json!("north"));

    println!("     ✓ Filters bound as @paramN, ordering and limit applied");
}

pub async fn test_get_documents_defaults_and_validation(ctx: &TestContext) {
    println!("  🧪 test_get_documents_defaults_and_validation");

    let result = ctx
        .call(GET_DOCUMENTS, json!({"container_id": "products"}))
        .await;
    assert_success(&result, "get documents with defaults");
    assert_eq!(extract_json(&result).as_array().unwrap().len(), 5);
    let recorded = ctx.backend(PRIMARY).recorded_queries();
    assert_eq!(recorded.last().unwrap().query, "SELECT TOP 100 * FROM c");

    let result = ctx
        .call(
            GET_DOCUMENTS,
            json!({"container_id": "products", "filter_conditions": {"name = 'x' OR 1=1 --": 1}}),
        )
        .await;
    assert_failure(&result, "invalid filter field");

    let result = ctx
        .call(GET_DOCUMENTS, json!({"container_id": "products", "order_by": "price DESC, c.id"}))
        .await;
    assert_failure(&result, "invalid order_by field");

    let result = ctx
        .call(GET_DOCUMENTS, json!({"container_id": "products", "order_direction": "SIDEWAYS"}))
        .await;
    assert_failure(&result, "invalid arguments for tool mcp_get_documents");

    let result = ctx
        .call(GET_DOCUMENTS, json!({"container_id": "products", "limit": 0}))
        .await;
    assert_failure(&result, "limit must be at least 1");

    println!("     ✓ Unsafe field names rejected before reaching the backend");
}

pub async fn test_get_document_by_id(ctx: &TestContext) {
    println!("  🧪 test_get_document_by_id");

    let result = ctx
        .call(
            GET_DOCUMENT_BY_ID,
            json!({"container_id": "products", "document_id": "p1", "partition_key": "tools"}),
        )
        .await;
    assert_success(&result, "point read");
    assert_eq!(extract_json(&result)["name"], "Hammer");

    // Right id, wrong partition.
    let result = ctx
        .call(
            GET_DOCUMENT_BY_ID,
            json!({"container_id": "products", "document_id": "p1", "partition_key": "garden"}),
        )
        .await;
    assert_failure(&result, "document 'p1' not found in container 'products'");

    let result = ctx
        .call(
            GET_DOCUMENT_BY_ID,
            json!({"container_id": "products", "document_id": "p1"}),
        )
        .await;
    assert_failure(&result, "partition_key");

    let result = ctx
        .call(
            GET_DOCUMENT_BY_ID,
            json!({"container_id": "products", "document_id": "p1", "partition_key": {"a": 1}}),
        )
        .await;
    assert_failure(&result, "partition_key must be a string, number or boolean");

    println!("     ✓ Point reads need id and partition key");
}

pub async fn run_all_tests(ctx: &TestContext) {
    println!("\n📖 Running Read Operation Tests\n");

    test_list_containers(ctx).await;
    test_container_definition(ctx).await;
    test_cosmos_query(ctx).await;
    test_get_documents_builds_query(ctx).await;
    test_get_documents_defaults_and_validation(ctx).await;
    test_get_document_by_id(ctx).await;

    println!("\n✅ All Read Operation tests passed!\n");
}
