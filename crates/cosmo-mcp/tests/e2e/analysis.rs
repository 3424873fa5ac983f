//! Sampling-based statistics and schema analysis through the tools.

use super::common::*;
use cosmo_mcp::catalog::*;
use serde_json::json;

pub async fn test_container_stats(ctx: &TestContext) {
    println!("  🧪 test_container_stats");

    let result = ctx
        .call(GET_CONTAINER_STATS, json!({"container_id": "products"}))
        .await;
    assert_success(&result, "container stats");

    let data = extract_json(&result);
    assert_eq!(data["documentCount"], 5);
    assert_eq!(data["sampledDocuments"], 5);
    assert_eq!(data["partitionKeyPath"], "/category");

    let partitions = data["partitionKeyStatistics"].as_array().unwrap();
    let labels: Vec<_> = partitions
        .iter()
        .map(|p| p["partitionKeyValue"].as_str().unwrap())
        .collect();
    assert_eq!(labels, vec!["tools", "garden", "undefined"]);
    let total: u64 = partitions
        .iter()
        .map(|p| p["documentCount"].as_u64().unwrap())
        .sum();
    assert_eq!(total, 5);

    println!("     ✓ Exact count with per-partition distribution");
}

pub async fn test_container_stats_sample_size(ctx: &TestContext) {
    println!("  🧪 test_container_stats_sample_size");

    let data = extract_json(
        &ctx.call(
            GET_CONTAINER_STATS,
            json!({"container_id": "products", "sample_size": 2}),
        )
        .await,
    );
    assert_eq!(data["documentCount"], 5);
    assert_eq!(data["sampledDocuments"], 2);
    // Both sampled documents are in "tools"; extrapolated to all five.
    assert_eq!(data["partitionKeyStatistics"][0]["documentCount"], 5);

    let data = extract_json(
        &ctx.call(
            GET_CONTAINER_STATS,
            json!({"container_id": "products", "sample_size": 0}),
        )
        .await,
    );
    assert_eq!(data["sizeInKB"], 0);
    assert_eq!(data["partitionKeyStatistics"], json!([]));

    println!("     ✓ Sample size honoured, empty sample gives zero size");
}

pub async fn test_container_stats_errors(ctx: &TestContext) {
    println!("  🧪 test_container_stats_errors");

    let result = ctx
        .call(GET_CONTAINER_STATS, json!({"container_id": "unpartitioned"}))
        .await;
    assert_failure(&result, "does not have a valid partition key defined");

    let result = ctx
        .call(GET_CONTAINER_STATS, json!({"container_id": "missing"}))
        .await;
    assert_failure(&result, "container 'missing' not found");

    println!("     ✓ Missing partition key and missing container reported");
}

pub async fn test_analyze_schema_mixed_types(ctx: &TestContext) {
    println!("  🧪 test_analyze_schema_mixed_types");

    let result = ctx
        .call(ANALYZE_SCHEMA, json!({"container_id": "mixed"}))
        .await;
    assert_success(&result, "analyze schema");

    let data = extract_json(&result);
    assert_eq!(data["sampleSize"], 4);
    let x = &data["commonProperties"][0];
    assert_eq!(x["name"], "x");
    assert_eq!(x["type"], "number | string | null");
    assert_eq!(x["frequency"], 0.75);
    assert_eq!(x["nullCount"], 1);
    assert_eq!(x["examples"], json!([1, "s"]));
    assert_eq!(data["dataTypes"]["number"], 1);
    assert_eq!(data["dataTypes"]["string"], 1);
    assert_eq!(data["dataTypes"]["null"], 1);

    println!("     ✓ Absent fields are not occurrences; null counted separately");
}

pub async fn test_analyze_schema_nested(ctx: &TestContext) {
    println!("  🧪 test_analyze_schema_nested");

    let data = extract_json(
        &ctx.call(ANALYZE_SCHEMA, json!({"container_id": "products"}))
            .await,
    );
    let properties = data["commonProperties"].as_array().unwrap();
    let names: Vec<_> = properties
        .iter()
        .map(|p| p["name"].as_str().unwrap())
        .collect();
    assert!(names.contains(&"stock.warehouse"));
    assert_eq!(names[0], "id");

    for pair in properties.windows(2) {
        assert!(pair[0]["frequency"].as_f64() >= pair[1]["frequency"].as_f64());
    }

    let data = extract_json(
        &ctx.call(ANALYZE_SCHEMA, json!({"container_id": "empty"}))
            .await,
    );
    assert_eq!(
        data,
        json!({"sampleSize": 0, "commonProperties": [], "dataTypes": {}, "nestedStructures": []})
    );

    println!("     ✓ Nested paths profiled, empty container yields empty summary");
}

pub async fn run_all_tests(ctx: &TestContext) {
    println!("\n📊 Running Analysis Tests\n");

    test_container_stats(ctx).await;
    test_container_stats_sample_size(ctx).await;
    test_container_stats_errors(ctx).await;
    test_analyze_schema_mixed_types(ctx).await;
    test_analyze_schema_nested(ctx).await;

    println!("\n✅ All Analysis tests passed!\n");
}
