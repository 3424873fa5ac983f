//! Write tools and the modification policy.

use super::common::*;
use cosmo_mcp::catalog::*;
use serde_json::json;

pub async fn test_write_blocked_without_policy(_ctx: &TestContext) {
    println!("  🧪 test_write_blocked_without_policy");

    // Connection flag unset, global default false.
    let ctx = TestContext::with_policy(None, false);
    let args = json!({
        "connection_id": PRIMARY,
        "container_id": "products",
        "document": {"id": "p9", "category": "tools", "name": "Saw"},
        "partition_key": "tools"
    });

    let result = ctx.call(CREATE_DOCUMENT, args.clone()).await;
    assert_failure(&result, "modifications are disabled for connection 'primary'");
    assert_failure(&result, "mcp_create_document");
    assert_eq!(ctx.backend(PRIMARY).documents("products").len(), 5);
    // Blocked before connecting.
    assert!(!ctx.registry.is_active(PRIMARY));

    // The connection's own flag overrides the global default.
    let ctx = TestContext::with_policy(Some(true), false);
    let result = ctx.call(CREATE_DOCUMENT, args.clone()).await;
    assert_success(&result, "create with connection opt-in");
    assert_eq!(extract_json(&result)["id"], "p9");
    assert_eq!(ctx.backend(PRIMARY).documents("products").len(), 6);

    // An explicit false beats a permissive global default.
    let ctx = TestContext::with_policy(Some(false), true);
    let result = ctx.call(CREATE_DOCUMENT, args.clone()).await;
    assert_failure(&result, "modifications are disabled");

    // Unset flag with a permissive global default.
    let ctx = TestContext::with_policy(None, true);
    let result = ctx.call(CREATE_DOCUMENT, args).await;
    assert_success(&result, "create with global opt-in");

    println!("     ✓ Per-connection flag wins, global default applies when unset");
}

pub async fn test_all_writes_are_guarded(ctx: &TestContext) {
    println!("  🧪 test_all_writes_are_guarded");

    let document = json!({"id": "p1", "category": "tools"});
    let calls = [
        (CREATE_DOCUMENT, json!({"container_id": "products", "document": document, "partition_key": "tools"})),
        (UPSERT_DOCUMENT, json!({"container_id": "products", "document": document, "partition_key": "tools"})),
        (UPDATE_DOCUMENT, json!({"container_id": "products", "document_id": "p1", "document": document, "partition_key": "tools"})),
        (DELETE_DOCUMENT, json!({"container_id": "products", "document_id": "p1", "partition_key": "tools"})),
    ];
    for (tool, args) in calls {
        let result = ctx.call(tool, args).await;
        assert_failure(&result, tool);
    }
    assert_eq!(ctx.backend(PRIMARY).documents("products").len(), 5);

    println!("     ✓ Create, upsert, update and delete all refused on the default connection");
}

pub async fn test_create_and_conflict(ctx: &TestContext) {
    println!("  🧪 test_create_and_conflict");

    let args = json!({
        "connection_id": SANDBOX,
        "container_id": "notes",
        "document": {"id": "n2", "owner": "ben", "text": "draft"},
        "partition_key": "ben"
    });
    let result = ctx.call(CREATE_DOCUMENT, args.clone()).await;
    assert_success(&result, "create");
    assert_eq!(extract_json(&result)["text"], "draft");

    let result = ctx.call(CREATE_DOCUMENT, args).await;
    assert_failure(&result, "document 'n2' already exists in container 'notes'");

    println!("     ✓ Duplicate create reports a friendly conflict");
}

pub async fn test_write_payload_validation(ctx: &TestContext) {
    println!("  🧪 test_write_payload_validation");

    let base = |document: serde_json::Value, partition_key: serde_json::Value| {
        json!({
            "connection_id": SANDBOX,
            "container_id": "notes",
            "document": document,
            "partition_key": partition_key
        })
    };

    let result = ctx.call(CREATE_DOCUMENT, base(json!({"owner": "ana"}), json!("ana"))).await;
    assert_failure(&result, "non-empty string 'id'");

    let result = ctx.call(CREATE_DOCUMENT, base(json!([1, 2]), json!("ana"))).await;
    assert_failure(&result, "document must be a JSON object");

    let result = ctx
        .call(CREATE_DOCUMENT, base(json!({"id": "x", "owner": "ana"}), json!("ben")))
        .await;
    assert_failure(&result, "does not match document value");

    let result = ctx
        .call(UPSERT_DOCUMENT, base(json!({"id": "x"}), json!("ana")))
        .await;
    assert_failure(&result, "document has no value at partition key path /owner");

    let result = ctx
        .call(
            UPDATE_DOCUMENT,
            json!({
                "connection_id": SANDBOX,
                "container_id": "notes",
                "document_id": "n1",
                "document": {"id": "other", "owner": "ana"},
                "partition_key": "ana"
            }),
        )
        .await;
    assert_failure(&result, "does not match document_id 'n1'");

    let result = ctx
        .call(
            CREATE_DOCUMENT,
            json!({"connection_id": SANDBOX, "container_id": "notes", "partition_key": "ana"}),
        )
        .await;
    assert_failure(&result, "missing field `document`");

    println!("     ✓ Malformed payloads rejected as validation errors");
}

pub async fn test_update_upsert_delete(ctx: &TestContext) {
    println!("  🧪 test_update_upsert_delete");

    let backend = ctx.backend(SANDBOX);

    let result = ctx
        .call(
            UPDATE_DOCUMENT,
            json!({
                "connection_id": SANDBOX,
                "container_id": "notes",
                "document_id": "n1",
                "document": {"id": "n1", "owner": "ana", "text": "edited"},
                "partition_key": "ana"
            }),
        )
        .await;
    assert_success(&result, "update");
    let stored = backend.documents("notes");
    assert_eq!(stored[0]["text"], "edited");

    let result = ctx
        .call(
            UPDATE_DOCUMENT,
            json!({
                "connection_id": SANDBOX,
                "container_id": "notes",
                "document_id": "ghost",
                "document": {"id": "ghost", "owner": "ana"},
                "partition_key": "ana"
            }),
        )
        .await;
    assert_failure(&result, "document 'ghost' not found in container 'notes'");

    let upsert = json!({
        "connection_id": SANDBOX,
        "container_id": "notes",
        "document": {"id": "n3", "owner": "cy", "text": "v1"},
        "partition_key": "cy"
    });
    assert_success(&ctx.call(UPSERT_DOCUMENT, upsert).await, "upsert insert");
    let upsert = json!({
        "connection_id": SANDBOX,
        "container_id": "notes",
        "document": {"id": "n3", "owner": "cy", "text": "v2"},
        "partition_key": "cy"
    });
    assert_success(&ctx.call(UPSERT_DOCUMENT, upsert).await, "upsert replace");
    let n3: Vec<_> = backend
        .documents("notes")
        .into_iter()
        .filter(|d| d["id"] == "n3")
        .collect();
    assert_eq!(n3.len(), 1);
    assert_eq!(n3[0]["text"], "v2");

    let delete = json!({
        "connection_id": SANDBOX,
        "container_id": "notes",
        "document_id": "n3",
        "partition_key": "cy"
    });
    let result = ctx.call(DELETE_DOCUMENT, delete.clone()).await;
    assert_success(&result, "delete");
    assert_eq!(
        extract_json(&result),
        json!({"deleted": true, "id": "n3", "containerId": "notes"})
    );

    let result = ctx.call(DELETE_DOCUMENT, delete).await;
    assert_failure(&result, "document 'n3' not found");

    println!("     ✓ Replace, upsert and delete reach the backend; 404s are friendly");
}

pub async fn run_all_tests(ctx: &TestContext) {
    println!("\n✏️  Running Modification Tests\n");

    test_write_blocked_without_policy(ctx).await;
    test_all_writes_are_guarded(ctx).await;
    test_create_and_conflict(ctx).await;
    test_write_payload_validation(ctx).await;
    test_update_upsert_delete(ctx).await;

    println!("\n✅ All Modification tests passed!\n");
}
