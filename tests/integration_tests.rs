//! Integration tests using mock HTTP server
//!
//! Tests the full flow: source Base URL → open API calls → static copy

use base_snapshot::config::LarkConfig;
use base_snapshot::snapshot::{SnapshotConfig, SnapshotEngine};
use chrono::NaiveDate;
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn ok(data: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({ "code": 0, "msg": "success", "data": data }))
}

fn engine_for(server: &MockServer) -> SnapshotEngine {
    let mut lark = LarkConfig::new("cli_test", "secret");
    lark.api_base = server.uri();
    let (client, _) = lark.build_clients("http://localhost/callback");
    SnapshotEngine::new(client).with_date(NaiveDate::from_ymd_opt(2024, 5, 6).unwrap())
}

async fn mount_tenant_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path("/auth/v3/tenant_access_token/internal"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": 0,
            "tenant_access_token": "t-tenant",
            "expire": 7200
        })))
        .mount(server)
        .await;
}

// ============================================================================
// End-to-end snapshot
// ============================================================================

#[tokio::test]
async fn test_snapshot_flattens_link_field() {
    let server = MockServer::start().await;
    mount_tenant_token(&server).await;

    Mock::given(method("GET"))
        .and(path("/bitable/v1/apps/appSrc"))
        .and(header("authorization", "Bearer t-tenant"))
        .respond_with(ok(json!({ "app": { "app_token": "appSrc", "name": "Projects" } })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/bitable/v1/apps"))
        .and(body_partial_json(json!({ "name": "Projects frozen" })))
        .respond_with(ok(json!({
            "app": {
                "app_token": "appDst",
                "name": "Projects frozen",
                "url": "https://x.larksuite.com/base/appDst",
                "default_table_id": "tblDefault"
            }
        })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("DELETE"))
        .and(path("/bitable/v1/apps/appDst/tables/tblDefault"))
        .respond_with(ok(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/bitable/v1/apps/appSrc/tables"))
        .respond_with(ok(json!({
            "items": [{ "table_id": "tblTasks", "name": "Tasks" }],
            "has_more": false
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/bitable/v1/apps/appSrc/tables/tblTasks/fields"))
        .respond_with(ok(json!({
            "items": [
                { "field_id": "f1", "field_name": "Title", "type": 1, "ui_type": "Text", "is_primary": true },
                {
                    "field_id": "f2",
                    "field_name": "Depends on",
                    "type": 18,
                    "ui_type": "SingleLink",
                    "property": { "table_id": "tblTasks", "multiple": true }
                }
            ],
            "has_more": false
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/bitable/v1/apps/appDst/tables"))
        .and(body_partial_json(json!({
            "table": {
                "name": "Tasks_20240506",
                "fields": [
                    { "field_name": "Title", "type": 1 },
                    { "field_name": "Depends on", "type": 1 }
                ]
            }
        })))
        .respond_with(ok(json!({ "table_id": "tblCopy" })))
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/bitable/v1/apps/appDst/tables/tblCopy/fields"))
        .respond_with(ok(json!({
            "items": [
                { "field_id": "n1", "field_name": "Title", "type": 1 },
                { "field_id": "n2", "field_name": "Depends on", "type": 1 }
            ],
            "has_more": false
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/bitable/v1/apps/appSrc/tables/tblTasks/records"))
        .respond_with(ok(json!({
            "items": [
                {
                    "record_id": "rec3",
                    "fields": {
                        "Title": "Ship",
                        "Depends on": [
                            { "text": "A", "record_ids": ["rec1"] },
                            { "text": "B", "record_ids": ["rec2"] }
                        ]
                    }
                }
            ],
            "has_more": false
        })))
        .mount(&server)
        .await;

    Mock::given(method("POST"))
        .and(path("/bitable/v1/apps/appDst/tables/tblCopy/records/batch_create"))
        .and(body_partial_json(json!({
            "records": [{ "fields": { "Title": "Ship", "Depends on": "A, B" } }]
        })))
        .respond_with(ok(json!({ "records": [] })))
        .expect(1)
        .mount(&server)
        .await;

    let engine = engine_for(&server);
    let result = engine
        .run(&SnapshotConfig::new(
            "https://x.larksuite.com/base/appSrc?table=tblTasks",
            "Projects frozen",
        ))
        .await;

    assert!(result.success);
    assert!(result.errors.is_empty(), "{:?}", result.errors);
    assert_eq!(result.tables_processed, 1);
    assert_eq!(result.records_processed, 1);
    assert_eq!(result.fields_converted, 1);
    assert_eq!(result.source_base.name, "Projects");
    assert_eq!(
        result.target_base.url.as_deref(),
        Some("https://x.larksuite.com/base/appDst")
    );
}

#[tokio::test]
async fn test_snapshot_result_serializes_for_the_ui() {
    let server = MockServer::start().await;
    mount_tenant_token(&server).await;

    let engine = engine_for(&server);
    let result = engine
        .run(&SnapshotConfig::new("not a base url", "Copy"))
        .await;
    let value = serde_json::to_value(&result).unwrap();

    assert_eq!(value["success"], json!(false));
    assert_eq!(value["tablesProcessed"], json!(0));
    assert_eq!(value["errors"].as_array().map(Vec::len), Some(1));
    assert!(value["createdAt"].is_string());
}

// ============================================================================
// Preview
// ============================================================================

#[tokio::test]
async fn test_preview_counts_dynamic_fields() {
    let server = MockServer::start().await;
    mount_tenant_token(&server).await;

    Mock::given(method("GET"))
        .and(path("/bitable/v1/apps/appSrc"))
        .respond_with(ok(json!({ "app": { "app_token": "appSrc", "name": "Projects" } })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/bitable/v1/apps/appSrc/tables"))
        .respond_with(ok(json!({
            "items": [{ "table_id": "tblTasks", "name": "Tasks" }],
            "has_more": false
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/bitable/v1/apps/appSrc/tables/tblTasks/fields"))
        .respond_with(ok(json!({
            "items": [
                { "field_id": "f1", "field_name": "Title", "type": 1, "ui_type": "Text" },
                { "field_id": "f2", "field_name": "Total", "type": 20, "ui_type": "Formula" },
                { "field_id": "f3", "field_name": "Owner", "type": 11, "ui_type": "User" }
            ],
            "has_more": false
        })))
        .mount(&server)
        .await;

    let preview = engine_for(&server)
        .preview("https://x.larksuite.com/base/appSrc?table=tblTasks")
        .await
        .unwrap();

    assert_eq!(preview.source_base.name, "Projects");
    assert_eq!(preview.table_id_from_url.as_deref(), Some("tblTasks"));
    assert_eq!(preview.tables.len(), 1);
    assert_eq!(preview.tables[0].field_count, 3);
    assert_eq!(preview.tables[0].dynamic_field_count, 2);
}
