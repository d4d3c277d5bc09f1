//! Table listing, descriptions, single rows and cache maintenance.

use crate::common::*;
use pretty_assertions::assert_eq;
use rowgate_runtime::QueryError;
use serde_json::Value;
use std::sync::atomic::Ordering;

fn key(id: &str) -> Vec<(String, String)> {
    vec![("id".to_string(), id.to_string())]
}

#[tokio::test]
async fn test_list_tables_filters_by_visibility() {
    let h = harness().await;

    let mut viewer: Vec<String> = h
        .orchestrator
        .list_tables(CONNECTION, VIEWER)
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.table)
        .collect();
    viewer.sort();
    assert_eq!(viewer, vec!["users"]);

    let mut admin: Vec<String> = h
        .orchestrator
        .list_tables(CONNECTION, ADMIN)
        .await
        .unwrap()
        .into_iter()
        .map(|t| t.table)
        .collect();
    admin.sort();
    assert_eq!(admin, vec!["audit_log", "orders", "users"]);

    let err = h.orchestrator.list_tables(CONNECTION, STRANGER).await.unwrap_err();
    assert_eq!(err.status_code(), 404);
}

#[tokio::test]
async fn test_describe_table_hides_excluded_columns() {
    let h = harness().await;
    let description = h
        .orchestrator
        .describe_table(CONNECTION, "users", EDITOR)
        .await
        .unwrap();

    let columns: Vec<&str> = description.columns.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(columns, vec!["id", "name", "email", "age"]);
    assert_eq!(description.readonly_fields, vec!["email"]);
    assert_eq!(description.identity_column.as_deref(), Some("name"));
    assert!(description.identifiable);
    assert!(description.capability.edit);

    let orders = h
        .orchestrator
        .describe_table(CONNECTION, "orders", EDITOR)
        .await
        .unwrap();
    assert_eq!(orders.foreign_keys.len(), 1);
    assert_eq!(orders.foreign_keys[0].referenced_table, "users");
}

#[tokio::test]
async fn test_get_row_by_primary_key() {
    let h = harness().await;
    let row = h
        .orchestrator
        .get_row(CONNECTION, "users", &key("15"), VIEWER)
        .await
        .unwrap();

    assert_eq!(row.get("id").and_then(Value::as_i64), Some(15));
    assert_eq!(row.get("name").and_then(Value::as_str), Some("Vasia 15"));
    assert!(!row.contains_key("password_hash"));
}

#[tokio::test]
async fn test_get_row_errors() {
    let h = harness().await;

    let missing = h
        .orchestrator
        .get_row(CONNECTION, "users", &key("999"), VIEWER)
        .await
        .unwrap_err();
    assert!(matches!(missing, QueryError::NotFound(_)), "got {:?}", missing);
    assert_eq!(missing.status_code(), 404);

    let wrong_column = h
        .orchestrator
        .get_row(CONNECTION, "users", &[("name".to_string(), "x".to_string())], VIEWER)
        .await
        .unwrap_err();
    assert_eq!(wrong_column.status_code(), 400);

    let keyless = h
        .orchestrator
        .get_row(CONNECTION, "audit_log", &key("1"), EDITOR)
        .await
        .unwrap_err();
    assert_eq!(keyless.status_code(), 400);
}

#[tokio::test]
async fn test_schema_is_cached_until_refreshed() {
    let h = harness().await;
    for _ in 0..3 {
        h.orchestrator
            .run_table_query(CONNECTION, "users", &params(""), VIEWER)
            .await
            .unwrap();
    }
    assert_eq!(h.introspector.calls.load(Ordering::SeqCst), 1);

    h.orchestrator.refresh_table(CONNECTION, "users").await.unwrap();
    assert_eq!(h.introspector.calls.load(Ordering::SeqCst), 2);

    h.orchestrator.invalidate(CONNECTION).unwrap();
    h.orchestrator
        .run_table_query(CONNECTION, "users", &params(""), VIEWER)
        .await
        .unwrap();
    assert_eq!(h.introspector.calls.load(Ordering::SeqCst), 3);
}
