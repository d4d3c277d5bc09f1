//! Visibility, excluded fields and capability checks.

use crate::common::*;
use pretty_assertions::assert_eq;
use rowgate_core::TableAction;
use rowgate_runtime::QueryError;

#[tokio::test]
async fn test_excluded_field_never_returned() {
    let h = harness().await;
    for requester in [ADMIN, VIEWER, EDITOR] {
        let result = h
            .orchestrator
            .run_table_query(CONNECTION, "users", &params("perPage=50"), requester)
            .await
            .unwrap();
        assert_eq!(result.rows.len(), 42);
        for row in &result.rows {
            assert!(!row.contains_key("password_hash"));
            assert!(row.contains_key("email"));
        }
    }
}

#[tokio::test]
async fn test_excluded_field_cannot_be_filtered_or_sorted() {
    let h = harness().await;
    let err = h
        .orchestrator
        .run_table_query(
            CONNECTION,
            "users",
            &params("f_password_hash=hash-1&sort=password_hash"),
            ADMIN,
        )
        .await
        .unwrap_err();

    let QueryError::Validation(validation) = &err else {
        panic!("expected validation error, got {:?}", err);
    };
    assert_eq!(validation.issues.len(), 2);
    assert_eq!(validation.fields(), vec!["password_hash"]);
    assert_eq!(
        err.to_string(),
        "column 'password_hash' does not exist in table 'users', \
         column 'password_hash' does not exist in table 'users'"
    );
}

#[tokio::test]
async fn test_hidden_table_looks_missing() {
    let h = harness().await;
    let hidden = h
        .orchestrator
        .run_table_query(CONNECTION, "orders", &params(""), VIEWER)
        .await
        .unwrap_err();
    let missing = h
        .orchestrator
        .run_table_query(CONNECTION, "ghosts", &params(""), VIEWER)
        .await
        .unwrap_err();

    assert_eq!(hidden.status_code(), 400);
    assert_eq!(hidden.kind(), "TABLE_NOT_FOUND");
    assert_eq!(hidden.to_string(), "table 'orders' not found");
    assert_eq!(missing.to_string(), "table 'ghosts' not found");
    assert_eq!(hidden.status_code(), missing.status_code());

    let visible = h
        .orchestrator
        .run_table_query(CONNECTION, "orders", &params(""), EDITOR)
        .await
        .unwrap();
    assert_eq!(visible.pagination.total, 3);
}

#[tokio::test]
async fn test_unknown_connection_and_non_member() {
    let h = harness().await;
    let unknown = h
        .orchestrator
        .run_table_query("nowhere", "users", &params(""), ADMIN)
        .await
        .unwrap_err();
    let stranger = h
        .orchestrator
        .run_table_query(CONNECTION, "users", &params(""), STRANGER)
        .await
        .unwrap_err();

    assert_eq!(unknown.status_code(), 404);
    assert_eq!(stranger.status_code(), 404);
    assert_eq!(unknown.to_string(), stranger.to_string());
}

#[tokio::test]
async fn test_capabilities_merge_across_groups() {
    let h = harness().await;

    // Viewer alone cannot edit.
    let err = h
        .orchestrator
        .authorize(CONNECTION, "users", TableAction::Edit, VIEWER)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 403);

    // A second group granting edit wins.
    let cap = h
        .orchestrator
        .authorize(CONNECTION, "users", TableAction::Edit, VIEWER_EDITOR)
        .await
        .unwrap();
    assert!(cap.visibility && cap.edit && cap.add && cap.delete);
}

#[tokio::test]
async fn test_readonly_group_restricts_writes() {
    let h = harness().await;
    for action in [TableAction::Add, TableAction::Edit, TableAction::Delete] {
        let err = h
            .orchestrator
            .authorize(CONNECTION, "users", action, LOCKED_EDITOR)
            .await
            .unwrap_err();
        assert!(matches!(err, QueryError::Forbidden { .. }), "got {:?}", err);
    }

    let cap = h
        .orchestrator
        .authorize(CONNECTION, "users", TableAction::Read, LOCKED_EDITOR)
        .await
        .unwrap();
    assert!(cap.readonly);
    assert!(!cap.edit);
}

#[tokio::test]
async fn test_admin_has_full_access() {
    let h = harness().await;
    for table in ["users", "orders"] {
        let cap = h
            .orchestrator
            .authorize(CONNECTION, table, TableAction::Delete, ADMIN)
            .await
            .unwrap();
        assert!(cap.visibility && cap.add && cap.edit && cap.delete);
    }
}

#[tokio::test]
async fn test_row_actions_need_a_primary_key() {
    let h = harness().await;
    let err = h
        .orchestrator
        .authorize(CONNECTION, "audit_log", TableAction::Edit, EDITOR)
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::Validation(_)), "got {:?}", err);

    // Reading a keyless table is still allowed.
    let result = h
        .orchestrator
        .run_table_query(CONNECTION, "audit_log", &params(""), EDITOR)
        .await
        .unwrap();
    assert_eq!(result.pagination.total, 1);
    assert!(result.primary_columns.is_empty());
}
