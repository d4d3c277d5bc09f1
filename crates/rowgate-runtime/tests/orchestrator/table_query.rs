//! Pagination, filtering, search, sorting and parameter validation.

use crate::common::*;
use pretty_assertions::assert_eq;
use rowgate_core::QueryConfig;
use rowgate_runtime::QueryError;
use serde_json::Value;

#[tokio::test]
async fn test_default_page_and_pagination_block() {
    let h = harness().await;
    let result = h
        .orchestrator
        .run_table_query(CONNECTION, "users", &params("perPage=2"), VIEWER)
        .await
        .unwrap();

    assert_eq!(ids(&result.rows), vec![1, 2]);
    assert_eq!(result.pagination.total, 42);
    assert_eq!(result.pagination.last_page, 21);
    assert_eq!(result.pagination.per_page, 2);
    assert_eq!(result.pagination.current_page, 1);
    assert_eq!(result.primary_columns.len(), 1);
    assert_eq!(result.primary_columns[0].column_name, "id");

    let json = serde_json::to_value(&result.pagination).unwrap();
    assert_eq!(
        json,
        serde_json::json!({ "total": 42, "lastPage": 21, "perPage": 2, "currentPage": 1 })
    );
}

#[tokio::test]
async fn test_later_pages_do_not_overlap() {
    let h = harness().await;
    let page3 = h
        .orchestrator
        .run_table_query(CONNECTION, "users", &params("page=3&perPage=2"), VIEWER)
        .await
        .unwrap();
    assert_eq!(ids(&page3.rows), vec![5, 6]);
    assert_eq!(page3.pagination.current_page, 3);

    let last = h
        .orchestrator
        .run_table_query(CONNECTION, "users", &params("page=5&perPage=10"), VIEWER)
        .await
        .unwrap();
    assert_eq!(ids(&last.rows), vec![41, 42]);
    assert_eq!(last.pagination.last_page, 5);
}

#[tokio::test]
async fn test_page_past_the_end_is_empty() {
    let h = harness().await;
    let result = h
        .orchestrator
        .run_table_query(CONNECTION, "users", &params("page=99&perPage=10"), VIEWER)
        .await
        .unwrap();
    assert!(result.rows.is_empty());
    assert_eq!(result.pagination.total, 42);
}

#[tokio::test]
async fn test_filter_search_sort_combined() {
    let h = harness().await;
    let result = h
        .orchestrator
        .run_table_query(
            CONNECTION,
            "users",
            &params("f_id__lt=45&search=Vasia&sort=id&order=DESC&perPage=2"),
            VIEWER,
        )
        .await
        .unwrap();

    assert_eq!(ids(&result.rows), vec![40, 35]);
    assert_eq!(result.pagination.total, 8);
    assert_eq!(result.pagination.last_page, 4);
    for row in &result.rows {
        let name = row.get("name").and_then(Value::as_str).unwrap();
        assert!(name.starts_with("Vasia"), "unexpected row {:?}", row);
    }
}

#[tokio::test]
async fn test_search_is_literal() {
    let h = harness().await;
    let result = h
        .orchestrator
        .run_table_query(CONNECTION, "users", &params("search=%25"), VIEWER)
        .await
        .unwrap();
    assert_eq!(result.pagination.total, 0);

    let result = h
        .orchestrator
        .run_table_query(CONNECTION, "users", &params("search=vasia"), VIEWER)
        .await
        .unwrap();
    assert_eq!(result.pagination.total, 8);
}

#[tokio::test]
async fn test_pattern_operators() {
    let h = harness().await;
    let starts = h
        .orchestrator
        .run_table_query(CONNECTION, "users", &params("f_name__startswith=Vasia%204&perPage=50"), VIEWER)
        .await
        .unwrap();
    assert_eq!(ids(&starts.rows), vec![40]);

    let ends = h
        .orchestrator
        .run_table_query(CONNECTION, "users", &params("f_email__endswith=2@example.com&perPage=50"), VIEWER)
        .await
        .unwrap();
    assert_eq!(ids(&ends.rows), vec![2, 12, 22, 32, 42]);
}

#[tokio::test]
async fn test_numeric_sort_and_filter_are_typed() {
    let h = harness().await;
    let result = h
        .orchestrator
        .run_table_query(CONNECTION, "users", &params("sort=age&perPage=50"), VIEWER)
        .await
        .unwrap();

    let ages: Vec<i64> = result
        .rows
        .iter()
        .map(|r| r.get("age").and_then(Value::as_i64).unwrap())
        .collect();
    let mut sorted = ages.clone();
    sorted.sort();
    assert_eq!(ages, sorted);
    assert_eq!(ages.len(), 42);

    let expected: Vec<i64> = (1..=USER_ROWS).filter(|id| user_age(*id) > 60).collect();
    let filtered = h
        .orchestrator
        .run_table_query(CONNECTION, "users", &params("f_age__gt=60&perPage=50"), VIEWER)
        .await
        .unwrap();
    assert_eq!(ids(&filtered.rows), expected);
    assert_eq!(filtered.pagination.total, expected.len() as u64);
}

#[tokio::test]
async fn test_equal_sort_keys_break_ties_on_primary_key() {
    let h = harness().await;
    let mut seen = Vec::new();
    for page in 1..=6 {
        let result = h
            .orchestrator
            .run_table_query(
                CONNECTION,
                "users",
                &params(&format!("sort=age&order=DESC&perPage=8&page={}", page)),
                VIEWER,
            )
            .await
            .unwrap();
        seen.extend(ids(&result.rows));
    }
    seen.sort();
    assert_eq!(seen, (1..=USER_ROWS).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_coercion_failure_is_bad_request() {
    let h = harness().await;
    let err = h
        .orchestrator
        .run_table_query(CONNECTION, "users", &params("f_age__gt=old"), VIEWER)
        .await
        .unwrap_err();
    assert!(matches!(err, QueryError::Coercion(_)), "got {:?}", err);
    assert_eq!(err.status_code(), 400);
}

#[tokio::test]
async fn test_invalid_parameters_are_aggregated() {
    let h = harness().await;
    let err = h
        .orchestrator
        .run_table_query(
            CONNECTION,
            "users",
            &params("f_nope=1&sort=missing&order=sideways&page=0"),
            VIEWER,
        )
        .await
        .unwrap_err();

    let QueryError::Validation(validation) = &err else {
        panic!("expected validation error, got {:?}", err);
    };
    assert_eq!(validation.issues.len(), 4);
    assert_eq!(err.status_code(), 400);

    let body = err.to_body();
    assert_eq!(body.kind, "VALIDATION_ERROR");
    assert!(body.message.contains("column 'nope' does not exist in table 'users'"));
    assert!(body.message.contains(", "));
}

#[tokio::test]
async fn test_per_page_limit() {
    let h = harness_with(QueryConfig {
        max_per_page: 10,
        ..QueryConfig::default()
    })
    .await;

    let err = h
        .orchestrator
        .run_table_query(CONNECTION, "users", &params("perPage=11"), VIEWER)
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 400);

    let ok = h
        .orchestrator
        .run_table_query(CONNECTION, "users", &params("perPage=10"), VIEWER)
        .await
        .unwrap();
    assert_eq!(ok.rows.len(), 10);
}
