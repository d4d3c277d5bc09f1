//! Engine-independent result shape.

use rowgate_core::TableSchema;
use rowgate_dialect::NativeRowSet;
use rowgate_query::PageWindow;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeSet;

/// Primary key column as reported to callers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryColumn {
    pub column_name: String,
    /// Native type name recorded by introspection.
    pub data_type: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    pub total: u64,
    pub last_page: u64,
    pub per_page: u32,
    pub current_page: u32,
}

impl Pagination {
    pub fn new(total: u64, window: PageWindow) -> Self {
        Self {
            total,
            last_page: window.last_page(total),
            per_page: window.per_page,
            current_page: window.page,
        }
    }
}

/// One page of a table query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryResult {
    pub rows: Vec<Map<String, Value>>,
    pub primary_columns: Vec<PrimaryColumn>,
    pub pagination: Pagination,
}

pub fn primary_columns(schema: &TableSchema) -> Vec<PrimaryColumn> {
    schema
        .primary_columns()
        .into_iter()
        .map(|c| PrimaryColumn {
            column_name: c.name.clone(),
            data_type: c.data_type.clone(),
        })
        .collect()
}

/// Reshape native rows: every row carries exactly the `projection` columns,
/// with missing fields as null.
pub fn normalize(
    rowset: NativeRowSet,
    schema: &TableSchema,
    projection: &[String],
    window: PageWindow,
) -> QueryResult {
    let rows = rowset
        .rows
        .into_iter()
        .map(|mut row| {
            projection
                .iter()
                .map(|col| (col.clone(), row.remove(col).unwrap_or(Value::Null)))
                .collect()
        })
        .collect();

    QueryResult {
        rows,
        primary_columns: primary_columns(schema),
        pagination: Pagination::new(rowset.total, window),
    }
}

/// Remove excluded fields from every row and from the primary columns.
pub fn strip_excluded(result: &mut QueryResult, excluded: &BTreeSet<String>) {
    if excluded.is_empty() {
        return;
    }
    for row in &mut result.rows {
        row.retain(|k, _| !excluded.contains(k));
    }
    result
        .primary_columns
        .retain(|c| !excluded.contains(&c.column_name));
}
