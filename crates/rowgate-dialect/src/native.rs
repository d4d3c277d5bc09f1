//! Engine-native query forms and the raw row set executors return.

use rowgate_core::DialectKind;
use rowgate_query::{PageWindow, Predicate, SortSpec};
use serde::Serialize;
use serde_json::{Map, Value};

use crate::value::TypedValue;

/// One parameterised statement. Values are only ever carried in `params`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SqlStatement {
    pub text: String,
    pub params: Vec<TypedValue>,
}

/// Page select plus the count that shares its filter.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SqlQuery {
    pub kind: DialectKind,
    pub select: SqlStatement,
    pub count: SqlStatement,
}

/// MongoDB `find` + `countDocuments` over one collection.
///
/// `filter` is MongoDB extended JSON; executors convert it to BSON.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentQuery {
    pub collection: String,
    pub filter: Value,
    /// Fields to return. `_id` is returned only when listed.
    pub projection: Vec<String>,
    /// `(field, 1 | -1)` in priority order.
    pub sort: Vec<(String, i32)>,
    pub skip: u64,
    pub limit: u64,
}

impl DocumentQuery {
    /// `{field: 1, ...}` projection document.
    pub fn projection_document(&self) -> Value {
        let mut doc = Map::new();
        if !self.projection.iter().any(|f| f == "_id") {
            doc.insert("_id".to_string(), Value::from(0));
        }
        for field in &self.projection {
            doc.insert(field.clone(), Value::from(1));
        }
        Value::Object(doc)
    }

    pub fn sort_document(&self) -> Value {
        Value::Object(
            self.sort
                .iter()
                .map(|(field, dir)| (field.clone(), Value::from(*dir)))
                .collect(),
        )
    }
}

/// Cassandra select.
///
/// Only conjunctive equality and range clauses are pushed down. Disjunctions,
/// pattern matches, NULL tests, arbitrary sorting, offsets and the total are
/// evaluated client-side by [`crate::wide_column::finish`].
///
/// When `count` is set the select already carries the clustering `ORDER BY`
/// and a `LIMIT` covering the requested page, and `count` yields the total.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CqlQuery {
    pub select: SqlStatement,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<SqlStatement>,
    pub projection: Vec<String>,
    pub residual: Option<Predicate>,
    pub sort: Vec<SortSpec>,
    pub window: PageWindow,
}

/// Engine-native form of a table query.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum NativeQuery {
    Sql(SqlQuery),
    Document(DocumentQuery),
    Cql(CqlQuery),
}

impl NativeQuery {
    pub fn variant_name(&self) -> &'static str {
        match self {
            NativeQuery::Sql(_) => "sql",
            NativeQuery::Document(_) => "document",
            NativeQuery::Cql(_) => "cql",
        }
    }

    /// Statement text for logging. Parameter values are never included.
    pub fn describe(&self) -> String {
        match self {
            NativeQuery::Sql(q) => q.select.text.clone(),
            NativeQuery::Document(q) => format!("find({})", q.collection),
            NativeQuery::Cql(q) => q.select.text.clone(),
        }
    }
}

/// Rows as returned by an executor, keyed by column name.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NativeRowSet {
    pub rows: Vec<Map<String, Value>>,
    /// Row count of the whole filtered result, not of this page.
    pub total: u64,
}

impl NativeRowSet {
    pub fn new(rows: Vec<Map<String, Value>>, total: u64) -> Self {
        Self { rows, total }
    }
}
