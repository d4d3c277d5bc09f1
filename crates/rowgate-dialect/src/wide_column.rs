//! Wide-column family: Cassandra.
//!
//! CQL cannot express OR, LIKE without a custom index, IS NULL, OFFSET or an
//! ORDER BY outside the clustering order, and `COUNT(*)` scans the partition
//! anyway. The adapter pushes the conjunctive equality and range clauses down
//! with `ALLOW FILTERING` and leaves everything else to [`finish`], which
//! filters, sorts, counts and pages the fetched rows client-side.
//!
//! When nothing is left for the client and the requested sort is the table's
//! clustering order (or its full reverse) inside one partition pinned by
//! equality, the `ORDER BY` and a `LIMIT` of `offset + perPage` go to the
//! server too, with a separate `COUNT(*)` for the total.
//!
//! Range clauses are pushed as given. A range on a partition-key column is
//! not valid CQL and is rejected by the server.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rowgate_core::{ColumnSchema, DataCategory, DialectKind, SortOrder, TableSchema};
use rowgate_query::{FilterClause, FilterOperator, Predicate, QueryIr, SortSpec};
use serde_json::{Map, Value};
use std::cmp::Ordering;

use crate::DialectAdapter;
use crate::error::{AdapterError, CoercionError};
use crate::native::{CqlQuery, NativeQuery, NativeRowSet, SqlStatement};
use crate::sql::SqlFlavor;
use crate::value::{TypedValue, coerce_for_column};

/// Dialect adapter for Cassandra tables.
#[derive(Debug, Clone, Copy, Default)]
pub struct CassandraDialect;

impl CassandraDialect {
    pub fn new() -> Self {
        Self
    }
}

fn is_pushable(clause: &FilterClause) -> bool {
    matches!(clause.operator, FilterOperator::Eq) || clause.operator.is_range()
}

/// Split a filter into pushable top-level clauses and a residual predicate.
fn split_filter(filter: Option<&Predicate>) -> (Vec<&FilterClause>, Option<Predicate>) {
    let top: Vec<&Predicate> = match filter {
        None => return (Vec::new(), None),
        Some(Predicate::And(parts)) => parts.iter().collect(),
        Some(other) => vec![other],
    };
    let mut pushed = Vec::new();
    let mut residual = Vec::new();
    for part in top {
        match part {
            Predicate::Clause(c) if is_pushable(c) => pushed.push(c),
            other => residual.push(other.clone()),
        }
    }
    (pushed, Predicate::and(residual))
}

impl DialectAdapter for CassandraDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::Cassandra
    }

    fn build_query(&self, ir: &QueryIr, schema: &TableSchema) -> Result<NativeQuery, AdapterError> {
        if ir.projection.is_empty() {
            return Err(AdapterError::EmptyProjection(schema.name.clone()));
        }
        let flavor = SqlFlavor::new(DialectKind::Cassandra);

        // Residual filters and sorting may reference every projected column.
        let columns = ir
            .projection
            .iter()
            .map(|c| flavor.quote_ident(c))
            .collect::<Result<Vec<_>, _>>()?;
        let table = match &schema.schema {
            Some(ks) => format!("{}.{}", flavor.quote_ident(ks)?, flavor.quote_ident(&schema.name)?),
            None => flavor.quote_ident(&schema.name)?,
        };

        let (pushed, residual) = split_filter(ir.filter.as_ref());
        let pinned: Vec<&str> = pushed
            .iter()
            .copied()
            .filter(|c| c.operator == FilterOperator::Eq)
            .map(|c| c.column.as_str())
            .collect();
        let mut conditions = Vec::new();
        let mut params = Vec::new();
        for clause in pushed {
            let column = schema
                .get_column(&clause.column)
                .ok_or_else(|| AdapterError::UnknownColumn {
                    table: schema.name.clone(),
                    column: clause.column.clone(),
                })?;
            params.push(self.coerce_value(column, &clause.value)?);
            let op = match clause.operator {
                FilterOperator::Gt => ">",
                FilterOperator::Lt => "<",
                FilterOperator::Gte => ">=",
                FilterOperator::Lte => "<=",
                _ => "=",
            };
            conditions.push(format!("{} {} ?", flavor.quote_ident(&column.name)?, op));
        }

        // Residual clauses are coerced now so a bad value fails before execution.
        if let Some(residual) = &residual {
            for clause in residual.clauses() {
                if clause.operator.is_pattern() || clause.operator == FilterOperator::Empty {
                    continue;
                }
                if let Some(column) = schema.get_column(&clause.column) {
                    self.coerce_value(column, &clause.value)?;
                }
            }
        }

        let where_clause = if conditions.is_empty() {
            String::new()
        } else {
            format!(" WHERE {}", conditions.join(" AND "))
        };
        let filtering = if conditions.is_empty() { "" } else { " ALLOW FILTERING" };

        let order = if residual.is_none() {
            clustering_order(&ir.sort, schema, &pinned, &flavor)?
        } else {
            None
        };

        let mut text = format!("SELECT {} FROM {}{}", columns.join(", "), table, where_clause);
        let count = match &order {
            Some(order) => {
                let fetch = ir.page.offset().saturating_add(ir.page.limit());
                text.push_str(&format!(" {} LIMIT {}", order, fetch));
                Some(SqlStatement {
                    text: format!("SELECT COUNT(*) FROM {}{}{}", table, where_clause, filtering),
                    params: params.clone(),
                })
            }
            None => None,
        };
        text.push_str(filtering);

        tracing::debug!(
            sql = %text,
            residual = residual.is_some(),
            server_paged = count.is_some(),
            "Built CQL query"
        );

        Ok(NativeQuery::Cql(CqlQuery {
            select: SqlStatement { text, params },
            count,
            projection: ir.projection.clone(),
            residual,
            sort: ir.sort.clone(),
            window: ir.page,
        }))
    }

    fn coerce_value(&self, column: &ColumnSchema, raw: &str) -> Result<TypedValue, CoercionError> {
        coerce_for_column(column, raw)
    }
}

/// `ORDER BY` for a sort that walks the clustering key of one partition.
///
/// Every partition-key column must be pinned by equality, and the sort
/// (ignoring pinned columns) must list the clustering columns in order with
/// a single direction.
fn clustering_order(
    sort: &[SortSpec],
    schema: &TableSchema,
    pinned: &[&str],
    flavor: &SqlFlavor,
) -> Result<Option<String>, AdapterError> {
    if schema.clustering_key.is_empty() || !schema.partition_key().all(|pk| pinned.contains(&pk)) {
        return Ok(None);
    }
    let keys: Vec<&SortSpec> = sort
        .iter()
        .filter(|s| !pinned.contains(&s.column.as_str()))
        .collect();
    let Some(direction) = keys.first().map(|s| s.direction) else {
        return Ok(None);
    };
    let walks_clustering = keys.len() == schema.clustering_key.len()
        && keys
            .iter()
            .zip(&schema.clustering_key)
            .all(|(s, ck)| &s.column == ck && s.direction == direction);
    if !walks_clustering {
        return Ok(None);
    }

    let columns = schema
        .clustering_key
        .iter()
        .map(|c| Ok(format!("{} {}", flavor.quote_ident(c)?, direction.as_sql())))
        .collect::<Result<Vec<_>, AdapterError>>()?;
    Ok(Some(format!("ORDER BY {}", columns.join(", "))))
}

/// Apply the client-side part of a CQL query to the fetched rows.
pub fn finish(query: &CqlQuery, schema: &TableSchema, raw: NativeRowSet) -> NativeRowSet {
    let offset = usize::try_from(query.window.offset()).unwrap_or(usize::MAX);
    let limit = usize::try_from(query.window.limit()).unwrap_or(usize::MAX);

    // Already ordered and limited by the server.
    if query.count.is_some() {
        let rows = raw.rows.into_iter().skip(offset).take(limit).collect();
        return NativeRowSet::new(rows, raw.total);
    }

    let rows = raw.rows;
    let mut matched: Vec<Map<String, Value>> = match &query.residual {
        Some(residual) => rows
            .into_iter()
            .filter(|row| matches_row(residual, row, schema))
            .collect(),
        None => rows,
    };

    sort_rows(&mut matched, &query.sort, schema);

    let total = matched.len() as u64;
    let rows = matched.into_iter().skip(offset).take(limit).collect();
    NativeRowSet::new(rows, total)
}

/// Evaluate a predicate against one JSON row.
pub fn matches_row(predicate: &Predicate, row: &Map<String, Value>, schema: &TableSchema) -> bool {
    match predicate {
        Predicate::And(parts) => parts.iter().all(|p| matches_row(p, row, schema)),
        Predicate::Or(parts) => parts.iter().any(|p| matches_row(p, row, schema)),
        Predicate::Clause(clause) => {
            let value = row.get(&clause.column).unwrap_or(&Value::Null);
            let category = schema
                .get_column(&clause.column)
                .map(ColumnSchema::category)
                .unwrap_or(DataCategory::Other);
            matches_clause(clause, value, category)
        }
    }
}

fn matches_clause(clause: &FilterClause, value: &Value, category: DataCategory) -> bool {
    if clause.operator == FilterOperator::Empty {
        return value.is_null();
    }
    if value.is_null() {
        return false;
    }
    if clause.operator.is_pattern() {
        let haystack = match value {
            Value::String(s) => s.to_lowercase(),
            other => other.to_string().to_lowercase(),
        };
        let needle = clause.value.to_lowercase();
        return match clause.operator {
            FilterOperator::StartsWith => haystack.starts_with(&needle),
            FilterOperator::EndsWith => haystack.ends_with(&needle),
            _ => haystack.contains(&needle),
        };
    }

    let ordering = compare_values(value, &Value::String(clause.value.clone()), category);
    match clause.operator {
        FilterOperator::Gt => ordering == Ordering::Greater,
        FilterOperator::Lt => ordering == Ordering::Less,
        FilterOperator::Gte => ordering != Ordering::Less,
        FilterOperator::Lte => ordering != Ordering::Greater,
        _ => ordering == Ordering::Equal,
    }
}

fn sort_rows(rows: &mut [Map<String, Value>], sort: &[SortSpec], schema: &TableSchema) {
    if sort.is_empty() {
        return;
    }
    let keys: Vec<(&SortSpec, DataCategory)> = sort
        .iter()
        .map(|s| {
            let category = schema
                .get_column(&s.column)
                .map(ColumnSchema::category)
                .unwrap_or(DataCategory::Other);
            (s, category)
        })
        .collect();

    rows.sort_by(|a, b| {
        for (spec, category) in &keys {
            let left = a.get(&spec.column).unwrap_or(&Value::Null);
            let right = b.get(&spec.column).unwrap_or(&Value::Null);
            let ord = compare_values(left, right, *category);
            let ord = match spec.direction {
                SortOrder::Asc => ord,
                SortOrder::Desc => ord.reverse(),
            };
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

/// Compare two JSON values by the column's declared type. Nulls sort first.
pub fn compare_values(left: &Value, right: &Value, category: DataCategory) -> Ordering {
    match (left.is_null(), right.is_null()) {
        (true, true) => return Ordering::Equal,
        (true, false) => return Ordering::Less,
        (false, true) => return Ordering::Greater,
        _ => {}
    }
    match category {
        DataCategory::Numeric => match (as_number(left), as_number(right)) {
            (Some(l), Some(r)) => l.partial_cmp(&r).unwrap_or(Ordering::Equal),
            _ => text_of(left).cmp(&text_of(right)),
        },
        DataCategory::Temporal => match (as_timestamp(left), as_timestamp(right)) {
            (Some(l), Some(r)) => l.cmp(&r),
            _ => text_of(left).cmp(&text_of(right)),
        },
        DataCategory::Boolean => match (as_bool(left), as_bool(right)) {
            (Some(l), Some(r)) => l.cmp(&r),
            _ => text_of(left).cmp(&text_of(right)),
        },
        _ => text_of(left).cmp(&text_of(right)),
    }
}

fn text_of(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.to_ascii_lowercase().as_str() {
            "true" | "1" => Some(true),
            "false" | "0" => Some(false),
            _ => None,
        },
        Value::Number(n) => n.as_i64().map(|v| v != 0),
        _ => None,
    }
}

fn as_timestamp(value: &Value) -> Option<NaiveDateTime> {
    let s = value.as_str()?.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"]
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .ok()
                .and_then(|d| d.and_hms_opt(0, 0, 0))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rowgate_query::PageWindow;
    use serde_json::json;

    fn events() -> TableSchema {
        TableSchema::new("events")
            .with_schema("app")
            .with_column(ColumnSchema::new("id", "int").primary_key())
            .with_column(ColumnSchema::new("kind", "text"))
            .with_column(ColumnSchema::new("at", "timestamp"))
    }

    fn clause(col: &str, op: FilterOperator, v: &str) -> Predicate {
        Predicate::Clause(FilterClause::new(col, op, v))
    }

    fn row(id: i64, kind: &str, at: &str) -> Map<String, Value> {
        match json!({ "id": id, "kind": kind, "at": at }) {
            Value::Object(m) => m,
            _ => unreachable!(),
        }
    }

    fn cql(ir: &QueryIr) -> CqlQuery {
        match CassandraDialect::new().build_query(ir, &events()).unwrap() {
            NativeQuery::Cql(q) => q,
            other => panic!("expected cql, got {}", other.variant_name()),
        }
    }

    fn ir(filter: Option<Predicate>, sort: Vec<SortSpec>, page: PageWindow) -> QueryIr {
        QueryIr {
            table: "events".to_string(),
            projection: vec!["id".to_string(), "kind".to_string(), "at".to_string()],
            filter,
            sort,
            page,
        }
    }

    #[test]
    fn test_pushdown_split() {
        let q = cql(&ir(
            Some(Predicate::And(vec![
                clause("id", FilterOperator::Gte, "2"),
                clause("kind", FilterOperator::Contain, "log"),
            ])),
            vec![],
            PageWindow::new(1, 10),
        ));
        assert_eq!(
            q.select.text,
            "SELECT \"id\", \"kind\", \"at\" FROM \"app\".\"events\" WHERE \"id\" >= ? ALLOW FILTERING"
        );
        assert_eq!(q.select.params, vec![TypedValue::Int(2)]);
        assert_eq!(q.residual, Some(clause("kind", FilterOperator::Contain, "log")));
    }

    #[test]
    fn test_finish_filters_sorts_and_pages() {
        let q = cql(&ir(
            Some(Predicate::Or(vec![
                clause("kind", FilterOperator::StartsWith, "LOG"),
                clause("id", FilterOperator::Eq, "10"),
            ])),
            vec![SortSpec::new("id", SortOrder::Desc)],
            PageWindow::new(1, 2),
        ));
        assert!(!q.select.text.contains("WHERE"));

        let rows = vec![
            row(2, "login", "2024-01-02T00:00:00Z"),
            row(9, "click", "2024-01-03T00:00:00Z"),
            row(10, "click", "2024-01-01T00:00:00Z"),
            row(3, "logout", "2024-01-04T00:00:00Z"),
        ];
        let result = finish(&q, &events(), NativeRowSet::new(rows, 0));
        assert_eq!(result.total, 3);
        let ids: Vec<i64> = result.rows.iter().filter_map(|r| r["id"].as_i64()).collect();
        assert_eq!(ids, vec![10, 3]);
    }

    fn readings() -> TableSchema {
        TableSchema::new("readings")
            .with_schema("app")
            .with_column(ColumnSchema::new("device", "text").primary_key())
            .with_column(ColumnSchema::new("at", "timestamp").primary_key())
            .with_column(ColumnSchema::new("reading", "int"))
            .with_clustering_key(["at"])
    }

    fn readings_query(filter: Option<Predicate>, sort: Vec<SortSpec>) -> CqlQuery {
        let ir = QueryIr {
            table: "readings".to_string(),
            projection: vec!["device".to_string(), "at".to_string(), "reading".to_string()],
            filter,
            sort,
            page: PageWindow::new(2, 2),
        };
        match CassandraDialect::new().build_query(&ir, &readings()).unwrap() {
            NativeQuery::Cql(q) => q,
            other => panic!("expected cql, got {}", other.variant_name()),
        }
    }

    #[test]
    fn test_clustering_order_pages_on_the_server() {
        let q = readings_query(
            Some(clause("device", FilterOperator::Eq, "d1")),
            vec![SortSpec::new("at", SortOrder::Desc), SortSpec::new("device", SortOrder::Asc)],
        );
        assert_eq!(
            q.select.text,
            "SELECT \"device\", \"at\", \"reading\" FROM \"app\".\"readings\" \
             WHERE \"device\" = ? ORDER BY \"at\" DESC LIMIT 4 ALLOW FILTERING"
        );
        let count = q.count.clone().unwrap();
        assert_eq!(
            count.text,
            "SELECT COUNT(*) FROM \"app\".\"readings\" WHERE \"device\" = ? ALLOW FILTERING"
        );
        assert_eq!(count.params, q.select.params);

        let fetched = (1..=4)
            .map(|i| {
                let mut r = Map::new();
                r.insert("reading".to_string(), json!(i));
                r
            })
            .collect();
        let result = finish(&q, &readings(), NativeRowSet::new(fetched, 9));
        assert_eq!(result.total, 9);
        let values: Vec<i64> = result.rows.iter().filter_map(|r| r["reading"].as_i64()).collect();
        assert_eq!(values, vec![3, 4]);
    }

    #[test]
    fn test_other_sorts_stay_client_side() {
        // Partition not pinned.
        let q = readings_query(None, vec![SortSpec::new("at", SortOrder::Asc)]);
        assert_eq!(q.count, None);
        assert!(!q.select.text.contains("LIMIT"));

        // Sort on a regular column.
        let q = readings_query(
            Some(clause("device", FilterOperator::Eq, "d1")),
            vec![SortSpec::new("reading", SortOrder::Asc), SortSpec::new("at", SortOrder::Asc)],
        );
        assert_eq!(q.count, None);

        // Residual predicate left for the client.
        let q = readings_query(
            Some(Predicate::And(vec![
                clause("device", FilterOperator::Eq, "d1"),
                clause("device", FilterOperator::Contain, "d"),
            ])),
            vec![SortSpec::new("at", SortOrder::Asc)],
        );
        assert_eq!(q.count, None);
    }

    #[test]
    fn test_numeric_and_temporal_compare_by_type() {
        assert_eq!(
            compare_values(&json!(9), &json!(10), DataCategory::Numeric),
            Ordering::Less
        );
        assert_eq!(
            compare_values(&json!("9"), &json!("10"), DataCategory::Text),
            Ordering::Greater
        );
        assert_eq!(
            compare_values(
                &json!("2024-01-02T00:00:00+05:00"),
                &json!("2024-01-01 20:00:00"),
                DataCategory::Temporal
            ),
            Ordering::Less
        );
        assert_eq!(compare_values(&Value::Null, &json!(1), DataCategory::Numeric), Ordering::Less);
    }

    #[test]
    fn test_empty_matches_missing_field() {
        let schema = events();
        let mut r = row(1, "x", "2024-01-01");
        r.remove("at");
        assert!(matches_row(&clause("at", FilterOperator::Empty, ""), &r, &schema));
        assert!(!matches_row(&clause("kind", FilterOperator::Empty, ""), &r, &schema));
    }
}
