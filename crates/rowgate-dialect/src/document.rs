//! Document family: MongoDB.
//!
//! Predicates become a filter document in extended JSON. Pattern operators use
//! `$regex` with the search term escaped, so a term is always matched
//! literally; non-string fields are matched through `$toString`.

use rowgate_core::{ColumnSchema, DataCategory, DialectKind, SortOrder, TableSchema};
use rowgate_query::{FilterClause, FilterOperator, Predicate, QueryIr};
use serde_json::{Value, json};

use crate::DialectAdapter;
use crate::error::{AdapterError, CoercionError};
use crate::native::{DocumentQuery, NativeQuery};
use crate::value::{TypedValue, coerce_for_column};

/// Dialect adapter for MongoDB collections.
#[derive(Debug, Clone, Copy, Default)]
pub struct MongoDialect;

impl MongoDialect {
    pub fn new() -> Self {
        Self
    }

    /// Filter document for `filter`; `{}` selects everything.
    pub fn filter_document(
        &self,
        filter: Option<&Predicate>,
        schema: &TableSchema,
    ) -> Result<Value, AdapterError> {
        match filter {
            Some(p) => self.render(p, schema),
            None => Ok(json!({})),
        }
    }

    fn render(&self, predicate: &Predicate, schema: &TableSchema) -> Result<Value, AdapterError> {
        let (parts, op) = match predicate {
            Predicate::Clause(clause) => return self.render_clause(clause, schema),
            Predicate::And(parts) => (parts, "$and"),
            Predicate::Or(parts) => (parts, "$or"),
        };
        let docs = parts
            .iter()
            .map(|p| self.render(p, schema))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(json!({ op: docs }))
    }

    fn render_clause(&self, clause: &FilterClause, schema: &TableSchema) -> Result<Value, AdapterError> {
        let column = schema
            .get_column(&clause.column)
            .ok_or_else(|| AdapterError::UnknownColumn {
                table: schema.name.clone(),
                column: clause.column.clone(),
            })?;
        let field = column.name.as_str();

        let doc = match clause.operator {
            // Matches both an explicit null and a missing field.
            FilterOperator::Empty => json!({ field: Value::Null }),
            op if op.is_pattern() => {
                let regex = match op {
                    FilterOperator::StartsWith => format!("^{}", regex::escape(&clause.value)),
                    FilterOperator::EndsWith => format!("{}$", regex::escape(&clause.value)),
                    _ => regex::escape(&clause.value),
                };
                if column.category().is_text_like() {
                    json!({ field: { "$regex": regex, "$options": "i" } })
                } else {
                    json!({ "$expr": { "$regexMatch": {
                        "input": { "$toString": format!("${}", field) },
                        "regex": regex,
                        "options": "i",
                    } } })
                }
            }
            op => {
                let value = self.coerce_value(column, &clause.value)?;
                let operand = extended_json(column, &value);
                let mongo_op = match op {
                    FilterOperator::Gt => "$gt",
                    FilterOperator::Lt => "$lt",
                    FilterOperator::Gte => "$gte",
                    FilterOperator::Lte => "$lte",
                    _ => "$eq",
                };
                json!({ field: { mongo_op: operand } })
            }
        };
        Ok(doc)
    }
}

/// Extended JSON for a coerced value: dates become `$date`, object ids `$oid`.
fn extended_json(column: &ColumnSchema, value: &TypedValue) -> Value {
    match value {
        TypedValue::Text(hex) if column.category() == DataCategory::Identifier => {
            json!({ "$oid": hex })
        }
        TypedValue::Date(d) => json!({ "$date": format!("{}T00:00:00Z", d.format("%Y-%m-%d")) }),
        TypedValue::Timestamp(ts) => {
            json!({ "$date": format!("{}Z", ts.format("%Y-%m-%dT%H:%M:%S%.3f")) })
        }
        TypedValue::Decimal(s) => json!({ "$numberDecimal": s }),
        other => other.to_json(),
    }
}

impl DialectAdapter for MongoDialect {
    fn kind(&self) -> DialectKind {
        DialectKind::Mongo
    }

    fn build_query(&self, ir: &QueryIr, schema: &TableSchema) -> Result<NativeQuery, AdapterError> {
        if ir.projection.is_empty() {
            return Err(AdapterError::EmptyProjection(schema.name.clone()));
        }
        let filter = self.filter_document(ir.filter.as_ref(), schema)?;
        let sort = ir
            .sort
            .iter()
            .map(|s| {
                let dir = match s.direction {
                    SortOrder::Asc => 1,
                    SortOrder::Desc => -1,
                };
                (s.column.clone(), dir)
            })
            .collect();

        tracing::debug!(collection = %schema.name, "Built document query");

        Ok(NativeQuery::Document(DocumentQuery {
            collection: schema.name.clone(),
            filter,
            projection: ir.projection.clone(),
            sort,
            skip: ir.page.offset(),
            limit: ir.page.limit(),
        }))
    }

    fn coerce_value(&self, column: &ColumnSchema, raw: &str) -> Result<TypedValue, CoercionError> {
        coerce_for_column(column, raw)
    }
}
