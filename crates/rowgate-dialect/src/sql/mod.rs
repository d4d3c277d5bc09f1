//! Relational family: Postgres, MySQL, SQL Server, Oracle and DB2.
//!
//! Every engine gets the same two statements: a paged select and a count
//! sharing its WHERE clause. Filter values are coerced to the column's native
//! type and bound; the statement text only ever contains quoted introspected
//! identifiers, operators and placeholders.

pub mod flavor;

use rowgate_core::{ColumnSchema, DialectKind, TableSchema};
use rowgate_query::{FilterClause, FilterOperator, Predicate, QueryIr};

use crate::DialectAdapter;
use crate::error::{AdapterError, CoercionError};
use crate::native::{NativeQuery, SqlQuery, SqlStatement};
use crate::value::{TypedValue, coerce_for_column};

pub use flavor::{LIKE_ESCAPE, SqlFlavor};

/// Dialect adapter for one relational engine.
#[derive(Debug, Clone, Copy)]
pub struct SqlDialect {
    flavor: SqlFlavor,
}

impl SqlDialect {
    pub fn new(kind: DialectKind) -> Self {
        Self {
            flavor: SqlFlavor::new(kind),
        }
    }

    pub fn flavor(&self) -> &SqlFlavor {
        &self.flavor
    }

    fn table_ref(&self, schema: &TableSchema) -> Result<String, AdapterError> {
        let table = self.flavor.quote_ident(&schema.name)?;
        match &schema.schema {
            Some(ns) => Ok(format!("{}.{}", self.flavor.quote_ident(ns)?, table)),
            None => Ok(table),
        }
    }

    /// WHERE clause body and its bound values.
    pub fn build_where(
        &self,
        filter: Option<&Predicate>,
        schema: &TableSchema,
    ) -> Result<(Option<String>, Vec<TypedValue>), AdapterError> {
        let mut builder = WhereBuilder {
            dialect: self,
            schema,
            params: Vec::new(),
        };
        let text = filter.map(|p| builder.render(p, false)).transpose()?;
        Ok((text, builder.params))
    }

    fn order_by(&self, ir: &QueryIr, schema: &TableSchema) -> Result<Option<String>, AdapterError> {
        if ir.sort.is_empty() {
            return Ok(self
                .flavor
                .requires_order_for_paging()
                .then(|| "ORDER BY (SELECT NULL)".to_string()));
        }
        let keys = ir
            .sort
            .iter()
            .map(|s| {
                require_column(schema, &s.column)?;
                Ok(format!("{} {}", self.flavor.quote_ident(&s.column)?, s.direction.as_sql()))
            })
            .collect::<Result<Vec<_>, AdapterError>>()?;
        Ok(Some(format!("ORDER BY {}", keys.join(", "))))
    }
}

impl DialectAdapter for SqlDialect {
    fn kind(&self) -> DialectKind {
        self.flavor.kind()
    }

    fn build_query(&self, ir: &QueryIr, schema: &TableSchema) -> Result<NativeQuery, AdapterError> {
        if ir.projection.is_empty() {
            return Err(AdapterError::EmptyProjection(schema.name.clone()));
        }
        let columns = ir
            .projection
            .iter()
            .map(|c| {
                require_column(schema, c)?;
                self.flavor.quote_ident(c)
            })
            .collect::<Result<Vec<_>, _>>()?;

        let table = self.table_ref(schema)?;
        let (where_sql, params) = self.build_where(ir.filter.as_ref(), schema)?;
        let where_clause = where_sql.map(|w| format!(" WHERE {}", w)).unwrap_or_default();

        let count = SqlStatement {
            text: format!("SELECT COUNT(*) AS total FROM {}{}", table, where_clause),
            params: params.clone(),
        };

        let mut select_text = format!("SELECT {} FROM {}{}", columns.join(", "), table, where_clause);
        if let Some(order) = self.order_by(ir, schema)? {
            select_text.push(' ');
            select_text.push_str(&order);
        }
        let (page_sql, page_params) =
            self.flavor
                .pagination(params.len() + 1, ir.page.offset(), ir.page.limit());
        select_text.push(' ');
        select_text.push_str(&page_sql);

        let mut select_params = params;
        select_params.extend(page_params);

        tracing::debug!(
            dialect = %self.kind(),
            sql = %select_text,
            params = select_params.len(),
            "Built table query"
        );

        Ok(NativeQuery::Sql(SqlQuery {
            kind: self.kind(),
            select: SqlStatement {
                text: select_text,
                params: select_params,
            },
            count,
        }))
    }

    fn coerce_value(&self, column: &ColumnSchema, raw: &str) -> Result<TypedValue, CoercionError> {
        let value = coerce_for_column(column, raw)?;
        Ok(match (self.kind(), value) {
            // Oracle has no boolean column type and its DATE carries a time.
            (DialectKind::Oracle, TypedValue::Bool(b)) => TypedValue::Int(i64::from(b)),
            (DialectKind::Oracle, TypedValue::Date(d)) => d
                .and_hms_opt(0, 0, 0)
                .map(TypedValue::Timestamp)
                .unwrap_or(TypedValue::Date(d)),
            (DialectKind::Mssql | DialectKind::Db2, TypedValue::Uuid(u)) => {
                TypedValue::Text(u.to_string().to_uppercase())
            }
            (_, v) => v,
        })
    }
}

fn require_column<'a>(schema: &'a TableSchema, column: &str) -> Result<&'a ColumnSchema, AdapterError> {
    schema
        .get_column(column)
        .ok_or_else(|| AdapterError::UnknownColumn {
            table: schema.name.clone(),
            column: column.to_string(),
        })
}

struct WhereBuilder<'a> {
    dialect: &'a SqlDialect,
    schema: &'a TableSchema,
    params: Vec<TypedValue>,
}

impl WhereBuilder<'_> {
    fn bind(&mut self, value: TypedValue) -> String {
        self.params.push(value);
        let n = self.params.len();
        self.dialect.flavor.param_expr(n, &self.params[n - 1])
    }

    fn render(&mut self, predicate: &Predicate, nested: bool) -> Result<String, AdapterError> {
        let (parts, joiner) = match predicate {
            Predicate::Clause(clause) => return self.render_clause(clause),
            Predicate::And(parts) => (parts, " AND "),
            Predicate::Or(parts) => (parts, " OR "),
        };
        let rendered = parts
            .iter()
            .map(|p| self.render(p, true))
            .collect::<Result<Vec<_>, _>>()?;
        let joined = rendered.join(joiner);
        if nested && rendered.len() > 1 {
            Ok(format!("({})", joined))
        } else {
            Ok(joined)
        }
    }

    fn render_clause(&mut self, clause: &FilterClause) -> Result<String, AdapterError> {
        let column = require_column(self.schema, &clause.column)?;
        let flavor = self.dialect.flavor;
        let quoted = flavor.quote_ident(&column.name)?;

        let sql = match clause.operator {
            FilterOperator::Empty => format!("{} IS NULL", quoted),
            op if op.is_pattern() => {
                let pattern = flavor.like_pattern(op, &clause.value);
                let placeholder = self.bind(TypedValue::Text(pattern));
                flavor.pattern_match(column, &quoted, &placeholder)
            }
            op => {
                let value = self.dialect.coerce_value(column, &clause.value)?;
                let placeholder = self.bind(value);
                let lhs = flavor.comparison_lhs(column, &quoted);
                format!("{} {} {}", lhs, comparison(op), placeholder)
            }
        };
        Ok(sql)
    }
}

fn comparison(op: FilterOperator) -> &'static str {
    match op {
        FilterOperator::Gt => ">",
        FilterOperator::Lt => "<",
        FilterOperator::Gte => ">=",
        FilterOperator::Lte => "<=",
        _ => "=",
    }
}
