//! Syntax differences between the relational engines.

use rowgate_core::{ColumnSchema, DataCategory, DialectKind};
use rowgate_query::FilterOperator;

use crate::error::AdapterError;
use crate::value::TypedValue;

/// How an engine spells identifiers, placeholders, paging and text matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SqlFlavor {
    kind: DialectKind,
}

/// Escape character used in every generated LIKE pattern.
pub const LIKE_ESCAPE: char = '!';

impl SqlFlavor {
    pub fn new(kind: DialectKind) -> Self {
        Self { kind }
    }

    pub fn kind(&self) -> DialectKind {
        self.kind
    }

    /// Quote an introspected identifier.
    pub fn quote_ident(&self, ident: &str) -> Result<String, AdapterError> {
        if ident.is_empty() || ident.contains('\0') {
            return Err(AdapterError::InvalidIdentifier(ident.to_string()));
        }
        Ok(match self.kind {
            DialectKind::Mysql => format!("`{}`", ident.replace('`', "``")),
            DialectKind::Mssql => format!("[{}]", ident.replace(']', "]]")),
            _ => format!("\"{}\"", ident.replace('"', "\"\"")),
        })
    }

    /// Placeholder for the `n`-th (1-based) bound parameter.
    pub fn placeholder(&self, n: usize) -> String {
        match self.kind {
            DialectKind::Postgres => format!("${}", n),
            DialectKind::Mssql => format!("@P{}", n),
            DialectKind::Oracle => format!(":{}", n),
            _ => "?".to_string(),
        }
    }

    /// Placeholder with whatever cast the engine needs to compare `value`
    /// against a typed column.
    pub fn param_expr(&self, n: usize, value: &TypedValue) -> String {
        let p = self.placeholder(n);
        match (self.kind, value) {
            // Exact numerics are bound as text.
            (DialectKind::Postgres, TypedValue::Decimal(_)) => format!("{}::numeric", p),
            (DialectKind::Oracle, TypedValue::Decimal(_)) => format!("TO_NUMBER({})", p),
            (DialectKind::Db2, TypedValue::Decimal(_)) => format!("CAST({} AS DECFLOAT)", p),
            _ => p,
        }
    }

    /// Text form of a non-text column for pattern matching.
    pub fn cast_to_text(&self, expr: &str) -> String {
        match self.kind {
            DialectKind::Postgres => format!("CAST({} AS TEXT)", expr),
            DialectKind::Mysql => format!("CAST({} AS CHAR)", expr),
            DialectKind::Mssql => format!("CAST({} AS NVARCHAR(MAX))", expr),
            DialectKind::Oracle => format!("TO_CHAR({})", expr),
            _ => format!("VARCHAR({})", expr),
        }
    }

    /// Left-hand side of a comparison against a bound value.
    ///
    /// Columns of an unrecognised type (Postgres enums, domains, MySQL `set`)
    /// receive their value as text, so they are compared in text form.
    pub fn comparison_lhs(&self, column: &ColumnSchema, quoted: &str) -> String {
        match column.category() {
            DataCategory::Other => self.cast_to_text(quoted),
            _ => quoted.to_string(),
        }
    }

    /// Render a pattern match of `column` against a bound pattern placeholder.
    ///
    /// Postgres uses `ILIKE`; MySQL and SQL Server `LIKE` are case-insensitive
    /// under their default collations; Oracle and DB2 compare upper-cased.
    pub fn pattern_match(&self, column: &ColumnSchema, quoted: &str, placeholder: &str) -> String {
        let lhs = if column.category().is_text_like() {
            quoted.to_string()
        } else {
            self.cast_to_text(quoted)
        };
        match self.kind {
            DialectKind::Postgres => format!("{} ILIKE {} ESCAPE '{}'", lhs, placeholder, LIKE_ESCAPE),
            DialectKind::Oracle | DialectKind::Db2 => format!(
                "UPPER({}) LIKE UPPER({}) ESCAPE '{}'",
                lhs, placeholder, LIKE_ESCAPE
            ),
            _ => format!("{} LIKE {} ESCAPE '{}'", lhs, placeholder, LIKE_ESCAPE),
        }
    }

    /// Paging clause binding `offset` and `limit` at parameter positions
    /// `first` and `first + 1`. Returns the clause and the bound values in order.
    pub fn pagination(&self, first: usize, offset: u64, limit: u64) -> (String, Vec<TypedValue>) {
        let offset = TypedValue::Int(i64::try_from(offset).unwrap_or(i64::MAX));
        let limit = TypedValue::Int(i64::try_from(limit).unwrap_or(i64::MAX));
        match self.kind {
            DialectKind::Postgres | DialectKind::Mysql => (
                format!(
                    "LIMIT {} OFFSET {}",
                    self.placeholder(first),
                    self.placeholder(first + 1)
                ),
                vec![limit, offset],
            ),
            DialectKind::Db2 => (
                format!(
                    "OFFSET {} ROWS FETCH FIRST {} ROWS ONLY",
                    self.placeholder(first),
                    self.placeholder(first + 1)
                ),
                vec![offset, limit],
            ),
            _ => (
                format!(
                    "OFFSET {} ROWS FETCH NEXT {} ROWS ONLY",
                    self.placeholder(first),
                    self.placeholder(first + 1)
                ),
                vec![offset, limit],
            ),
        }
    }

    /// LIKE pattern for `value` under `operator`, with wildcards escaped.
    pub fn like_pattern(&self, operator: FilterOperator, value: &str) -> String {
        let bracket_wildcard = self.kind == DialectKind::Mssql;
        let mut escaped = String::with_capacity(value.len() + 2);
        for c in value.chars() {
            if c == '%' || c == '_' || c == LIKE_ESCAPE || (bracket_wildcard && c == '[') {
                escaped.push(LIKE_ESCAPE);
            }
            escaped.push(c);
        }
        match operator {
            FilterOperator::StartsWith => format!("{}%", escaped),
            FilterOperator::EndsWith => format!("%{}", escaped),
            _ => format!("%{}%", escaped),
        }
    }

    /// Whether OFFSET/FETCH needs an ORDER BY to be valid.
    pub fn requires_order_for_paging(&self) -> bool {
        matches!(self.kind, DialectKind::Mssql)
    }
}
