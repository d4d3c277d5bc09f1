//! Dialect-neutral query representation.
//!
//! Every adapter receives the same [`QueryIr`] shape: search has already been
//! expanded into an OR of `contain` clauses, defaults for sort and page are
//! filled in, and every referenced column is known to exist and be visible.

use rowgate_core::{DataCategory, SortOrder};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Comparison operator of a filter clause.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterOperator {
    Eq,
    Contain,
    StartsWith,
    EndsWith,
    Gt,
    Lt,
    Gte,
    Lte,
    /// NULL (or missing field) test. The clause value is ignored.
    Empty,
}

impl FilterOperator {
    pub const ALL: [FilterOperator; 9] = [
        FilterOperator::Eq,
        FilterOperator::Contain,
        FilterOperator::StartsWith,
        FilterOperator::EndsWith,
        FilterOperator::Gt,
        FilterOperator::Lt,
        FilterOperator::Gte,
        FilterOperator::Lte,
        FilterOperator::Empty,
    ];

    /// Parse the operator suffix of an `f_<column>__<operator>` key.
    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_str() == raw)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FilterOperator::Eq => "eq",
            FilterOperator::Contain => "contain",
            FilterOperator::StartsWith => "startswith",
            FilterOperator::EndsWith => "endswith",
            FilterOperator::Gt => "gt",
            FilterOperator::Lt => "lt",
            FilterOperator::Gte => "gte",
            FilterOperator::Lte => "lte",
            FilterOperator::Empty => "empty",
        }
    }

    pub fn is_pattern(self) -> bool {
        matches!(
            self,
            FilterOperator::Contain | FilterOperator::StartsWith | FilterOperator::EndsWith
        )
    }

    pub fn is_range(self) -> bool {
        matches!(
            self,
            FilterOperator::Gt | FilterOperator::Lt | FilterOperator::Gte | FilterOperator::Lte
        )
    }

    /// Whether a request filter may apply this operator to a column of `category`.
    pub fn supports(self, category: DataCategory) -> bool {
        match self {
            FilterOperator::Empty => true,
            FilterOperator::Eq => !matches!(category, DataCategory::Binary | DataCategory::Json),
            op if op.is_pattern() => category.is_text_like(),
            _ => category.is_ordered(),
        }
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One `column operator value` predicate. Values stay raw until an adapter
/// coerces them to the column's native type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterClause {
    pub column: String,
    pub operator: FilterOperator,
    pub value: String,
}

impl FilterClause {
    pub fn new(column: impl Into<String>, operator: FilterOperator, value: impl Into<String>) -> Self {
        Self {
            column: column.into(),
            operator,
            value: value.into(),
        }
    }
}

/// Boolean combination of filter clauses.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Predicate {
    Clause(FilterClause),
    And(Vec<Predicate>),
    Or(Vec<Predicate>),
}

impl Predicate {
    /// Conjunction, collapsing the single-element case.
    pub fn and(mut parts: Vec<Predicate>) -> Option<Predicate> {
        match parts.len() {
            0 => None,
            1 => parts.pop(),
            _ => Some(Predicate::And(parts)),
        }
    }

    /// Disjunction, collapsing the single-element case.
    pub fn or(mut parts: Vec<Predicate>) -> Option<Predicate> {
        match parts.len() {
            0 => None,
            1 => parts.pop(),
            _ => Some(Predicate::Or(parts)),
        }
    }

    /// Every clause in the tree, depth first.
    pub fn clauses(&self) -> Vec<&FilterClause> {
        let mut out = Vec::new();
        self.collect_clauses(&mut out);
        out
    }

    fn collect_clauses<'a>(&'a self, out: &mut Vec<&'a FilterClause>) {
        match self {
            Predicate::Clause(c) => out.push(c),
            Predicate::And(parts) | Predicate::Or(parts) => {
                for p in parts {
                    p.collect_clauses(out);
                }
            }
        }
    }

    /// Whether the tree contains a disjunction.
    pub fn has_or(&self) -> bool {
        match self {
            Predicate::Clause(_) => false,
            Predicate::Or(_) => true,
            Predicate::And(parts) => parts.iter().any(Predicate::has_or),
        }
    }
}

/// One sort key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SortSpec {
    pub column: String,
    pub direction: SortOrder,
}

impl SortSpec {
    pub fn new(column: impl Into<String>, direction: SortOrder) -> Self {
        Self {
            column: column.into(),
            direction,
        }
    }
}

/// 1-based page window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageWindow {
    pub page: u32,
    pub per_page: u32,
}

impl PageWindow {
    pub fn new(page: u32, per_page: u32) -> Self {
        Self {
            page: page.max(1),
            per_page: per_page.max(1),
        }
    }

    /// Rows to skip before this page. Page 0 reads as page 1.
    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.per_page)
    }

    pub fn limit(&self) -> u64 {
        u64::from(self.per_page)
    }

    /// Number of pages needed for `total` rows.
    pub fn last_page(&self, total: u64) -> u64 {
        total.div_ceil(u64::from(self.per_page.max(1)))
    }
}

/// A fully resolved table query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryIr {
    pub table: String,

    /// Columns to return, in table order. Excluded fields are never listed.
    pub projection: Vec<String>,

    /// Row filter; `None` selects every row.
    pub filter: Option<Predicate>,

    /// Sort keys in priority order.
    pub sort: Vec<SortSpec>,

    pub page: PageWindow,
}

impl QueryIr {
    /// Every column named anywhere in the query.
    pub fn referenced_columns(&self) -> Vec<&str> {
        let mut cols: Vec<&str> = self.projection.iter().map(String::as_str).collect();
        if let Some(filter) = &self.filter {
            cols.extend(filter.clauses().into_iter().map(|c| c.column.as_str()));
        }
        cols.extend(self.sort.iter().map(|s| s.column.as_str()));
        cols.sort_unstable();
        cols.dedup();
        cols
    }
}
