//! Validation errors for request parameters.
//!
//! The parser never stops at the first bad parameter: every problem becomes a
//! [`ValidationIssue`] and all of them are returned together in one
//! [`ValidationError`], so the caller can fix everything in a single round trip.

use serde::Serialize;
use thiserror::Error;

/// Category of a validation issue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IssueKind {
    /// Column is unknown, or excluded for this requester. Both read the same.
    ColumnNotFound,
    OperatorNotSupported,
    InvalidPage,
    InvalidPerPage,
    PerPageExceeded,
    InvalidSortOrder,
    InvalidParameter,
}

/// One offending parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationIssue {
    pub kind: IssueKind,
    /// Name of the offending field or parameter.
    pub field: String,
    pub message: String,
}

impl ValidationIssue {
    pub fn new(kind: IssueKind, field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            field: field.into(),
            message: message.into(),
        }
    }

    pub fn column_not_found(column: &str, table: &str) -> Self {
        Self::new(
            IssueKind::ColumnNotFound,
            column,
            format!("column '{}' does not exist in table '{}'", column, table),
        )
    }

    pub fn operator_not_supported(column: &str, operator: &str, data_type: &str) -> Self {
        Self::new(
            IssueKind::OperatorNotSupported,
            column,
            format!(
                "operator '{}' is not supported for column '{}' of type '{}'",
                operator, column, data_type
            ),
        )
    }

    pub fn invalid_page(raw: &str) -> Self {
        Self::new(
            IssueKind::InvalidPage,
            "page",
            format!("page must be an integer of at least 1, got '{}'", raw),
        )
    }

    pub fn invalid_per_page(raw: &str) -> Self {
        Self::new(
            IssueKind::InvalidPerPage,
            "perPage",
            format!("perPage must be an integer of at least 1, got '{}'", raw),
        )
    }

    pub fn per_page_exceeded(requested: u32, max: u32) -> Self {
        Self::new(
            IssueKind::PerPageExceeded,
            "perPage",
            format!("perPage {} exceeds the maximum of {}", requested, max),
        )
    }

    pub fn invalid_sort_order(raw: &str) -> Self {
        Self::new(
            IssueKind::InvalidSortOrder,
            "order",
            format!("order must be ASC or DESC, got '{}'", raw),
        )
    }

    pub fn invalid_parameter(name: &str, reason: &str) -> Self {
        Self::new(
            IssueKind::InvalidParameter,
            name,
            format!("invalid parameter '{}': {}", name, reason),
        )
    }
}

/// All validation issues of one request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Error)]
#[error("{}", join_messages(.issues))]
pub struct ValidationError {
    pub issues: Vec<ValidationIssue>,
}

impl ValidationError {
    pub fn new(issues: Vec<ValidationIssue>) -> Self {
        Self { issues }
    }

    pub fn single(issue: ValidationIssue) -> Self {
        Self {
            issues: vec![issue],
        }
    }

    /// Names of the offending fields, deduplicated, in report order.
    pub fn fields(&self) -> Vec<&str> {
        let mut seen = Vec::new();
        for issue in &self.issues {
            if !seen.contains(&issue.field.as_str()) {
                seen.push(issue.field.as_str());
            }
        }
        seen
    }
}

fn join_messages(issues: &[ValidationIssue]) -> String {
    issues
        .iter()
        .map(|i| i.message.as_str())
        .collect::<Vec<_>>()
        .join(", ")
}
