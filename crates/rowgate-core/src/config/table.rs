//! Per-table settings supplied by the table-settings collaborator.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Sort direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "UPPERCASE")]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    /// Parse `ASC`/`DESC` case-insensitively.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_uppercase().as_str() {
            "ASC" => Some(SortOrder::Asc),
            "DESC" => Some(SortOrder::Desc),
            _ => None,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl fmt::Display for SortOrder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// Display and query settings of one table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TableSettings {
    /// Default sort column when the request names none.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ordering_field: Option<String>,

    /// Default sort direction for `ordering_field`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ordering: Option<SortOrder>,

    /// Default page size for this table.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_per_page: Option<u32>,

    /// Columns included in free-text search. Empty means every text-like column.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub searched_columns: Vec<String>,

    /// Columns never returned or filterable. Primary keys are ignored here.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub excluded_fields: Vec<String>,

    /// Column shown as the human-readable identity of a row.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identity_column: Option<String>,

    /// Columns shown but never editable.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub readonly_fields: Vec<String>,
}

impl TableSettings {
    pub fn is_excluded(&self, column: &str) -> bool {
        self.excluded_fields.iter().any(|c| c == column)
    }
}
