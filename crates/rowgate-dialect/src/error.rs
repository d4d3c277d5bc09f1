//! Error types for dialect adapters and executors.

use rowgate_core::DialectKind;
use std::time::Duration;
use thiserror::Error;

/// A filter value could not be converted to its column's native type.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid value '{raw}' for column '{column}': expected {expected}")]
pub struct CoercionError {
    pub column: String,
    pub raw: String,
    pub expected: &'static str,
}

impl CoercionError {
    pub fn new(column: impl Into<String>, raw: impl Into<String>, expected: &'static str) -> Self {
        Self {
            column: column.into(),
            raw: raw.into(),
            expected,
        }
    }
}

/// Errors raised while translating a [`QueryIr`](rowgate_query::QueryIr).
#[derive(Debug, Error)]
pub enum AdapterError {
    #[error(transparent)]
    Coercion(#[from] CoercionError),

    #[error("invalid identifier '{0}'")]
    InvalidIdentifier(String),

    #[error("column '{column}' is not in table '{table}'")]
    UnknownColumn { table: String, column: String },

    #[error("no columns to select from table '{0}'")]
    EmptyProjection(String),

    #[error("{kind} adapter cannot run a {query} query")]
    Unsupported { kind: DialectKind, query: &'static str },
}

/// Errors raised while running a native query against the external database.
#[derive(Debug, Error)]
pub enum ExecutorError {
    #[error("connection unreachable: {0}")]
    Unreachable(String),

    #[error("query timed out after {0:?}")]
    Timeout(Duration),

    #[error("query cancelled")]
    Cancelled,

    #[error("query failed: {0}")]
    Query(String),

    #[error("failed to decode row: {0}")]
    Decode(String),

    #[error(transparent)]
    Adapter(#[from] AdapterError),
}
