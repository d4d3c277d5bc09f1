//! User-facing error taxonomy of the query core.
//!
//! Lower crates raise narrow errors; the orchestrator is the only place that
//! translates them into a [`QueryError`].

use rowgate_core::TableAction;
use rowgate_dialect::CoercionError;
use rowgate_query::ValidationError;
use serde::Serialize;
use thiserror::Error;

/// Errors returned to callers of the orchestrator.
#[derive(Debug, Error)]
pub enum QueryError {
    /// Unknown connection, or a requester with no group on it.
    #[error("{0}")]
    NotFound(String),

    /// Table missing from the external database, or hidden from the requester.
    #[error("table '{0}' not found")]
    TableNotFound(String),

    /// Malformed filter, sort or page parameters. Aggregates every issue.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// A filter value could not be converted to its column type.
    #[error(transparent)]
    Coercion(#[from] CoercionError),

    /// Table is visible but the action is not permitted.
    #[error("{action} is not permitted on table '{table}'")]
    Forbidden { table: String, action: TableAction },

    #[error("connection '{connection}' is unreachable: {reason}")]
    ConnectionUnreachable { connection: String, reason: String },

    #[error("query timed out after {0} ms")]
    QueryTimeout(u64),

    #[error("query cancelled")]
    Cancelled,

    #[error("internal error: {0}")]
    Internal(String),
}

/// `{message, statusCode}` body for the HTTP layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub message: String,
    pub status_code: u16,
    #[serde(rename = "type")]
    pub kind: &'static str,
}

impl QueryError {
    pub fn status_code(&self) -> u16 {
        match self {
            QueryError::NotFound(_) => 404,
            QueryError::TableNotFound(_) | QueryError::Validation(_) | QueryError::Coercion(_) => 400,
            QueryError::Forbidden { .. } => 403,
            QueryError::ConnectionUnreachable { .. }
            | QueryError::QueryTimeout(_)
            | QueryError::Cancelled
            | QueryError::Internal(_) => 500,
        }
    }

    /// Stable machine-readable kind.
    pub fn kind(&self) -> &'static str {
        match self {
            QueryError::NotFound(_) => "NOT_FOUND",
            QueryError::TableNotFound(_) => "TABLE_NOT_FOUND",
            QueryError::Validation(_) => "VALIDATION_ERROR",
            QueryError::Coercion(_) => "COERCION_ERROR",
            QueryError::Forbidden { .. } => "FORBIDDEN",
            QueryError::ConnectionUnreachable { .. } => "CONNECTION_UNREACHABLE",
            QueryError::QueryTimeout(_) => "QUERY_TIMEOUT",
            QueryError::Cancelled => "CANCELLED",
            QueryError::Internal(_) => "INTERNAL",
        }
    }

    pub fn to_body(&self) -> ErrorBody {
        ErrorBody {
            message: self.to_string(),
            status_code: self.status_code(),
            kind: self.kind(),
        }
    }
}
