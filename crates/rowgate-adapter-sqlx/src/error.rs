//! sqlx error classification.

use rowgate_dialect::ExecutorError;
use rowgate_runtime::SchemaError;

/// Whether `err` means the database could not be reached at all.
pub fn is_unreachable(err: &sqlx::Error) -> bool {
    matches!(
        err,
        sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed
    )
}

pub fn executor_error(err: sqlx::Error) -> ExecutorError {
    if is_unreachable(&err) {
        return ExecutorError::Unreachable(err.to_string());
    }
    match err {
        sqlx::Error::ColumnDecode { .. } | sqlx::Error::Decode(_) => {
            ExecutorError::Decode(err.to_string())
        }
        other => ExecutorError::Query(other.to_string()),
    }
}

pub fn schema_error(err: sqlx::Error) -> SchemaError {
    if is_unreachable(&err) {
        SchemaError::Unreachable(err.to_string())
    } else {
        SchemaError::Introspection(err.to_string())
    }
}
