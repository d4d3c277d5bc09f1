//! Execution seam between the query core and a live database client.
//!
//! Executors are supplied per connection. Postgres and MySQL executors ship
//! in `rowgate-adapter-sqlx`; other engines are plugged in by the embedding
//! application.

use async_trait::async_trait;
use rowgate_core::{DialectKind, TableSchema};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::error::ExecutorError;
use crate::native::{NativeQuery, NativeRowSet};
use crate::wide_column;

/// Runs native queries against one external database.
///
/// For [`NativeQuery::Sql`] and [`NativeQuery::Document`] the executor runs
/// both the page and the count and fails if either fails. For
/// [`NativeQuery::Cql`] it runs the select and returns every fetched row; it
/// runs `count` too when present and reports it as `total`, which is
/// otherwise ignored.
#[async_trait]
pub trait QueryExecutor: Send + Sync {
    fn kind(&self) -> DialectKind;

    async fn execute(&self, query: &NativeQuery) -> Result<NativeRowSet, ExecutorError>;
}

/// Run `query` with a deadline, aborting early when `cancel` fires.
///
/// Dropping the in-flight execute future releases the driver statement and
/// returns its connection to the pool.
pub async fn execute_cancellable(
    executor: &Arc<dyn QueryExecutor>,
    query: &NativeQuery,
    schema: &TableSchema,
    timeout: Duration,
    cancel: &CancellationToken,
) -> Result<NativeRowSet, ExecutorError> {
    let raw = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            tracing::warn!(table = %schema.name, "Query cancelled by caller");
            return Err(ExecutorError::Cancelled);
        }
        res = tokio::time::timeout(timeout, executor.execute(query)) => match res {
            Ok(rows) => rows?,
            Err(_) => {
                tracing::warn!(
                    table = %schema.name,
                    timeout_ms = timeout.as_millis() as u64,
                    "Query timed out"
                );
                return Err(ExecutorError::Timeout(timeout));
            }
        },
    };

    Ok(match query {
        NativeQuery::Cql(cql) => wide_column::finish(cql, schema, raw),
        _ => raw,
    })
}
