//! Dialect adapters for rowgate.
//!
//! A [`DialectAdapter`] turns the dialect-neutral [`QueryIr`] into a
//! [`NativeQuery`] for one engine and coerces filter values to the native
//! column types. Adapters are a closed set, one per [`DialectKind`]; see
//! [`adapter_for`].

pub mod document;
pub mod error;
pub mod executor;
pub mod native;
pub mod sql;
pub mod value;
pub mod wide_column;

use rowgate_core::{ColumnSchema, DialectKind, EngineFamily, TableSchema};
use rowgate_query::QueryIr;
use std::sync::Arc;

pub use document::MongoDialect;
pub use error::{AdapterError, CoercionError, ExecutorError};
pub use executor::{QueryExecutor, execute_cancellable};
pub use native::{CqlQuery, DocumentQuery, NativeQuery, NativeRowSet, SqlQuery, SqlStatement};
pub use sql::SqlDialect;
pub use value::TypedValue;
pub use wide_column::CassandraDialect;

/// Query construction and value coercion for one engine.
pub trait DialectAdapter: Send + Sync {
    fn kind(&self) -> DialectKind;

    /// Translate `ir` into the page query and its count.
    fn build_query(&self, ir: &QueryIr, schema: &TableSchema) -> Result<NativeQuery, AdapterError>;

    /// Convert a raw filter value to the native type of `column`.
    fn coerce_value(&self, column: &ColumnSchema, raw: &str) -> Result<TypedValue, CoercionError>;
}

/// The adapter for `kind`.
pub fn adapter_for(kind: DialectKind) -> Arc<dyn DialectAdapter> {
    match kind.family() {
        EngineFamily::Relational => Arc::new(SqlDialect::new(kind)),
        EngineFamily::Document => Arc::new(MongoDialect::new()),
        EngineFamily::WideColumn => Arc::new(CassandraDialect::new()),
    }
}
