//! Rowgate runtime: the schema cache, result normalizer and query orchestrator.
//!
//! The embedding application supplies the collaborators (connections, group
//! store, table settings) and calls into [`QueryOrchestrator`]; everything it
//! gets back is either a [`QueryResult`] or a [`QueryError`].

pub mod cache;
pub mod connection;
pub mod error;
pub mod normalizer;
pub mod orchestrator;
pub mod settings;

pub use cache::SchemaCache;
pub use connection::{
    ConnectionHandle, ConnectionProvider, SchemaError, SchemaIntrospector, StaticConnectionProvider,
};
pub use error::{ErrorBody, QueryError};
pub use normalizer::{Pagination, PrimaryColumn, QueryResult};
pub use orchestrator::{QueryOrchestrator, TableDescription, TableSummary};
pub use settings::{ConfigTableSettings, SettingsError, TableSettingsProvider};
