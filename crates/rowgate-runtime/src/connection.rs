//! Connection collaborators.
//!
//! Credentials and client construction belong to the embedding application.
//! The core only sees a [`ConnectionHandle`]: the engine kind plus an executor
//! and an introspector bound to that connection.

use async_trait::async_trait;
use rowgate_core::{DialectKind, TableSchema};
use rowgate_dialect::QueryExecutor;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;

/// Errors raised by introspection and connection lookup.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("table '{0}' does not exist")]
    TableNotFound(String),

    #[error("connection unreachable: {0}")]
    Unreachable(String),

    #[error("introspection failed: {0}")]
    Introspection(String),

    #[error("schema cache lock poisoned: {0}")]
    Lock(String),
}

/// Reads table metadata from a live external database.
#[async_trait]
pub trait SchemaIntrospector: Send + Sync {
    /// Names of every table (or collection) of the connection.
    async fn list_tables(&self) -> Result<Vec<String>, SchemaError>;

    /// Metadata of one table, `None` when it does not exist.
    async fn introspect_table(&self, table: &str) -> Result<Option<TableSchema>, SchemaError>;
}

/// One external database, ready to query.
#[derive(Clone)]
pub struct ConnectionHandle {
    pub id: String,
    pub kind: DialectKind,
    pub executor: Arc<dyn QueryExecutor>,
    pub introspector: Arc<dyn SchemaIntrospector>,
}

impl ConnectionHandle {
    pub fn new(
        id: impl Into<String>,
        executor: Arc<dyn QueryExecutor>,
        introspector: Arc<dyn SchemaIntrospector>,
    ) -> Self {
        Self {
            id: id.into(),
            kind: executor.kind(),
            executor,
            introspector,
        }
    }
}

impl std::fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .field("kind", &self.kind)
            .finish_non_exhaustive()
    }
}

/// Resolves connection ids to handles.
#[async_trait]
pub trait ConnectionProvider: Send + Sync {
    /// `None` when the connection does not exist (or was soft-deleted).
    async fn connection(&self, connection_id: &str) -> Result<Option<ConnectionHandle>, SchemaError>;
}

/// Provider over a fixed set of handles.
#[derive(Debug, Clone, Default)]
pub struct StaticConnectionProvider {
    connections: HashMap<String, ConnectionHandle>,
}

impl StaticConnectionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connection(mut self, handle: ConnectionHandle) -> Self {
        self.connections.insert(handle.id.clone(), handle);
        self
    }

    pub fn insert(&mut self, handle: ConnectionHandle) {
        self.connections.insert(handle.id.clone(), handle);
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.connections.keys().map(String::as_str)
    }
}

#[async_trait]
impl ConnectionProvider for StaticConnectionProvider {
    async fn connection(&self, connection_id: &str) -> Result<Option<ConnectionHandle>, SchemaError> {
        Ok(self.connections.get(connection_id).cloned())
    }
}
