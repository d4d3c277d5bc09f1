//! Introspected schema cache.
//!
//! Entries are keyed by `(connection, table)` and expire after a TTL. A miss or
//! refresh introspects outside the lock and then swaps the complete entry in,
//! so readers only ever see a whole [`TableSchema`].

use rowgate_core::TableSchema;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};

use crate::connection::{ConnectionHandle, SchemaError};

#[derive(Debug, Clone)]
struct Cached<T> {
    value: Arc<T>,
    loaded_at: Instant,
}

impl<T> Cached<T> {
    fn new(value: T) -> Self {
        Self {
            value: Arc::new(value),
            loaded_at: Instant::now(),
        }
    }

    fn is_fresh(&self, ttl: Duration) -> bool {
        self.loaded_at.elapsed() < ttl
    }
}

type TableKey = (String, String);

/// Per-connection table metadata with TTL expiry.
#[derive(Debug)]
pub struct SchemaCache {
    ttl: Duration,
    tables: RwLock<HashMap<TableKey, Cached<TableSchema>>>,
    listings: RwLock<HashMap<String, Cached<Vec<String>>>>,
}

impl SchemaCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            tables: RwLock::new(HashMap::new()),
            listings: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Cached schema of `table`, introspecting on a miss or after expiry.
    pub async fn get_table_schema(
        &self,
        connection: &ConnectionHandle,
        table: &str,
    ) -> Result<Arc<TableSchema>, SchemaError> {
        let key = (connection.id.clone(), table.to_string());
        {
            let tables = self
                .tables
                .read()
                .map_err(|e| SchemaError::Lock(e.to_string()))?;
            if let Some(entry) = tables.get(&key)
                && entry.is_fresh(self.ttl)
            {
                return Ok(entry.value.clone());
            }
        }
        self.refresh(connection, table).await
    }

    /// Re-introspect `table` and replace the cached entry.
    pub async fn refresh(
        &self,
        connection: &ConnectionHandle,
        table: &str,
    ) -> Result<Arc<TableSchema>, SchemaError> {
        let key = (connection.id.clone(), table.to_string());
        let schema = match connection.introspector.introspect_table(table).await? {
            Some(schema) => schema,
            None => {
                self.remove(&key)?;
                return Err(SchemaError::TableNotFound(table.to_string()));
            }
        };

        let entry = Cached::new(schema);
        let value = entry.value.clone();
        self.tables
            .write()
            .map_err(|e| SchemaError::Lock(e.to_string()))?
            .insert(key, entry);

        tracing::info!(
            connection = %connection.id,
            table = %table,
            columns = value.columns.len(),
            "Refreshed table schema"
        );
        Ok(value)
    }

    /// Cached table names of the connection.
    pub async fn table_names(&self, connection: &ConnectionHandle) -> Result<Arc<Vec<String>>, SchemaError> {
        {
            let listings = self
                .listings
                .read()
                .map_err(|e| SchemaError::Lock(e.to_string()))?;
            if let Some(entry) = listings.get(&connection.id)
                && entry.is_fresh(self.ttl)
            {
                return Ok(entry.value.clone());
            }
        }

        let mut names = connection.introspector.list_tables().await?;
        names.sort();
        names.dedup();
        let entry = Cached::new(names);
        let value = entry.value.clone();
        self.listings
            .write()
            .map_err(|e| SchemaError::Lock(e.to_string()))?
            .insert(connection.id.clone(), entry);
        Ok(value)
    }

    /// Drop one table's entry.
    pub fn invalidate_table(&self, connection_id: &str, table: &str) -> Result<(), SchemaError> {
        self.remove(&(connection_id.to_string(), table.to_string()))
    }

    /// Drop every entry of a connection.
    pub fn invalidate(&self, connection_id: &str) -> Result<(), SchemaError> {
        self.tables
            .write()
            .map_err(|e| SchemaError::Lock(e.to_string()))?
            .retain(|(conn, _), _| conn != connection_id);
        self.listings
            .write()
            .map_err(|e| SchemaError::Lock(e.to_string()))?
            .remove(connection_id);
        tracing::info!(connection = %connection_id, "Invalidated schema cache");
        Ok(())
    }

    fn remove(&self, key: &TableKey) -> Result<(), SchemaError> {
        self.tables
            .write()
            .map_err(|e| SchemaError::Lock(e.to_string()))?
            .remove(key);
        Ok(())
    }
}
