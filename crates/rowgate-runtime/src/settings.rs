//! Table-settings collaborator.

use async_trait::async_trait;
use rowgate_core::{RowgateConfig, TableSettings};
use std::collections::HashMap;
use thiserror::Error;

#[derive(Debug, Error)]
#[error("table settings unavailable: {0}")]
pub struct SettingsError(pub String);

/// Supplies per-table display and query settings. The core reads them but
/// does not own their storage.
#[async_trait]
pub trait TableSettingsProvider: Send + Sync {
    /// Settings of `table`, `None` when nothing is configured.
    async fn table_settings(
        &self,
        connection_id: &str,
        table: &str,
    ) -> Result<Option<TableSettings>, SettingsError>;
}

/// Settings taken from the `tables` section of the configuration.
#[derive(Debug, Clone, Default)]
pub struct ConfigTableSettings {
    tables: HashMap<String, HashMap<String, TableSettings>>,
}

impl ConfigTableSettings {
    pub fn new(tables: HashMap<String, HashMap<String, TableSettings>>) -> Self {
        Self { tables }
    }

    pub fn from_config(config: &RowgateConfig) -> Self {
        Self::new(config.tables.clone())
    }

    pub fn with_table(
        mut self,
        connection_id: impl Into<String>,
        table: impl Into<String>,
        settings: TableSettings,
    ) -> Self {
        self.tables
            .entry(connection_id.into())
            .or_default()
            .insert(table.into(), settings);
        self
    }
}

#[async_trait]
impl TableSettingsProvider for ConfigTableSettings {
    async fn table_settings(
        &self,
        connection_id: &str,
        table: &str,
    ) -> Result<Option<TableSettings>, SettingsError> {
        Ok(self
            .tables
            .get(connection_id)
            .and_then(|t| t.get(table))
            .cloned())
    }
}
