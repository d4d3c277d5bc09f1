//! Builds a query orchestrator from a configuration file.

use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use rowgate_core::RowgateConfig;
use rowgate_policy::{PermissionEvaluator, StaticAccessStore};
use rowgate_runtime::{ConfigTableSettings, QueryOrchestrator, SchemaCache, StaticConnectionProvider};

/// Load and validate the configuration at `path`.
pub fn load_config(path: &Path) -> Result<RowgateConfig> {
    let config = RowgateConfig::load_with_context(path)
        .with_context(|| format!("failed to load {}", path.display()))?;
    config
        .validate()
        .with_context(|| format!("invalid configuration in {}", path.display()))?;
    Ok(config)
}

/// Connect `connection_id` and wire the orchestrator around it.
///
/// Only the requested connection is opened; the other configured
/// connections stay untouched.
pub async fn orchestrator(config: &RowgateConfig, connection_id: &str) -> Result<QueryOrchestrator> {
    let mut connections = StaticConnectionProvider::new();
    if let Some(connection) = config.connection(connection_id) {
        let handle = rowgate_adapter_sqlx::connect(connection_id, connection)
            .await
            .with_context(|| format!("failed to open connection '{}'", connection_id))?;
        connections.insert(handle);
    } else {
        tracing::debug!(connection = %connection_id, "Connection not configured");
    }

    Ok(QueryOrchestrator::new(
        Arc::new(connections),
        Arc::new(SchemaCache::new(Duration::from_secs(config.schema_cache.ttl_seconds))),
        PermissionEvaluator::new(Arc::new(StaticAccessStore::new(config.groups.clone()))),
        Arc::new(ConfigTableSettings::from_config(config)),
        config.query.clone(),
    ))
}
