//! Configuration types for rowgate.
//!
//! Configuration is loaded from YAML (`rowgate.yaml`, plus `groups/*.yaml`)
//! and combined into a single [`RowgateConfig`].
//!
//! # Configuration Files
//!
//! - **rowgate.yaml**: connections, query defaults, schema cache policy, table settings
//! - **groups/*.yaml**: one group per file (members, access level, table permissions)

pub mod connection;
pub mod table;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::{Path, PathBuf};

use crate::access::Group;

pub use connection::{ConnectionConfig, ConnectionPoolConfig};
pub use table::{SortOrder, TableSettings};

/// Complete rowgate configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RowgateConfig {
    #[serde(default)]
    pub project: Option<String>,

    /// Connections keyed by connection id.
    #[serde(default)]
    pub connections: BTreeMap<String, ConnectionConfig>,

    #[serde(default)]
    pub query: QueryConfig,

    #[serde(default)]
    pub schema_cache: SchemaCacheConfig,

    /// Table settings keyed by connection id, then table name.
    #[serde(default)]
    pub tables: HashMap<String, HashMap<String, TableSettings>>,

    /// Inline group definitions.
    #[serde(default)]
    pub groups: Vec<Group>,

    /// Directory containing group definition files.
    #[serde(default)]
    pub groups_dir: Option<PathBuf>,

    /// List of individual group definition files.
    #[serde(default)]
    pub group_files: Vec<PathBuf>,
}

/// Query defaults and guardrails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Page size when neither the request nor the table settings name one.
    #[serde(default = "default_per_page")]
    pub default_per_page: u32,

    /// Largest `perPage` a request may ask for.
    #[serde(default = "default_max_per_page")]
    pub max_per_page: u32,

    /// Per-query timeout against the external database, in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            default_per_page: default_per_page(),
            max_per_page: default_max_per_page(),
            timeout_ms: default_timeout_ms(),
        }
    }
}

/// Schema cache refresh policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchemaCacheConfig {
    /// Seconds before a cached table schema is re-introspected.
    #[serde(default = "default_ttl_seconds")]
    pub ttl_seconds: u64,
}

impl Default for SchemaCacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: default_ttl_seconds(),
        }
    }
}

fn default_per_page() -> u32 {
    20
}

fn default_max_per_page() -> u32 {
    1000
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_ttl_seconds() -> u64 {
    300
}

/// Error type for configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl RowgateConfig {
    /// Load configuration from a YAML file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path.as_ref())?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from YAML content.
    pub fn from_yaml(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(ConfigError::from)
    }

    /// Load configuration and resolve group files relative to the config file.
    pub fn load_with_context(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let mut config = Self::from_file(path)?;

        let base_dir = path
            .parent()
            .map(|p| p.to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        if let Some(groups_dir) = &config.groups_dir {
            let groups_path = resolve(&base_dir, groups_dir);
            if groups_path.is_dir() {
                let mut files: Vec<PathBuf> = fs::read_dir(&groups_path)?
                    .filter_map(|entry| entry.ok().map(|e| e.path()))
                    .filter(|p| p.extension().map(|e| e == "yaml" || e == "yml").unwrap_or(false))
                    .collect();
                files.sort();
                for file in files {
                    config.groups.push(load_group_file(&file)?);
                }
            }
        }

        for group_file in &config.group_files.clone() {
            let group_path = resolve(&base_dir, group_file);
            if group_path.exists() {
                config.groups.push(load_group_file(&group_path)?);
            }
        }

        Ok(config)
    }

    pub fn connection(&self, id: &str) -> Option<&ConnectionConfig> {
        self.connections.get(id)
    }

    pub fn table_settings(&self, connection_id: &str, table: &str) -> Option<&TableSettings> {
        self.tables.get(connection_id).and_then(|t| t.get(table))
    }

    pub fn groups_for_connection<'a>(
        &'a self,
        connection_id: &'a str,
    ) -> impl Iterator<Item = &'a Group> + 'a {
        self.groups
            .iter()
            .filter(move |g| g.connection_id == connection_id)
    }

    /// Check cross-references and invariants, reporting every problem at once.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let mut problems = Vec::new();

        if self.query.default_per_page == 0 {
            problems.push("query.default_per_page must be at least 1".to_string());
        }
        if self.query.max_per_page < self.query.default_per_page {
            problems.push(format!(
                "query.max_per_page ({}) is below query.default_per_page ({})",
                self.query.max_per_page, self.query.default_per_page
            ));
        }
        if self.query.timeout_ms == 0 {
            problems.push("query.timeout_ms must be greater than zero".to_string());
        }

        for group in &self.groups {
            if !self.connections.contains_key(&group.connection_id) {
                problems.push(format!(
                    "group '{}' references unknown connection '{}'",
                    group.name, group.connection_id
                ));
            }
        }

        for connection_id in self.connections.keys() {
            let admins: Vec<&Group> = self
                .groups_for_connection(connection_id)
                .filter(|g| g.is_admin)
                .collect();
            match admins.as_slice() {
                [] => problems.push(format!(
                    "connection '{}' has no Admin group",
                    connection_id
                )),
                [admin] if admin.members.is_empty() => problems.push(format!(
                    "Admin group of connection '{}' has no members",
                    connection_id
                )),
                [_] => {}
                _ => problems.push(format!(
                    "connection '{}' has {} Admin groups, expected exactly one",
                    connection_id,
                    admins.len()
                )),
            }
        }

        for (connection_id, tables) in &self.tables {
            if !self.connections.contains_key(connection_id) {
                problems.push(format!(
                    "table settings reference unknown connection '{}'",
                    connection_id
                ));
            }
            for (table, settings) in tables {
                if let Some(per_page) = settings.default_per_page
                    && (per_page == 0 || per_page > self.query.max_per_page)
                {
                    problems.push(format!(
                        "tables.{}.{}.default_per_page must be between 1 and {}",
                        connection_id, table, self.query.max_per_page
                    ));
                }
            }
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Config(problems.join(", ")))
        }
    }
}

fn resolve(base_dir: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    }
}

/// Load a single group definition from a YAML file.
pub fn load_group_file(path: impl AsRef<Path>) -> Result<Group, ConfigError> {
    let content = fs::read_to_string(path.as_ref())?;
    serde_yaml::from_str(&content).map_err(ConfigError::from)
}
