//! Connection configuration for externally owned databases.
//!
//! Credentials are opaque to the query core: they are resolved into a
//! connection string only by the adapter that opens the client, and are
//! never printed by `Debug`.
//!
//! Three configuration methods are supported:
//! 1. `database_url_env` - reference an environment variable
//! 2. `database_url` - provide the URL directly
//! 3. Individual fields (host, port, database, username, password)

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::DialectKind;

/// Configuration for one external database connection.
#[derive(Clone, Serialize, Deserialize)]
pub struct ConnectionConfig {
    /// Engine type. Immutable once the connection exists.
    pub kind: DialectKind,

    /// Human-readable title shown to users.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Environment variable name containing the connection URL. Highest precedence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url_env: Option<String>,

    /// Full connection URL. Second precedence.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub database_url: Option<String>,

    #[serde(default = "default_host")]
    pub host: String,

    /// Port; the engine's default port when omitted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    #[serde(default)]
    pub database: String,

    /// Namespace to introspect (Postgres schema, Oracle owner, Cassandra keyspace).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,

    #[serde(default)]
    pub username: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    /// Environment variable containing the password.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_env: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pool: Option<ConnectionPoolConfig>,
}

impl fmt::Debug for ConnectionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionConfig")
            .field("kind", &self.kind)
            .field("title", &self.title)
            .field("database_url_env", &self.database_url_env)
            .field("database_url", &self.database_url.as_ref().map(|_| "<redacted>"))
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("schema", &self.schema)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("password_env", &self.password_env)
            .field("pool", &self.pool)
            .finish()
    }
}

/// Connection pool configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionPoolConfig {
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,

    #[serde(default = "default_max_connections")]
    pub max_connections: u32,

    /// Timeout in seconds when acquiring a connection.
    #[serde(default = "default_acquire_timeout")]
    pub acquire_timeout_seconds: u32,
}

impl Default for ConnectionPoolConfig {
    fn default() -> Self {
        Self {
            min_connections: default_min_connections(),
            max_connections: default_max_connections(),
            acquire_timeout_seconds: default_acquire_timeout(),
        }
    }
}

impl ConnectionConfig {
    pub fn new(kind: DialectKind) -> Self {
        Self {
            kind,
            title: None,
            database_url_env: None,
            database_url: None,
            host: default_host(),
            port: None,
            database: String::new(),
            schema: None,
            username: String::new(),
            password: None,
            password_env: None,
            pool: None,
        }
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.database_url = Some(url.into());
        self
    }

    /// Build a connection string.
    ///
    /// Precedence:
    /// 1. database_url_env (environment variable)
    /// 2. database_url (direct URL)
    /// 3. Individual fields
    pub fn connection_string(&self) -> String {
        if let Some(env_var) = &self.database_url_env
            && let Ok(url) = std::env::var(env_var)
        {
            return url;
        }

        if let Some(url) = &self.database_url {
            return url.clone();
        }

        let port = self.port.unwrap_or_else(|| default_port(self.kind));
        match self.get_password() {
            Some(password) => format!(
                "{}://{}:{}@{}:{}/{}",
                url_scheme(self.kind),
                self.username,
                password,
                self.host,
                port,
                self.database
            ),
            None => format!(
                "{}://{}@{}:{}/{}",
                url_scheme(self.kind),
                self.username,
                self.host,
                port,
                self.database
            ),
        }
    }

    fn get_password(&self) -> Option<String> {
        if let Some(env_var) = &self.password_env
            && let Ok(password) = std::env::var(env_var)
        {
            return Some(password);
        }
        self.password.clone()
    }

    pub fn pool_config(&self) -> ConnectionPoolConfig {
        self.pool.clone().unwrap_or_default()
    }
}

fn url_scheme(kind: DialectKind) -> &'static str {
    match kind {
        DialectKind::Postgres => "postgresql",
        DialectKind::Mysql => "mysql",
        DialectKind::Mssql => "mssql",
        DialectKind::Oracle => "oracle",
        DialectKind::Db2 => "db2",
        DialectKind::Mongo => "mongodb",
        DialectKind::Cassandra => "cassandra",
    }
}

fn default_port(kind: DialectKind) -> u16 {
    match kind {
        DialectKind::Postgres => 5432,
        DialectKind::Mysql => 3306,
        DialectKind::Mssql => 1433,
        DialectKind::Oracle => 1521,
        DialectKind::Db2 => 50000,
        DialectKind::Mongo => 27017,
        DialectKind::Cassandra => 9042,
    }
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_min_connections() -> u32 {
    1
}

fn default_max_connections() -> u32 {
    5
}

fn default_acquire_timeout() -> u32 {
    30
}
