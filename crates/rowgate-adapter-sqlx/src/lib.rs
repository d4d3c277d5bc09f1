//! Postgres and MySQL connections for rowgate, backed by sqlx pools.
//!
//! Each connection gets one pool shared by its [`QueryExecutor`] and its
//! [`SchemaIntrospector`]. Other engines are wired in by the embedding
//! application through the same seams.
//!
//! [`QueryExecutor`]: rowgate_dialect::QueryExecutor
//! [`SchemaIntrospector`]: rowgate_runtime::SchemaIntrospector

use rowgate_core::{ConnectionConfig, DialectKind};
use rowgate_runtime::ConnectionHandle;
use sqlx::mysql::MySqlPoolOptions;
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use std::time::Duration;

pub mod error;
pub mod mysql;
pub mod postgres;

pub use mysql::{MySqlExecutor, MySqlIntrospector};
pub use postgres::{PgExecutor, PgIntrospector};

/// Whether [`connect`] can open connections of `kind`.
pub fn supports(kind: DialectKind) -> bool {
    matches!(kind, DialectKind::Postgres | DialectKind::Mysql)
}

/// Open a pool for `config` and wrap it as a connection handle.
pub async fn connect(id: &str, config: &ConnectionConfig) -> anyhow::Result<ConnectionHandle> {
    let url = config.connection_string();
    let pool_config = config.pool_config();
    let acquire_timeout = Duration::from_secs(u64::from(pool_config.acquire_timeout_seconds));

    let handle = match config.kind {
        DialectKind::Postgres => {
            let pool = PgPoolOptions::new()
                .min_connections(pool_config.min_connections)
                .max_connections(pool_config.max_connections)
                .acquire_timeout(acquire_timeout)
                .connect(&url)
                .await?;
            ConnectionHandle::new(
                id,
                Arc::new(PgExecutor::new(pool.clone())),
                Arc::new(PgIntrospector::new(pool, config.schema.clone())),
            )
        }
        DialectKind::Mysql => {
            let pool = MySqlPoolOptions::new()
                .min_connections(pool_config.min_connections)
                .max_connections(pool_config.max_connections)
                .acquire_timeout(acquire_timeout)
                .connect(&url)
                .await?;
            ConnectionHandle::new(
                id,
                Arc::new(MySqlExecutor::new(pool.clone())),
                Arc::new(MySqlIntrospector::new(pool, config.schema.clone())),
            )
        }
        other => anyhow::bail!(
            "connection '{}': no built-in driver for {}, register an executor for it instead",
            id,
            other
        ),
    };

    tracing::info!(connection = %id, kind = %config.kind, "Connected");
    Ok(handle)
}
