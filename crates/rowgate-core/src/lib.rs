//! Shared types for rowgate: introspected schema metadata, the group and
//! permission model, engine kinds and configuration.

pub mod access;
pub mod config;
pub mod kind;
pub mod schema;

pub use access::{
    ADMIN_GROUP_NAME, AccessLevel, Capability, Group, GroupError, Permission, TableAction,
};
pub use config::{
    ConfigError, ConnectionConfig, ConnectionPoolConfig, QueryConfig, RowgateConfig,
    SchemaCacheConfig, SortOrder, TableSettings,
};
pub use kind::{DialectKind, EngineFamily};
pub use schema::{ColumnSchema, DataCategory, ForeignKeyRef, TableSchema};
