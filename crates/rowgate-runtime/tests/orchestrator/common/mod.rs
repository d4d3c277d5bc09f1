//! Shared fixtures: a seeded SQLite database, a SQLite-backed executor and
//! the groups used across the orchestrator tests.

use async_trait::async_trait;
use rowgate_core::{
    AccessLevel, Capability, ColumnSchema, DialectKind, ForeignKeyRef, Group, QueryConfig,
    TableSchema, TableSettings,
};
use rowgate_dialect::{ExecutorError, NativeQuery, NativeRowSet, QueryExecutor, SqlStatement, TypedValue};
use rowgate_policy::{PermissionEvaluator, StaticAccessStore};
use rowgate_query::RawParams;
use rowgate_runtime::{
    ConfigTableSettings, ConnectionHandle, QueryOrchestrator, SchemaCache, SchemaError,
    SchemaIntrospector, StaticConnectionProvider,
};
use serde_json::{Map, Value};
use sqlx::sqlite::{SqliteArguments, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::{Column, Row};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub const CONNECTION: &str = "shop";
pub const USER_ROWS: i64 = 42;

// Requesters
pub const ADMIN: &str = "admin";
pub const VIEWER: &str = "viewer";
pub const EDITOR: &str = "editor";
pub const VIEWER_EDITOR: &str = "viewer-editor";
pub const LOCKED_EDITOR: &str = "locked-editor";
pub const STRANGER: &str = "stranger";

// =============================================================================
// DATABASE
// =============================================================================

pub fn user_name(id: i64) -> String {
    if id % 5 == 0 {
        format!("Vasia {}", id)
    } else {
        format!("User {}", id)
    }
}

pub fn user_age(id: i64) -> i64 {
    18 + (id * 7) % 50
}

pub async fn seeded_pool() -> SqlitePool {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await
        .expect("open in-memory sqlite");

    sqlx::query(
        "CREATE TABLE users (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT NOT NULL,
            age INTEGER,
            password_hash TEXT NOT NULL
        )",
    )
    .execute(&pool)
    .await
    .expect("create users");

    sqlx::query(
        "CREATE TABLE orders (
            id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL REFERENCES users(id),
            total REAL NOT NULL
        )",
    )
    .execute(&pool)
    .await
    .expect("create orders");

    sqlx::query("CREATE TABLE audit_log (message TEXT)")
        .execute(&pool)
        .await
        .expect("create audit_log");

    for id in 1..=USER_ROWS {
        sqlx::query("INSERT INTO users (id, name, email, age, password_hash) VALUES (?, ?, ?, ?, ?)")
            .bind(id)
            .bind(user_name(id))
            .bind(format!("user{}@example.com", id))
            .bind(user_age(id))
            .bind(format!("hash-{}", id))
            .execute(&pool)
            .await
            .expect("insert user");
    }
    for id in 1..=3_i64 {
        sqlx::query("INSERT INTO orders (id, user_id, total) VALUES (?, ?, ?)")
            .bind(id)
            .bind(id)
            .bind(id as f64 * 10.5)
            .execute(&pool)
            .await
            .expect("insert order");
    }
    sqlx::query("INSERT INTO audit_log (message) VALUES ('boot')")
        .execute(&pool)
        .await
        .expect("insert log");

    pool
}

// =============================================================================
// EXECUTOR + INTROSPECTOR
// =============================================================================

/// Runs MySQL-dialect statements on SQLite.
pub struct SqliteExecutor {
    pool: SqlitePool,
}

fn bind_all<'q>(stmt: &'q SqlStatement) -> sqlx::query::Query<'q, sqlx::Sqlite, SqliteArguments<'q>> {
    let mut query = sqlx::query(&stmt.text);
    for param in &stmt.params {
        query = match param {
            TypedValue::Null => query.bind(Option::<String>::None),
            TypedValue::Bool(b) => query.bind(*b),
            TypedValue::Int(n) => query.bind(*n),
            TypedValue::Float(f) => query.bind(*f),
            TypedValue::Decimal(s) | TypedValue::Text(s) => query.bind(s.clone()),
            other => query.bind(other.to_json().as_str().unwrap_or_default().to_string()),
        };
    }
    query
}

fn row_to_json(row: &SqliteRow) -> Map<String, Value> {
    let mut map = Map::new();
    for (i, col) in row.columns().iter().enumerate() {
        let value = if let Ok(v) = row.try_get::<Option<i64>, _>(i) {
            v.map(Value::from).unwrap_or(Value::Null)
        } else if let Ok(v) = row.try_get::<Option<f64>, _>(i) {
            v.map(Value::from).unwrap_or(Value::Null)
        } else if let Ok(v) = row.try_get::<Option<String>, _>(i) {
            v.map(Value::String).unwrap_or(Value::Null)
        } else {
            Value::Null
        };
        map.insert(col.name().to_string(), value);
    }
    map
}

#[async_trait]
impl QueryExecutor for SqliteExecutor {
    fn kind(&self) -> DialectKind {
        DialectKind::Mysql
    }

    async fn execute(&self, query: &NativeQuery) -> Result<NativeRowSet, ExecutorError> {
        let NativeQuery::Sql(sql) = query else {
            return Err(ExecutorError::Query(format!(
                "unexpected {} query",
                query.variant_name()
            )));
        };
        let rows = bind_all(&sql.select)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| ExecutorError::Query(e.to_string()))?;
        let total: i64 = bind_all(&sql.count)
            .fetch_one(&self.pool)
            .await
            .and_then(|r| r.try_get("total"))
            .map_err(|e| ExecutorError::Query(e.to_string()))?;

        Ok(NativeRowSet::new(
            rows.iter().map(row_to_json).collect(),
            total as u64,
        ))
    }
}

/// Fixed schemas mirroring the seeded tables; counts introspection calls.
#[derive(Default)]
pub struct FixtureIntrospector {
    tables: HashMap<String, TableSchema>,
    pub calls: AtomicUsize,
}

impl FixtureIntrospector {
    pub fn new() -> Self {
        let users = TableSchema::new("users")
            .with_column(ColumnSchema::new("id", "INTEGER").primary_key().auto_increment())
            .with_column(ColumnSchema::new("name", "TEXT").not_null())
            .with_column(ColumnSchema::new("email", "TEXT").not_null())
            .with_column(ColumnSchema::new("age", "INTEGER"))
            .with_column(ColumnSchema::new("password_hash", "TEXT").not_null());
        let orders = TableSchema::new("orders")
            .with_column(ColumnSchema::new("id", "INTEGER").primary_key())
            .with_column(ColumnSchema::new("user_id", "INTEGER").not_null())
            .with_column(ColumnSchema::new("total", "REAL").not_null())
            .with_foreign_key(ForeignKeyRef {
                column_name: "user_id".to_string(),
                referenced_table: "users".to_string(),
                referenced_column: "id".to_string(),
                constraint_name: "orders_user_id_fkey".to_string(),
            });
        let audit_log = TableSchema::new("audit_log").with_column(ColumnSchema::new("message", "TEXT"));

        Self {
            tables: [users, orders, audit_log]
                .into_iter()
                .map(|t| (t.name.clone(), t))
                .collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl SchemaIntrospector for FixtureIntrospector {
    async fn list_tables(&self) -> Result<Vec<String>, SchemaError> {
        Ok(self.tables.keys().cloned().collect())
    }

    async fn introspect_table(&self, table: &str) -> Result<Option<TableSchema>, SchemaError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.tables.get(table).cloned())
    }
}

// =============================================================================
// GROUPS + SETTINGS
// =============================================================================

fn visible(edit: bool) -> Capability {
    Capability {
        visibility: true,
        edit,
        ..Capability::denied()
    }
}

pub fn groups() -> Vec<Group> {
    vec![
        Group::new_admin(CONNECTION, ADMIN),
        // Sees users only, cannot edit.
        Group::new("viewers", CONNECTION, "Viewers", AccessLevel::Edit)
            .with_member(VIEWER)
            .with_member(VIEWER_EDITOR)
            .with_permission("users", visible(false)),
        // Edits users and orders.
        Group::new("editors", CONNECTION, "Editors", AccessLevel::Edit)
            .with_member(EDITOR)
            .with_member(VIEWER_EDITOR)
            .with_member(LOCKED_EDITOR)
            .with_permission(
                "users",
                Capability {
                    add: true,
                    delete: true,
                    ..visible(true)
                },
            )
            .with_permission("orders", visible(true))
            .with_permission("audit_log", visible(true)),
        // Marks users readonly.
        Group::new("lock", CONNECTION, "Lock", AccessLevel::Edit)
            .with_member(LOCKED_EDITOR)
            .with_permission("users", Capability::read_only()),
    ]
}

pub fn settings() -> ConfigTableSettings {
    ConfigTableSettings::default().with_table(
        CONNECTION,
        "users",
        TableSettings {
            excluded_fields: vec!["password_hash".to_string()],
            readonly_fields: vec!["email".to_string(), "password_hash".to_string()],
            identity_column: Some("name".to_string()),
            ..Default::default()
        },
    )
}

// =============================================================================
// HARNESS
// =============================================================================

pub struct Harness {
    pub orchestrator: QueryOrchestrator,
    pub introspector: Arc<FixtureIntrospector>,
}

pub async fn harness() -> Harness {
    harness_with(QueryConfig::default()).await
}

pub async fn harness_with(query: QueryConfig) -> Harness {
    let pool = seeded_pool().await;
    let introspector = Arc::new(FixtureIntrospector::new());
    let handle = ConnectionHandle::new(
        CONNECTION,
        Arc::new(SqliteExecutor { pool }),
        introspector.clone(),
    );

    let orchestrator = QueryOrchestrator::new(
        Arc::new(StaticConnectionProvider::new().with_connection(handle)),
        Arc::new(SchemaCache::new(Duration::from_secs(300))),
        PermissionEvaluator::new(Arc::new(StaticAccessStore::new(groups()))),
        Arc::new(settings()),
        query,
    );

    Harness {
        orchestrator,
        introspector,
    }
}

pub fn params(query: &str) -> RawParams {
    RawParams::from_query_string(query).expect("valid query string")
}

pub fn ids(rows: &[Map<String, Value>]) -> Vec<i64> {
    rows.iter().filter_map(|r| r.get("id").and_then(Value::as_i64)).collect()
}
