//! Postgres executor and information_schema introspection.

use async_trait::async_trait;
use rowgate_core::{ColumnSchema, DialectKind, ForeignKeyRef, TableSchema};
use rowgate_dialect::{ExecutorError, NativeQuery, NativeRowSet, QueryExecutor, SqlStatement, TypedValue};
use rowgate_runtime::{SchemaError, SchemaIntrospector};
use serde_json::{Map, Value, json};
use sqlx::postgres::{PgArguments, PgPool, PgRow};
use sqlx::{Arguments, Column, Row};

use crate::error::{executor_error, schema_error};

fn args_add<T>(args: &mut PgArguments, v: T) -> Result<(), ExecutorError>
where
    T: Send + Sync + 'static,
    for<'q> T: sqlx::Encode<'q, sqlx::Postgres> + sqlx::Type<sqlx::Postgres>,
{
    args.add(v).map_err(|e| ExecutorError::Query(e.to_string()))
}

/// Bind every parameter of `stmt` with its native type.
pub fn arguments(stmt: &SqlStatement) -> Result<PgArguments, ExecutorError> {
    let mut args = PgArguments::default();
    for value in &stmt.params {
        match value {
            TypedValue::Null => args_add(&mut args, Option::<String>::None)?,
            TypedValue::Bool(b) => args_add(&mut args, *b)?,
            TypedValue::Int(n) => args_add(&mut args, *n)?,
            TypedValue::Float(f) => args_add(&mut args, *f)?,
            // Cast to numeric in SQL.
            TypedValue::Decimal(s) => args_add(&mut args, s.clone())?,
            TypedValue::Text(s) => args_add(&mut args, s.clone())?,
            TypedValue::Date(d) => args_add(&mut args, *d)?,
            TypedValue::Time(t) => args_add(&mut args, *t)?,
            TypedValue::Timestamp(ts) => args_add(&mut args, *ts)?,
            TypedValue::Uuid(u) => args_add(&mut args, *u)?,
        }
    }
    Ok(args)
}

/// Decode a row into JSON, trying the native types in turn.
pub fn row_to_json(row: &PgRow) -> Map<String, Value> {
    let mut obj = Map::new();
    for (i, col) in row.columns().iter().enumerate() {
        let value: Value = if let Ok(v) = row.try_get::<i64, _>(i) {
            json!(v)
        } else if let Ok(v) = row.try_get::<i32, _>(i) {
            json!(v)
        } else if let Ok(v) = row.try_get::<i16, _>(i) {
            json!(v)
        } else if let Ok(v) = row.try_get::<f64, _>(i) {
            json!(v)
        } else if let Ok(v) = row.try_get::<f32, _>(i) {
            json!(v)
        } else if let Ok(v) = row.try_get::<bool, _>(i) {
            json!(v)
        } else if let Ok(v) = row.try_get::<String, _>(i) {
            json!(v)
        } else if let Ok(v) = row.try_get::<sqlx::types::BigDecimal, _>(i) {
            json!(v.to_string())
        } else if let Ok(v) = row.try_get::<chrono::DateTime<chrono::Utc>, _>(i) {
            json!(v.to_rfc3339())
        } else if let Ok(v) = row.try_get::<chrono::NaiveDateTime, _>(i) {
            json!(v.format("%Y-%m-%dT%H:%M:%S%.f").to_string())
        } else if let Ok(v) = row.try_get::<chrono::NaiveDate, _>(i) {
            json!(v.to_string())
        } else if let Ok(v) = row.try_get::<chrono::NaiveTime, _>(i) {
            json!(v.to_string())
        } else if let Ok(v) = row.try_get::<uuid::Uuid, _>(i) {
            json!(v.to_string())
        } else if let Ok(v) = row.try_get::<Value, _>(i) {
            v
        } else {
            Value::Null
        };
        obj.insert(col.name().to_string(), value);
    }
    obj
}

/// Runs relational queries against a Postgres pool.
pub struct PgExecutor {
    pool: PgPool,
}

impl PgExecutor {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QueryExecutor for PgExecutor {
    fn kind(&self) -> DialectKind {
        DialectKind::Postgres
    }

    async fn execute(&self, query: &NativeQuery) -> Result<NativeRowSet, ExecutorError> {
        let NativeQuery::Sql(sql) = query else {
            return Err(ExecutorError::Query(format!(
                "postgres cannot run a {} query",
                query.variant_name()
            )));
        };

        let select = sqlx::query_with(&sql.select.text, arguments(&sql.select)?).fetch_all(&self.pool);
        let count = sqlx::query_with(&sql.count.text, arguments(&sql.count)?).fetch_one(&self.pool);
        let (rows, count) = tokio::try_join!(select, count).map_err(executor_error)?;

        let total: i64 = count.try_get("total").map_err(executor_error)?;
        Ok(NativeRowSet::new(
            rows.iter().map(row_to_json).collect(),
            u64::try_from(total).unwrap_or_default(),
        ))
    }
}

/// Reads table metadata from `information_schema` for one Postgres schema.
pub struct PgIntrospector {
    pool: PgPool,
    schema: String,
}

impl PgIntrospector {
    pub fn new(pool: PgPool, schema: Option<String>) -> Self {
        Self {
            pool,
            schema: schema.unwrap_or_else(|| "public".to_string()),
        }
    }
}

#[async_trait]
impl SchemaIntrospector for PgIntrospector {
    async fn list_tables(&self) -> Result<Vec<String>, SchemaError> {
        let rows = sqlx::query(
            r#"
            select table_name::text as table_name
            from information_schema.tables
            where table_schema = $1
              and table_type in ('BASE TABLE', 'VIEW')
            order by table_name
            "#,
        )
        .bind(&self.schema)
        .fetch_all(&self.pool)
        .await
        .map_err(schema_error)?;

        rows.iter()
            .map(|r| r.try_get::<String, _>("table_name").map_err(schema_error))
            .collect()
    }

    async fn introspect_table(&self, table: &str) -> Result<Option<TableSchema>, SchemaError> {
        let col_rows = sqlx::query(
            r#"
            select
              column_name::text as column_name,
              data_type::text as data_type,
              udt_name::text as udt_name,
              is_nullable::text as is_nullable,
              column_default::text as column_default,
              character_maximum_length::int as max_length,
              is_identity::text as is_identity
            from information_schema.columns
            where table_schema = $1 and table_name = $2
            order by ordinal_position
            "#,
        )
        .bind(&self.schema)
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(schema_error)?;

        if col_rows.is_empty() {
            return Ok(None);
        }

        let pk_rows = sqlx::query(
            r#"
            select kcu.column_name::text as column_name
            from information_schema.table_constraints tc
            join information_schema.key_column_usage kcu
              on tc.constraint_name = kcu.constraint_name
             and tc.table_schema = kcu.table_schema
            where tc.constraint_type = 'PRIMARY KEY'
              and tc.table_schema = $1
              and tc.table_name = $2
            order by kcu.ordinal_position
            "#,
        )
        .bind(&self.schema)
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(schema_error)?;

        let primary_key: Vec<String> = pk_rows
            .iter()
            .map(|r| r.try_get::<String, _>("column_name"))
            .collect::<Result<_, _>>()
            .map_err(schema_error)?;

        let mut schema = TableSchema::new(table).with_schema(self.schema.clone());
        for c in &col_rows {
            schema = schema.with_column(column_from_row(c, &primary_key).map_err(schema_error)?);
        }
        schema.primary_key = primary_key;

        let fk_rows = sqlx::query(
            r#"
            select
              tc.constraint_name::text as constraint_name,
              kcu.column_name::text as column_name,
              ccu.table_name::text as foreign_table_name,
              ccu.column_name::text as foreign_column_name
            from information_schema.table_constraints tc
            join information_schema.key_column_usage kcu
              on tc.constraint_name = kcu.constraint_name
             and tc.table_schema = kcu.table_schema
            join information_schema.constraint_column_usage ccu
              on ccu.constraint_name = tc.constraint_name
             and ccu.table_schema = tc.table_schema
            where tc.constraint_type = 'FOREIGN KEY'
              and tc.table_schema = $1
              and tc.table_name = $2
            order by tc.constraint_name, kcu.ordinal_position
            "#,
        )
        .bind(&self.schema)
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(schema_error)?;

        for fk in &fk_rows {
            schema = schema.with_foreign_key(ForeignKeyRef {
                constraint_name: fk.try_get("constraint_name").map_err(schema_error)?,
                column_name: fk.try_get("column_name").map_err(schema_error)?,
                referenced_table: fk.try_get("foreign_table_name").map_err(schema_error)?,
                referenced_column: fk.try_get("foreign_column_name").map_err(schema_error)?,
            });
        }

        tracing::debug!(
            schema = %self.schema,
            table = %table,
            columns = schema.columns.len(),
            "Introspected postgres table"
        );
        Ok(Some(schema))
    }
}

fn column_from_row(row: &PgRow, primary_key: &[String]) -> Result<ColumnSchema, sqlx::Error> {
    let name: String = row.try_get("column_name")?;
    let data_type: String = row.try_get("data_type")?;
    let udt_name: String = row.try_get("udt_name")?;
    let is_nullable: String = row.try_get("is_nullable")?;
    let default: Option<String> = row.try_get("column_default")?;
    let max_length: Option<i32> = row.try_get("max_length")?;
    let is_identity: String = row.try_get("is_identity")?;

    let auto_increment = is_identity == "YES"
        || default.as_deref().is_some_and(|d| d.starts_with("nextval("));

    Ok(ColumnSchema {
        is_primary_key: primary_key.contains(&name),
        name,
        data_type: native_type_name(&data_type, &udt_name),
        nullable: is_nullable == "YES",
        is_auto_increment: auto_increment,
        max_length: max_length.and_then(|n| u32::try_from(n).ok()),
        default,
    })
}

/// `information_schema` reports enums and domains as `USER-DEFINED`.
fn native_type_name(data_type: &str, udt_name: &str) -> String {
    match data_type {
        "USER-DEFINED" => udt_name.to_string(),
        "ARRAY" => "array".to_string(),
        other => other.to_string(),
    }
}
