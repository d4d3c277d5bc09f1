//! MySQL executor and introspection.

use async_trait::async_trait;
use rowgate_core::{ColumnSchema, DialectKind, ForeignKeyRef, TableSchema};
use rowgate_dialect::{ExecutorError, NativeQuery, NativeRowSet, QueryExecutor, SqlStatement, TypedValue};
use rowgate_runtime::{SchemaError, SchemaIntrospector};
use serde_json::{Map, Value, json};
use sqlx::mysql::{MySqlArguments, MySqlPool, MySqlRow};
use sqlx::{Arguments, Column, Row};

use crate::error::{executor_error, schema_error};

fn args_add<T>(args: &mut MySqlArguments, v: T) -> Result<(), ExecutorError>
where
    T: Send + Sync + 'static,
    for<'q> T: sqlx::Encode<'q, sqlx::MySql> + sqlx::Type<sqlx::MySql>,
{
    args.add(v).map_err(|e| ExecutorError::Query(e.to_string()))
}

pub fn arguments(stmt: &SqlStatement) -> Result<MySqlArguments, ExecutorError> {
    let mut args = MySqlArguments::default();
    for value in &stmt.params {
        match value {
            TypedValue::Null => args_add(&mut args, Option::<String>::None)?,
            TypedValue::Bool(b) => args_add(&mut args, *b)?,
            TypedValue::Int(n) => args_add(&mut args, *n)?,
            TypedValue::Float(f) => args_add(&mut args, *f)?,
            TypedValue::Decimal(s) | TypedValue::Text(s) => args_add(&mut args, s.clone())?,
            TypedValue::Date(d) => args_add(&mut args, *d)?,
            TypedValue::Time(t) => args_add(&mut args, *t)?,
            TypedValue::Timestamp(ts) => args_add(&mut args, *ts)?,
            // No native uuid type; stored as CHAR(36).
            TypedValue::Uuid(u) => args_add(&mut args, u.to_string())?,
        }
    }
    Ok(args)
}

pub fn row_to_json(row: &MySqlRow) -> Map<String, Value> {
    let mut obj = Map::new();
    for (i, col) in row.columns().iter().enumerate() {
        let value: Value = if let Ok(v) = row.try_get::<i64, _>(i) {
            json!(v)
        } else if let Ok(v) = row.try_get::<u64, _>(i) {
            json!(v)
        } else if let Ok(v) = row.try_get::<f64, _>(i) {
            json!(v)
        } else if let Ok(v) = row.try_get::<f32, _>(i) {
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
        } else if let Ok(v) = row.try_get::<Value, _>(i) {
            v
        } else {
            Value::Null
        };
        obj.insert(col.name().to_string(), value);
    }
    obj
}

pub struct MySqlExecutor {
    pool: MySqlPool,
}

impl MySqlExecutor {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl QueryExecutor for MySqlExecutor {
    fn kind(&self) -> DialectKind {
        DialectKind::Mysql
    }

    async fn execute(&self, query: &NativeQuery) -> Result<NativeRowSet, ExecutorError> {
        let NativeQuery::Sql(sql) = query else {
            return Err(ExecutorError::Query(format!(
                "mysql cannot run a {} query",
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

/// Reads table metadata from `information_schema`. Without an explicit
/// database the connection's current one is used.
pub struct MySqlIntrospector {
    pool: MySqlPool,
    database: Option<String>,
}

impl MySqlIntrospector {
    pub fn new(pool: MySqlPool, database: Option<String>) -> Self {
        Self { pool, database }
    }
}

// information_schema columns come back as VARBINARY on MySQL 8 unless cast.
#[async_trait]
impl SchemaIntrospector for MySqlIntrospector {
    async fn list_tables(&self) -> Result<Vec<String>, SchemaError> {
        let rows = sqlx::query(
            r#"
            select cast(table_name as char) as table_name
            from information_schema.tables
            where table_schema = coalesce(?, database())
              and table_type in ('BASE TABLE', 'VIEW')
            order by table_name
            "#,
        )
        .bind(&self.database)
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
              cast(column_name as char) as column_name,
              cast(data_type as char) as data_type,
              cast(is_nullable as char) as is_nullable,
              cast(column_default as char) as column_default,
              cast(character_maximum_length as signed) as max_length,
              cast(extra as char) as extra,
              cast(table_schema as char) as table_schema
            from information_schema.columns
            where table_schema = coalesce(?, database()) and table_name = ?
            order by ordinal_position
            "#,
        )
        .bind(&self.database)
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(schema_error)?;

        let Some(first) = col_rows.first() else {
            return Ok(None);
        };
        let database: String = first.try_get("table_schema").map_err(schema_error)?;

        let pk_rows = sqlx::query(
            r#"
            select cast(column_name as char) as column_name
            from information_schema.key_column_usage
            where constraint_name = 'PRIMARY'
              and table_schema = ?
              and table_name = ?
            order by ordinal_position
            "#,
        )
        .bind(&database)
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(schema_error)?;

        let primary_key: Vec<String> = pk_rows
            .iter()
            .map(|r| r.try_get::<String, _>("column_name"))
            .collect::<Result<_, _>>()
            .map_err(schema_error)?;

        let mut schema = TableSchema::new(table).with_schema(database.clone());
        for c in &col_rows {
            schema = schema.with_column(column_from_row(c, &primary_key).map_err(schema_error)?);
        }
        schema.primary_key = primary_key;

        let fk_rows = sqlx::query(
            r#"
            select
              cast(constraint_name as char) as constraint_name,
              cast(column_name as char) as column_name,
              cast(referenced_table_name as char) as referenced_table_name,
              cast(referenced_column_name as char) as referenced_column_name
            from information_schema.key_column_usage
            where table_schema = ?
              and table_name = ?
              and referenced_table_name is not null
            order by constraint_name, ordinal_position
            "#,
        )
        .bind(&database)
        .bind(table)
        .fetch_all(&self.pool)
        .await
        .map_err(schema_error)?;

        for fk in &fk_rows {
            schema = schema.with_foreign_key(ForeignKeyRef {
                constraint_name: fk.try_get("constraint_name").map_err(schema_error)?,
                column_name: fk.try_get("column_name").map_err(schema_error)?,
                referenced_table: fk.try_get("referenced_table_name").map_err(schema_error)?,
                referenced_column: fk.try_get("referenced_column_name").map_err(schema_error)?,
            });
        }

        tracing::debug!(
            database = %database,
            table = %table,
            columns = schema.columns.len(),
            "Introspected mysql table"
        );
        Ok(Some(schema))
    }
}

fn column_from_row(row: &MySqlRow, primary_key: &[String]) -> Result<ColumnSchema, sqlx::Error> {
    let name: String = row.try_get("column_name")?;
    let is_nullable: String = row.try_get("is_nullable")?;
    let max_length: Option<i64> = row.try_get("max_length")?;
    let extra: Option<String> = row.try_get("extra")?;

    Ok(ColumnSchema {
        is_primary_key: primary_key.contains(&name),
        name,
        data_type: row.try_get("data_type")?,
        nullable: is_nullable == "YES",
        is_auto_increment: extra.is_some_and(|e| e.contains("auto_increment")),
        max_length: max_length.and_then(|n| u32::try_from(n).ok()),
        default: row.try_get("column_default")?,
    })
}
