//! Table query orchestration.
//!
//! One request is a single pass: resolve the connection, check membership,
//! resolve the schema, evaluate access, parse the parameters, build and run
//! the native query, normalize, strip excluded fields. No state survives the
//! request except the schema cache.

use rowgate_core::{
    Capability, ColumnSchema, ForeignKeyRef, QueryConfig, TableAction, TableSchema, TableSettings,
};
use rowgate_dialect::{AdapterError, ExecutorError, NativeRowSet, adapter_for, execute_cancellable};
use rowgate_policy::{AccessDecision, PermissionEvaluator, PolicyError};
use rowgate_query::{ParseContext, QueryIr, QueryParser, RawParams, ValidationError, ValidationIssue};
use serde::Serialize;
use serde_json::{Map, Value};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

use crate::cache::SchemaCache;
use crate::connection::{ConnectionHandle, ConnectionProvider, SchemaError};
use crate::error::QueryError;
use crate::normalizer::{PrimaryColumn, QueryResult, normalize, primary_columns, strip_excluded};
use crate::settings::TableSettingsProvider;

/// A visible table and the requester's capability on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TableSummary {
    pub table: String,
    pub capability: Capability,
}

/// Visible structure of one table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TableDescription {
    pub table: String,
    pub columns: Vec<ColumnSchema>,
    pub primary_columns: Vec<PrimaryColumn>,
    pub foreign_keys: Vec<ForeignKeyRef>,
    pub readonly_fields: Vec<String>,
    pub identity_column: Option<String>,
    /// Rows can be addressed for edit/delete.
    pub identifiable: bool,
    pub capability: Capability,
}

/// Everything resolved for one requester on one table.
struct TableAccess {
    connection: ConnectionHandle,
    schema: Arc<TableSchema>,
    settings: TableSettings,
    decision: AccessDecision,
}

/// Composes the schema cache, permission evaluator, parser, dialect adapters
/// and normalizer.
pub struct QueryOrchestrator {
    connections: Arc<dyn ConnectionProvider>,
    cache: Arc<SchemaCache>,
    permissions: PermissionEvaluator,
    settings: Arc<dyn TableSettingsProvider>,
    query: QueryConfig,
}

impl QueryOrchestrator {
    pub fn new(
        connections: Arc<dyn ConnectionProvider>,
        cache: Arc<SchemaCache>,
        permissions: PermissionEvaluator,
        settings: Arc<dyn TableSettingsProvider>,
        query: QueryConfig,
    ) -> Self {
        Self {
            connections,
            cache,
            permissions,
            settings,
            query,
        }
    }

    pub fn schema_cache(&self) -> &Arc<SchemaCache> {
        &self.cache
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(self.query.timeout_ms)
    }

    /// Run a table query with no caller-side cancellation.
    pub async fn run_table_query(
        &self,
        connection_id: &str,
        table: &str,
        raw: &RawParams,
        requester_id: &str,
    ) -> Result<QueryResult, QueryError> {
        self.run_table_query_with_cancel(connection_id, table, raw, requester_id, &CancellationToken::new())
            .await
    }

    /// Run a table query; firing `cancel` aborts the in-flight native query.
    pub async fn run_table_query_with_cancel(
        &self,
        connection_id: &str,
        table: &str,
        raw: &RawParams,
        requester_id: &str,
        cancel: &CancellationToken,
    ) -> Result<QueryResult, QueryError> {
        let access = self.resolve_access(connection_id, table, requester_id).await?;
        let ir = self
            .parser(&access)
            .parse(raw)
            .inspect_err(|e| tracing::debug!(table = %table, error = %e, "Rejected table query"))?;

        let rowset = self.execute(&access, &ir, cancel).await?;
        let mut result = normalize(rowset, &access.schema, &ir.projection, ir.page);
        strip_excluded(&mut result, &access.decision.excluded_fields);

        tracing::debug!(
            connection = %connection_id,
            table = %table,
            rows = result.rows.len(),
            total = result.pagination.total,
            "Table query completed"
        );
        Ok(result)
    }

    /// Single row by its full primary key.
    pub async fn get_row(
        &self,
        connection_id: &str,
        table: &str,
        primary_key: &[(String, String)],
        requester_id: &str,
    ) -> Result<Map<String, Value>, QueryError> {
        let access = self.resolve_access(connection_id, table, requester_id).await?;
        let ir = self.parser(&access).primary_key_lookup(primary_key)?;

        let rowset = self.execute(&access, &ir, &CancellationToken::new()).await?;
        let mut result = normalize(rowset, &access.schema, &ir.projection, ir.page);
        strip_excluded(&mut result, &access.decision.excluded_fields);

        result
            .rows
            .into_iter()
            .next()
            .ok_or_else(|| QueryError::NotFound(format!("row not found in table '{}'", table)))
    }

    /// Visible tables of the connection with the requester's capability on each.
    pub async fn list_tables(
        &self,
        connection_id: &str,
        requester_id: &str,
    ) -> Result<Vec<TableSummary>, QueryError> {
        let connection = self.resolve_connection(connection_id).await?;
        let names = self
            .cache
            .table_names(&connection)
            .await
            .map_err(|e| schema_error(connection_id, e))?;

        let capabilities = self
            .permissions
            .table_capabilities(requester_id, connection_id, &names)
            .await
            .map_err(policy_error)?
            .ok_or_else(|| {
                tracing::warn!(connection = %connection_id, requester = %requester_id, "Requester has no group on connection");
                connection_not_found()
            })?;

        Ok(capabilities
            .into_iter()
            .filter(|(_, cap)| cap.visibility)
            .map(|(table, capability)| TableSummary { table, capability })
            .collect())
    }

    /// Visible columns, keys and capability of one table.
    pub async fn describe_table(
        &self,
        connection_id: &str,
        table: &str,
        requester_id: &str,
    ) -> Result<TableDescription, QueryError> {
        let access = self.resolve_access(connection_id, table, requester_id).await?;
        let schema = &access.schema;
        let excluded = &access.decision.excluded_fields;
        let visible = |c: &str| schema.has_column(c) && !excluded.contains(c);

        Ok(TableDescription {
            table: schema.name.clone(),
            columns: schema
                .columns
                .iter()
                .filter(|c| !excluded.contains(&c.name))
                .cloned()
                .collect(),
            primary_columns: primary_columns(schema),
            foreign_keys: schema
                .foreign_keys
                .iter()
                .filter(|fk| visible(&fk.column_name))
                .cloned()
                .collect(),
            readonly_fields: access
                .settings
                .readonly_fields
                .iter()
                .filter(|c| visible(c))
                .cloned()
                .collect(),
            identity_column: access
                .settings
                .identity_column
                .clone()
                .filter(|c| visible(c)),
            identifiable: schema.is_identifiable(),
            capability: access.decision.capability,
        })
    }

    /// Check that the requester may perform `action` on `table`.
    pub async fn authorize(
        &self,
        connection_id: &str,
        table: &str,
        action: TableAction,
        requester_id: &str,
    ) -> Result<Capability, QueryError> {
        let access = self.resolve_access(connection_id, table, requester_id).await?;
        let capability = access.decision.capability;

        if matches!(action, TableAction::Edit | TableAction::Delete) && !access.schema.is_identifiable() {
            return Err(ValidationError::single(ValidationIssue::invalid_parameter(
                "tableName",
                &format!("table '{}' has no primary key, rows cannot be addressed", table),
            ))
            .into());
        }

        if !capability.allows(action) {
            tracing::warn!(
                connection = %connection_id,
                table = %table,
                action = %action,
                "Action denied"
            );
            return Err(QueryError::Forbidden {
                table: table.to_string(),
                action,
            });
        }
        Ok(capability)
    }

    /// Re-introspect a table after its settings changed.
    pub async fn refresh_table(&self, connection_id: &str, table: &str) -> Result<(), QueryError> {
        let connection = self.resolve_connection(connection_id).await?;
        self.cache
            .refresh(&connection, table)
            .await
            .map_err(|e| schema_error(connection_id, e))?;
        Ok(())
    }

    /// Drop every cached schema of a connection.
    pub fn invalidate(&self, connection_id: &str) -> Result<(), QueryError> {
        self.cache
            .invalidate(connection_id)
            .map_err(|e| schema_error(connection_id, e))
    }

    async fn resolve_connection(&self, connection_id: &str) -> Result<ConnectionHandle, QueryError> {
        self.connections
            .connection(connection_id)
            .await
            .map_err(|e| schema_error(connection_id, e))?
            .ok_or_else(|| {
                tracing::debug!(connection = %connection_id, "Unknown connection");
                connection_not_found()
            })
    }

    async fn resolve_access(
        &self,
        connection_id: &str,
        table: &str,
        requester_id: &str,
    ) -> Result<TableAccess, QueryError> {
        let connection = self.resolve_connection(connection_id).await?;

        if !self
            .permissions
            .is_member(requester_id, connection_id)
            .await
            .map_err(policy_error)?
        {
            tracing::warn!(connection = %connection_id, requester = %requester_id, "Requester has no group on connection");
            return Err(connection_not_found());
        }

        let schema = self
            .cache
            .get_table_schema(&connection, table)
            .await
            .map_err(|e| schema_error(connection_id, e))?;

        let settings = self
            .settings
            .table_settings(connection_id, table)
            .await
            .map_err(|e| QueryError::Internal(e.to_string()))?
            .unwrap_or_default();

        let decision = self
            .permissions
            .evaluate(requester_id, connection_id, &schema, &settings)
            .await
            .map_err(policy_error)?;

        if !decision.is_visible() {
            tracing::warn!(
                connection = %connection_id,
                table = %table,
                requester = %requester_id,
                "Table hidden from requester"
            );
            return Err(QueryError::TableNotFound(table.to_string()));
        }

        Ok(TableAccess {
            connection,
            schema,
            settings,
            decision,
        })
    }

    fn parser<'a>(&'a self, access: &'a TableAccess) -> QueryParser<'a> {
        QueryParser::new(ParseContext {
            schema: &access.schema,
            settings: &access.settings,
            excluded: &access.decision.excluded_fields,
            defaults: &self.query,
        })
    }

    async fn execute(
        &self,
        access: &TableAccess,
        ir: &QueryIr,
        cancel: &CancellationToken,
    ) -> Result<NativeRowSet, QueryError> {
        let adapter = adapter_for(access.connection.kind);
        let native = adapter.build_query(ir, &access.schema).map_err(adapter_error)?;

        tracing::debug!(
            connection = %access.connection.id,
            query = %native.describe(),
            "Executing native query"
        );

        execute_cancellable(
            &access.connection.executor,
            &native,
            &access.schema,
            self.timeout(),
            cancel,
        )
        .await
        .map_err(|e| executor_error(&access.connection.id, e))
    }
}

fn connection_not_found() -> QueryError {
    QueryError::NotFound("connection not found".to_string())
}

fn schema_error(connection_id: &str, err: SchemaError) -> QueryError {
    match err {
        SchemaError::TableNotFound(table) => QueryError::TableNotFound(table),
        SchemaError::Unreachable(reason) => QueryError::ConnectionUnreachable {
            connection: connection_id.to_string(),
            reason,
        },
        other => QueryError::Internal(other.to_string()),
    }
}

fn policy_error(err: PolicyError) -> QueryError {
    QueryError::Internal(err.to_string())
}

fn adapter_error(err: AdapterError) -> QueryError {
    match err {
        AdapterError::Coercion(e) => QueryError::Coercion(e),
        other => QueryError::Internal(other.to_string()),
    }
}

fn executor_error(connection_id: &str, err: ExecutorError) -> QueryError {
    match err {
        ExecutorError::Unreachable(reason) => QueryError::ConnectionUnreachable {
            connection: connection_id.to_string(),
            reason,
        },
        ExecutorError::Timeout(d) => QueryError::QueryTimeout(d.as_millis() as u64),
        ExecutorError::Cancelled => QueryError::Cancelled,
        ExecutorError::Adapter(e) => adapter_error(e),
        other => QueryError::Internal(other.to_string()),
    }
}
