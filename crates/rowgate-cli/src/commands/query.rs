//! `rowgate query`, `row`, `tables` and `describe`.
//!
//! Every command prints JSON to stdout. Failures reported by the query core
//! are printed as an error body (`{message, statusCode, type}`) on stderr.

use anyhow::Result;
use serde::Serialize;
use std::path::Path;
use tokio_util::sync::CancellationToken;

use rowgate_query::RawParams;
use rowgate_runtime::QueryError;

use super::context::{load_config, orchestrator};

/// Parse a `key=value` argument.
pub fn parse_pair(raw: &str) -> Result<(String, String), String> {
    match raw.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_string(), value.to_string())),
        _ => Err(format!("expected key=value, got '{}'", raw)),
    }
}

/// Merge a raw query string with individual `--param` pairs; pairs come last
/// and so win over the query string.
pub fn raw_params(query_string: Option<&str>, pairs: &[(String, String)]) -> Result<RawParams> {
    let mut raw = match query_string {
        Some(q) => RawParams::from_query_string(q)?,
        None => RawParams::new(),
    };
    for (key, value) in pairs {
        raw.push(key.clone(), value.clone());
    }
    Ok(raw)
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn report(err: QueryError) -> anyhow::Error {
    match serde_json::to_string_pretty(&err.to_body()) {
        Ok(body) => eprintln!("{}", body),
        Err(e) => tracing::debug!(error = %e, "Could not serialize error body"),
    }
    anyhow::Error::new(err)
}

/// Token cancelled on Ctrl-C.
fn ctrl_c_token() -> CancellationToken {
    let token = CancellationToken::new();
    let guard = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("Interrupted, cancelling query");
            guard.cancel();
        }
    });
    token
}

pub struct TableArgs<'a> {
    pub config: &'a Path,
    pub connection: &'a str,
    pub table: &'a str,
    pub requester: &'a str,
}

pub async fn run_query(args: TableArgs<'_>, raw: RawParams) -> Result<()> {
    let config = load_config(args.config)?;
    let orchestrator = orchestrator(&config, args.connection).await?;

    let result = orchestrator
        .run_table_query_with_cancel(args.connection, args.table, &raw, args.requester, &ctrl_c_token())
        .await
        .map_err(report)?;
    print_json(&result)
}

pub async fn run_row(args: TableArgs<'_>, key: &[(String, String)]) -> Result<()> {
    let config = load_config(args.config)?;
    let orchestrator = orchestrator(&config, args.connection).await?;

    let row = orchestrator
        .get_row(args.connection, args.table, key, args.requester)
        .await
        .map_err(report)?;
    print_json(&row)
}

pub async fn run_describe(args: TableArgs<'_>) -> Result<()> {
    let config = load_config(args.config)?;
    let orchestrator = orchestrator(&config, args.connection).await?;

    let description = orchestrator
        .describe_table(args.connection, args.table, args.requester)
        .await
        .map_err(report)?;
    print_json(&description)
}

pub async fn run_tables(config: &Path, connection: &str, requester: &str) -> Result<()> {
    let config = load_config(config)?;
    let orchestrator = orchestrator(&config, connection).await?;

    let tables = orchestrator
        .list_tables(connection, requester)
        .await
        .map_err(report)?;
    print_json(&tables)
}
