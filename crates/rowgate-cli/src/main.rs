use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;

use commands::query::{TableArgs, parse_pair};

#[derive(Parser, Debug)]
#[command(name = "rowgate", version, about = "Permission-aware table queries over external databases")]
struct Cli {
    /// Configuration file
    #[arg(long, short, global = true, env = "ROWGATE_CONFIG", default_value = "rowgate.yaml")]
    config: PathBuf,

    /// Log at debug level (RUST_LOG takes precedence)
    #[arg(long, short, global = true, default_value_t = false)]
    verbose: bool,

    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Validate the configuration and report every problem.
    Check,

    /// List the tables visible to a user.
    Tables {
        #[arg(long)]
        connection: String,

        /// Requesting user id
        #[arg(long = "as")]
        requester: String,
    },

    /// Show the visible columns, keys and capability of a table.
    Describe {
        #[arg(long)]
        connection: String,

        #[arg(long)]
        table: String,

        #[arg(long = "as")]
        requester: String,
    },

    /// Run a filtered, sorted, paginated table query.
    Query {
        #[arg(long)]
        connection: String,

        #[arg(long)]
        table: String,

        #[arg(long = "as")]
        requester: String,

        /// Raw query string, e.g. "f_id__lt=45&search=Vasia&sort=id&order=DESC"
        #[arg(long = "query", short = 'q')]
        query_string: Option<String>,

        /// Single parameter as key=value (repeatable)
        #[arg(long = "param", short = 'p', value_parser = parse_pair)]
        params: Vec<(String, String)>,
    },

    /// Fetch one row by its primary key.
    Row {
        #[arg(long)]
        connection: String,

        #[arg(long)]
        table: String,

        #[arg(long = "as")]
        requester: String,

        /// Primary key column as column=value (repeat for composite keys)
        #[arg(long = "key", short = 'k', value_parser = parse_pair, required = true)]
        key: Vec<(String, String)>,
    },
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.cmd {
        Command::Check => commands::check::run(&cli.config)?,

        Command::Tables {
            connection,
            requester,
        } => commands::query::run_tables(&cli.config, &connection, &requester).await?,

        Command::Describe {
            connection,
            table,
            requester,
        } => {
            commands::query::run_describe(TableArgs {
                config: &cli.config,
                connection: &connection,
                table: &table,
                requester: &requester,
            })
            .await?
        }

        Command::Query {
            connection,
            table,
            requester,
            query_string,
            params,
        } => {
            let raw = commands::query::raw_params(query_string.as_deref(), &params)?;
            commands::query::run_query(
                TableArgs {
                    config: &cli.config,
                    connection: &connection,
                    table: &table,
                    requester: &requester,
                },
                raw,
            )
            .await?
        }

        Command::Row {
            connection,
            table,
            requester,
            key,
        } => {
            commands::query::run_row(
                TableArgs {
                    config: &cli.config,
                    connection: &connection,
                    table: &table,
                    requester: &requester,
                },
                &key,
            )
            .await?
        }
    }

    Ok(())
}
