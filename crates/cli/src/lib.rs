//! Command line driver for history DDL.
//!
//! Each subcommand maps to one [`DdlManager`] operation. A migration runner
//! calls `install`, `drop-views`, runs its migrations, then calls `reconcile`.

use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use tsdbhistory_core::{
    ChildLink, ConnectionOptions, DialectType, HistoryConfig, DEFAULT_PARENT_COLUMN,
};
use tsdbhistory_sql_timescale::DdlManager;

/// Top-level arguments.
#[derive(Debug, Parser)]
#[command(author, version, about = "TimescaleDB history table maintenance")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// PostgreSQL connection string
    #[arg(long, env = "TSDB_HISTORY_DSN", hide_env_values = true)]
    pub dsn: String,

    /// Database dialect; only timescaledb supports history
    #[arg(long, default_value = "timescaledb", value_parser = parse_dialect)]
    pub dialect: DialectType,

    /// Maximum pooled connections
    #[arg(long, env = "TSDB_HISTORY_MAX_CONNECTIONS", default_value_t = 5)]
    pub max_connections: u32,

    #[command(flatten)]
    pub history: HistoryArgs,

    /// Cancel the operation after this many seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// Print results as JSON
    #[arg(long)]
    pub json: bool,

    /// Enable debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Partitioning and retention overrides.
#[derive(Debug, Args)]
pub struct HistoryArgs {
    /// Chunk time interval in hours
    #[arg(long, env = "TSDB_HISTORY_CHUNK_INTERVAL_HOURS", default_value_t = 24)]
    pub chunk_interval_hours: i32,

    /// Retention window in days
    #[arg(long, env = "TSDB_HISTORY_RETENTION_DAYS", default_value_t = 7)]
    pub retention_days: i32,

    /// Schema the snapshot views are created in
    #[arg(long, env = "TSDB_HISTORY_VIEW_SCHEMA", default_value = "public")]
    pub view_schema: String,
}

impl From<HistoryArgs> for HistoryConfig {
    fn from(args: HistoryArgs) -> Self {
        HistoryConfig {
            chunk_interval_hours: args.chunk_interval_hours,
            retention_days: args.retention_days,
            view_schema: args.view_schema,
        }
    }
}

/// Subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Install or upgrade the history schema and routines.
    Install,
    /// Drop every snapshot view before a migration.
    DropViews,
    /// Configure every hypertable and rebuild its view after a migration.
    Reconcile,
    /// Promote a history table to a parent hypertable.
    Promote {
        /// Table name in the history schema
        table: String,
    },
    /// Promote a history table to a child hypertable of `parent`.
    PromoteChild(PromoteChildArgs),
    /// Show chunk interval and retention of every hypertable.
    Status,
}

/// Arguments of `promote-child`.
#[derive(Debug, Args)]
pub struct PromoteChildArgs {
    /// Child table name in the history schema
    pub table: String,
    /// Child column holding the parent key
    #[arg(long)]
    pub column: String,
    /// Parent table name in the history schema
    #[arg(long)]
    pub parent: String,
    /// Parent key column
    #[arg(long, default_value = DEFAULT_PARENT_COLUMN)]
    pub parent_column: String,
}

impl From<PromoteChildArgs> for ChildLink {
    fn from(args: PromoteChildArgs) -> Self {
        ChildLink::new(args.table, args.column, args.parent).with_parent_column(args.parent_column)
    }
}

fn parse_dialect(raw: &str) -> Result<DialectType, String> {
    raw.parse().map_err(|e: tsdbhistory_core::HistoryError| e.to_string())
}

/// Install the global `tracing` subscriber. `RUST_LOG` takes precedence.
pub fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Connect, run one subcommand, and shut the manager down.
pub async fn run(cli: Cli) -> Result<()> {
    let Cli {
        command,
        dsn,
        dialect,
        max_connections,
        history,
        timeout_secs,
        json,
        verbose: _,
    } = cli;

    let mut options = ConnectionOptions::new(dsn);
    options.max_connections = max_connections;
    let manager = DdlManager::connect(&options, history.into(), dialect)
        .await
        .context("failed to start history manager")?;

    let cancel = CancellationToken::new();
    let watcher = spawn_cancel_watcher(cancel.clone(), timeout_secs.map(Duration::from_secs));

    let result = execute(&manager, command, json, &cancel).await;

    watcher.abort();
    manager.shutdown().await;
    result
}

async fn execute(
    manager: &DdlManager,
    command: Commands,
    json: bool,
    cancel: &CancellationToken,
) -> Result<()> {
    match command {
        Commands::Install => {
            manager.install_routines(cancel).await?;
            emit(json, &"installed", || "history routines installed".to_string())
        }
        Commands::DropViews => {
            let dropped = manager.drop_all_views(cancel).await?;
            emit(json, &dropped, || format!("dropped {dropped} views"))
        }
        Commands::Reconcile => {
            let summary = manager.reconcile(cancel).await?;
            emit(json, &summary, || {
                let mut out = format!("reconciled {} tables", summary.len());
                for table in &summary.tables {
                    out.push_str(&format!(
                        "\n  {:<40} retention={}",
                        table.table,
                        table.retention.code()
                    ));
                }
                out
            })
        }
        Commands::Promote { table } => {
            let outcome = manager
                .promote_parent(&table, cancel)
                .await
                .with_context(|| format!("failed to promote {table}"))?;
            emit(json, &outcome, || {
                format!("promoted {table} (retention result {})", outcome.code())
            })
        }
        Commands::PromoteChild(args) => {
            let link = ChildLink::from(args);
            let outcome = manager
                .promote_child(&link, cancel)
                .await
                .with_context(|| format!("failed to promote {}", link.table))?;
            emit(json, &outcome, || {
                format!(
                    "promoted {} under {} ({outcome:?})",
                    link.table, link.parent_table
                )
            })
        }
        Commands::Status => {
            let tables = manager.describe(cancel).await?;
            emit(json, &tables, || {
                let mut out = String::new();
                for table in &tables {
                    let retention = table
                        .retention
                        .as_ref()
                        .map(|policy| format!("{} (job {})", policy.drop_after, policy.job_id))
                        .unwrap_or_else(|| "-".to_string());
                    out.push_str(&format!(
                        "{:<40} chunk={:<12} retention={}\n",
                        table.name,
                        table.chunk_interval.as_deref().unwrap_or("-"),
                        retention
                    ));
                }
                out.trim_end().to_string()
            })
        }
    }
}

fn emit<T, F>(json: bool, value: &T, text: F) -> Result<()>
where
    T: Serialize + ?Sized,
    F: FnOnce() -> String,
{
    if json {
        println!("{}", serde_json::to_string_pretty(value)?);
    } else {
        println!("{}", text());
    }
    Ok(())
}

/// Cancel `cancel` on Ctrl-C or once `timeout` elapses.
fn spawn_cancel_watcher(
    cancel: CancellationToken,
    timeout: Option<Duration>,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let deadline = async {
            match timeout {
                Some(timeout) => tokio::time::sleep(timeout).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::select! {
            _ = tokio::signal::ctrl_c() => warn!("interrupt received, cancelling"),
            _ = deadline => info!("timeout elapsed, cancelling"),
        }
        cancel.cancel();
    })
}
