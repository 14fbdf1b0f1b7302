//! sql-export CLI
//!
//! Scripts the schema of every eligible database on a SQL Server instance
//! into one replayable `<database>.sql` file per database.

mod config;

use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use sql_export_core::adapter::{CatalogAdapter, CatalogSnapshot, MssqlAdapter, SnapshotAdapter};
use sql_export_core::domain::{ExportOutcome, ExportReport, SchedulingStrategy};
use sql_export_core::filter::ObjectFilter;
use sql_export_core::{CoreError, ExportConfig, ExportOrchestrator};

use crate::config::{normalize_args, LogFormat, Settings};

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser, Debug)]
#[command(name = "sql-export")]
#[command(about = "Script SQL Server database schemas into replayable DDL files")]
#[command(version)]
struct Cli {
    /// ADO.NET style connection string [env: SQL_EXPORT_CONNECTION]
    #[arg(short, long)]
    connection: Option<String>,

    /// Newline-delimited list of databases to export
    #[arg(short = 'd', long)]
    databases: Option<PathBuf>,

    /// Export only this database (also accepted as -db=<NAME>)
    #[arg(long)]
    db: Option<String>,

    /// Newline-delimited list of tables, views, routines and types to export
    #[arg(short = 's', long)]
    objects: Option<PathBuf>,

    /// Data table list (accepted for compatibility, data is not exported)
    #[arg(short = 't', long)]
    tables: Option<PathBuf>,

    /// Output directory, created if missing [default: .]
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Object ordering: phases or dependencies
    #[arg(long)]
    strategy: Option<SchedulingStrategy>,

    /// Number of databases exported concurrently (1-32)
    #[arg(long)]
    parallel: Option<usize>,

    /// Keep the partial script of a database that failed
    #[arg(long)]
    keep_partial: bool,

    /// Export from a JSON catalog snapshot instead of a live server
    #[arg(long, conflicts_with = "connection")]
    snapshot: Option<PathBuf>,

    /// Capture the catalog of the exported databases into a snapshot file
    #[arg(long)]
    save_snapshot: Option<PathBuf>,

    /// Print the run report as JSON on stdout
    #[arg(long)]
    report_json: bool,

    /// Log format
    #[arg(long, value_enum)]
    log_format: Option<LogFormat>,

    /// Log verbosity: trace, debug, info, warn, error
    #[arg(long)]
    verbosity: Option<String>,

    /// Settings file [default: sql-export.toml if present]
    #[arg(long)]
    settings: Option<PathBuf>,
}

impl Cli {
    /// The command-line layer of the settings
    fn as_settings(&self) -> Settings {
        Settings {
            connection: self.connection.clone(),
            output: self.output.clone(),
            databases: self.databases.clone(),
            objects: self.objects.clone(),
            strategy: self.strategy,
            parallel: self.parallel,
            keep_partial: self.keep_partial.then_some(true),
            log_format: self.log_format,
            verbosity: self.verbosity.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    let cli = Cli::parse_from(normalize_args(std::env::args()));

    match run(cli).await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            ExitCode::from(exit_code(&e))
        }
    }
}

async fn run(cli: Cli) -> Result<ExitCode> {
    let settings = Settings::load(cli.settings.as_deref())?.overlay(cli.as_settings());

    setup_logging(
        settings.verbosity.as_deref().unwrap_or("info"),
        settings.log_format.unwrap_or_default(),
    );

    if let Some(tables) = &cli.tables {
        warn!(
            "Ignoring data table list {}: table data is not exported",
            tables.display()
        );
    }

    let config = export_config(&cli, &settings).await?;
    config.validate()?;

    let adapter: Arc<dyn CatalogAdapter> = match (&cli.snapshot, &settings.connection) {
        (Some(path), _) => {
            info!("Reading catalog snapshot {}", path.display());
            Arc::new(SnapshotAdapter::load(path).await?)
        }
        (None, Some(connection)) => {
            Arc::new(MssqlAdapter::connect(connection, config.parallelism as u32).await?)
        }
        (None, None) => {
            return Err(CoreError::Config(
                "a connection string (--connection or SQL_EXPORT_CONNECTION) or --snapshot is required"
                    .to_string(),
            )
            .into());
        }
    };

    let cancel = setup_signal_handler();
    let orchestrator = ExportOrchestrator::new(adapter, config).with_cancellation(cancel);

    if let Some(path) = &cli.save_snapshot {
        let databases = orchestrator.eligible_databases().await?;
        CatalogSnapshot::capture(orchestrator.adapter(), &databases)
            .await?
            .save(path)
            .await?;
    }

    let report = orchestrator.run().await?;

    if cli.report_json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_summary(&report);
    }

    Ok(if report.cancelled {
        ExitCode::from(CoreError::Cancelled.exit_code())
    } else if report.has_failures() {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    })
}

async fn export_config(cli: &Cli, settings: &Settings) -> Result<ExportConfig> {
    let defaults = ExportConfig::default();
    Ok(ExportConfig {
        output_dir: settings.output.clone().unwrap_or(defaults.output_dir),
        databases: load_filter(settings.databases.as_deref()).await?,
        database: cli.db.clone(),
        objects: load_filter(settings.objects.as_deref()).await?,
        strategy: settings.strategy.unwrap_or(defaults.strategy),
        parallelism: settings.parallel.unwrap_or(defaults.parallelism),
        keep_partial: settings.keep_partial.unwrap_or(defaults.keep_partial),
    })
}

async fn load_filter(path: Option<&Path>) -> Result<ObjectFilter> {
    match path {
        Some(path) => ObjectFilter::from_file(path).await.map_err(|e| {
            anyhow::Error::from(CoreError::Config(format!(
                "cannot read list {}: {}",
                path.display(),
                e
            )))
        }),
        None => Ok(ObjectFilter::all()),
    }
}

fn print_summary(report: &ExportReport) {
    for outcome in &report.outcomes {
        match outcome {
            ExportOutcome::Written {
                database,
                path,
                statements,
                failures,
            } => {
                println!(
                    "  {}: {} ({} statements, {} skipped)",
                    database,
                    path.display(),
                    statements,
                    failures.len()
                );
                for failure in failures {
                    println!("    {} {}: {}", failure.kind, failure.identity, failure.cause);
                }
            }
            ExportOutcome::Failed { database, cause, .. } => {
                println!("  {}: FAILED ({})", database, cause);
            }
            ExportOutcome::Skipped { database, reason } => {
                println!("  {}: skipped ({})", database, reason);
            }
        }
    }
    println!(
        "Exported {}/{} database(s) in {:.2}s",
        report.written_count(),
        report.outcomes.len(),
        (report.finished_at - report.started_at).num_milliseconds() as f64 / 1000.0
    );
}

/// Run-level failures carry their own exit code; CLI glue errors are
/// configuration problems
fn exit_code(err: &anyhow::Error) -> u8 {
    err.downcast_ref::<CoreError>()
        .map(CoreError::exit_code)
        .unwrap_or(2)
}

fn setup_logging(verbosity: &str, format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(verbosity));
    let registry = tracing_subscriber::registry().with(filter);

    match format {
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
            .init(),
        LogFormat::Text => registry
            .with(
                tracing_subscriber::fmt::layer()
                    .with_target(false)
                    .with_writer(std::io::stderr),
            )
            .init(),
    }
}

/// Cancel the export on SIGINT or SIGTERM
#[cfg(unix)]
fn setup_signal_handler() -> CancellationToken {
    let cancel = CancellationToken::new();

    for kind in [SignalKind::interrupt(), SignalKind::terminate()] {
        let token = cancel.clone();
        match signal(kind) {
            Ok(mut stream) => {
                tokio::spawn(async move {
                    if stream.recv().await.is_some() {
                        warn!("Received shutdown signal, cancelling export");
                        token.cancel();
                    }
                });
            }
            Err(e) => warn!("Could not install signal handler: {}", e),
        }
    }

    cancel
}

/// Cancel the export on Ctrl-C
#[cfg(not(unix))]
fn setup_signal_handler() -> CancellationToken {
    let cancel = CancellationToken::new();
    let token = cancel.clone();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Received Ctrl-C, cancelling export");
            token.cancel();
        }
    });

    cancel
}
