//! oracle-migrate CLI - move tables between Oracle schemas.

use clap::{Parser, Subcommand};
use oracle_migrate::config::parse_batch_size;
use oracle_migrate::transfer::DEFAULT_BATCH_SIZE;
use oracle_migrate::{
    Config, MigrateError, OdbcConnector, Orchestrator, PredicateStore, ProgressEvent, TableRef,
    TableReport, TableStatus,
};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

#[derive(Parser)]
#[command(name = "oracle-migrate")]
#[command(about = "Create, copy, size and clean tables between Oracle schemas")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: debug, info, warn, error
    #[arg(long, default_value = "info")]
    verbosity: String,

    /// Override number of parallel table jobs
    #[arg(long)]
    workers: Option<usize>,

    /// Print progress updates as JSON lines to stderr
    #[arg(long)]
    progress: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List tables in the source schema
    Tables,

    /// Show source row count and size, and target row count, per table
    Survey {
        /// Tables to survey [default: configured or all source tables]
        tables: Vec<String>,
    },

    /// Create target tables like their source tables
    Create {
        /// Tables to create [default: configured or all source tables]
        tables: Vec<String>,
    },

    /// Copy rows from source tables into target tables
    Copy {
        /// Tables to copy [default: configured or all source tables]
        tables: Vec<String>,

        /// Rows per committed batch (invalid values fall back to 1000)
        #[arg(long)]
        batch_size: Option<String>,
    },

    /// Delete rows from target tables in committed batches
    Delete {
        /// Tables to delete from [default: configured or all source tables]
        tables: Vec<String>,

        /// Rows per committed round (invalid values fall back to 1000)
        #[arg(long)]
        batch_size: Option<String>,
    },

    /// Suggest a bounding predicate from a table's key range
    Suggest {
        /// Table name, optionally SCHEMA.TABLE
        table: String,

        /// Save the suggestion as the table's predicate
        #[arg(long)]
        save: bool,
    },

    /// Manage saved per-table predicates
    Where {
        #[command(subcommand)]
        action: WhereAction,
    },
}

#[derive(Subcommand)]
enum WhereAction {
    /// Print the saved predicate
    Show {
        /// Table name, optionally SCHEMA.TABLE
        table: String,
    },

    /// Save a predicate
    Set {
        /// Table name, optionally SCHEMA.TABLE
        table: String,

        /// SQL condition, without the WHERE keyword
        predicate: String,
    },

    /// Remove the saved predicate
    Clear {
        /// Table name, optionally SCHEMA.TABLE
        table: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(code) => code,
        Err(e) => {
            eprintln!("{}", e.format_detailed());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<ExitCode, MigrateError> {
    let cli = Cli::parse();

    setup_logging(&cli.verbosity, &cli.log_format);

    let mut config = Config::load(&cli.config)?;
    info!("Loaded configuration from {:?}", cli.config);

    if let Some(w) = cli.workers {
        if w == 0 {
            return Err(MigrateError::Config("--workers must be at least 1".to_string()));
        }
        config.migration.workers = Some(w);
    }
    match &cli.command {
        Commands::Copy { batch_size, .. } | Commands::Delete { batch_size, .. } if batch_size.is_some() => {
            config.migration.batch_size = Some(parse_batch_size(batch_size.as_deref(), DEFAULT_BATCH_SIZE));
        }
        _ => {}
    }

    let store = match &config.migration.predicates_dir {
        Some(dir) => PredicateStore::new(dir.clone()),
        None => PredicateStore::default_location()?,
    };
    let source_schema = config.source.schema.clone();

    if let Commands::Where { action } = &cli.command {
        return where_command(&store, &source_schema, action, cli.output_json);
    }

    let mut orchestrator =
        Orchestrator::new(config, Arc::new(OdbcConnector::new())).with_predicates(Arc::new(store.clone()));
    if cli.progress {
        orchestrator = orchestrator.with_progress(|e: &ProgressEvent| {
            eprintln!(
                "{}",
                serde_json::json!({
                    "table": e.table.to_string(),
                    "kind": e.kind,
                    "units": e.units,
                    "rate": e.rate,
                })
            );
        });
    } else {
        orchestrator = orchestrator.with_progress(|e: &ProgressEvent| {
            debug!("{}: {} {} rows ({} rows/s)", e.table, e.kind, e.units, e.rate);
        });
    }
    info!("Run ID: {}", orchestrator.run_id());

    setup_signal_handler(orchestrator.cancel_token());

    let reports = match cli.command {
        Commands::Where { .. } => return Ok(ExitCode::SUCCESS),

        Commands::Tables => {
            let tables = orchestrator.list_source_tables().await?;
            if cli.output_json {
                let names: Vec<String> = tables.iter().map(|t| t.name.clone()).collect();
                println!("{}", serde_json::to_string_pretty(&names)?);
            } else {
                for table in &tables {
                    println!("{}", table.name);
                }
            }
            return Ok(ExitCode::SUCCESS);
        }

        Commands::Suggest { table, save } => {
            let table = table_ref(&source_schema, &table);
            match orchestrator.suggest_predicate(&table).await? {
                Some(predicate) => {
                    if cli.output_json {
                        println!(
                            "{}",
                            serde_json::json!({ "table": table.to_string(), "predicate": predicate })
                        );
                    } else {
                        println!("{}", predicate);
                    }
                    if save {
                        store.save(&table.schema, &table.name, &predicate)?;
                        info!("Saved predicate for {}", table);
                    }
                }
                None => {
                    warn!("{} has no column to range on", table);
                    if cli.output_json {
                        println!("{}", serde_json::json!({ "table": table.to_string(), "predicate": null }));
                    }
                }
            }
            return Ok(ExitCode::SUCCESS);
        }

        Commands::Survey { tables } => {
            let tables = orchestrator.resolve_tables(&tables).await?;
            orchestrator.survey(tables).await?
        }

        Commands::Create { tables } => {
            let tables = orchestrator.resolve_tables(&tables).await?;
            orchestrator.create_tables(tables).await?
        }

        Commands::Copy { tables, .. } => {
            let tables = orchestrator.resolve_tables(&tables).await?;
            orchestrator.transfer_tables(tables).await?
        }

        Commands::Delete { tables, .. } => {
            let tables = orchestrator.resolve_tables(&tables).await?;
            orchestrator.delete_tables(tables).await?
        }
    };

    print_reports(&reports, cli.output_json)?;
    Ok(exit_status(&reports))
}

fn where_command(
    store: &PredicateStore,
    default_schema: &str,
    action: &WhereAction,
    json: bool,
) -> Result<ExitCode, MigrateError> {
    match action {
        WhereAction::Show { table } => {
            let table = table_ref(default_schema, table);
            let predicate = store.load(&table.schema, &table.name)?;
            if json {
                println!(
                    "{}",
                    serde_json::json!({ "table": table.to_string(), "predicate": predicate })
                );
            } else if let Some(p) = predicate {
                println!("{}", p);
            } else {
                println!("no saved predicate for {}", table);
            }
        }
        WhereAction::Set { table, predicate } => {
            let table = table_ref(default_schema, table);
            if predicate.trim().is_empty() {
                return Err(MigrateError::Config(
                    "predicate must not be empty; use `where clear` to remove one".to_string(),
                ));
            }
            store.save(&table.schema, &table.name, predicate)?;
            println!("saved predicate for {}", table);
        }
        WhereAction::Clear { table } => {
            let table = table_ref(default_schema, table);
            if store.remove(&table.schema, &table.name)? {
                println!("cleared predicate for {}", table);
            } else {
                println!("no saved predicate for {}", table);
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}

/// `SCHEMA.TABLE`, or a bare table name in the default schema.
fn table_ref(default_schema: &str, name: &str) -> TableRef {
    match name.split_once('.') {
        Some((schema, table)) => TableRef::new(schema, table),
        None => TableRef::new(default_schema, name),
    }
}

fn print_reports(reports: &[TableReport], json: bool) -> Result<(), MigrateError> {
    if json {
        println!("{}", serde_json::to_string_pretty(reports)?);
        return Ok(());
    }

    for report in reports {
        println!(
            "{:<40} {:<8} {}",
            report.table.to_string(),
            report.status.to_string(),
            report.detail
        );
        if let Some(ddl) = &report.ddl {
            for entry in ddl.failures() {
                println!(
                    "    {} {} failed: {}",
                    entry.kind,
                    entry.name,
                    entry.error.as_deref().unwrap_or_default()
                );
            }
        }
    }

    let done = reports.iter().filter(|r| r.is_done()).count();
    println!("\n{} of {} tables done", done, reports.len());
    Ok(())
}

fn exit_status(reports: &[TableReport]) -> ExitCode {
    if reports.iter().any(|r| r.status == TableStatus::Failed) {
        ExitCode::FAILURE
    } else if reports.iter().any(|r| r.status == TableStatus::Stopped) {
        ExitCode::from(MigrateError::Stopped.exit_code())
    } else {
        ExitCode::SUCCESS
    }
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_writer(std::io::stderr)
        .with_target(false);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}

/// Cancel `cancel` on SIGINT (Ctrl-C) or SIGTERM. Running jobs stop at their
/// next batch boundary.
#[cfg(unix)]
fn setup_signal_handler(cancel: CancellationToken) {
    for (kind, name) in [
        (SignalKind::interrupt(), "SIGINT"),
        (SignalKind::terminate(), "SIGTERM"),
    ] {
        let token = cancel.clone();
        tokio::spawn(async move {
            match signal(kind) {
                Ok(mut stream) => {
                    stream.recv().await;
                    eprintln!("\nReceived {}. Stopping at the next batch boundary...", name);
                    token.cancel();
                }
                Err(e) => warn!("Failed to install {} handler: {}", name, e),
            }
        });
    }
}

/// Cancel `cancel` on Ctrl-C.
#[cfg(not(unix))]
fn setup_signal_handler(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                eprintln!("\nReceived Ctrl-C. Stopping at the next batch boundary...");
                cancel.cancel();
            }
            Err(e) => warn!("Failed to install Ctrl-C handler: {}", e),
        }
    });
}
