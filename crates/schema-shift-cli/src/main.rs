//! schema-shift CLI - MySQL schema analysis and migration to PostgreSQL or MongoDB.

use clap::{Parser, Subcommand};
use schema_shift::{api, ApiError, MigrateError, Settings, TargetKind, TransferRequest};
use std::path::PathBuf;
use std::process::ExitCode;
use thiserror::Error;
use tracing::{info, Level};
use tracing_subscriber::fmt::format::FmtSpan;

#[derive(Parser)]
#[command(name = "schema-shift")]
#[command(about = "Analyze a MySQL schema and migrate it to PostgreSQL or MongoDB")]
#[command(version)]
struct Cli {
    /// Path to YAML configuration file (default: read the environment and .env)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Output JSON result to stdout
    #[arg(long)]
    output_json: bool,

    /// Log format: text or json
    #[arg(long, default_value = "text")]
    log_format: String,

    /// Log verbosity: trace, debug, info, warn, error (default: from configuration)
    #[arg(long)]
    verbosity: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect the source schema and recommend a target database
    Analyze {
        /// Override source database name
        #[arg(long)]
        source_database: Option<String>,
    },

    /// Migrate every source table into the target database
    Transfer {
        /// Target database kind: postgresql or mongodb
        target: String,

        /// Override source database name
        #[arg(long)]
        source_database: Option<String>,

        /// Override target database name
        #[arg(long)]
        target_database: Option<String>,
    },
}

#[derive(Error, Debug)]
enum CliError {
    #[error(transparent)]
    Migrate(#[from] MigrateError),

    #[error(transparent)]
    Api(#[from] ApiError),
}

impl CliError {
    fn exit_code(&self) -> u8 {
        match self {
            CliError::Migrate(e) => e.exit_code(),
            CliError::Api(e) => e.exit_code(),
        }
    }

    fn report(&self) -> String {
        match self {
            CliError::Migrate(e) => e.format_detailed(),
            CliError::Api(e) => format!("Error: {}\n", e.detail()),
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", e.report());
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run() -> Result<(), CliError> {
    let cli = Cli::parse();

    let mut settings = match &cli.config {
        Some(path) => Settings::load(path)?,
        None => Settings::from_env()?,
    };

    let level = cli
        .verbosity
        .clone()
        .unwrap_or_else(|| settings.effective_log_level().to_string());
    setup_logging(&level, &cli.log_format);

    match &cli.config {
        Some(path) => info!("Loaded configuration from {:?}", path),
        None => info!("Loaded configuration from environment"),
    }

    match cli.command {
        Commands::Analyze { source_database } => {
            if let Some(db) = source_database {
                settings.source.database = db;
            }

            let source = serde_json::to_value(&settings.source).map_err(MigrateError::from)?;
            let response = api::analyze(source).await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&response).map_err(MigrateError::from)?);
            } else {
                println!("{}\n", response.summary);
                println!(
                    "  Tables: {}  Relationships: {}",
                    response.analysis.tables.len(),
                    response.analysis.relationships.len()
                );
                for table in &response.analysis.tables {
                    println!("    {} ({} columns)", table.name, table.columns.len());
                }
            }
        }

        Commands::Transfer {
            target,
            source_database,
            target_database,
        } => {
            if let Some(db) = source_database {
                settings.source.database = db;
            }

            // Unknown kinds get no credentials; the API rejects them before any I/O.
            let target_credentials = match target.parse::<TargetKind>() {
                Ok(TargetKind::Relational) => {
                    if let Some(db) = target_database {
                        settings.postgres.database = db;
                    }
                    serde_json::to_value(&settings.postgres).map_err(MigrateError::from)?
                }
                Ok(TargetKind::Document) => {
                    if let Some(db) = target_database {
                        settings.mongodb.database = db;
                    }
                    serde_json::to_value(&settings.mongodb).map_err(MigrateError::from)?
                }
                Err(_) => serde_json::Value::Null,
            };

            let outcome = api::transfer(TransferRequest {
                target_db: target,
                source_credentials: serde_json::to_value(&settings.source)
                    .map_err(MigrateError::from)?,
                target_credentials,
            })
            .await?;

            if cli.output_json {
                println!("{}", serde_json::to_string_pretty(&outcome).map_err(MigrateError::from)?);
            } else {
                println!("{}", outcome.details);
            }
        }
    }

    Ok(())
}

fn setup_logging(verbosity: &str, format: &str) {
    let level = match verbosity.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    let subscriber = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_span_events(FmtSpan::CLOSE)
        .with_target(false)
        .with_writer(std::io::stderr);

    if format == "json" {
        subscriber.json().init();
    } else {
        subscriber.init();
    }
}
