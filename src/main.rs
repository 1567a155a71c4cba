use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

use citysearch_importer::config::ConnectionConfig;
use citysearch_importer::data_importer::{
    ImportConfig, InsertMode, PostgresExecutor, DEFAULT_RESET_SCRIPT,
};
use citysearch_importer::pipeline::{self, RunOptions};
use citysearch_importer::snapshot::{SnapshotConfig, DEFAULT_SNAPSHOT_PATH};
use citysearch_importer::transform::{MissingValuePolicy, TransformConfig};
use citysearch_importer::tsv_loader::TsvDialect;
use citysearch_importer::types::DEFAULT_TARGET_TABLE;

#[derive(Parser)]
#[command(name = "citysearch-import")]
#[command(about = "Data importer for the citysearch city table")]
#[command(version)]
#[command(long_about = "Loads a section-sign quoted TSV of GeoNames cities, optionally resets the citysearch database first, inserts every row into PostgreSQL and can export a Parquet snapshot of the transformed table. Without --password no database connection is made.")]
#[command(after_help = "EXAMPLES:
    # Reset the database and import a dump
    citysearch-import --password secret --reset-db --source-tsv cities1000.tsv

    # Only write the columnar snapshot
    citysearch-import --dump-hdf --source-tsv cities1000.tsv

    # Use prepared statements and keep empty fields as NULL
    citysearch-import --password secret --source-tsv cities1000.tsv --prepared --missing-as-null")]
struct Cli {
    /// Database user
    #[arg(long, default_value = "postgres")]
    user: String,

    /// Database password; when absent no connection is made
    #[arg(long)]
    password: Option<String>,

    /// Database host
    #[arg(long, default_value = "localhost")]
    host: String,

    /// Database port
    #[arg(long, default_value = "5432")]
    port: u16,

    /// Database name
    #[arg(long, default_value = "citysearch")]
    dbname: String,

    /// Drop and recreate the schema before importing
    #[arg(long)]
    reset_db: bool,

    /// SQL script run by --reset-db
    #[arg(long, value_name = "FILE", default_value = DEFAULT_RESET_SCRIPT)]
    reset_script: PathBuf,

    /// Write the transformed table to a columnar snapshot file
    #[arg(long, visible_alias = "dump-snapshot")]
    dump_hdf: bool,

    /// Snapshot file written by --dump-hdf
    #[arg(long, value_name = "FILE", default_value = DEFAULT_SNAPSHOT_PATH)]
    snapshot_path: PathBuf,

    /// Tab-separated source file
    #[arg(long, value_name = "FILE")]
    source_tsv: Option<PathBuf>,

    /// Table the rows are inserted into
    #[arg(long, default_value = DEFAULT_TARGET_TABLE)]
    target_table: String,

    /// Insert through one prepared statement instead of SQL literals
    #[arg(long)]
    prepared: bool,

    /// Keep empty fields as NULL instead of replacing them with 0
    #[arg(long)]
    missing_as_null: bool,

    /// Parse every generated statement before sending it
    #[arg(long)]
    validate_sql: bool,

    /// Write a JSON report of the run
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,

    /// Enable verbose logging (debug level)
    #[arg(short, long)]
    verbose: bool,

    /// Set log level explicitly
    #[arg(long, value_enum)]
    log_level: Option<LogLevel>,

    /// Output logs in JSON format
    #[arg(long)]
    json_logs: bool,
}

#[derive(ValueEnum, Clone, Debug)]
enum LogLevel {
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for Level {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Error => Level::ERROR,
            LogLevel::Warn => Level::WARN,
            LogLevel::Info => Level::INFO,
            LogLevel::Debug => Level::DEBUG,
            LogLevel::Trace => Level::TRACE,
        }
    }
}

impl Cli {
    fn run_options(&self) -> RunOptions {
        let mode = if self.prepared {
            InsertMode::Prepared
        } else {
            InsertMode::Literal
        };

        RunOptions {
            reset_db: self.reset_db,
            reset_script: self.reset_script.clone(),
            source_tsv: self.source_tsv.clone(),
            dialect: TsvDialect::default(),
            transform: TransformConfig {
                // bound parameters need the raw text
                escape_quotes: mode == InsertMode::Literal,
                missing_values: if self.missing_as_null {
                    MissingValuePolicy::Null
                } else {
                    MissingValuePolicy::Zero
                },
                ..TransformConfig::default()
            },
            snapshot: self.dump_hdf.then(|| SnapshotConfig {
                path: self.snapshot_path.clone(),
                ..SnapshotConfig::default()
            }),
            import: ImportConfig {
                target_table: self.target_table.clone(),
                mode,
                validate_statements: self.validate_sql,
                ..ImportConfig::default()
            },
        }
    }

    fn connection_config(&self) -> Option<ConnectionConfig> {
        // an empty password counts as absent
        self.password
            .as_ref()
            .filter(|password| !password.is_empty())
            .map(|password| ConnectionConfig {
                host: self.host.clone(),
                port: self.port,
                user: self.user.clone(),
                password: password.clone(),
                dbname: self.dbname.clone(),
                ..ConnectionConfig::default()
            })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    initialize_logging(&cli)?;

    info!("Starting citysearch importer v{}", env!("CARGO_PKG_VERSION"));

    let options = cli.run_options();
    let mut executor = match cli.connection_config() {
        Some(config) => Some(
            PostgresExecutor::connect(&config)
                .await
                .with_context(|| format!("failed to connect to {}", config))?,
        ),
        None => {
            info!("No password given; running without a database connection");
            None
        }
    };

    let report = pipeline::run(&options, executor.as_mut())
        .await
        .context("import failed")?;

    info!("Import completed: {}", report.summary());

    if let Some(path) = &cli.report {
        report
            .write_json(path)
            .await
            .with_context(|| format!("failed to write report to {}", path.display()))?;
        info!("Report written to {}", path.display());
    }

    Ok(())
}

/// Initialize logging based on CLI configuration
fn initialize_logging(cli: &Cli) -> Result<()> {
    let log_level = if let Some(level) = &cli.log_level {
        level.clone().into()
    } else if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };

    // RUST_LOG, when set, refines the level chosen on the command line
    let filter = EnvFilter::builder()
        .with_default_directive(LevelFilter::from_level(log_level).into())
        .from_env_lossy();

    if cli.json_logs {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_file(cli.verbose)
            .with_line_number(cli.verbose)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_file(cli.verbose)
            .with_line_number(cli.verbose)
            .init();
    }

    Ok(())
}
