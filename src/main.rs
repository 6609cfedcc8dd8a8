use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn, Level};

use sqlite2mysql::config::{default_output_path, Charset, Collation, DumpConfig, ExportMode, StorageEngine};
use sqlite2mysql::logging::{init_logging, LogLevel, LoggingOptions, DEFAULT_ROTATE_SIZE, LOG_FILE_NAME};
use sqlite2mysql::monitoring::DumpReport;
use sqlite2mysql::run_dump;

#[derive(Parser)]
#[command(name = "sqlite2mysql")]
#[command(about = "Convert a SQLite database into a MySQL-compatible SQL dump")]
#[command(version)]
#[command(long_about = "sqlite2mysql reads a SQLite database file and writes a single SQL script that recreates its tables, indexes, foreign keys, views, triggers and rows on MySQL. Tables are emitted in dependency order inside one transaction with foreign key checks disabled.")]
#[command(after_help = "EXAMPLES:
    # Dump structure and data next to the source file
    sqlite2mysql app.db

    # Compressed dump with large BLOBs written to a directory
    sqlite2mysql app.db --compress --blob-dir blobs --relative-blob-paths

    # Schema only, MyISAM with FULLTEXT indexes
    sqlite2mysql app.db --export-mode structure --engine MyISAM --fulltext")]
struct Cli {
    /// Path to the SQLite database file
    #[arg(value_name = "FILE")]
    input: PathBuf,

    /// Output script path (default: <input stem>_mysql.sql, .gz appended with --compress)
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Do not emit DROP statements before CREATE
    #[arg(long)]
    no_drop: bool,

    /// Which parts of the database to export
    #[arg(long, value_enum, default_value = "both")]
    export_mode: ExportMode,

    /// MySQL storage engine for created tables
    #[arg(long, value_enum, default_value = "InnoDB")]
    engine: StorageEngine,

    /// Table character set
    #[arg(long, value_enum, default_value = "utf8mb4")]
    charset: Charset,

    /// Table collation (default: the charset's default collation)
    #[arg(long, value_enum)]
    collate: Option<Collation>,

    /// Rows fetched from SQLite per page
    #[arg(long, default_value_t = DumpConfig::DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Rows per INSERT statement
    #[arg(long, default_value_t = DumpConfig::DEFAULT_INSERT_CHUNK_SIZE)]
    insert_chunk_size: usize,

    /// Gzip the output script
    #[arg(long)]
    compress: bool,

    /// Largest BLOB in bytes written inline
    #[arg(long, default_value_t = DumpConfig::DEFAULT_MAX_BLOB_SIZE)]
    max_blob_size: usize,

    /// Directory for BLOBs over --max-blob-size
    #[arg(long, value_name = "DIR")]
    blob_dir: Option<PathBuf>,

    /// Reference external BLOBs relative to the output script directory
    #[arg(long)]
    relative_blob_paths: bool,

    /// Add a FULLTEXT index over the text columns of each table
    #[arg(long)]
    fulltext: bool,

    /// Partition clause appended to every CREATE TABLE
    #[arg(long, value_name = "CLAUSE")]
    partition: Option<String>,

    /// Tablespace for created tables
    #[arg(long, value_name = "NAME")]
    tablespace: Option<String>,

    /// Target MySQL version
    #[arg(long, default_value = "8.0")]
    mysql_version: String,

    /// Re-count source rows after each table and warn on mismatch
    #[arg(long)]
    verify_data: bool,

    /// Rotate the log file after this many bytes
    #[arg(long, default_value_t = DEFAULT_ROTATE_SIZE)]
    log_rotate_size: u64,

    /// Do not write the log file
    #[arg(long)]
    no_log_file: bool,

    /// Set log level explicitly
    #[arg(long, value_enum)]
    log_level: Option<LogLevel>,

    /// Enable verbose logging (debug level)
    #[arg(short, long)]
    verbose: bool,

    /// Output logs in JSON format
    #[arg(long)]
    json_logs: bool,

    /// Write the run report as JSON
    #[arg(long, value_name = "FILE")]
    report: Option<PathBuf>,
}

impl Cli {
    fn logging_options(&self) -> LoggingOptions {
        let level = if let Some(level) = self.log_level {
            level.into()
        } else if self.verbose {
            Level::DEBUG
        } else {
            Level::INFO
        };

        LoggingOptions {
            level,
            json: self.json_logs,
            verbose: self.verbose,
            log_file: (!self.no_log_file).then(|| PathBuf::from(LOG_FILE_NAME)),
            rotate_size: self.log_rotate_size,
        }
    }

    fn dump_config(&self) -> DumpConfig {
        let output_path = self
            .output
            .clone()
            .unwrap_or_else(|| default_output_path(&self.input, self.compress));

        let mut config = DumpConfig::new(&self.input).with_output(output_path);
        config.drop_table = !self.no_drop;
        config.export_mode = self.export_mode;
        config.engine = self.engine;
        config.charset = self.charset;
        config.collation = self.collate.unwrap_or_else(|| self.charset.default_collation());
        config.batch_size = self.batch_size;
        config.insert_chunk_size = self.insert_chunk_size;
        config.compress = self.compress;
        config.max_blob_size = self.max_blob_size;
        config.blob_dir = self.blob_dir.clone();
        config.relative_blob_paths = self.relative_blob_paths;
        config.fulltext = self.fulltext;
        config.partition = self.partition.clone();
        config.tablespace = self.tablespace.clone();
        config.mysql_version = self.mysql_version.clone();
        config.verify_data = self.verify_data;
        config
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let guard = match init_logging(&cli.logging_options()) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("{:#}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("Starting sqlite2mysql v{}", env!("CARGO_PKG_VERSION"));

    let code = match execute_dump(&cli).await {
        Ok(report) => {
            println!("{}", report.summary());
            ExitCode::SUCCESS
        }
        Err(e) => {
            error!("Dump failed: {:#}", e);
            eprintln!("Dump failed: {:#}", e);
            ExitCode::FAILURE
        }
    };

    // Flush the file writer before exiting
    drop(guard);
    code
}

/// Validate the configuration, then run the dump on the blocking pool
async fn execute_dump(cli: &Cli) -> Result<DumpReport> {
    let config = cli.dump_config();
    config.validate().context("Invalid configuration")?;
    info!(
        "Configuration: mode={:?}, engine={}, charset={}, collation={}, batch_size={}, insert_chunk_size={}, compress={}",
        config.export_mode,
        config.engine.as_str(),
        config.charset.as_str(),
        config.collation.as_str(),
        config.batch_size,
        config.insert_chunk_size,
        config.compress
    );

    let cancel = setup_signal_handler();
    let worker_config = config.clone();
    let report = tokio::task::spawn_blocking(move || run_dump(&worker_config, cancel))
        .await
        .context("Dump task terminated unexpectedly")??;

    if report.is_cancelled() {
        warn!("Dump was cancelled; {} is incomplete", config.output_path.display());
    } else {
        info!("Dump written to {}", config.output_path.display());
    }

    if let Some(path) = &cli.report {
        report.write_json(path)?;
        info!("Run report written to {}", path.display());
    }

    Ok(report)
}

/// Returns a token that is cancelled on Ctrl-C
fn setup_signal_handler() -> CancellationToken {
    let cancel_token = CancellationToken::new();
    let token = cancel_token.clone();

    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl-C: {}", e);
            return;
        }
        eprintln!("\nReceived Ctrl-C. Finishing the current page and stopping...");
        token.cancel();
    });

    cancel_token
}
