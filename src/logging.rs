//! Logging setup: a stderr layer plus an optional size-rotated log file.

use clap::ValueEnum;
use file_rotate::compression::Compression;
use file_rotate::suffix::AppendCount;
use file_rotate::{ContentLimit, FileRotate};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    filter::LevelFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt, Layer, Registry,
};

pub const LOG_FILE_NAME: &str = "sqlite2mysql.log";
pub const LOG_BACKUP_COUNT: usize = 5;
pub const DEFAULT_ROTATE_SIZE: u64 = 10 * 1024 * 1024;

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogLevel {
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

/// Logging options gathered from the command line
#[derive(Debug, Clone)]
pub struct LoggingOptions {
    pub level: Level,
    pub json: bool,
    /// Include thread ids, file and line in console output
    pub verbose: bool,
    /// Log file path; `None` disables file logging
    pub log_file: Option<PathBuf>,
    /// Rotate the log file once it would exceed this many bytes; 0 never rotates
    pub rotate_size: u64,
}

impl Default for LoggingOptions {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            json: false,
            verbose: false,
            log_file: Some(PathBuf::from(LOG_FILE_NAME)),
            rotate_size: DEFAULT_ROTATE_SIZE,
        }
    }
}

/// Initialize the global subscriber.
///
/// The returned guard flushes the file writer when dropped and must be held
/// until the program exits.
pub fn init_logging(options: &LoggingOptions) -> anyhow::Result<Option<WorkerGuard>> {
    let level_filter = LevelFilter::from_level(options.level);
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    let console_layer = fmt::layer()
        .with_writer(io::stderr)
        .with_target(false)
        .with_thread_ids(options.verbose)
        .with_file(options.verbose)
        .with_line_number(options.verbose);
    if options.json {
        layers.push(console_layer.json().with_filter(level_filter).boxed());
    } else {
        layers.push(console_layer.with_filter(level_filter).boxed());
    }

    let mut guard = None;
    if let Some(path) = &options.log_file {
        let writer = open_log_file(path, options.rotate_size)?;
        let (non_blocking, worker_guard) = tracing_appender::non_blocking(writer);
        guard = Some(worker_guard);

        let file_layer = fmt::layer()
            .with_writer(non_blocking)
            .with_ansi(false)
            .with_target(true)
            .with_filter(level_filter)
            .boxed();
        layers.push(file_layer);
    }

    tracing_subscriber::registry()
        .with(layers)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    Ok(guard)
}

/// Open `path` for appending, rolled to `path.1 .. path.N` past `rotate_size` bytes
pub fn open_log_file(path: &Path, rotate_size: u64) -> io::Result<FileRotate<AppendCount>> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    let limit = match usize::try_from(rotate_size) {
        Ok(0) => ContentLimit::None,
        Ok(bytes) => ContentLimit::Bytes(bytes),
        Err(_) => ContentLimit::None,
    };
    Ok(FileRotate::new(
        path,
        AppendCount::new(LOG_BACKUP_COUNT),
        limit,
        Compression::None,
        #[cfg(unix)]
        None,
    ))
}
