use crate::error::{ConvertError, ConvertResult};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Which parts of the database end up in the script
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ExportMode {
    Structure,
    Data,
    Both,
}

impl ExportMode {
    pub fn includes_structure(self) -> bool {
        matches!(self, ExportMode::Structure | ExportMode::Both)
    }

    pub fn includes_data(self) -> bool {
        matches!(self, ExportMode::Data | ExportMode::Both)
    }
}

/// Target storage engine
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageEngine {
    #[value(name = "InnoDB")]
    InnoDb,
    #[value(name = "MyISAM")]
    MyIsam,
    #[value(name = "MEMORY")]
    Memory,
}

impl StorageEngine {
    pub fn as_str(self) -> &'static str {
        match self {
            StorageEngine::InnoDb => "InnoDB",
            StorageEngine::MyIsam => "MyISAM",
            StorageEngine::Memory => "MEMORY",
        }
    }

    /// FULLTEXT support: MyISAM always, InnoDB from 8.x on, MEMORY never.
    pub fn supports_fulltext(self, mysql_version: &str) -> bool {
        match self {
            StorageEngine::MyIsam => true,
            StorageEngine::InnoDb => !mysql_version.trim().starts_with('5'),
            StorageEngine::Memory => false,
        }
    }
}

/// Target character set
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Charset {
    #[value(name = "utf8mb4")]
    Utf8mb4,
    #[value(name = "utf8")]
    Utf8,
    #[value(name = "latin1")]
    Latin1,
}

impl Charset {
    pub fn as_str(self) -> &'static str {
        match self {
            Charset::Utf8mb4 => "utf8mb4",
            Charset::Utf8 => "utf8",
            Charset::Latin1 => "latin1",
        }
    }

    pub fn default_collation(self) -> Collation {
        match self {
            Charset::Utf8mb4 => Collation::Utf8mb4UnicodeCi,
            Charset::Utf8 => Collation::Utf8GeneralCi,
            Charset::Latin1 => Collation::Latin1SwedishCi,
        }
    }
}

/// Target collation
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Collation {
    #[value(name = "utf8mb4_unicode_ci")]
    Utf8mb4UnicodeCi,
    #[value(name = "utf8_general_ci")]
    Utf8GeneralCi,
    #[value(name = "latin1_swedish_ci")]
    Latin1SwedishCi,
}

impl Collation {
    pub fn as_str(self) -> &'static str {
        match self {
            Collation::Utf8mb4UnicodeCi => "utf8mb4_unicode_ci",
            Collation::Utf8GeneralCi => "utf8_general_ci",
            Collation::Latin1SwedishCi => "latin1_swedish_ci",
        }
    }

    pub fn charset(self) -> Charset {
        match self {
            Collation::Utf8mb4UnicodeCi => Charset::Utf8mb4,
            Collation::Utf8GeneralCi => Charset::Utf8,
            Collation::Latin1SwedishCi => Charset::Latin1,
        }
    }
}

/// Everything the dump writer needs to know about one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DumpConfig {
    /// SQLite database to read
    pub source_path: PathBuf,
    /// Script to write
    pub output_path: PathBuf,
    /// Emit DROP ... IF EXISTS before each object
    pub drop_table: bool,
    pub export_mode: ExportMode,
    pub engine: StorageEngine,
    pub charset: Charset,
    pub collation: Collation,
    /// Rows fetched per page
    pub batch_size: usize,
    /// Rows per multi-row INSERT statement
    pub insert_chunk_size: usize,
    /// gzip the script
    pub compress: bool,
    /// Largest BLOB written inline, in bytes
    pub max_blob_size: usize,
    /// Directory for BLOBs over `max_blob_size`
    pub blob_dir: Option<PathBuf>,
    /// Reference externalized BLOBs relative to the script directory
    pub relative_blob_paths: bool,
    pub fulltext: bool,
    /// Raw partitioning clause appended to CREATE TABLE
    pub partition: Option<String>,
    pub tablespace: Option<String>,
    pub mysql_version: String,
    /// Re-count rows after each table export
    pub verify_data: bool,
}

impl DumpConfig {
    pub const DEFAULT_BATCH_SIZE: usize = 1000;
    pub const DEFAULT_INSERT_CHUNK_SIZE: usize = 100;
    pub const DEFAULT_MAX_BLOB_SIZE: usize = 1_048_576;

    /// Create a configuration with defaults for everything but the paths
    pub fn new(source_path: impl Into<PathBuf>) -> Self {
        let source_path = source_path.into();
        let output_path = default_output_path(&source_path, false);
        Self {
            source_path,
            output_path,
            drop_table: true,
            export_mode: ExportMode::Both,
            engine: StorageEngine::InnoDb,
            charset: Charset::Utf8mb4,
            collation: Collation::Utf8mb4UnicodeCi,
            batch_size: Self::DEFAULT_BATCH_SIZE,
            insert_chunk_size: Self::DEFAULT_INSERT_CHUNK_SIZE,
            compress: false,
            max_blob_size: Self::DEFAULT_MAX_BLOB_SIZE,
            blob_dir: None,
            relative_blob_paths: false,
            fulltext: false,
            partition: None,
            tablespace: None,
            mysql_version: "8.0".to_string(),
            verify_data: false,
        }
    }

    pub fn with_output(mut self, output_path: impl Into<PathBuf>) -> Self {
        self.output_path = output_path.into();
        self
    }

    /// Reject configurations that cannot produce a usable script
    pub fn validate(&self) -> ConvertResult<()> {
        if !self.source_path.is_file() {
            return Err(ConvertError::setup(format!(
                "SQLite database file does not exist: {}",
                self.source_path.display()
            )));
        }

        if self.collation.charset() != self.charset {
            return Err(ConvertError::setup(format!(
                "Collation {} does not belong to charset {}",
                self.collation.as_str(),
                self.charset.as_str()
            )));
        }

        if !is_valid_version(&self.mysql_version) {
            return Err(ConvertError::setup(format!(
                "Invalid MySQL version '{}', expected a form like 5.7 or 8.0",
                self.mysql_version
            )));
        }

        if self.fulltext && !self.engine.supports_fulltext(&self.mysql_version) {
            return Err(ConvertError::setup(format!(
                "FULLTEXT indexes are not supported by engine {} on MySQL {}",
                self.engine.as_str(),
                self.mysql_version
            )));
        }

        if self.batch_size == 0 {
            return Err(ConvertError::setup("Batch size must be greater than zero"));
        }

        if self.insert_chunk_size == 0 {
            return Err(ConvertError::setup("INSERT chunk size must be greater than zero"));
        }

        if let Some(tablespace) = &self.tablespace {
            if tablespace.trim().is_empty() {
                return Err(ConvertError::setup("Tablespace name must not be empty"));
            }
        }

        self.check_output_target()
    }

    /// Reject an output path that would overwrite the source database or
    /// collide with the BLOB directory
    pub fn check_output_target(&self) -> ConvertResult<()> {
        let output = resolve_path(&self.output_path);
        if output == resolve_path(&self.source_path) {
            return Err(ConvertError::setup(format!(
                "Output path {} is the source database",
                self.output_path.display()
            )));
        }

        if output.is_dir() {
            return Err(ConvertError::setup(format!(
                "Output path {} is a directory",
                self.output_path.display()
            )));
        }

        if let Some(blob_dir) = &self.blob_dir {
            let blob_dir = resolve_path(blob_dir);
            if output == blob_dir {
                return Err(ConvertError::setup(format!(
                    "Output path {} is the BLOB directory",
                    self.output_path.display()
                )));
            }
            if blob_dir == resolve_path(&self.source_path) {
                return Err(ConvertError::setup(format!(
                    "BLOB directory {} is the source database",
                    blob_dir.display()
                )));
            }
        }

        Ok(())
    }
}

/// Canonical form of a path that may not exist yet: the existing file itself,
/// else the canonical parent joined with the file name
fn resolve_path(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    match (parent.canonicalize(), path.file_name()) {
        (Ok(parent), Some(name)) => parent.join(name),
        _ => path.to_path_buf(),
    }
}

/// `<dir>/<stem>_mysql.sql`, with `.gz` appended when compressing
pub fn default_output_path(source_path: &Path, compress: bool) -> PathBuf {
    let stem = source_path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "dump".to_string());
    let mut file_name = format!("{}_mysql.sql", stem);
    if compress {
        file_name.push_str(".gz");
    }
    source_path.with_file_name(file_name)
}

fn is_valid_version(version: &str) -> bool {
    let mut parts = version.trim().split('.');
    let major_ok = parts
        .next()
        .map(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
        .unwrap_or(false);
    major_ok && parts.all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()))
}
