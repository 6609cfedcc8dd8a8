use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the conversion engine
#[derive(Error, Debug)]
pub enum ConvertError {
    /// Bad input path, invalid option or unopenable output. Aborts before any output.
    #[error("Setup error: {message}")]
    Setup { message: String },

    #[error("Could not calculate statistics for {table}.{column}: {message}")]
    StatisticsProbe {
        table: String,
        column: String,
        message: String,
    },

    #[error("Error processing value for {table}.{column}: {message}")]
    ValueEncoding {
        table: String,
        column: String,
        message: String,
    },

    #[error("Error writing BLOB file {}: {source}", path.display())]
    BlobWrite {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Cyclic dependencies detected between tables [{}]; tables may need manual reordering in the SQL file", tables.join(", "))]
    DependencyCycle { tables: Vec<String> },

    /// The destination stream failed. Partial output is unusable.
    #[error("Output write error: {0}")]
    Output(#[source] std::io::Error),

    #[error("Source database error: {0}")]
    Source(#[from] rusqlite::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type ConvertResult<T> = Result<T, ConvertError>;

impl ConvertError {
    pub fn setup(message: impl Into<String>) -> Self {
        Self::Setup { message: message.into() }
    }

    pub fn statistics_probe(
        table: impl Into<String>,
        column: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::StatisticsProbe {
            table: table.into(),
            column: column.into(),
            message: message.into(),
        }
    }

    pub fn value_encoding(
        table: impl Into<String>,
        column: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::ValueEncoding {
            table: table.into(),
            column: column.into(),
            message: message.into(),
        }
    }

    /// Whether this error ends the run. Everything else is logged and degraded.
    pub fn is_fatal(&self) -> bool {
        !matches!(
            self,
            Self::StatisticsProbe { .. }
                | Self::ValueEncoding { .. }
                | Self::BlobWrite { .. }
                | Self::DependencyCycle { .. }
        )
    }
}
