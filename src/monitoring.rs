// Run report, warning ledger and progress reporting
use crate::error::ConvertError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Value warnings kept in the ledger per column; later ones are only counted
pub const MAX_VALUE_WARNINGS_PER_COLUMN: usize = 3;

/// How a dump run ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DumpOutcome {
    Completed,
    /// Interrupted between pages; the script holds everything written so far
    Cancelled,
}

/// A recovered problem recorded during the run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarningRecord {
    pub timestamp: DateTime<Utc>,
    /// Object or column the warning is about
    pub scope: String,
    pub message: String,
}

/// Data export results for a single table
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TableExportSummary {
    pub table: String,
    pub rows_expected: u64,
    pub rows_exported: u64,
    pub insert_statements: u64,
    pub pages_fetched: u64,
    pub blobs_externalized: u64,
    pub null_substitutions: u64,
    pub duration_ms: u64,
    /// Result of the post-export count check, when enabled
    pub verified: Option<bool>,
}

impl TableExportSummary {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Default::default()
        }
    }
}

/// Summary of one dump run, optionally written as JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DumpReport {
    pub source_path: PathBuf,
    pub output_path: PathBuf,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub duration_ms: Option<u64>,
    pub outcome: Option<DumpOutcome>,
    /// Table names in the order they were emitted
    pub table_order: Vec<String>,
    pub tables_created: usize,
    pub views_created: usize,
    pub triggers_created: usize,
    pub indexes_created: usize,
    pub foreign_keys_created: usize,
    pub tables: Vec<TableExportSummary>,
    pub warnings: Vec<WarningRecord>,
    /// Value warnings counted but not kept, keyed by `table.column`
    #[serde(default)]
    pub suppressed_warnings: BTreeMap<String, u64>,
}

impl DumpReport {
    pub fn new(source_path: impl Into<PathBuf>, output_path: impl Into<PathBuf>) -> Self {
        Self {
            source_path: source_path.into(),
            output_path: output_path.into(),
            started_at: Utc::now(),
            finished_at: None,
            duration_ms: None,
            outcome: None,
            table_order: Vec::new(),
            tables_created: 0,
            views_created: 0,
            triggers_created: 0,
            indexes_created: 0,
            foreign_keys_created: 0,
            tables: Vec::new(),
            warnings: Vec::new(),
            suppressed_warnings: BTreeMap::new(),
        }
    }

    /// Log a warning and keep it in the ledger
    pub fn record_warning(&mut self, scope: impl Into<String>, message: impl Into<String>) {
        let scope = scope.into();
        let message = message.into();
        warn!(scope = %scope, "{}", message);
        self.warnings.push(WarningRecord {
            timestamp: Utc::now(),
            scope,
            message,
        });
    }

    /// Record a recoverable error as a warning
    pub fn record_error(&mut self, scope: impl Into<String>, error: &ConvertError) {
        self.record_warning(scope, error.to_string());
    }

    /// Record a per-value problem. Only the first
    /// [`MAX_VALUE_WARNINGS_PER_COLUMN`] per scope are kept and logged at warn level.
    pub fn record_value_warning(&mut self, scope: impl Into<String>, error: &ConvertError) {
        let scope = scope.into();
        let kept = self.warnings.iter().filter(|w| w.scope == scope).count();
        if kept < MAX_VALUE_WARNINGS_PER_COLUMN {
            self.record_error(scope, error);
            return;
        }
        debug!(scope = %scope, "{}", error);
        *self.suppressed_warnings.entry(scope).or_insert(0) += 1;
    }

    /// Recorded plus suppressed warnings
    pub fn total_warnings(&self) -> u64 {
        self.warnings.len() as u64 + self.suppressed_warnings.values().sum::<u64>()
    }

    pub fn warnings_for(&self, scope: &str) -> Vec<&WarningRecord> {
        self.warnings.iter().filter(|w| w.scope == scope).collect()
    }

    pub fn total_rows_exported(&self) -> u64 {
        self.tables.iter().map(|t| t.rows_exported).sum()
    }

    pub fn total_insert_statements(&self) -> u64 {
        self.tables.iter().map(|t| t.insert_statements).sum()
    }

    pub fn finish(&mut self, outcome: DumpOutcome) {
        let finished_at = Utc::now();
        let duration = finished_at.signed_duration_since(self.started_at);
        self.duration_ms = Some(duration.num_milliseconds().max(0) as u64);
        self.finished_at = Some(finished_at);
        self.outcome = Some(outcome);

        info!(
            outcome = ?outcome,
            tables = self.tables_created,
            rows = self.total_rows_exported(),
            warnings = self.total_warnings(),
            "Dump finished"
        );
    }

    pub fn is_cancelled(&self) -> bool {
        self.outcome == Some(DumpOutcome::Cancelled)
    }

    /// Human readable summary for the end of a run
    pub fn summary(&self) -> String {
        let mut report = String::new();

        report.push_str("=== SQLite to MySQL Dump Report ===\n\n");
        report.push_str(&format!("Source: {}\n", self.source_path.display()));
        report.push_str(&format!("Output: {}\n", self.output_path.display()));

        let outcome = match self.outcome {
            Some(DumpOutcome::Completed) => "COMPLETED",
            Some(DumpOutcome::Cancelled) => "CANCELLED",
            None => "IN PROGRESS",
        };
        report.push_str(&format!("Outcome: {}\n", outcome));
        if let Some(duration_ms) = self.duration_ms {
            report.push_str(&format!("Duration: {:.2}s\n", duration_ms as f64 / 1000.0));
        }
        report.push('\n');

        report.push_str("Objects:\n");
        report.push_str(&format!("  Tables: {}\n", self.tables_created));
        report.push_str(&format!("  Views: {}\n", self.views_created));
        report.push_str(&format!("  Triggers: {}\n", self.triggers_created));
        report.push_str(&format!("  Indexes: {}\n", self.indexes_created));
        report.push_str(&format!("  Foreign keys: {}\n", self.foreign_keys_created));
        report.push('\n');

        if !self.tables.is_empty() {
            report.push_str("Data:\n");
            for table in &self.tables {
                report.push_str(&format!(
                    "  {}: {} rows in {} INSERT statements",
                    table.table, table.rows_exported, table.insert_statements
                ));
                if table.blobs_externalized > 0 {
                    report.push_str(&format!(", {} BLOB files", table.blobs_externalized));
                }
                if table.verified == Some(false) {
                    report.push_str(" (row count mismatch)");
                }
                report.push('\n');
            }
            report.push_str(&format!(
                "  Total: {} rows, {} INSERT statements\n\n",
                self.total_rows_exported(),
                self.total_insert_statements()
            ));
        }

        if !self.warnings.is_empty() {
            report.push_str(&format!("Warnings ({}):\n", self.total_warnings()));
            for (i, warning) in self.warnings.iter().enumerate() {
                report.push_str(&format!("  {}. [{}] {}\n", i + 1, warning.scope, warning.message));
            }
            for (scope, count) in &self.suppressed_warnings {
                report.push_str(&format!("  [{}] {} more similar warnings\n", scope, count));
            }
        }

        report
    }

    pub fn write_json(&self, path: &Path) -> Result<(), ConvertError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Progress information for long-running operations
#[derive(Debug, Clone)]
pub struct ProgressInfo {
    pub current_step: String,
    pub current_progress: u64,
    pub total_progress: u64,
    pub percentage: f64,
}

impl ProgressInfo {
    pub fn new(step: impl Into<String>, current: u64, total: u64) -> Self {
        let percentage = if total > 0 {
            (current as f64 / total as f64) * 100.0
        } else {
            100.0
        };
        Self {
            current_step: step.into(),
            current_progress: current,
            total_progress: total,
            percentage,
        }
    }
}

/// Progress callback trait for reporting progress
pub trait ProgressCallback: Send + Sync {
    fn on_progress(&self, progress: ProgressInfo);
}

/// Simple progress callback that logs progress
pub struct LoggingProgressCallback;

impl ProgressCallback for LoggingProgressCallback {
    fn on_progress(&self, progress: ProgressInfo) {
        info!(
            "Progress: {} - {:.1}% ({}/{})",
            progress.current_step,
            progress.percentage,
            progress.current_progress,
            progress.total_progress
        );
    }
}
