use super::output::OutputSink;
use crate::catalog_reader::{CatalogSnapshot, CatalogSource, SchemaIntrospector, SqliteSource};
use crate::config::DumpConfig;
use crate::data_exporter::{render_tuple, BlobExternalizer, InsertBuffer, ValueContext, ValueEncoder};
use crate::error::{ConvertError, ConvertResult};
use crate::monitoring::{
    DumpOutcome, DumpReport, LoggingProgressCallback, ProgressCallback, ProgressInfo,
    TableExportSummary,
};
use crate::schema_converter::identifiers::quote_identifier;
use crate::schema_converter::{
    build_dump_items, ConstraintGenerator, DdlGenerator, DdlOutput, IndexConfig, IndexGenerator,
    ObjectRewriter, TableOptions,
};
use crate::types::{DumpItem, ObjectKind, TableDescriptor};
use chrono::Local;
use std::io::Write;
use std::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const TOOL_NAME: &str = concat!("sqlite2mysql ", env!("CARGO_PKG_VERSION"));

fn emit<W: Write>(out: &mut W, text: &str) -> ConvertResult<()> {
    out.write_all(text.as_bytes()).map_err(ConvertError::Output)
}

/// Orchestrates one dump: ordering, structure, data and the transaction envelope
pub struct DumpWriter<'a, S: CatalogSource> {
    source: &'a S,
    config: &'a DumpConfig,
    cancel: CancellationToken,
    encoder: ValueEncoder,
    ddl: DdlGenerator,
    indexes: IndexGenerator,
    constraints: ConstraintGenerator,
    rewriter: ObjectRewriter,
    progress_callback: Option<Box<dyn ProgressCallback>>,
}

impl<'a, S: CatalogSource> DumpWriter<'a, S> {
    /// Fails when the BLOB directory cannot be prepared
    pub fn new(source: &'a S, config: &'a DumpConfig, cancel: CancellationToken) -> ConvertResult<Self> {
        let externalizer = config
            .blob_dir
            .as_deref()
            .map(|dir| BlobExternalizer::new(dir, &config.output_path, config.relative_blob_paths))
            .transpose()?;

        Ok(Self {
            source,
            config,
            cancel,
            encoder: ValueEncoder::new(config.max_blob_size, externalizer),
            ddl: DdlGenerator::new(TableOptions::from_config(config)),
            indexes: IndexGenerator::new(IndexConfig::from_config(config)),
            constraints: ConstraintGenerator::new(),
            rewriter: ObjectRewriter::new(config.drop_table),
            progress_callback: None,
        })
    }

    /// Set a progress callback for long-running table exports
    pub fn with_progress_callback(mut self, callback: Box<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Write the whole script to `out`. Cancellation is an outcome, not an error.
    pub fn write_dump<W: Write>(&self, out: &mut W, report: &mut DumpReport) -> ConvertResult<DumpOutcome> {
        let snapshot = SchemaIntrospector::new(self.source)
            .with_statistics(self.config.export_mode.includes_structure())
            .introspect(report)?;
        let items = build_dump_items(&snapshot.objects, &snapshot.foreign_key_map(), report);
        report.table_order = items
            .iter()
            .filter(|i| i.kind == ObjectKind::Table)
            .map(|i| i.name.clone())
            .collect();

        info!(items = items.len(), "Found items (tables, views, triggers) to export");
        self.write_header(out)?;

        let mut outcome = DumpOutcome::Completed;
        for item in &items {
            if self.cancel.is_cancelled() {
                outcome = DumpOutcome::Cancelled;
                break;
            }
            debug!(rank = item.rank, kind = %item.kind, name = %item.name, "Processing item");
            if self.write_item(item, &snapshot, out, report)? == DumpOutcome::Cancelled {
                outcome = DumpOutcome::Cancelled;
                break;
            }
        }

        match outcome {
            DumpOutcome::Completed => {
                emit(out, "\nCOMMIT;\nSET FOREIGN_KEY_CHECKS = 1;\n")?;
            }
            DumpOutcome::Cancelled => {
                warn!("Dump cancelled; script is incomplete");
                emit(
                    out,
                    "\n-- Dump cancelled before completion; the transaction was left open and the script is incomplete.\n",
                )?;
            }
        }
        out.flush().map_err(ConvertError::Output)?;
        Ok(outcome)
    }

    fn write_header<W: Write>(&self, out: &mut W) -> ConvertResult<()> {
        let header = format!(
            "-- SQL Dump generated by {}\n-- Source DB: {}\n-- Generated on: {}\n\n\
             SET FOREIGN_KEY_CHECKS = 0;\nSET NAMES {};\nSTART TRANSACTION;\n",
            TOOL_NAME,
            self.config.source_path.display(),
            Local::now().format("%Y-%m-%d %H:%M:%S"),
            self.config.charset.as_str()
        );
        emit(out, &header)
    }

    fn write_item<W: Write>(
        &self,
        item: &DumpItem,
        snapshot: &CatalogSnapshot,
        out: &mut W,
        report: &mut DumpReport,
    ) -> ConvertResult<DumpOutcome> {
        let structure = self.config.export_mode.includes_structure();
        match item.kind {
            ObjectKind::View if structure => {
                let output = self.rewriter.rewrite_view(&item.name, &item.sql);
                self.write_section(out, report, &item.name, &format!("View: {}", quote_identifier(&item.name)), output)?;
                report.views_created += 1;
            }
            ObjectKind::Trigger if structure => {
                let output = self.rewriter.rewrite_trigger(&item.name, &item.sql);
                self.write_section(out, report, &item.name, &format!("Trigger: {}", quote_identifier(&item.name)), output)?;
                report.triggers_created += 1;
            }
            ObjectKind::Table => {
                let Some(table) = snapshot.table(&item.name) else {
                    return Ok(DumpOutcome::Completed);
                };
                if structure {
                    self.write_table_structure(table, out, report)?;
                }
                if self.config.export_mode.includes_data() {
                    return self.write_table_data(table, out, report);
                }
            }
            _ => {}
        }
        Ok(DumpOutcome::Completed)
    }

    fn write_section<W: Write>(
        &self,
        out: &mut W,
        report: &mut DumpReport,
        scope: &str,
        title: &str,
        output: DdlOutput,
    ) -> ConvertResult<()> {
        for warning in &output.warnings {
            report.record_warning(scope, warning.as_str());
        }
        let mut text = format!("\n-- {}\n", title);
        for statement in &output.statements {
            text.push_str(statement);
            text.push('\n');
        }
        emit(out, &text)
    }

    fn write_table_structure<W: Write>(
        &self,
        table: &TableDescriptor,
        out: &mut W,
        report: &mut DumpReport,
    ) -> ConvertResult<()> {
        let mut output = self.ddl.generate_table(table);

        let indexes = self.indexes.generate_indexes(table);
        report.indexes_created += indexes.statements.len();
        output.extend(indexes);

        let constraints = self.constraints.generate_constraints(table);
        report.foreign_keys_created += constraints.statements.len();
        output.extend(constraints);

        self.write_section(
            out,
            report,
            &table.name,
            &format!("Table structure for {}", quote_identifier(&table.name)),
            output,
        )?;
        report.tables_created += 1;
        Ok(())
    }

    /// Page through the table, writing INSERTs of `insert_chunk_size` rows.
    /// Polls the cancellation token before each page.
    fn write_table_data<W: Write>(
        &self,
        table: &TableDescriptor,
        out: &mut W,
        report: &mut DumpReport,
    ) -> ConvertResult<DumpOutcome> {
        let total = self.source.count_rows(&table.name)?;
        if total == 0 {
            debug!(table = %table.name, "Skipping empty table");
            return Ok(DumpOutcome::Completed);
        }

        let started = Instant::now();
        let columns: Vec<String> = table.columns.iter().map(|c| c.name.clone()).collect();
        let mut summary = TableExportSummary::new(&table.name);
        summary.rows_expected = total;
        let mut buffer = InsertBuffer::new(&table.name, columns.clone(), self.config.insert_chunk_size);
        let mut outcome = DumpOutcome::Completed;

        emit(out, &format!("\n-- Data for table {}\n", quote_identifier(&table.name)))?;

        let mut offset = 0u64;
        while offset < total {
            if self.cancel.is_cancelled() {
                outcome = DumpOutcome::Cancelled;
                break;
            }

            let rows = self
                .source
                .fetch_rows(&table.name, &columns, self.config.batch_size, offset)?;
            summary.pages_fetched += 1;
            if rows.is_empty() {
                break;
            }

            for (row_index, row) in rows.iter().enumerate() {
                let row_offset = offset + row_index as u64;
                let mut values = Vec::with_capacity(row.len());
                for (column_index, value) in row.iter().enumerate() {
                    let column = columns.get(column_index).map(String::as_str).unwrap_or_default();
                    let encoded = self.encoder.encode(
                        value,
                        &ValueContext {
                            table: &table.name,
                            column,
                            row_offset,
                            column_index,
                        },
                    );
                    if let Some(warning) = &encoded.warning {
                        summary.null_substitutions += 1;
                        report.record_value_warning(format!("{}.{}", table.name, column), warning);
                    }
                    if encoded.externalized {
                        summary.blobs_externalized += 1;
                    }
                    values.push(encoded.sql);
                }
                buffer
                    .push(render_tuple(&values), out)
                    .map_err(ConvertError::Output)?;
            }

            offset += rows.len() as u64;
            self.report_progress(&table.name, offset.min(total), total);
        }

        buffer.flush(out).map_err(ConvertError::Output)?;
        summary.rows_exported = buffer.rows_written();
        summary.insert_statements = buffer.statements_written();
        summary.duration_ms = started.elapsed().as_millis() as u64;

        if self.config.verify_data && outcome == DumpOutcome::Completed {
            let actual = self.source.count_rows(&table.name)?;
            let matches = actual == summary.rows_exported;
            summary.verified = Some(matches);
            if !matches {
                report.record_warning(
                    table.name.as_str(),
                    format!(
                        "Row count mismatch for {}: source has {}, exported {}",
                        table.name, actual, summary.rows_exported
                    ),
                );
            }
        }

        info!(
            table = %table.name,
            rows = summary.rows_exported,
            statements = summary.insert_statements,
            "Exported table data"
        );
        report.tables.push(summary);
        Ok(outcome)
    }

    fn report_progress(&self, step: &str, current: u64, total: u64) {
        if let Some(callback) = &self.progress_callback {
            callback.on_progress(ProgressInfo::new(step, current, total));
        }
    }
}

/// Run a complete dump for `config`, writing the script to `config.output_path`
pub fn run_dump(config: &DumpConfig, cancel: CancellationToken) -> ConvertResult<DumpReport> {
    info!(
        source = %config.source_path.display(),
        output = %config.output_path.display(),
        mode = ?config.export_mode,
        "Starting SQLite to MySQL dump"
    );

    config.check_output_target()?;
    let source = SqliteSource::open(&config.source_path)?;
    let mut sink = OutputSink::create(&config.output_path, config.compress)?;
    let mut report = DumpReport::new(&config.source_path, &config.output_path);

    let writer = DumpWriter::new(&source, config, cancel)?
        .with_progress_callback(Box::new(LoggingProgressCallback));
    let outcome = writer.write_dump(&mut sink, &mut report)?;
    sink.finish()?;

    report.finish(outcome);
    Ok(report)
}
