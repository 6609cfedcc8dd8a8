use super::*;
use crate::catalog_reader::{CatalogSource, RawColumn, RawForeignKey, SqliteSource};
use crate::config::{DumpConfig, ExportMode};
use crate::error::ConvertResult;
use crate::monitoring::{DumpOutcome, DumpReport};
use crate::types::{CatalogObject, IndexDescriptor};
use rusqlite::types::Value;
use rusqlite::Connection;
use std::cell::Cell;
use tokio_util::sync::CancellationToken;

fn source_with(schema: &str) -> SqliteSource {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(schema).unwrap();
    SqliteSource::from_connection(conn).unwrap()
}

fn config() -> DumpConfig {
    DumpConfig::new("fixture.db").with_output("fixture_mysql.sql")
}

fn dump_with<S: CatalogSource>(
    source: &S,
    config: &DumpConfig,
    cancel: CancellationToken,
) -> (String, DumpReport, DumpOutcome) {
    let mut report = DumpReport::new(&config.source_path, &config.output_path);
    let mut out = Vec::new();
    let writer = DumpWriter::new(source, config, cancel).unwrap();
    let outcome = writer.write_dump(&mut out, &mut report).unwrap();
    (String::from_utf8(out).unwrap(), report, outcome)
}

fn dump(source: &SqliteSource, config: &DumpConfig) -> (String, DumpReport, DumpOutcome) {
    dump_with(source, config, CancellationToken::new())
}

fn position(script: &str, needle: &str) -> usize {
    script
        .find(needle)
        .unwrap_or_else(|| panic!("missing `{}` in script:\n{}", needle, script))
}

/// Delegates to SQLite, counting pages and optionally cancelling after the first one
struct ObservedSource {
    inner: SqliteSource,
    fetches: Cell<usize>,
    cancel_after_first_page: Option<CancellationToken>,
}

impl ObservedSource {
    fn new(inner: SqliteSource) -> Self {
        Self {
            inner,
            fetches: Cell::new(0),
            cancel_after_first_page: None,
        }
    }
}

impl CatalogSource for ObservedSource {
    fn list_objects(&self) -> ConvertResult<Vec<CatalogObject>> {
        self.inner.list_objects()
    }

    fn table_columns(&self, table: &str) -> ConvertResult<Vec<RawColumn>> {
        self.inner.table_columns(table)
    }

    fn table_indexes(&self, table: &str) -> ConvertResult<Vec<IndexDescriptor>> {
        self.inner.table_indexes(table)
    }

    fn foreign_keys(&self, table: &str) -> ConvertResult<Vec<RawForeignKey>> {
        self.inner.foreign_keys(table)
    }

    fn max_text_length(&self, table: &str, column: &str) -> ConvertResult<u64> {
        self.inner.max_text_length(table, column)
    }

    fn max_integer_magnitude(&self, table: &str, column: &str) -> ConvertResult<u64> {
        self.inner.max_integer_magnitude(table, column)
    }

    fn count_rows(&self, table: &str) -> ConvertResult<u64> {
        self.inner.count_rows(table)
    }

    fn fetch_rows(
        &self,
        table: &str,
        columns: &[String],
        limit: usize,
        offset: u64,
    ) -> ConvertResult<Vec<Vec<Value>>> {
        self.fetches.set(self.fetches.get() + 1);
        if let Some(token) = &self.cancel_after_first_page {
            token.cancel();
        }
        self.inner.fetch_rows(table, columns, limit, offset)
    }
}

fn numbered_rows(rows: usize) -> SqliteSource {
    source_with(&format!(
        "CREATE TABLE n (id INTEGER PRIMARY KEY, label TEXT);
         WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c WHERE x < {})
         INSERT INTO n SELECT x, 'row ' || x FROM c;",
        rows
    ))
}

#[cfg(test)]
mod envelope_tests {
    use super::*;

    /// Test that the script opens and closes the transaction envelope
    #[test]
    fn test_envelope_lines() {
        let source = source_with("CREATE TABLE t (id INTEGER PRIMARY KEY); INSERT INTO t VALUES (1);");
        let (script, report, outcome) = dump(&source, &config());

        assert_eq!(outcome, DumpOutcome::Completed);
        assert!(script.starts_with("-- SQL Dump generated by sqlite2mysql"));
        assert!(script.contains("-- Source DB: fixture.db"));
        assert!(script.contains("-- Generated on: "));

        let fk_off = position(&script, "SET FOREIGN_KEY_CHECKS = 0;");
        let names = position(&script, "SET NAMES utf8mb4;");
        let begin = position(&script, "START TRANSACTION;");
        let create = position(&script, "CREATE TABLE `t`");
        let commit = position(&script, "COMMIT;");
        assert!(fk_off < names && names < begin && begin < create && create < commit);
        assert!(script.trim_end().ends_with("SET FOREIGN_KEY_CHECKS = 1;"));
        assert_eq!(report.tables_created, 1);
    }

    /// Test that the configured charset is used for SET NAMES
    #[test]
    fn test_set_names_follows_charset() {
        let source = source_with("CREATE TABLE t (id INTEGER PRIMARY KEY);");
        let mut config = config();
        config.charset = crate::config::Charset::Latin1;
        config.collation = crate::config::Collation::Latin1SwedishCi;
        let (script, _, _) = dump(&source, &config);
        assert!(script.contains("SET NAMES latin1;"));
    }
}

#[cfg(test)]
mod ordering_tests {
    use super::*;

    /// Test that a referenced table is created before the table that references it
    #[test]
    fn test_parent_created_before_child() {
        let source = source_with(
            "CREATE TABLE child (id INTEGER PRIMARY KEY, parent_id INTEGER REFERENCES parent(id));
             CREATE TABLE parent (id INTEGER PRIMARY KEY);",
        );
        let (script, report, _) = dump(&source, &config());

        let parent = position(&script, "CREATE TABLE `parent`");
        let child = position(&script, "CREATE TABLE `child`");
        let fk = position(&script, "ALTER TABLE `child` ADD CONSTRAINT");
        assert!(parent < child);
        assert!(child < fk);
        assert_eq!(report.table_order, vec!["parent", "child"]);
        assert_eq!(report.foreign_keys_created, 1);
    }

    /// Test that views and triggers follow all tables
    #[test]
    fn test_views_and_triggers_after_tables() {
        let source = source_with(
            "CREATE TABLE a (id INTEGER PRIMARY KEY, n INTEGER);
             CREATE VIEW va AS SELECT id FROM a;
             CREATE TRIGGER ta AFTER INSERT ON a BEGIN UPDATE a SET n = 1 WHERE id = NEW.id; END;
             CREATE TABLE b (id INTEGER PRIMARY KEY);",
        );
        let (script, report, _) = dump(&source, &config());

        let table_b = position(&script, "CREATE TABLE `b`");
        let view = position(&script, "-- View: `va`");
        let trigger = position(&script, "-- Trigger: `ta`");
        assert!(table_b < view);
        assert!(view < trigger);
        assert!(script.contains("DELIMITER $$"));
        assert_eq!(report.views_created, 1);
        assert_eq!(report.triggers_created, 1);
    }

    /// Test that a cycle is reported once and every table is still written
    #[test]
    fn test_cycle_reported_once() {
        let source = source_with(
            "CREATE TABLE x (id INTEGER PRIMARY KEY, y_id INTEGER REFERENCES y(id));
             CREATE TABLE y (id INTEGER PRIMARY KEY, x_id INTEGER REFERENCES x(id));",
        );
        let (script, report, outcome) = dump(&source, &config());

        assert_eq!(outcome, DumpOutcome::Completed);
        assert_eq!(report.warnings_for("schema").len(), 1);
        assert!(script.contains("CREATE TABLE `x`"));
        assert!(script.contains("CREATE TABLE `y`"));
    }
}

#[cfg(test)]
mod data_tests {
    use super::*;

    /// Test that pages and INSERT statements follow the batch and chunk sizes
    #[test]
    fn test_fetch_and_insert_counts() {
        let source = ObservedSource::new(numbered_rows(250));
        let mut config = config();
        config.batch_size = 100;
        config.insert_chunk_size = 40;
        let (script, report, _) = dump_with(&source, &config, CancellationToken::new());

        assert_eq!(source.fetches.get(), 3);
        assert_eq!(script.matches("INSERT INTO `n`").count(), 7);
        assert_eq!(report.total_rows_exported(), 250);
        assert_eq!(report.tables[0].pages_fetched, 3);
        assert_eq!(report.tables[0].insert_statements, 7);
        assert!(script.contains("(250, 'row 250');"));
    }

    /// Test that an empty table produces no data section
    #[test]
    fn test_empty_table_has_no_insert() {
        let source = source_with("CREATE TABLE e (id INTEGER PRIMARY KEY);");
        let (script, report, _) = dump(&source, &config());
        assert!(!script.contains("INSERT INTO"));
        assert!(!script.contains("-- Data for table"));
        assert!(report.tables.is_empty());
    }

    /// Test that structure mode skips data and data mode skips DDL
    #[test]
    fn test_export_modes() {
        let schema = "CREATE TABLE m (id INTEGER PRIMARY KEY, v TEXT);
                      CREATE VIEW mv AS SELECT v FROM m;
                      INSERT INTO m VALUES (1, 'a');";

        let mut structure = config();
        structure.export_mode = ExportMode::Structure;
        let (script, _, _) = dump(&source_with(schema), &structure);
        assert!(script.contains("CREATE TABLE `m`"));
        assert!(script.contains("CREATE VIEW mv AS SELECT v FROM m;"));
        assert!(!script.contains("INSERT INTO"));

        let mut data = config();
        data.export_mode = ExportMode::Data;
        let (script, report, _) = dump(&source_with(schema), &data);
        assert!(!script.contains("CREATE TABLE"));
        assert!(!script.contains("CREATE VIEW"));
        assert!(script.contains("INSERT INTO `m` (`id`, `v`) VALUES\n  (1, 'a');"));
        assert!(script.contains("START TRANSACTION;"));
        assert_eq!(report.tables_created, 0);
    }

    /// Test that verification records a matching row count
    #[test]
    fn test_verify_data() {
        let source = numbered_rows(12);
        let mut config = config();
        config.verify_data = true;
        let (_, report, _) = dump(&source, &config);
        assert_eq!(report.tables[0].verified, Some(true));
        assert!(report.warnings.is_empty());
    }

    /// Test that oversized BLOBs without a BLOB directory become NULL with a warning
    #[test]
    fn test_oversized_blob_without_directory() {
        let source = source_with("CREATE TABLE b (id INTEGER PRIMARY KEY, data BLOB); INSERT INTO b VALUES (1, x'0102030405');");
        let mut config = config();
        config.max_blob_size = 2;
        let (script, report, _) = dump(&source, &config);

        assert!(script.contains("(1, NULL);"));
        assert_eq!(report.warnings_for("b.data").len(), 1);
        assert_eq!(report.tables[0].null_substitutions, 1);
    }

    /// Test that a column full of oversized BLOBs keeps a bounded warning ledger
    #[test]
    fn test_many_oversized_blobs_keep_few_warnings() {
        let source = source_with(
            "CREATE TABLE b (id INTEGER PRIMARY KEY, data BLOB);
             WITH RECURSIVE c(x) AS (SELECT 1 UNION ALL SELECT x + 1 FROM c WHERE x < 2000)
             INSERT INTO b SELECT x, randomblob(8) FROM c;",
        );
        let mut config = config();
        config.max_blob_size = 2;
        let (script, report, _) = dump(&source, &config);

        assert_eq!(script.matches(", NULL)").count(), 2000);
        assert_eq!(report.tables[0].null_substitutions, 2000);
        assert_eq!(
            report.warnings_for("b.data").len(),
            crate::monitoring::MAX_VALUE_WARNINGS_PER_COLUMN
        );
        assert_eq!(
            report.suppressed_warnings.get("b.data").copied(),
            Some(2000 - crate::monitoring::MAX_VALUE_WARNINGS_PER_COLUMN as u64)
        );
        assert_eq!(report.total_warnings(), 2000);
    }

    /// Test that oversized BLOBs are written to files and loaded with LOAD_FILE
    #[test]
    fn test_oversized_blob_externalized() {
        let dir = tempfile::tempdir().unwrap();
        let source = source_with("CREATE TABLE b (id INTEGER PRIMARY KEY, data BLOB); INSERT INTO b VALUES (1, x'0102030405'), (2, x'01');");
        let mut config = config().with_output(dir.path().join("out.sql"));
        config.max_blob_size = 2;
        config.blob_dir = Some(dir.path().join("blobs"));
        let (script, report, _) = dump(&source, &config);

        assert!(script.contains("LOAD_FILE('"));
        assert!(script.contains("UNHEX('01')"));
        assert_eq!(report.tables[0].blobs_externalized, 1);
        let written = std::fs::read(dir.path().join("blobs").join("b_data_0_1.bin")).unwrap();
        assert_eq!(written, vec![1, 2, 3, 4, 5]);
    }
}

#[cfg(test)]
mod cancellation_tests {
    use super::*;

    /// Test that a token cancelled before the run leaves the transaction open
    #[test]
    fn test_cancelled_before_start() {
        let source = numbered_rows(5);
        let cancel = CancellationToken::new();
        cancel.cancel();
        let (script, _, outcome) = dump_with(&source, &config(), cancel);

        assert_eq!(outcome, DumpOutcome::Cancelled);
        assert!(script.contains("START TRANSACTION;"));
        assert!(script.contains("-- Dump cancelled before completion"));
        assert!(!script.contains("COMMIT;"));
        assert!(!script.contains("INSERT INTO"));
    }

    /// Test that cancelling mid-table keeps the rows of completed pages
    #[test]
    fn test_cancelled_between_pages() {
        let cancel = CancellationToken::new();
        let mut source = ObservedSource::new(numbered_rows(30));
        source.cancel_after_first_page = Some(cancel.clone());
        let mut config = config();
        config.batch_size = 10;
        let (script, report, outcome) = dump_with(&source, &config, cancel);

        assert_eq!(outcome, DumpOutcome::Cancelled);
        assert_eq!(source.fetches.get(), 1);
        assert_eq!(report.total_rows_exported(), 10);
        assert!(script.contains("(10, 'row 10');"));
        assert!(!script.contains("(11, 'row 11')"));
        assert!(!script.contains("COMMIT;"));
    }
}

#[cfg(test)]
mod output_tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::{Read, Write};

    /// Test that the gzip sink produces a readable stream
    #[test]
    fn test_gzip_sink_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out.sql.gz");
        let mut sink = OutputSink::create(&path, true).unwrap();
        sink.write_all(b"SELECT 1;\n").unwrap();
        sink.finish().unwrap();

        let mut decoded = String::new();
        GzDecoder::new(std::fs::File::open(&path).unwrap())
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, "SELECT 1;\n");
    }

    /// Test that an unwritable output path is a setup error
    #[test]
    fn test_unwritable_output_path() {
        let dir = tempfile::tempdir().unwrap();
        let result = OutputSink::create(&dir.path().join("missing").join("out.sql"), false);
        assert!(matches!(result, Err(crate::error::ConvertError::Setup { .. })));
    }
}
