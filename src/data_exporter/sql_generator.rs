use crate::schema_converter::identifiers::{quote_column_list, quote_identifier};
use std::io::{self, Write};

/// `(v1, v2, ...)` from already encoded literals
pub fn render_tuple(values: &[String]) -> String {
    format!("({})", values.join(", "))
}

/// Multi-row INSERT statement, one tuple per line
pub fn render_insert<S: AsRef<str>>(table: &str, columns: &[S], tuples: &[String]) -> String {
    let mut sql = format!(
        "INSERT INTO {} ({}) VALUES\n",
        quote_identifier(table),
        quote_column_list(columns)
    );
    for (i, tuple) in tuples.iter().enumerate() {
        sql.push_str("  ");
        sql.push_str(tuple);
        sql.push_str(if i + 1 == tuples.len() { ";\n" } else { ",\n" });
    }
    sql
}

/// Collects row tuples and writes an INSERT every `chunk_size` rows.
///
/// Tuples carry over between fetched pages, so a table of R rows produces
/// ceil(R / chunk_size) statements.
pub struct InsertBuffer {
    table: String,
    columns: Vec<String>,
    chunk_size: usize,
    tuples: Vec<String>,
    statements_written: u64,
    rows_written: u64,
}

impl InsertBuffer {
    pub fn new(table: impl Into<String>, columns: Vec<String>, chunk_size: usize) -> Self {
        let chunk_size = chunk_size.max(1);
        Self {
            table: table.into(),
            columns,
            chunk_size,
            tuples: Vec::with_capacity(chunk_size),
            statements_written: 0,
            rows_written: 0,
        }
    }

    pub fn push<W: Write>(&mut self, tuple: String, out: &mut W) -> io::Result<()> {
        self.tuples.push(tuple);
        if self.tuples.len() >= self.chunk_size {
            self.flush(out)?;
        }
        Ok(())
    }

    /// Write whatever is buffered as one statement
    pub fn flush<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        if self.tuples.is_empty() {
            return Ok(());
        }
        out.write_all(render_insert(&self.table, &self.columns, &self.tuples).as_bytes())?;
        self.statements_written += 1;
        self.rows_written += self.tuples.len() as u64;
        self.tuples.clear();
        Ok(())
    }

    pub fn statements_written(&self) -> u64 {
        self.statements_written
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }
}
