use super::blob_externalizer::BlobExternalizer;
use crate::error::ConvertError;
use rusqlite::types::Value;

/// Where a value sits in the export, for blob naming and diagnostics
#[derive(Debug, Clone, Copy)]
pub struct ValueContext<'a> {
    pub table: &'a str,
    pub column: &'a str,
    /// Offset of the row within the table
    pub row_offset: u64,
    pub column_index: usize,
}

/// A rendered SQL literal and what happened while producing it
#[derive(Debug)]
pub struct EncodedValue {
    pub sql: String,
    /// Set when the value degraded to NULL
    pub warning: Option<ConvertError>,
    pub externalized: bool,
}

impl EncodedValue {
    fn literal(sql: String) -> Self {
        Self {
            sql,
            warning: None,
            externalized: false,
        }
    }

    fn degraded(warning: ConvertError) -> Self {
        Self {
            sql: "NULL".to_string(),
            warning: Some(warning),
            externalized: false,
        }
    }
}

/// Escape text for a single-quoted MySQL literal: quotes and backslashes are
/// doubled, and characters in the Unicode `Cc` category (NUL, C0 controls
/// including newline and tab, DEL, C1 controls) are removed. Format and
/// separator characters such as U+200B or U+2028 are kept as is.
pub fn escape_string_literal(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        match c {
            '\'' => escaped.push_str("''"),
            '\\' => escaped.push_str("\\\\"),
            c if c.is_control() => {}
            c => escaped.push(c),
        }
    }
    escaped
}

/// Turns SQLite values into MySQL literals
pub struct ValueEncoder {
    max_blob_size: usize,
    externalizer: Option<BlobExternalizer>,
}

impl ValueEncoder {
    pub fn new(max_blob_size: usize, externalizer: Option<BlobExternalizer>) -> Self {
        Self {
            max_blob_size,
            externalizer,
        }
    }

    pub fn encode(&self, value: &Value, ctx: &ValueContext<'_>) -> EncodedValue {
        match value {
            Value::Null => EncodedValue::literal("NULL".to_string()),
            Value::Integer(i) => EncodedValue::literal(i.to_string()),
            Value::Real(f) if f.is_finite() => EncodedValue::literal(f.to_string()),
            Value::Real(f) => EncodedValue::degraded(ConvertError::value_encoding(
                ctx.table,
                ctx.column,
                format!("non-finite value {} at row {} replaced with NULL", f, ctx.row_offset),
            )),
            Value::Text(s) => EncodedValue::literal(format!("'{}'", escape_string_literal(s))),
            Value::Blob(bytes) => self.encode_blob(bytes, ctx),
        }
    }

    fn encode_blob(&self, bytes: &[u8], ctx: &ValueContext<'_>) -> EncodedValue {
        if bytes.len() <= self.max_blob_size {
            return EncodedValue::literal(format!("UNHEX('{}')", hex::encode(bytes)));
        }

        let Some(externalizer) = &self.externalizer else {
            return EncodedValue::degraded(ConvertError::value_encoding(
                ctx.table,
                ctx.column,
                format!(
                    "BLOB of {} bytes at row {} exceeds the {} byte limit and no BLOB directory is set; replaced with NULL",
                    bytes.len(),
                    ctx.row_offset,
                    self.max_blob_size
                ),
            ));
        };

        match externalizer.externalize(bytes, ctx.table, ctx.column, ctx.row_offset, ctx.column_index) {
            Ok(placeholder) => EncodedValue {
                sql: placeholder,
                warning: None,
                externalized: true,
            },
            Err(e) => EncodedValue::degraded(e),
        }
    }
}
