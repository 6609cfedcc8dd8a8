use super::value_encoder::escape_string_literal;
use crate::types::{ColumnDescriptor, MySqlType, SourceType};
use once_cell::sync::Lazy;
use regex::Regex;

/// Longest text that still fits a VARCHAR column
pub const MAX_VARCHAR_LENGTH: u64 = 255;
/// Longest text that still fits a TEXT column
pub const MAX_TEXT_LENGTH: u64 = 65_535;
/// Width used when no length was observed
pub const DEFAULT_VARCHAR_LENGTH: u32 = 255;

static FUNCTION_CALL_DEFAULT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?s)^\(?\s*\w+\s*\(.*\)\s*\)?$").expect("valid regex"));

const TEMPORAL_KEYWORDS: [&str; 4] = [
    "CURRENT_TIMESTAMP",
    "CURRENT_DATE",
    "CURRENT_TIME",
    "NOW()",
];

/// Result of mapping one column
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnTypeMapping {
    /// The mapped MySQL type
    pub mysql_type: MySqlType,
    pub auto_increment: bool,
    pub not_null: bool,
    /// Rendered default, without the DEFAULT keyword
    pub default_clause: Option<String>,
    /// Problems found while mapping
    pub warnings: Vec<String>,
}

impl ColumnTypeMapping {
    /// Full column clause after the name, e.g. `VARCHAR(20) NOT NULL DEFAULT 'x'`
    pub fn to_clause(&self) -> String {
        let mut clause = self.mysql_type.to_sql();
        if self.auto_increment {
            clause.push_str(" AUTO_INCREMENT");
        }
        if self.not_null {
            clause.push_str(" NOT NULL");
        }
        match &self.default_clause {
            Some(default) => {
                clause.push_str(" DEFAULT ");
                clause.push_str(default);
            }
            None if !self.not_null && !self.auto_increment => clause.push_str(" DEFAULT NULL"),
            None => {}
        }
        clause
    }
}

/// Choose the MySQL type from the source type and observed statistics.
///
/// Returns the type and whether the column becomes AUTO_INCREMENT.
pub fn map_source_type(
    source_type: &SourceType,
    max_text_length: u64,
    max_int_magnitude: u64,
    is_primary_key: bool,
) -> (MySqlType, bool) {
    match source_type {
        SourceType::Text => {
            let mysql_type = if max_text_length == 0 {
                MySqlType::Varchar(DEFAULT_VARCHAR_LENGTH)
            } else if max_text_length <= MAX_VARCHAR_LENGTH {
                MySqlType::Varchar(max_text_length as u32)
            } else if max_text_length <= MAX_TEXT_LENGTH {
                MySqlType::Text
            } else {
                MySqlType::LongText
            };
            (mysql_type, false)
        }
        SourceType::Integer if is_primary_key => (MySqlType::BigInt, true),
        SourceType::Integer => {
            if max_int_magnitude <= i32::MAX as u64 {
                (MySqlType::Int, false)
            } else {
                (MySqlType::BigInt, false)
            }
        }
        SourceType::Real => (MySqlType::Double, false),
        SourceType::Blob => (MySqlType::LongBlob, false),
        SourceType::Numeric => (MySqlType::Decimal(10, 2), false),
        SourceType::Boolean => (MySqlType::Boolean, false),
        SourceType::Temporal(name) => (MySqlType::Raw(name.clone()), false),
        SourceType::Other(name) => (MySqlType::Raw(name.clone()), false),
    }
}

/// Maps source column descriptors to MySQL column clauses
#[derive(Debug, Clone, Default)]
pub struct DataTypeMapper;

impl DataTypeMapper {
    pub fn new() -> Self {
        Self
    }

    /// Map a column. `auto_increment_eligible` is false for columns of a
    /// composite primary key, which MySQL cannot auto-number.
    pub fn map_column(&self, column: &ColumnDescriptor, auto_increment_eligible: bool) -> ColumnTypeMapping {
        let (mysql_type, auto_increment) = map_source_type(
            &column.source_type,
            column.max_text_length,
            column.max_int_magnitude,
            column.is_primary_key && auto_increment_eligible,
        );
        let not_null = !column.nullable || column.is_primary_key;

        let mut warnings = Vec::new();
        let default_clause = match &column.default_value {
            Some(raw) if auto_increment => {
                warnings.push(format!(
                    "Default {} dropped from AUTO_INCREMENT column {}",
                    raw, column.name
                ));
                None
            }
            Some(raw) => map_default(column, raw, not_null, &mut warnings),
            None => None,
        };

        ColumnTypeMapping {
            mysql_type,
            auto_increment,
            not_null,
            default_clause,
            warnings,
        }
    }
}

fn map_default(
    column: &ColumnDescriptor,
    raw: &str,
    not_null: bool,
    warnings: &mut Vec<String>,
) -> Option<String> {
    let raw = raw.trim();

    if raw.eq_ignore_ascii_case("NULL") {
        if not_null {
            warnings.push(format!(
                "DEFAULT NULL dropped from NOT NULL column {}",
                column.name
            ));
            return None;
        }
        return Some("NULL".to_string());
    }

    if !column.source_type.quotes_defaults() {
        return Some(raw.to_string());
    }

    let upper = raw.to_ascii_uppercase();
    if TEMPORAL_KEYWORDS.contains(&upper.as_str()) {
        if matches!(column.source_type, SourceType::Temporal(_)) {
            return Some(upper);
        }
        warnings.push(format!(
            "Default {} dropped from column {}: not valid for a text column",
            raw, column.name
        ));
        return None;
    }

    if FUNCTION_CALL_DEFAULT.is_match(raw) {
        warnings.push(format!(
            "Default expression {} dropped from column {}",
            raw, column.name
        ));
        return None;
    }

    Some(format!("'{}'", escape_string_literal(&strip_source_quotes(raw))))
}

/// Remove one level of SQLite quoting from a literal
fn strip_source_quotes(raw: &str) -> String {
    let bytes = raw.as_bytes();
    if raw.len() >= 2 {
        let (first, last) = (bytes[0], bytes[raw.len() - 1]);
        if first == b'\'' && last == b'\'' {
            return raw[1..raw.len() - 1].replace("''", "'");
        }
        if first == b'"' && last == b'"' {
            return raw[1..raw.len() - 1].replace("\"\"", "\"");
        }
    }
    raw.to_string()
}
