//! MySQL identifier quoting and deterministic synthetic names.

use sha2::{Digest, Sha256};

/// Longest identifier MySQL accepts
pub const MAX_IDENTIFIER_LENGTH: usize = 64;
const DIGEST_LENGTH: usize = 8;

/// First 8 hex characters of the SHA-256 digest of `input`
pub fn short_digest(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut hex = hex::encode(digest);
    hex.truncate(DIGEST_LENGTH);
    hex
}

/// Shorten identifiers over 64 characters to a 55-character prefix, `_`, and a digest
pub fn truncate_identifier(name: &str) -> String {
    if name.chars().count() <= MAX_IDENTIFIER_LENGTH {
        return name.to_string();
    }
    let prefix_len = MAX_IDENTIFIER_LENGTH - DIGEST_LENGTH - 1;
    let prefix: String = name.chars().take(prefix_len).collect();
    format!("{}_{}", prefix, short_digest(name))
}

/// Backtick-quote an identifier, doubling embedded backticks
pub fn quote_identifier(name: &str) -> String {
    format!("`{}`", truncate_identifier(name).replace('`', "``"))
}

/// Quote and join a column list
pub fn quote_column_list<S: AsRef<str>>(columns: &[S]) -> String {
    columns
        .iter()
        .map(|c| quote_identifier(c.as_ref()))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Replace everything outside `[A-Za-z0-9_]` with `_`
pub fn sanitize_name_part(part: &str) -> String {
    part.chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' { c } else { '_' })
        .collect()
}

/// Stable replacement for an SQLite auto-index name
pub fn auto_index_name(table: &str, columns: &[String], original: &str) -> String {
    let name = format!(
        "idx_{}_{}_{}",
        sanitize_name_part(table),
        sanitize_name_part(&columns.join("_")),
        short_digest(original)
    );
    truncate_identifier(&name)
}

/// Stable name for a foreign key constraint
pub fn foreign_key_name(table: &str, columns: &[String], referenced_table: &str) -> String {
    let column_part = columns.join("_");
    let name = format!(
        "fk_{}_{}_{}",
        sanitize_name_part(table),
        sanitize_name_part(&column_part),
        short_digest(&format!("{}_{}_{}", table, column_part, referenced_table))
    );
    truncate_identifier(&name)
}

/// Stable name for the generated FULLTEXT index of a table
pub fn fulltext_index_name(table: &str) -> String {
    truncate_identifier(&format!("fulltext_{}", sanitize_name_part(table)))
}
