use super::value_encoder::escape_string_literal;
use crate::error::{ConvertError, ConvertResult};
use crate::schema_converter::identifiers::sanitize_name_part;
use std::fs;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// Writes oversized BLOBs to files and returns `LOAD_FILE` placeholders
#[derive(Debug, Clone)]
pub struct BlobExternalizer {
    blob_dir: PathBuf,
    /// Directory placeholders are made relative to; `None` for absolute paths
    relative_base: Option<PathBuf>,
}

impl BlobExternalizer {
    /// Create the blob directory if needed. `output_path` is the dump script,
    /// whose directory anchors relative placeholders.
    pub fn new(blob_dir: &Path, output_path: &Path, relative: bool) -> ConvertResult<Self> {
        fs::create_dir_all(blob_dir).map_err(|e| {
            ConvertError::setup(format!(
                "Cannot create BLOB directory {}: {}",
                blob_dir.display(),
                e
            ))
        })?;
        let blob_dir = blob_dir.canonicalize().map_err(|e| {
            ConvertError::setup(format!("Cannot resolve BLOB directory {}: {}", blob_dir.display(), e))
        })?;

        let relative_base = if relative {
            let dump_dir = match output_path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            };
            let dump_dir = dump_dir.canonicalize().map_err(|e| {
                ConvertError::setup(format!("Cannot resolve output directory {}: {}", dump_dir.display(), e))
            })?;
            Some(dump_dir)
        } else {
            None
        };

        Ok(Self {
            blob_dir,
            relative_base,
        })
    }

    /// `<table>_<column>_<rowOffset>_<columnIndex>.bin` with sanitized name parts
    pub fn file_name(table: &str, column: &str, row_offset: u64, column_index: usize) -> String {
        format!(
            "{}_{}_{}_{}.bin",
            sanitize_name_part(table),
            sanitize_name_part(column),
            row_offset,
            column_index
        )
    }

    /// Write `data` and return the `LOAD_FILE('<path>')` expression
    pub fn externalize(
        &self,
        data: &[u8],
        table: &str,
        column: &str,
        row_offset: u64,
        column_index: usize,
    ) -> ConvertResult<String> {
        let file_path = self
            .blob_dir
            .join(Self::file_name(table, column, row_offset, column_index));
        fs::write(&file_path, data).map_err(|source| ConvertError::BlobWrite {
            path: file_path.clone(),
            source,
        })?;
        debug!(path = %file_path.display(), bytes = data.len(), "Externalized BLOB");

        let reference = match &self.relative_base {
            Some(base) => relative_path(base, &file_path),
            None => file_path.to_string_lossy().into_owned(),
        };
        Ok(format!("LOAD_FILE('{}')", escape_string_literal(&reference)))
    }
}

/// Path from directory `from` to `to`, both absolute, with `/` separators
pub fn relative_path(from: &Path, to: &Path) -> String {
    let from: Vec<Component> = from.components().collect();
    let to: Vec<Component> = to.components().collect();
    let common = from
        .iter()
        .zip(to.iter())
        .take_while(|(a, b)| a == b)
        .count();

    let mut parts: Vec<String> = Vec::new();
    for _ in common..from.len() {
        parts.push("..".to_string());
    }
    for component in &to[common..] {
        parts.push(component.as_os_str().to_string_lossy().into_owned());
    }

    if parts.is_empty() {
        ".".to_string()
    } else {
        parts.join("/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_file_name_sanitized() {
        assert_eq!(
            BlobExternalizer::file_name("my table", "pic-1", 1500, 2),
            "my_table_pic_1_1500_2.bin"
        );
    }

    #[test]
    fn test_relative_path() {
        assert_eq!(relative_path(Path::new("/a/b"), Path::new("/a/b/c/x.bin")), "c/x.bin");
        assert_eq!(relative_path(Path::new("/a/b"), Path::new("/a/d/x.bin")), "../d/x.bin");
        assert_eq!(relative_path(Path::new("/a"), Path::new("/a")), ".");
    }

    #[test]
    fn test_externalize_absolute_and_relative() {
        let dir = TempDir::new().unwrap();
        let output = dir.path().join("dump.sql");
        let blob_dir = dir.path().join("blobs");

        let absolute = BlobExternalizer::new(&blob_dir, &output, false).unwrap();
        let placeholder = absolute.externalize(b"payload", "t", "c", 7, 1).unwrap();
        let written = blob_dir.join("t_c_7_1.bin");
        assert_eq!(fs::read(&written).unwrap(), b"payload");
        assert!(placeholder.starts_with("LOAD_FILE('"));
        assert!(placeholder.contains("t_c_7_1.bin"));

        let relative = BlobExternalizer::new(&blob_dir, &output, true).unwrap();
        let placeholder = relative.externalize(b"payload", "t", "c", 8, 1).unwrap();
        assert_eq!(placeholder, "LOAD_FILE('blobs/t_c_8_1.bin')");
    }
}
