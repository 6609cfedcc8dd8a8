use crate::error::{ConvertError, ConvertResult};
use crate::types::{CatalogObject, IndexDescriptor, IndexOrigin, ObjectKind};
use rusqlite::types::{Value, ValueRef};
use rusqlite::{params, Connection, OpenFlags};
use std::path::Path;
use tracing::debug;

/// Column row as reported by `PRAGMA table_info`
#[derive(Debug, Clone, PartialEq)]
pub struct RawColumn {
    pub cid: i64,
    pub name: String,
    pub declared_type: String,
    pub not_null: bool,
    pub default_value: Option<String>,
    /// 1-based position within the primary key, 0 when not part of it
    pub pk_position: i64,
}

/// Foreign key row as reported by `PRAGMA foreign_key_list`
#[derive(Debug, Clone, PartialEq)]
pub struct RawForeignKey {
    /// Rows sharing an id belong to one (composite) key
    pub id: i64,
    pub seq: i64,
    pub table: String,
    pub from: String,
    /// `None` when the key references the parent's primary key implicitly
    pub to: Option<String>,
    pub on_update: String,
    pub on_delete: String,
}

/// Read access to a source catalog and its rows.
///
/// All methods are read-only; the dataset is treated as an immutable snapshot
/// for the duration of a run.
pub trait CatalogSource {
    /// Tables, views and triggers in catalog order, internal objects excluded
    fn list_objects(&self) -> ConvertResult<Vec<CatalogObject>>;

    fn table_columns(&self, table: &str) -> ConvertResult<Vec<RawColumn>>;

    fn table_indexes(&self, table: &str) -> ConvertResult<Vec<IndexDescriptor>>;

    fn foreign_keys(&self, table: &str) -> ConvertResult<Vec<RawForeignKey>>;

    /// Longest text value in the column, 0 for an empty table
    fn max_text_length(&self, table: &str, column: &str) -> ConvertResult<u64>;

    /// Largest [`signed_magnitude`] of the integers in the column, 0 for an empty table
    fn max_integer_magnitude(&self, table: &str, column: &str) -> ConvertResult<u64>;

    fn count_rows(&self, table: &str) -> ConvertResult<u64>;

    /// One page of rows, columns in the requested order
    fn fetch_rows(
        &self,
        table: &str,
        columns: &[String],
        limit: usize,
        offset: u64,
    ) -> ConvertResult<Vec<Vec<Value>>>;
}

/// Owned copy of a column value; text that is not valid UTF-8 is decoded lossily
pub fn value_from_ref(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::Integer(i),
        ValueRef::Real(f) => Value::Real(f),
        ValueRef::Text(t) => Value::Text(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::Blob(b.to_vec()),
    }
}

/// `v` for non-negative values and `-v - 1` for negative ones, so a value fits a
/// signed N-bit integer exactly when the result is at most `2^(N-1) - 1`
pub fn signed_magnitude(value: i64) -> u64 {
    if value < 0 {
        (!value) as u64
    } else {
        value as u64
    }
}

/// Double-quote an identifier for use in a SQLite statement
pub fn quote_sqlite_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// SQLite database opened read-only
pub struct SqliteSource {
    conn: Connection,
}

impl SqliteSource {
    pub fn open(path: impl AsRef<Path>) -> ConvertResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| {
            ConvertError::setup(format!("Cannot open SQLite database {}: {}", path.display(), e))
        })?;

        Self::from_connection(conn).map_err(|e| {
            ConvertError::setup(format!("{} is not a usable SQLite database: {}", path.display(), e))
        })
    }

    /// Wrap an already open connection after checking that the catalog is readable
    pub fn from_connection(conn: Connection) -> ConvertResult<Self> {
        let objects: i64 = conn.query_row("SELECT COUNT(*) FROM sqlite_master", [], |row| row.get(0))?;
        debug!(objects, "Opened SQLite catalog");
        Ok(Self { conn })
    }

    fn index_columns(&self, index: &str) -> ConvertResult<Vec<Option<String>>> {
        let mut stmt = self
            .conn
            .prepare("SELECT seqno, cid, name FROM pragma_index_info(?1) ORDER BY seqno")?;
        let columns = stmt
            .query_map(params![index], |row| {
                let cid: i64 = row.get(1)?;
                let name: Option<String> = row.get(2)?;
                // cid -2 marks an expression, -1 the rowid
                Ok(if cid == -2 { None } else { name })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(columns)
    }
}

impl CatalogSource for SqliteSource {
    fn list_objects(&self) -> ConvertResult<Vec<CatalogObject>> {
        let mut stmt = self.conn.prepare(
            "SELECT type, name, sql FROM sqlite_master \
             WHERE type IN ('table', 'view', 'trigger') AND substr(name, 1, 7) <> 'sqlite_' \
             ORDER BY rowid",
        )?;
        let rows = stmt
            .query_map([], |row| {
                let kind: String = row.get(0)?;
                let name: String = row.get(1)?;
                let sql: Option<String> = row.get(2)?;
                Ok((kind, name, sql.unwrap_or_default()))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let objects = rows
            .into_iter()
            .filter_map(|(kind, name, sql)| {
                let kind = match kind.as_str() {
                    "table" => ObjectKind::Table,
                    "view" => ObjectKind::View,
                    "trigger" => ObjectKind::Trigger,
                    _ => return None,
                };
                Some(CatalogObject { kind, name, sql })
            })
            .collect();
        Ok(objects)
    }

    fn table_columns(&self, table: &str) -> ConvertResult<Vec<RawColumn>> {
        let mut stmt = self.conn.prepare(
            "SELECT cid, name, type, \"notnull\", dflt_value, pk FROM pragma_table_info(?1) ORDER BY cid",
        )?;
        let columns = stmt
            .query_map(params![table], |row| {
                Ok(RawColumn {
                    cid: row.get(0)?,
                    name: row.get(1)?,
                    declared_type: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
                    not_null: row.get::<_, i64>(3)? != 0,
                    default_value: row.get(4)?,
                    pk_position: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(columns)
    }

    fn table_indexes(&self, table: &str) -> ConvertResult<Vec<IndexDescriptor>> {
        let mut stmt = self
            .conn
            .prepare("SELECT name, \"unique\", origin, partial FROM pragma_index_list(?1) ORDER BY seq")?;
        let listed = stmt
            .query_map(params![table], |row| {
                let name: String = row.get(0)?;
                let unique: i64 = row.get(1)?;
                let origin: String = row.get(2)?;
                let partial: i64 = row.get(3)?;
                Ok((name, unique != 0, origin, partial != 0))
            })?
            .collect::<Result<Vec<_>, _>>()?;

        let mut indexes = Vec::with_capacity(listed.len());
        for (name, unique, origin, partial) in listed {
            let columns = self.index_columns(&name)?;
            indexes.push(IndexDescriptor {
                name,
                unique,
                columns,
                origin: IndexOrigin::from_code(&origin),
                partial,
            });
        }
        // pragma_index_list reports newest first
        indexes.reverse();
        Ok(indexes)
    }

    fn foreign_keys(&self, table: &str) -> ConvertResult<Vec<RawForeignKey>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, seq, \"table\", \"from\", \"to\", on_update, on_delete \
             FROM pragma_foreign_key_list(?1) ORDER BY id, seq",
        )?;
        let keys = stmt
            .query_map(params![table], |row| {
                Ok(RawForeignKey {
                    id: row.get(0)?,
                    seq: row.get(1)?,
                    table: row.get(2)?,
                    from: row.get(3)?,
                    to: row.get(4)?,
                    on_update: row.get(5)?,
                    on_delete: row.get(6)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(keys)
    }

    fn max_text_length(&self, table: &str, column: &str) -> ConvertResult<u64> {
        let sql = format!(
            "SELECT MAX(LENGTH({})) FROM {}",
            quote_sqlite_identifier(column),
            quote_sqlite_identifier(table)
        );
        let max: Option<i64> = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(max.unwrap_or(0).max(0) as u64)
    }

    fn max_integer_magnitude(&self, table: &str, column: &str) -> ConvertResult<u64> {
        let col = quote_sqlite_identifier(column);
        let sql = format!(
            "SELECT MAX({col}), MIN({col}) FROM {} WHERE typeof({col}) = 'integer'",
            quote_sqlite_identifier(table)
        );
        let (max, min): (Option<i64>, Option<i64>) =
            self.conn.query_row(&sql, [], |row| Ok((row.get(0)?, row.get(1)?)))?;
        Ok(signed_magnitude(max.unwrap_or(0)).max(signed_magnitude(min.unwrap_or(0))))
    }

    fn count_rows(&self, table: &str) -> ConvertResult<u64> {
        let sql = format!("SELECT COUNT(*) FROM {}", quote_sqlite_identifier(table));
        let count: i64 = self.conn.query_row(&sql, [], |row| row.get(0))?;
        Ok(count.max(0) as u64)
    }

    fn fetch_rows(
        &self,
        table: &str,
        columns: &[String],
        limit: usize,
        offset: u64,
    ) -> ConvertResult<Vec<Vec<Value>>> {
        let column_list = columns
            .iter()
            .map(|c| quote_sqlite_identifier(c))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT {} FROM {} LIMIT ?1 OFFSET ?2",
            column_list,
            quote_sqlite_identifier(table)
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let width = columns.len();
        let rows = stmt
            .query_map(params![limit as i64, offset as i64], |row| {
                (0..width)
                    .map(|i| row.get_ref(i).map(value_from_ref))
                    .collect::<Result<Vec<_>, _>>()
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }
}
