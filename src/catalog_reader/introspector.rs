use super::source::{CatalogSource, RawColumn, RawForeignKey};
use crate::error::{ConvertError, ConvertResult};
use crate::monitoring::DumpReport;
use crate::types::{
    CatalogObject, ColumnDescriptor, ForeignKeyDescriptor, ObjectKind, SourceType, TableDescriptor,
};
use std::collections::HashMap;
use tracing::{debug, info};

/// Everything read from the catalog, in catalog order
#[derive(Debug, Clone)]
pub struct CatalogSnapshot {
    /// Tables, views and triggers to convert
    pub objects: Vec<CatalogObject>,
    /// One descriptor per table in `objects`
    pub tables: Vec<TableDescriptor>,
}

impl CatalogSnapshot {
    pub fn table(&self, name: &str) -> Option<&TableDescriptor> {
        self.tables.iter().find(|t| t.name == name)
    }

    pub fn foreign_key_map(&self) -> HashMap<String, Vec<ForeignKeyDescriptor>> {
        self.tables
            .iter()
            .map(|t| (t.name.clone(), t.foreign_keys.clone()))
            .collect()
    }
}

/// Builds table descriptors from a catalog source
pub struct SchemaIntrospector<'a, S: CatalogSource> {
    source: &'a S,
    collect_statistics: bool,
}

impl<'a, S: CatalogSource> SchemaIntrospector<'a, S> {
    pub fn new(source: &'a S) -> Self {
        Self {
            source,
            collect_statistics: true,
        }
    }

    /// Skip the column statistics scan (not needed for data-only dumps)
    pub fn with_statistics(mut self, collect: bool) -> Self {
        self.collect_statistics = collect;
        self
    }

    pub fn introspect(&self, report: &mut DumpReport) -> ConvertResult<CatalogSnapshot> {
        let listed = self.source.list_objects()?;
        let mut objects = Vec::with_capacity(listed.len());
        let mut tables = Vec::new();

        for object in listed {
            if object.kind == ObjectKind::Table && is_virtual_table(&object.sql) {
                report.record_warning(
                    object.name.as_str(),
                    format!("Skipping virtual table {}; it has no MySQL equivalent", object.name),
                );
                continue;
            }
            if object.kind == ObjectKind::Table {
                tables.push(self.describe_table(&object.name, report)?);
            }
            objects.push(object);
        }

        resolve_implicit_references(&mut tables, report);

        info!(
            tables = tables.len(),
            objects = objects.len(),
            "Catalog introspection complete"
        );
        Ok(CatalogSnapshot { objects, tables })
    }

    fn describe_table(&self, name: &str, report: &mut DumpReport) -> ConvertResult<TableDescriptor> {
        let raw_columns = self.source.table_columns(name)?;
        let mut table = TableDescriptor::new(name);
        table.primary_key = primary_key_columns(&raw_columns);

        for raw in &raw_columns {
            let mut column = column_from_raw(raw);
            if self.collect_statistics {
                self.probe_statistics(name, &mut column, report);
            }
            table.columns.push(column);
        }

        table.foreign_keys = group_foreign_keys(self.source.foreign_keys(name)?);
        table.indexes = self.source.table_indexes(name)?;

        debug!(
            table = name,
            columns = table.columns.len(),
            foreign_keys = table.foreign_keys.len(),
            indexes = table.indexes.len(),
            "Described table"
        );
        Ok(table)
    }

    /// Best effort: a failed probe leaves the statistic at zero
    fn probe_statistics(&self, table: &str, column: &mut ColumnDescriptor, report: &mut DumpReport) {
        let scope = format!("{}.{}", table, column.name);
        match column.source_type {
            SourceType::Text => match self.source.max_text_length(table, &column.name) {
                Ok(len) => column.max_text_length = len,
                Err(e) => report.record_error(
                    scope,
                    &ConvertError::statistics_probe(table, &column.name, e.to_string()),
                ),
            },
            SourceType::Integer => match self.source.max_integer_magnitude(table, &column.name) {
                Ok(magnitude) => column.max_int_magnitude = magnitude,
                Err(e) => report.record_error(
                    scope,
                    &ConvertError::statistics_probe(table, &column.name, e.to_string()),
                ),
            },
            _ => {}
        }
    }
}

fn is_virtual_table(sql: &str) -> bool {
    let words: Vec<String> = sql
        .split_whitespace()
        .take(2)
        .map(|w| w.to_ascii_uppercase())
        .collect();
    words == ["CREATE", "VIRTUAL"]
}

fn column_from_raw(raw: &RawColumn) -> ColumnDescriptor {
    let mut column = ColumnDescriptor::new(raw.name.clone(), raw.declared_type.clone());
    column.default_value = raw.default_value.clone();
    column.is_primary_key = raw.pk_position > 0;
    column.nullable = !raw.not_null && !column.is_primary_key;
    column
}

fn primary_key_columns(columns: &[RawColumn]) -> Vec<String> {
    let mut keyed: Vec<&RawColumn> = columns.iter().filter(|c| c.pk_position > 0).collect();
    keyed.sort_by_key(|c| c.pk_position);
    keyed.into_iter().map(|c| c.name.clone()).collect()
}

/// Merge the per-column rows of composite keys into one descriptor per key id.
/// Referenced columns left implicit are filled in by `resolve_implicit_references`.
pub fn group_foreign_keys(mut rows: Vec<RawForeignKey>) -> Vec<ForeignKeyDescriptor> {
    rows.sort_by_key(|r| (r.id, r.seq));

    let mut keys: Vec<(i64, ForeignKeyDescriptor, bool)> = Vec::new();
    for row in rows {
        match keys.iter_mut().find(|(id, _, _)| *id == row.id) {
            Some((_, key, implicit)) => {
                key.columns.push(row.from);
                match row.to {
                    Some(to) => key.referenced_columns.push(to),
                    None => *implicit = true,
                }
            }
            None => {
                let implicit = row.to.is_none();
                keys.push((
                    row.id,
                    ForeignKeyDescriptor {
                        columns: vec![row.from],
                        referenced_table: row.table,
                        referenced_columns: row.to.into_iter().collect(),
                        on_delete: row.on_delete,
                        on_update: row.on_update,
                    },
                    implicit,
                ));
            }
        }
    }

    keys.into_iter()
        .map(|(_, mut key, implicit)| {
            if implicit {
                key.referenced_columns.clear();
            }
            key
        })
        .collect()
}

/// Point keys without explicit parent columns at the parent's primary key.
/// Unresolvable keys reuse the child column names.
pub fn resolve_implicit_references(tables: &mut [TableDescriptor], report: &mut DumpReport) {
    let primary_keys: HashMap<String, Vec<String>> = tables
        .iter()
        .map(|t| (t.name.clone(), t.primary_key.clone()))
        .collect();

    for table in tables.iter_mut() {
        for key in table.foreign_keys.iter_mut() {
            if key.referenced_columns.len() == key.columns.len() {
                continue;
            }
            match primary_keys.get(&key.referenced_table) {
                Some(pk) if pk.len() == key.columns.len() => {
                    key.referenced_columns = pk.clone();
                }
                _ => {
                    report.record_warning(
                        table.name.as_str(),
                        format!(
                            "Foreign key ({}) -> {} has no resolvable parent columns; using the child column names",
                            key.columns.join(", "),
                            key.referenced_table
                        ),
                    );
                    key.referenced_columns = key.columns.clone();
                }
            }
        }
    }
}
