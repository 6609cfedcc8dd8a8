use super::identifiers::{quote_column_list, quote_identifier};
use crate::config::{Charset, Collation, DumpConfig, StorageEngine};
use crate::data_exporter::type_mapper::DataTypeMapper;
use crate::types::TableDescriptor;

/// Statements generated for one object plus the problems found on the way
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DdlOutput {
    pub statements: Vec<String>,
    pub warnings: Vec<String>,
}

impl DdlOutput {
    pub fn extend(&mut self, other: DdlOutput) {
        self.statements.extend(other.statements);
        self.warnings.extend(other.warnings);
    }
}

/// Table-level options appended to every CREATE TABLE
#[derive(Debug, Clone)]
pub struct TableOptions {
    pub engine: StorageEngine,
    pub charset: Charset,
    pub collation: Collation,
    pub tablespace: Option<String>,
    /// Raw partitioning clause
    pub partition: Option<String>,
    /// Emit DROP TABLE IF EXISTS first
    pub drop_existing: bool,
}

impl TableOptions {
    pub fn from_config(config: &DumpConfig) -> Self {
        Self {
            engine: config.engine,
            charset: config.charset,
            collation: config.collation,
            tablespace: config.tablespace.clone(),
            partition: config.partition.clone(),
            drop_existing: config.drop_table,
        }
    }

    /// `ENGINE=.. DEFAULT CHARSET=.. COLLATE=..[ TABLESPACE `x`][ <partition>]`
    pub fn to_sql(&self) -> String {
        let mut sql = format!(
            "ENGINE={} DEFAULT CHARSET={} COLLATE={}",
            self.engine.as_str(),
            self.charset.as_str(),
            self.collation.as_str()
        );
        if let Some(tablespace) = &self.tablespace {
            sql.push_str(&format!(" TABLESPACE {}", quote_identifier(tablespace)));
        }
        if let Some(partition) = &self.partition {
            let partition = partition.trim();
            if !partition.is_empty() {
                sql.push(' ');
                sql.push_str(partition);
            }
        }
        sql
    }
}

impl Default for TableOptions {
    fn default() -> Self {
        Self {
            engine: StorageEngine::InnoDb,
            charset: Charset::Utf8mb4,
            collation: Collation::Utf8mb4UnicodeCi,
            tablespace: None,
            partition: None,
            drop_existing: true,
        }
    }
}

/// Generates DROP / CREATE TABLE statements
pub struct DdlGenerator {
    options: TableOptions,
    mapper: DataTypeMapper,
}

impl DdlGenerator {
    pub fn new(options: TableOptions) -> Self {
        Self {
            options,
            mapper: DataTypeMapper::new(),
        }
    }

    pub fn generate_table(&self, table: &TableDescriptor) -> DdlOutput {
        let mut output = DdlOutput::default();
        let table_name = quote_identifier(&table.name);

        if self.options.drop_existing {
            output
                .statements
                .push(format!("DROP TABLE IF EXISTS {};", table_name));
        }

        // MySQL auto-numbers at most one column
        let single_key = table.primary_key.len() == 1;

        let mut lines: Vec<String> = Vec::with_capacity(table.columns.len() + 1);
        for column in &table.columns {
            let mapping = self.mapper.map_column(column, single_key);
            output.warnings.extend(mapping.warnings.iter().cloned());
            lines.push(format!("  {} {}", quote_identifier(&column.name), mapping.to_clause()));
        }
        if !table.primary_key.is_empty() {
            lines.push(format!("  PRIMARY KEY ({})", quote_column_list(&table.primary_key)));
        }

        output.statements.push(format!(
            "CREATE TABLE {} (\n{}\n) {};",
            table_name,
            lines.join(",\n"),
            self.options.to_sql()
        ));
        output
    }
}
