use super::ddl_generator::DdlOutput;
use super::identifiers::{auto_index_name, fulltext_index_name, quote_column_list, quote_identifier, truncate_identifier};
use crate::config::{DumpConfig, StorageEngine};
use crate::types::{IndexDescriptor, IndexOrigin, TableDescriptor};

/// Configuration options for index generation
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Add one FULLTEXT index over the text columns of each table
    pub fulltext: bool,
    pub engine: StorageEngine,
    pub mysql_version: String,
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            fulltext: false,
            engine: StorageEngine::InnoDb,
            mysql_version: "8.0".to_string(),
        }
    }
}

impl IndexConfig {
    pub fn from_config(config: &DumpConfig) -> Self {
        Self {
            fulltext: config.fulltext,
            engine: config.engine,
            mysql_version: config.mysql_version.clone(),
        }
    }
}

/// Generator for CREATE INDEX statements
pub struct IndexGenerator {
    config: IndexConfig,
}

impl IndexGenerator {
    pub fn new(config: IndexConfig) -> Self {
        Self { config }
    }

    pub fn generate_indexes(&self, table: &TableDescriptor) -> DdlOutput {
        let mut output = DdlOutput::default();

        for index in &table.indexes {
            if index.origin == IndexOrigin::PrimaryKey {
                continue;
            }
            if let Some(statement) = self.generate_index(table, index, &mut output.warnings) {
                output.statements.push(statement);
            }
        }

        if self.config.fulltext {
            if let Some(statement) = self.generate_fulltext(table, &mut output.warnings) {
                output.statements.push(statement);
            }
        }

        output
    }

    fn generate_index(
        &self,
        table: &TableDescriptor,
        index: &IndexDescriptor,
        warnings: &mut Vec<String>,
    ) -> Option<String> {
        let columns: Option<Vec<String>> = index.columns.iter().cloned().collect();
        let Some(columns) = columns else {
            warnings.push(format!(
                "Skipping expression index {} on {}; MySQL needs it rewritten by hand",
                index.name, table.name
            ));
            return None;
        };
        if columns.is_empty() {
            return None;
        }

        if index.partial {
            warnings.push(format!(
                "Partial index {} on {} is created without its WHERE clause",
                index.name, table.name
            ));
        }

        let name = if index.is_auto_generated() {
            auto_index_name(&table.name, &columns, &index.name)
        } else {
            truncate_identifier(&index.name)
        };

        Some(format!(
            "CREATE {}INDEX {} ON {} ({});",
            if index.unique { "UNIQUE " } else { "" },
            quote_identifier(&name),
            quote_identifier(&table.name),
            quote_column_list(&columns)
        ))
    }

    fn generate_fulltext(&self, table: &TableDescriptor, warnings: &mut Vec<String>) -> Option<String> {
        let text_columns: Vec<&str> = table
            .columns
            .iter()
            .filter(|c| c.source_type.is_text())
            .map(|c| c.name.as_str())
            .collect();
        if text_columns.is_empty() {
            return None;
        }

        if !self.config.engine.supports_fulltext(&self.config.mysql_version) {
            warnings.push(format!(
                "FULLTEXT index on {} skipped: not supported by {} on MySQL {}",
                table.name,
                self.config.engine.as_str(),
                self.config.mysql_version
            ));
            return None;
        }

        Some(format!(
            "CREATE FULLTEXT INDEX {} ON {} ({});",
            quote_identifier(&fulltext_index_name(&table.name)),
            quote_identifier(&table.name),
            quote_column_list(&text_columns)
        ))
    }
}
