use super::ddl_generator::DdlOutput;
use super::identifiers::{foreign_key_name, quote_column_list, quote_identifier};
use crate::types::{ForeignKeyDescriptor, TableDescriptor};

const REFERENTIAL_ACTIONS: [&str; 5] = ["CASCADE", "SET NULL", "SET DEFAULT", "RESTRICT", "NO ACTION"];

/// Generator for foreign key ALTER TABLE statements
#[derive(Debug, Clone, Default)]
pub struct ConstraintGenerator;

impl ConstraintGenerator {
    pub fn new() -> Self {
        Self
    }

    pub fn generate_constraints(&self, table: &TableDescriptor) -> DdlOutput {
        let mut output = DdlOutput::default();
        for key in &table.foreign_keys {
            output
                .statements
                .push(self.generate_foreign_key(&table.name, key, &mut output.warnings));
        }
        output
    }

    pub fn generate_foreign_key(
        &self,
        table: &str,
        key: &ForeignKeyDescriptor,
        warnings: &mut Vec<String>,
    ) -> String {
        let name = foreign_key_name(table, &key.columns, &key.referenced_table);
        format!(
            "ALTER TABLE {} ADD CONSTRAINT {} FOREIGN KEY ({}) REFERENCES {} ({}) ON DELETE {} ON UPDATE {};",
            quote_identifier(table),
            quote_identifier(&name),
            quote_column_list(&key.columns),
            quote_identifier(&key.referenced_table),
            quote_column_list(&key.referenced_columns),
            normalize_action(&key.on_delete, table, warnings),
            normalize_action(&key.on_update, table, warnings)
        )
    }
}

fn normalize_action(action: &str, table: &str, warnings: &mut Vec<String>) -> &'static str {
    let upper = action.trim().to_ascii_uppercase();
    match REFERENTIAL_ACTIONS.iter().find(|a| **a == upper) {
        Some(known) => known,
        None => {
            warnings.push(format!(
                "Unknown referential action '{}' on {} replaced with NO ACTION",
                action, table
            ));
            "NO ACTION"
        }
    }
}
