use crate::error::ConvertError;
use crate::monitoring::DumpReport;
use crate::types::{CatalogObject, DumpItem, ForeignKeyDescriptor, ObjectKind};
use std::collections::{HashMap, VecDeque};
use tracing::debug;

/// Result of ordering tables by foreign key direction
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableOrder {
    /// Every input table exactly once
    pub order: Vec<String>,
    /// Tables that could not be ordered, appended in catalog order
    pub cyclic: Vec<String>,
}

impl TableOrder {
    pub fn has_cycle(&self) -> bool {
        !self.cyclic.is_empty()
    }

    pub fn rank_of(&self, table: &str) -> Option<usize> {
        self.order.iter().position(|t| t == table)
    }
}

/// Kahn topological sort of `tables` (catalog order) so every referenced table
/// precedes the tables that reference it.
///
/// Self-references and references to tables outside the set add no edge.
pub fn resolve_table_order(
    tables: &[String],
    foreign_keys: &HashMap<String, Vec<ForeignKeyDescriptor>>,
) -> TableOrder {
    let index: HashMap<&str, usize> = tables
        .iter()
        .enumerate()
        .map(|(i, name)| (name.as_str(), i))
        .collect();

    let mut dependents: Vec<Vec<usize>> = vec![Vec::new(); tables.len()];
    let mut in_degree = vec![0usize; tables.len()];

    for (i, table) in tables.iter().enumerate() {
        let Some(keys) = foreign_keys.get(table) else {
            continue;
        };
        for key in keys {
            if key.referenced_table == *table {
                continue;
            }
            if let Some(&parent) = index.get(key.referenced_table.as_str()) {
                dependents[parent].push(i);
                in_degree[i] += 1;
            }
        }
    }

    let mut queue: VecDeque<usize> = (0..tables.len()).filter(|&i| in_degree[i] == 0).collect();
    let mut emitted = vec![false; tables.len()];
    let mut order = Vec::with_capacity(tables.len());

    while let Some(current) = queue.pop_front() {
        emitted[current] = true;
        order.push(tables[current].clone());
        for &child in &dependents[current] {
            in_degree[child] -= 1;
            if in_degree[child] == 0 {
                queue.push_back(child);
            }
        }
    }

    let cyclic: Vec<String> = tables
        .iter()
        .enumerate()
        .filter(|(i, _)| !emitted[*i])
        .map(|(_, name)| name.clone())
        .collect();
    order.extend(cyclic.iter().cloned());

    debug!(tables = tables.len(), cyclic = cyclic.len(), "Resolved table order");
    TableOrder { order, cyclic }
}

/// Rank every catalog object: tables in dependency order, then views and
/// triggers in catalog order. A cycle is recorded as a single warning.
pub fn build_dump_items(
    objects: &[CatalogObject],
    foreign_keys: &HashMap<String, Vec<ForeignKeyDescriptor>>,
    report: &mut DumpReport,
) -> Vec<DumpItem> {
    let tables: Vec<String> = objects
        .iter()
        .filter(|o| o.kind == ObjectKind::Table)
        .map(|o| o.name.clone())
        .collect();

    let table_order = resolve_table_order(&tables, foreign_keys);
    if table_order.has_cycle() {
        report.record_error(
            "schema",
            &ConvertError::DependencyCycle {
                tables: table_order.cyclic.clone(),
            },
        );
    }

    let by_name: HashMap<&str, &CatalogObject> = objects
        .iter()
        .filter(|o| o.kind == ObjectKind::Table)
        .map(|o| (o.name.as_str(), o))
        .collect();

    let ordered_tables = table_order
        .order
        .iter()
        .filter_map(|name| by_name.get(name.as_str()).copied());
    let others = objects.iter().filter(|o| o.kind != ObjectKind::Table);

    ordered_tables
        .chain(others)
        .enumerate()
        .map(|(rank, object)| DumpItem {
            rank,
            kind: object.kind,
            name: object.name.clone(),
            sql: object.sql.clone(),
        })
        .collect()
}
