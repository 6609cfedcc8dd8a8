use super::*;
use crate::config::StorageEngine;
use crate::error::ConvertError;
use crate::monitoring::DumpReport;
use crate::types::{
    CatalogObject, ColumnDescriptor, ForeignKeyDescriptor, IndexDescriptor, IndexOrigin, ObjectKind,
    TableDescriptor,
};
use std::collections::HashMap;

fn names(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| s.to_string()).collect()
}

fn fk_map(edges: &[(&str, &str)]) -> HashMap<String, Vec<ForeignKeyDescriptor>> {
    let mut map: HashMap<String, Vec<ForeignKeyDescriptor>> = HashMap::new();
    for (child, parent) in edges {
        map.entry(child.to_string())
            .or_default()
            .push(ForeignKeyDescriptor::new("ref_id", *parent, "id"));
    }
    map
}

/// Test dependency ordering
#[cfg(test)]
mod dependency_resolver_tests {
    use super::*;

    #[test]
    fn test_referenced_tables_come_first() {
        let tables = names(&["orders", "users", "items"]);
        let keys = fk_map(&[("orders", "users"), ("items", "orders")]);
        let order = resolve_table_order(&tables, &keys);
        assert_eq!(order.order, names(&["users", "orders", "items"]));
        assert!(!order.has_cycle());
        assert!(order.rank_of("users") < order.rank_of("orders"));
    }

    #[test]
    fn test_independent_tables_keep_catalog_order() {
        let tables = names(&["c", "a", "b"]);
        let order = resolve_table_order(&tables, &HashMap::new());
        assert_eq!(order.order, names(&["c", "a", "b"]));
    }

    #[test]
    fn test_cycle_appended_in_catalog_order() {
        let tables = names(&["x", "a", "b", "root"]);
        let keys = fk_map(&[("a", "b"), ("b", "a"), ("x", "root")]);
        let order = resolve_table_order(&tables, &keys);
        assert_eq!(order.order, names(&["root", "x", "a", "b"]));
        assert_eq!(order.cyclic, names(&["a", "b"]));
    }

    #[test]
    fn test_self_and_unknown_references_ignored() {
        let tables = names(&["tree", "leaf"]);
        let keys = fk_map(&[("tree", "tree"), ("leaf", "missing")]);
        let order = resolve_table_order(&tables, &keys);
        assert_eq!(order.order, names(&["tree", "leaf"]));
        assert!(!order.has_cycle());
    }

    #[test]
    fn test_dump_items_put_views_and_triggers_last() {
        let objects = vec![
            CatalogObject { kind: ObjectKind::View, name: "v".into(), sql: "CREATE VIEW v AS SELECT 1".into() },
            CatalogObject { kind: ObjectKind::Table, name: "child".into(), sql: String::new() },
            CatalogObject { kind: ObjectKind::Trigger, name: "t".into(), sql: String::new() },
            CatalogObject { kind: ObjectKind::Table, name: "parent".into(), sql: String::new() },
        ];
        let keys = fk_map(&[("child", "parent")]);
        let mut report = DumpReport::new("a.db", "a.sql");
        let items = build_dump_items(&objects, &keys, &mut report);

        let order: Vec<&str> = items.iter().map(|i| i.name.as_str()).collect();
        assert_eq!(order, vec!["parent", "child", "v", "t"]);
        assert_eq!(items.iter().map(|i| i.rank).collect::<Vec<_>>(), vec![0, 1, 2, 3]);
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_cycle_reported_once() {
        let objects = vec![
            CatalogObject { kind: ObjectKind::Table, name: "a".into(), sql: String::new() },
            CatalogObject { kind: ObjectKind::Table, name: "b".into(), sql: String::new() },
        ];
        let keys = fk_map(&[("a", "b"), ("b", "a")]);
        let mut report = DumpReport::new("a.db", "a.sql");
        let items = build_dump_items(&objects, &keys, &mut report);

        assert_eq!(items.len(), 2);
        assert_eq!(report.warnings.len(), 1);
        let expected = ConvertError::DependencyCycle { tables: names(&["a", "b"]) }.to_string();
        assert_eq!(report.warnings[0].message, expected);
    }
}

/// Test CREATE TABLE generation
#[cfg(test)]
mod ddl_generator_tests {
    use super::*;

    fn users_table() -> TableDescriptor {
        let mut table = TableDescriptor::new("users");
        table.columns.push(ColumnDescriptor::new("id", "INTEGER").primary_key());
        let mut name = ColumnDescriptor::new("name", "TEXT").not_null();
        name.max_text_length = 40;
        table.columns.push(name);
        table.primary_key = names(&["id"]);
        table
    }

    #[test]
    fn test_create_table_layout() {
        let generator = DdlGenerator::new(TableOptions::default());
        let output = generator.generate_table(&users_table());
        assert_eq!(output.statements[0], "DROP TABLE IF EXISTS `users`;");
        assert_eq!(
            output.statements[1],
            "CREATE TABLE `users` (\n  `id` BIGINT AUTO_INCREMENT NOT NULL,\n  `name` VARCHAR(40) NOT NULL,\n  PRIMARY KEY (`id`)\n) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4 COLLATE=utf8mb4_unicode_ci;"
        );
    }

    #[test]
    fn test_no_drop_when_disabled() {
        let options = TableOptions {
            drop_existing: false,
            ..TableOptions::default()
        };
        let output = DdlGenerator::new(options).generate_table(&users_table());
        assert_eq!(output.statements.len(), 1);
        assert!(output.statements[0].starts_with("CREATE TABLE"));
    }

    #[test]
    fn test_tablespace_precedes_partition() {
        let options = TableOptions {
            tablespace: Some("ts1".to_string()),
            partition: Some("PARTITION BY HASH(`id`) PARTITIONS 4".to_string()),
            ..TableOptions::default()
        };
        let sql = options.to_sql();
        let tablespace = sql.find("TABLESPACE `ts1`").unwrap();
        let partition = sql.find("PARTITION BY").unwrap();
        assert!(tablespace < partition);
    }

    #[test]
    fn test_composite_key_not_auto_increment() {
        let mut table = TableDescriptor::new("pairs");
        table.columns.push(ColumnDescriptor::new("a", "INTEGER").primary_key());
        table.columns.push(ColumnDescriptor::new("b", "INTEGER").primary_key());
        table.primary_key = names(&["a", "b"]);
        let output = DdlGenerator::new(TableOptions::default()).generate_table(&table);
        assert!(!output.statements[1].contains("AUTO_INCREMENT"));
        assert!(output.statements[1].contains("PRIMARY KEY (`a`, `b`)"));
    }
}

/// Test index and constraint generation
#[cfg(test)]
mod index_and_constraint_tests {
    use super::*;

    fn indexed_table() -> TableDescriptor {
        let mut table = TableDescriptor::new("docs");
        table.columns.push(ColumnDescriptor::new("id", "INTEGER").primary_key());
        table.columns.push(ColumnDescriptor::new("title", "TEXT"));
        table.columns.push(ColumnDescriptor::new("body", "TEXT"));
        table.primary_key = names(&["id"]);

        let mut auto = IndexDescriptor::new("sqlite_autoindex_docs_1", true, &["title"]);
        auto.origin = IndexOrigin::UniqueConstraint;
        table.indexes.push(auto);

        let mut pk = IndexDescriptor::new("sqlite_autoindex_docs_2", true, &["id"]);
        pk.origin = IndexOrigin::PrimaryKey;
        table.indexes.push(pk);

        let mut expr = IndexDescriptor::new("idx_lower", false, &[]);
        expr.columns = vec![None];
        table.indexes.push(expr);

        let mut partial = IndexDescriptor::new("idx_recent", false, &["body"]);
        partial.partial = true;
        table.indexes.push(partial);
        table
    }

    #[test]
    fn test_index_statements() {
        let output = IndexGenerator::new(IndexConfig::default()).generate_indexes(&indexed_table());
        assert_eq!(output.statements.len(), 2);

        let expected_auto = super::identifiers::auto_index_name(
            "docs",
            &names(&["title"]),
            "sqlite_autoindex_docs_1",
        );
        assert_eq!(
            output.statements[0],
            format!("CREATE UNIQUE INDEX `{}` ON `docs` (`title`);", expected_auto)
        );
        assert_eq!(output.statements[1], "CREATE INDEX `idx_recent` ON `docs` (`body`);");
        assert_eq!(output.warnings.len(), 2);
    }

    #[test]
    fn test_fulltext_index_when_supported() {
        let config = IndexConfig {
            fulltext: true,
            ..IndexConfig::default()
        };
        let output = IndexGenerator::new(config).generate_indexes(&indexed_table());
        assert!(output
            .statements
            .contains(&"CREATE FULLTEXT INDEX `fulltext_docs` ON `docs` (`title`, `body`);".to_string()));
    }

    #[test]
    fn test_fulltext_skipped_with_warning_when_unsupported() {
        let config = IndexConfig {
            fulltext: true,
            engine: StorageEngine::Memory,
            mysql_version: "8.0".to_string(),
        };
        let output = IndexGenerator::new(config).generate_indexes(&indexed_table());
        assert!(!output.statements.iter().any(|s| s.contains("FULLTEXT")));
        assert!(output.warnings.iter().any(|w| w.contains("FULLTEXT")));
    }

    #[test]
    fn test_foreign_key_statement() {
        let mut table = TableDescriptor::new("orders");
        let mut key = ForeignKeyDescriptor::new("user_id", "users", "id");
        key.on_delete = "CASCADE".to_string();
        key.on_update = "set null".to_string();
        table.foreign_keys.push(key);

        let output = ConstraintGenerator::new().generate_constraints(&table);
        let name = super::identifiers::foreign_key_name("orders", &names(&["user_id"]), "users");
        assert_eq!(
            output.statements[0],
            format!(
                "ALTER TABLE `orders` ADD CONSTRAINT `{}` FOREIGN KEY (`user_id`) REFERENCES `users` (`id`) ON DELETE CASCADE ON UPDATE SET NULL;",
                name
            )
        );
        assert!(output.warnings.is_empty());
    }

    #[test]
    fn test_composite_foreign_key_single_statement() {
        let mut table = TableDescriptor::new("child");
        table.foreign_keys.push(ForeignKeyDescriptor {
            columns: names(&["x", "y"]),
            referenced_table: "parent".to_string(),
            referenced_columns: names(&["a", "b"]),
            on_delete: "NO ACTION".to_string(),
            on_update: "NO ACTION".to_string(),
        });
        let output = ConstraintGenerator::new().generate_constraints(&table);
        assert_eq!(output.statements.len(), 1);
        assert!(output.statements[0].contains("FOREIGN KEY (`x`, `y`) REFERENCES `parent` (`a`, `b`)"));
    }
}

/// Test view and trigger rewriting
#[cfg(test)]
mod object_rewriter_tests {
    use super::*;

    #[test]
    fn test_view_identifiers_requoted() {
        let rewriter = ObjectRewriter::new(true);
        let output = rewriter.rewrite_view(
            "active users",
            "CREATE VIEW \"active users\" AS SELECT \"id\", `name` FROM users WHERE note = 'it''s'",
        );
        assert_eq!(output.statements[0], "DROP VIEW IF EXISTS `active users`;");
        assert_eq!(
            output.statements[1],
            "CREATE VIEW `active users` AS SELECT `id`, `name` FROM users WHERE note = 'it''s';"
        );
        assert!(output.warnings.is_empty());
    }

    #[test]
    fn test_view_if_not_exists_removed() {
        let output = ObjectRewriter::new(false).rewrite_view("v", "CREATE VIEW IF NOT EXISTS v AS SELECT 1");
        assert_eq!(output.statements, vec!["CREATE VIEW v AS SELECT 1;".to_string()]);
        assert_eq!(output.warnings.len(), 1);
    }

    #[test]
    fn test_trigger_wrapped_in_delimiters() {
        let output = ObjectRewriter::new(true).rewrite_trigger(
            "guard",
            "CREATE TRIGGER guard BEFORE DELETE ON users FOR EACH ROW BEGIN SELECT RAISE(FAIL, 'locked'); END;",
        );
        assert_eq!(output.statements[0], "DROP TRIGGER IF EXISTS `guard`;");
        let body = &output.statements[1];
        assert!(body.starts_with("-- Warning: trigger may need manual adjustment"));
        assert!(body.contains("\nDELIMITER $$\n"));
        assert!(body.contains("SIGNAL SQLSTATE '45000' SET MESSAGE_TEXT = 'locked';"));
        assert!(body.ends_with("END$$\nDELIMITER ;"));
        assert!(!output.warnings.is_empty());
    }

    #[test]
    fn test_case_end_does_not_close_begin() {
        let output = ObjectRewriter::new(false).rewrite_trigger(
            "t",
            "CREATE TRIGGER t AFTER UPDATE ON a BEGIN UPDATE b SET c = CASE WHEN NEW.x > 0 THEN 1 ELSE 0 END; END",
        );
        let body = &output.statements[0];
        assert!(body.contains("    UPDATE b SET c = CASE WHEN NEW.x > 0 THEN 1 ELSE 0 END;\nEND$$"));
    }
}
