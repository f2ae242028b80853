//! Migration DDL for a whole catalog
//!
//! Tables are ordered so that every referenced table is created before the
//! tables pointing at it. A reference that would close a cycle keeps its
//! column but loses the `REFERENCES` clause.

use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, warn};

use dstu2_models::{SchemaCatalog, TypeKind};

use crate::dialect::Dialect;
use crate::error::Result;
use crate::mapping::{ColumnKind, TableMapping};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct MigrationOptions {
    /// Also create tables for concrete resource types
    pub include_resources: bool,
}

/// A foreign key left out to break a reference cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DroppedForeignKey {
    pub table: String,
    pub column: String,
    pub references: String,
}

/// Ordered set of table mappings with their DDL
#[derive(Debug, Clone)]
pub struct Migration {
    dialect: Dialect,
    tables: Vec<TableMapping>,
    dropped: Vec<DroppedForeignKey>,
}

impl Migration {
    /// Every concrete complex and backbone type (plus resources if requested)
    pub fn for_catalog(
        catalog: &SchemaCatalog,
        dialect: Dialect,
        options: MigrationOptions,
    ) -> Result<Self> {
        let names: Vec<&str> = catalog
            .types()
            .filter(|t| !t.is_abstract)
            .filter(|t| match t.kind {
                TypeKind::ComplexType | TypeKind::BackboneElement => true,
                TypeKind::Resource => options.include_resources,
                TypeKind::PrimitiveType => false,
            })
            .map(|t| t.name.as_str())
            .collect();
        Self::for_types(catalog, dialect, &names)
    }

    /// The given types and every composite they reference
    pub fn for_types(catalog: &SchemaCatalog, dialect: Dialect, names: &[&str]) -> Result<Self> {
        let mut mappings: BTreeMap<String, TableMapping> = BTreeMap::new();
        let mut pending: Vec<String> = names.iter().map(|n| n.to_string()).collect();

        while let Some(name) = pending.pop() {
            if mappings.contains_key(&name) {
                continue;
            }
            let mapping = TableMapping::for_type(catalog, &name)?;
            for column in &mapping.columns {
                if let ColumnKind::Composite { type_name, .. } = &column.kind {
                    if !mappings.contains_key(type_name) {
                        pending.push(type_name.clone());
                    }
                }
            }
            mappings.insert(name, mapping);
        }

        let mut migration = Self {
            dialect,
            tables: Vec::with_capacity(mappings.len()),
            dropped: Vec::new(),
        };
        migration.order(mappings);
        debug!(
            tables = migration.tables.len(),
            dropped_foreign_keys = migration.dropped.len(),
            dialect = %dialect,
            "Planned migration"
        );
        Ok(migration)
    }

    /// Depth-first ordering, referenced tables first
    fn order(&mut self, mut mappings: BTreeMap<String, TableMapping>) {
        let mut done: BTreeSet<String> = BTreeSet::new();
        let names: Vec<String> = mappings.keys().cloned().collect();
        for name in names {
            let mut stack = Vec::new();
            self.visit(&name, &mut mappings, &mut done, &mut stack);
        }
    }

    fn visit(
        &mut self,
        name: &str,
        mappings: &mut BTreeMap<String, TableMapping>,
        done: &mut BTreeSet<String>,
        stack: &mut Vec<String>,
    ) {
        if done.contains(name) {
            return;
        }
        let Some(mapping) = mappings.get(name) else {
            return;
        };
        stack.push(name.to_string());

        let targets: Vec<(String, String)> = mapping
            .columns
            .iter()
            .filter_map(|c| match &c.kind {
                ColumnKind::Composite { type_name, .. } if c.foreign_key => {
                    Some((c.name.clone(), type_name.clone()))
                }
                _ => None,
            })
            .collect();

        for (column, target) in targets {
            if target == name || done.contains(&target) {
                continue;
            }
            if stack.contains(&target) {
                let table = mappings.get(name).map(|m| m.table.clone()).unwrap_or_default();
                let references = mappings
                    .get(&target)
                    .map(|m| m.table.clone())
                    .unwrap_or_default();
                warn!(
                    table = %table,
                    column = %column,
                    references = %references,
                    "Dropping foreign key that closes a reference cycle"
                );
                if let Some(col) = mappings.get_mut(name).and_then(|m| m.column_mut(&column)) {
                    col.foreign_key = false;
                }
                self.dropped.push(DroppedForeignKey {
                    table,
                    column,
                    references,
                });
                continue;
            }
            self.visit(&target, mappings, done, stack);
        }

        stack.pop();
        done.insert(name.to_string());
        if let Some(mapping) = mappings.remove(name) {
            self.tables.push(mapping);
        }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Tables in creation order
    pub fn tables(&self) -> &[TableMapping] {
        &self.tables
    }

    pub fn table(&self, name: &str) -> Option<&TableMapping> {
        self.tables.iter().find(|t| t.table == name)
    }

    pub fn dropped_foreign_keys(&self) -> &[DroppedForeignKey] {
        &self.dropped
    }

    pub fn upgrade_statements(&self) -> Vec<String> {
        self.tables
            .iter()
            .map(|t| t.create_table_sql(self.dialect))
            .collect()
    }

    pub fn downgrade_statements(&self) -> Vec<String> {
        self.tables
            .iter()
            .rev()
            .map(|t| t.drop_table_sql(self.dialect))
            .collect()
    }

    /// `CREATE TABLE` script
    pub fn upgrade(&self) -> String {
        self.upgrade_statements().join("\n\n") + "\n"
    }

    /// `DROP TABLE` script, reverse creation order
    pub fn downgrade(&self) -> String {
        self.downgrade_statements().join("\n") + "\n"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dstu2_models::{Cardinality, FieldSchema, TypeSchema};

    fn position(migration: &Migration, table: &str) -> usize {
        migration
            .tables()
            .iter()
            .position(|t| t.table == table)
            .unwrap_or_else(|| panic!("table {table} missing"))
    }

    #[test]
    fn test_builtin_order() {
        let catalog = SchemaCatalog::builtin().unwrap();
        let migration =
            Migration::for_catalog(&catalog, Dialect::Postgres, MigrationOptions::default()).unwrap();

        assert!(position(&migration, "Quantity") < position(&migration, "Range"));
        assert!(position(&migration, "Range") < position(&migration, "ObservationReferenceRange"));
        assert!(position(&migration, "CodeableConcept") < position(&migration, "Identifier"));
        assert!(position(&migration, "FHIRReference") < position(&migration, "Identifier"));
        assert!(migration.table("Patient").is_none());
        assert!(migration.table("Element").is_none());
        assert!(migration.table("string").is_none());
        assert!(migration.dropped_foreign_keys().is_empty());
    }

    #[test]
    fn test_include_resources() {
        let catalog = SchemaCatalog::builtin().unwrap();
        let migration = Migration::for_catalog(
            &catalog,
            Dialect::Sqlite,
            MigrationOptions {
                include_resources: true,
            },
        )
        .unwrap();

        assert!(position(&migration, "HumanName") < position(&migration, "PatientContact"));
        assert!(migration.table("Patient").is_some());
        assert!(migration.table("DomainResource").is_none());
    }

    #[test]
    fn test_for_types_pulls_dependencies() {
        let catalog = SchemaCatalog::builtin().unwrap();
        let migration = Migration::for_types(&catalog, Dialect::Postgres, &["Range"]).unwrap();
        let tables: Vec<&str> = migration.tables().iter().map(|t| t.table.as_str()).collect();
        assert_eq!(tables, vec!["Quantity", "Range"]);

        assert_eq!(
            migration.downgrade(),
            "DROP TABLE IF EXISTS \"Range\";\nDROP TABLE IF EXISTS \"Quantity\";\n"
        );
        assert!(migration.upgrade().starts_with("CREATE TABLE IF NOT EXISTS \"Quantity\""));
    }

    #[test]
    fn test_cycle_drops_one_foreign_key() {
        let mut catalog = SchemaCatalog::new("1.0.2");
        catalog.register(TypeSchema::new("string", TypeKind::PrimitiveType));
        catalog.register(
            TypeSchema::new("Alpha", TypeKind::ComplexType)
                .with_field(FieldSchema::new("beta", "Beta", Cardinality::OPTIONAL)),
        );
        catalog.register(
            TypeSchema::new("Beta", TypeKind::ComplexType)
                .with_field(FieldSchema::new("alpha", "Alpha", Cardinality::OPTIONAL))
                .with_field(FieldSchema::new("next", "Beta", Cardinality::OPTIONAL)),
        );

        let migration =
            Migration::for_catalog(&catalog, Dialect::Postgres, MigrationOptions::default()).unwrap();

        assert_eq!(
            migration.dropped_foreign_keys(),
            &[DroppedForeignKey {
                table: "Beta".into(),
                column: "alpha".into(),
                references: "Alpha".into(),
            }]
        );
        let tables: Vec<&str> = migration.tables().iter().map(|t| t.table.as_str()).collect();
        assert_eq!(tables, vec!["Beta", "Alpha"]);

        let beta = migration.table("Beta").unwrap();
        assert_eq!(beta.column("alpha").unwrap().references(), None);
        // self references are valid DDL and stay
        assert_eq!(beta.column("next").unwrap().references(), Some("Beta"));
        assert_eq!(
            migration.table("Alpha").unwrap().column("beta").unwrap().references(),
            Some("Beta")
        );
    }
}
