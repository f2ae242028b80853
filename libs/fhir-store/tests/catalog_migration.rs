use dstu2_models::{ElementFactory, SchemaCatalog};
use dstu2_store::{BindValue, Dialect, Migration, MigrationOptions, RowPlanner};
use serde_json::Value;
use std::collections::HashSet;
use std::{fs::File, path::PathBuf, sync::Arc};

fn load_fixture(name: &str) -> Value {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("../fhir-models/tests/fixtures")
        .join(name);
    assert!(path.exists(), "fixture missing at {:?}", path);

    let file = File::open(&path).expect("failed to open fixture");
    serde_json::from_reader(file).expect("failed to deserialize fixture")
}

#[test]
fn every_foreign_key_points_at_an_earlier_table() {
    let catalog = SchemaCatalog::builtin().unwrap();
    let migration = Migration::for_catalog(
        &catalog,
        Dialect::Postgres,
        MigrationOptions {
            include_resources: true,
        },
    )
    .unwrap();

    let mut created: HashSet<&str> = HashSet::new();
    for table in migration.tables() {
        for column in table.foreign_keys() {
            let target = column.references().unwrap();
            assert!(
                target == table.table || created.contains(target),
                "{}.{} references {} before it exists",
                table.table,
                column.name,
                target
            );
        }
        created.insert(table.table.as_str());
    }

    let upgrade = migration.upgrade();
    let downgrade = migration.downgrade();
    assert_eq!(
        upgrade.matches("CREATE TABLE").count(),
        downgrade.matches("DROP TABLE").count()
    );
    assert!(upgrade.contains("\"high\" TEXT REFERENCES \"Quantity\" (\"id\")"));
}

#[test]
fn practitioner_rows_insert_in_dependency_order() {
    let factory = ElementFactory::builtin().unwrap();
    let catalog = Arc::clone(factory.catalog());
    let practitioner = factory
        .from_json(&load_fixture("practitioner-example-f202-lm.json"))
        .unwrap();

    let rows = RowPlanner::new(catalog).plan(&practitioner).unwrap();
    let tables: Vec<&str> = rows.iter().map(|r| r.table.as_str()).collect();
    assert_eq!(tables, vec!["Narrative", "HumanName", "Practitioner"]);

    let root = rows.last().unwrap();
    assert_eq!(root.id, "f202");
    assert_eq!(root.get("name"), Some(&BindValue::Text(rows[1].id.clone())));
    assert_eq!(root.get("gender"), Some(&BindValue::Text("male".into())));
    assert!(matches!(root.get("practitionerRole"), Some(BindValue::Json(Value::Array(_)))));

    let statement = root.insert_sql(Dialect::Sqlite);
    assert!(statement.sql.starts_with("INSERT INTO \"Practitioner\" (\"id\", \"text\""));
    assert_eq!(statement.params[0], BindValue::Text("f202".into()));
}
