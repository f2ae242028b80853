use dstu2_codegen::generators::rust::RustGenerator;
use dstu2_codegen::generators::GeneratorConfig;
use dstu2_codegen::{
    generate_rust_from_catalog, generate_rust_from_definitions, CatalogExporter, CodeGenerator,
};
use dstu2_models::{ElementFactory, SchemaCatalog, TypeKind};
use serde_json::json;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

fn definitions_dir() -> PathBuf {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/definitions");
    assert!(path.exists(), "fixtures missing at {:?}", path);
    path
}

#[test]
fn definitions_convert_to_a_usable_catalog() {
    let codegen = CodeGenerator::from_structure_definitions(&[definitions_dir()]).unwrap();
    let catalog = codegen.catalog();

    assert_eq!(catalog.fhir_version(), "1.0.2");
    // the us-core profile is skipped
    assert!(!catalog.contains("us-core-patient"));
    assert_eq!(catalog.get("DomainResource").unwrap().kind, TypeKind::Resource);

    let patient = catalog.get("Patient").unwrap();
    let declared: Vec<&str> = patient.fields.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(
        declared,
        vec!["active", "name", "birthDate", "deceased[x]", "contact", "managingOrganization"]
    );

    let contact = catalog.resolve("PatientContact").unwrap();
    assert!(contact.inherits_from("BackboneElement"));
    assert_eq!(contact.field("organization").unwrap().targets, vec!["Organization"]);
    assert_eq!(
        contact.fields.iter().filter(|f| f.name == "extension").count(),
        1
    );

    // the converted catalog drives the runtime factory
    let factory = ElementFactory::new(Arc::new(catalog.clone()));
    let element = factory
        .from_json(&json!({
            "resourceType": "Patient",
            "id": "p1",
            "active": true,
            "deceasedBoolean": false,
            "contact": [{ "name": { "family": ["Doe"] } }]
        }))
        .unwrap();
    assert_eq!(element.type_name(), "Patient");
    assert_eq!(element.id(), Some("p1"));
}

#[test]
fn exported_catalog_round_trips() {
    let codegen = CodeGenerator::from_structure_definitions(&[definitions_dir()]).unwrap();
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("catalog.json");

    CatalogExporter::new()
        .export_to(codegen.catalog(), &path)
        .unwrap();
    let reloaded = SchemaCatalog::from_path(&path).unwrap();

    assert_eq!(reloaded.len(), codegen.catalog().len());
    assert_eq!(
        reloaded.resolve("Patient").unwrap(),
        codegen.catalog().resolve("Patient").unwrap()
    );
}

#[test]
fn rust_models_from_definitions() {
    let dir = tempfile::tempdir().unwrap();
    let count =
        generate_rust_from_definitions(&[definitions_dir()], dir.path(), GeneratorConfig::default())
            .unwrap();

    // Extension, HumanName, Reference, Patient, PatientContact, factory, mod.rs
    assert_eq!(count, 7);

    let contact = fs::read_to_string(dir.path().join("patient_contact.rs")).unwrap();
    assert!(contact.contains("pub struct PatientContact {"));
    assert!(contact.contains("    pub modifier_extension: Option<Vec<Extension>>,\n"));
    assert!(contact.contains("    pub organization: Option<Reference>,\n"));

    let factory = fs::read_to_string(dir.path().join("element_factory.rs")).unwrap();
    assert!(factory.contains("\"Patient\" => Self::Patient("));
}

#[test]
fn rust_models_from_builtin_catalog() {
    let catalog = SchemaCatalog::builtin().unwrap();
    let dir = tempfile::tempdir().unwrap();

    let count =
        generate_rust_from_catalog(&catalog, dir.path(), GeneratorConfig::default()).unwrap();
    let output = CodeGenerator::new(catalog.clone())
        .generate(RustGenerator::new_default())
        .unwrap();
    assert_eq!(count, output.modules.len());

    let mod_rs = fs::read_to_string(dir.path().join("mod.rs")).unwrap();
    for resource in ["patient", "practitioner", "observation", "bundle"] {
        assert!(mod_rs.contains(&format!("pub mod {resource};")));
    }

    let observation = fs::read_to_string(dir.path().join("observation.rs")).unwrap();
    assert!(observation.contains("    pub value_quantity: Option<Quantity>,\n"));
    assert!(observation.contains("impl fmt::Display for Observation {"));
}
