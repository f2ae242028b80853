//! Type catalog with inheritance resolution
//!
//! [`SchemaCatalog`] is a string-keyed registry of [`TypeSchema`]s. Types only
//! declare the fields they add; [`SchemaCatalog::resolve`] walks the `base`
//! chain and produces a [`ResolvedType`] carrying the full, flattened field
//! list. Resolutions are cached behind an `RwLock` so a shared catalog can be
//! used from several threads.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, RwLock};
use tracing::debug;

use crate::error::{Error, Result};
use crate::schema::{is_primitive_code, FieldSchema, TypeKind, TypeSchema};

const BUILTIN_DSTU2: &str = include_str!("../data/dstu2.json");

/// On-disk form of a catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogDocument {
    pub fhir_version: String,
    #[serde(default)]
    pub types: Vec<TypeSchema>,
}

/// A type with its base chain flattened
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedType {
    pub name: String,
    pub kind: TypeKind,
    pub table: String,
    pub is_abstract: bool,
    /// Type names from the root of the base chain down to this type
    pub lineage: Vec<String>,
    /// Inherited fields first, in declaration order
    pub fields: Vec<FieldSchema>,
}

impl ResolvedType {
    /// Look up a field by its declared name; `value` also finds `value[x]`
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields
            .iter()
            .find(|f| f.name == name || (f.is_choice() && f.choice_base() == name))
    }

    /// Find the field a JSON property belongs to, with the concrete type code
    pub fn field_for_json_name(&self, key: &str) -> Option<(&FieldSchema, &str)> {
        self.fields
            .iter()
            .find_map(|f| f.type_for_json_name(key).map(|code| (f, code)))
    }

    pub fn is_resource(&self) -> bool {
        self.kind == TypeKind::Resource
    }

    /// Whether `name` appears anywhere in the base chain (including self)
    pub fn inherits_from(&self, name: &str) -> bool {
        self.lineage.iter().any(|t| t == name)
    }

    /// Name of the direct base type, if any
    pub fn base(&self) -> Option<&str> {
        let len = self.lineage.len();
        if len < 2 {
            None
        } else {
            Some(self.lineage[len - 2].as_str())
        }
    }
}

/// Registry of FHIR structure descriptions
#[derive(Debug)]
pub struct SchemaCatalog {
    fhir_version: String,
    types: BTreeMap<String, TypeSchema>,
    resolved: RwLock<HashMap<String, Arc<ResolvedType>>>,
}

impl Clone for SchemaCatalog {
    fn clone(&self) -> Self {
        Self {
            fhir_version: self.fhir_version.clone(),
            types: self.types.clone(),
            resolved: RwLock::new(HashMap::new()),
        }
    }
}

impl SchemaCatalog {
    /// Create an empty catalog
    pub fn new(fhir_version: impl Into<String>) -> Self {
        Self {
            fhir_version: fhir_version.into(),
            types: BTreeMap::new(),
            resolved: RwLock::new(HashMap::new()),
        }
    }

    /// The FHIR 1.0.2 catalog compiled into this crate
    pub fn builtin() -> Result<Self> {
        Self::from_json(BUILTIN_DSTU2)
    }

    /// Load a catalog document from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        let document: CatalogDocument = serde_json::from_str(json)?;
        Ok(Self::from_document(document))
    }

    /// Load a catalog document from disk
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        let catalog = Self::from_json(&content)?;
        debug!(
            path = %path.display(),
            types = catalog.len(),
            "Loaded schema catalog"
        );
        Ok(catalog)
    }

    pub fn from_document(document: CatalogDocument) -> Self {
        let mut catalog = Self::new(document.fhir_version);
        for schema in document.types {
            catalog.register(schema);
        }
        catalog
    }

    pub fn fhir_version(&self) -> &str {
        &self.fhir_version
    }

    /// Add or replace a type, returning the previous definition
    pub fn register(&mut self, schema: TypeSchema) -> Option<TypeSchema> {
        self.resolved = RwLock::new(HashMap::new());
        self.types.insert(schema.name.clone(), schema)
    }

    /// Register every type of `other`, replacing same-named ones
    pub fn merge(&mut self, other: SchemaCatalog) {
        for (_, schema) in other.types {
            self.register(schema);
        }
    }

    pub fn get(&self, name: &str) -> Option<&TypeSchema> {
        self.types.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.types.len()
    }

    pub fn is_empty(&self) -> bool {
        self.types.is_empty()
    }

    /// All types, sorted by name
    pub fn types(&self) -> impl Iterator<Item = &TypeSchema> {
        self.types.values()
    }

    /// Resolve a type and its full field list
    pub fn resolve(&self, name: &str) -> Result<Arc<ResolvedType>> {
        if let Some(hit) = self
            .resolved
            .read()
            .ok()
            .and_then(|cache| cache.get(name).cloned())
        {
            return Ok(hit);
        }

        let schema = self
            .get(name)
            .ok_or_else(|| Error::UnknownType(name.to_string()))?;

        let mut chain = vec![schema];
        let mut seen: HashSet<&str> = HashSet::from([name]);
        let mut current = schema;
        while let Some(base) = current.base.as_deref() {
            if !seen.insert(base) {
                return Err(Error::CyclicBase(name.to_string()));
            }
            let parent = self.get(base).ok_or_else(|| Error::UnknownBase {
                type_name: current.name.clone(),
                base: base.to_string(),
            })?;
            chain.push(parent);
            current = parent;
        }
        chain.reverse();

        let mut fields: Vec<FieldSchema> = Vec::new();
        for ty in &chain {
            for field in &ty.fields {
                match fields.iter_mut().find(|f| f.name == field.name) {
                    Some(existing) => *existing = field.clone(),
                    None => fields.push(field.clone()),
                }
            }
        }

        let resolved = Arc::new(ResolvedType {
            name: schema.name.clone(),
            kind: schema.kind,
            table: schema.table_name().to_string(),
            is_abstract: schema.is_abstract,
            lineage: chain.iter().map(|t| t.name.clone()).collect(),
            fields,
        });

        if let Ok(mut cache) = self.resolved.write() {
            cache.insert(name.to_string(), Arc::clone(&resolved));
        }
        Ok(resolved)
    }

    /// Types of one kind, sorted by name
    pub fn types_of_kind(&self, kind: TypeKind) -> Vec<&TypeSchema> {
        self.types.values().filter(|t| t.kind == kind).collect()
    }

    pub fn resource_types(&self) -> Vec<&TypeSchema> {
        self.types_of_kind(TypeKind::Resource)
    }

    pub fn complex_types(&self) -> Vec<&TypeSchema> {
        self.types_of_kind(TypeKind::ComplexType)
    }

    pub fn primitive_types(&self) -> Vec<&TypeSchema> {
        self.types_of_kind(TypeKind::PrimitiveType)
    }

    pub fn backbone_types(&self) -> Vec<&TypeSchema> {
        self.types_of_kind(TypeKind::BackboneElement)
    }

    /// Non-primitive type codes used by the resolved fields of `name`
    pub fn dependencies(&self, name: &str) -> Result<BTreeSet<String>> {
        let resolved = self.resolve(name)?;
        Ok(resolved
            .fields
            .iter()
            .flat_map(|f| f.types.iter())
            .filter(|code| !is_primitive_code(code))
            .cloned()
            .collect())
    }

    /// Verify that every base and every field type code is registered
    pub fn check(&self) -> Result<()> {
        for schema in self.types.values() {
            self.resolve(&schema.name)?;
            for field in &schema.fields {
                if let Some(code) = field.types.iter().find(|code| !self.contains(code)) {
                    return Err(Error::InvalidCatalog(format!(
                        "{}.{} uses unknown type '{}'",
                        schema.name, field.name, code
                    )));
                }
            }
        }
        Ok(())
    }

    pub fn to_document(&self) -> CatalogDocument {
        CatalogDocument {
            fhir_version: self.fhir_version.clone(),
            types: self.types.values().cloned().collect(),
        }
    }

    /// Serialize back to the catalog document format
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(&self.to_document())?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::Cardinality;

    fn field_names(resolved: &ResolvedType) -> Vec<&str> {
        resolved.fields.iter().map(|f| f.name.as_str()).collect()
    }

    #[test]
    fn test_builtin_catalog_is_consistent() {
        let catalog = SchemaCatalog::builtin().unwrap();
        assert_eq!(catalog.fhir_version(), "1.0.2");
        catalog.check().unwrap();

        for name in ["Patient", "Practitioner", "Observation", "Bundle", "HumanName"] {
            assert!(catalog.contains(name), "missing {name}");
        }
    }

    #[test]
    fn test_resolve_resource_chain() {
        let catalog = SchemaCatalog::builtin().unwrap();
        let patient = catalog.resolve("Patient").unwrap();

        assert_eq!(patient.lineage, vec!["Resource", "DomainResource", "Patient"]);
        assert_eq!(patient.base(), Some("DomainResource"));
        assert!(patient.is_resource());
        assert!(!patient.is_abstract);
        assert_eq!(
            &field_names(&patient)[..9],
            &[
                "id",
                "meta",
                "implicitRules",
                "language",
                "text",
                "contained",
                "extension",
                "modifierExtension",
                "identifier"
            ]
        );
    }

    #[test]
    fn test_resolve_backbone_chain() {
        let catalog = SchemaCatalog::builtin().unwrap();
        let contact = catalog.resolve("PatientContact").unwrap();

        assert_eq!(contact.lineage, vec!["Element", "BackboneElement", "PatientContact"]);
        assert_eq!(
            &field_names(&contact)[..4],
            &["id", "extension", "modifierExtension", "relationship"]
        );
    }

    #[test]
    fn test_resolve_is_cached() {
        let catalog = SchemaCatalog::builtin().unwrap();
        let first = catalog.resolve("Quantity").unwrap();
        let second = catalog.resolve("Quantity").unwrap();
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_redeclared_field_replaces_in_place() {
        let mut catalog = SchemaCatalog::new("1.0.2");
        catalog.register(
            TypeSchema::new("Base", TypeKind::ComplexType)
                .with_field(FieldSchema::new("a", "string", Cardinality::OPTIONAL))
                .with_field(FieldSchema::new("b", "string", Cardinality::OPTIONAL)),
        );
        catalog.register(
            TypeSchema::new("Child", TypeKind::ComplexType)
                .with_base("Base")
                .with_field(FieldSchema::new("c", "string", Cardinality::OPTIONAL))
                .with_field(FieldSchema::new("a", "code", Cardinality::MANY)),
        );

        let child = catalog.resolve("Child").unwrap();
        assert_eq!(field_names(&child), vec!["a", "b", "c"]);
        assert_eq!(child.fields[0].type_code(), Some("code"));
        assert!(child.fields[0].cardinality.is_array());
    }

    #[test]
    fn test_resolve_errors() {
        let mut catalog = SchemaCatalog::new("1.0.2");
        assert!(matches!(
            catalog.resolve("Nope"),
            Err(Error::UnknownType(name)) if name == "Nope"
        ));

        catalog.register(TypeSchema::new("Orphan", TypeKind::ComplexType).with_base("Missing"));
        assert!(matches!(
            catalog.resolve("Orphan"),
            Err(Error::UnknownBase { base, .. }) if base == "Missing"
        ));

        catalog.register(TypeSchema::new("A", TypeKind::ComplexType).with_base("B"));
        catalog.register(TypeSchema::new("B", TypeKind::ComplexType).with_base("A"));
        assert!(matches!(catalog.resolve("A"), Err(Error::CyclicBase(_))));
    }

    #[test]
    fn test_register_invalidates_cache() {
        let mut catalog = SchemaCatalog::new("1.0.2");
        catalog.register(TypeSchema::new("Thing", TypeKind::ComplexType));
        assert!(catalog.resolve("Thing").unwrap().fields.is_empty());

        catalog.register(
            TypeSchema::new("Thing", TypeKind::ComplexType)
                .with_field(FieldSchema::new("label", "string", Cardinality::OPTIONAL)),
        );
        assert_eq!(catalog.resolve("Thing").unwrap().fields.len(), 1);
    }

    #[test]
    fn test_kind_listings_and_dependencies() {
        let catalog = SchemaCatalog::builtin().unwrap();

        let resources: Vec<&str> = catalog
            .resource_types()
            .iter()
            .map(|t| t.name.as_str())
            .collect();
        assert!(resources.contains(&"Patient"));
        assert!(resources.contains(&"DomainResource"));
        assert!(!resources.contains(&"HumanName"));

        assert!(catalog
            .backbone_types()
            .iter()
            .any(|t| t.name == "ObservationReferenceRange"));
        assert_eq!(catalog.primitive_types().len(), 18);

        let deps = catalog.dependencies("Range").unwrap();
        assert_eq!(
            deps.into_iter().collect::<Vec<_>>(),
            vec!["Extension".to_string(), "Quantity".to_string()]
        );
    }

    #[test]
    fn test_quantity_profiles_share_quantity_fields() {
        let catalog = SchemaCatalog::builtin().unwrap();
        let quantity = catalog.resolve("Quantity").unwrap();

        for name in ["Money", "SimpleQuantity", "Age", "Duration", "Count", "Distance"] {
            let profile = catalog.resolve(name).unwrap();
            assert_eq!(profile.base(), Some("Quantity"), "{name}");
            assert!(profile.inherits_from("Element"));
            assert_eq!(field_names(&profile), field_names(&quantity), "{name}");
        }

        let dispense = catalog.resolve("MedicationOrderDispenseRequest").unwrap();
        assert_eq!(
            dispense.field("expectedSupplyDuration").unwrap().types,
            vec!["Duration".to_string()]
        );
    }

    #[test]
    fn test_field_lookup_by_json_name() {
        let catalog = SchemaCatalog::builtin().unwrap();
        let observation = catalog.resolve("Observation").unwrap();

        let (field, code) = observation.field_for_json_name("valueQuantity").unwrap();
        assert_eq!(field.name, "value[x]");
        assert_eq!(code, "Quantity");
        assert!(observation.field("value").is_some());
        assert!(observation.field_for_json_name("valueFoo").is_none());
    }

    #[test]
    fn test_document_round_trip() {
        let catalog = SchemaCatalog::builtin().unwrap();
        let json = catalog.to_json().unwrap();
        let reloaded = SchemaCatalog::from_json(&json).unwrap();

        assert_eq!(reloaded.len(), catalog.len());
        assert_eq!(
            reloaded.resolve("Patient").unwrap(),
            catalog.resolve("Patient").unwrap()
        );
    }

    #[test]
    fn test_merge_overrides() {
        let mut catalog = SchemaCatalog::builtin().unwrap();
        let mut overlay = SchemaCatalog::new("1.0.2");
        overlay.register(
            TypeSchema::new("Period", TypeKind::ComplexType)
                .with_base("Element")
                .with_field(FieldSchema::new("start", "dateTime", Cardinality::OPTIONAL)),
        );
        catalog.merge(overlay);

        let period = catalog.resolve("Period").unwrap();
        assert!(period.field("end").is_none());
        assert!(period.field("start").is_some());
    }
}
