//! FHIR 1.0.2 (DSTU2) data models
//!
//! This crate describes FHIR structures as data instead of one hand-written
//! type per resource. A [`SchemaCatalog`] holds [`TypeSchema`]s with their base
//! chain; an [`Element`] is a schema-backed instance of any catalog type, and
//! [`ElementFactory`] maps a `resourceType` plus JSON onto the right one.
//!
//! # Module Organization
//!
//! - `schema`: type and field descriptions (cardinality, choice fields)
//! - `catalog`: registry with inheritance resolution, embedded DSTU2 catalog
//! - `element`: generic instances and their JSON round trip
//! - `factory`: `resourceType` dispatch with fallback to `Element`
//! - `primitives`: partial dates and times
//! - `reference`: `Reference.reference` parsing
//! - `validation`: opt-in cardinality and type checks
//!
//! # Example
//!
//! ```rust
//! use dstu2_models::{ElementFactory, FieldValue};
//! use serde_json::json;
//!
//! let factory = ElementFactory::builtin().unwrap();
//! let patient = factory
//!     .from_json(&json!({
//!         "resourceType": "Patient",
//!         "id": "example",
//!         "name": [{ "family": ["Chalmers"], "given": ["Peter", "James"] }]
//!     }))
//!     .unwrap();
//!
//! assert_eq!(patient.resource_type(), Some("Patient"));
//! let name = patient.get("name").and_then(FieldValue::as_list).unwrap();
//! assert_eq!(name[0].as_element().unwrap().type_name(), "HumanName");
//! ```

pub mod catalog;
pub mod element;
pub mod error;
pub mod factory;
pub mod primitives;
pub mod reference;
pub mod resource_names;
pub mod schema;
pub mod validation;

// Re-export commonly used types
pub use catalog::{CatalogDocument, ResolvedType, SchemaCatalog};
pub use element::{Element, FieldValue};
pub use error::{Error, Result};
pub use factory::{ElementFactory, FALLBACK_TYPE};
pub use primitives::{DatePrecision, FhirDate, FhirTime};
pub use reference::ReferenceTarget;
pub use resource_names::is_dstu2_resource;
pub use schema::{
    capitalize_first, is_primitive_code, Cardinality, FieldSchema, TypeKind, TypeSchema,
};
pub use validation::{validate, Issue, IssueKind, Severity};
