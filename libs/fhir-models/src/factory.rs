//! Resource factory
//!
//! Maps a `resourceType` string plus a JSON object onto the matching catalog
//! type. Types the catalog does not carry degrade to the generic `Element`
//! type instead of failing, with the whole payload kept in `extras`.

use serde_json::Value;
use std::io::Read;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::catalog::SchemaCatalog;
use crate::element::Element;
use crate::error::{Error, Result};
use crate::resource_names::is_dstu2_resource;

/// Type every unknown resource falls back to
pub const FALLBACK_TYPE: &str = "Element";

/// Builds [`Element`]s from JSON resources
#[derive(Debug, Clone)]
pub struct ElementFactory {
    catalog: Arc<SchemaCatalog>,
}

impl ElementFactory {
    pub fn new(catalog: Arc<SchemaCatalog>) -> Self {
        Self { catalog }
    }

    /// Factory over the embedded FHIR 1.0.2 catalog
    pub fn builtin() -> Result<Self> {
        Ok(Self::new(Arc::new(SchemaCatalog::builtin()?)))
    }

    pub fn catalog(&self) -> &Arc<SchemaCatalog> {
        &self.catalog
    }

    /// Instantiate `resource_type` from `json`
    ///
    /// Only concrete resource types are dispatched; anything else yields a
    /// generic `Element` holding the payload.
    pub fn instantiate(&self, resource_type: &str, json: &Value) -> Result<Element> {
        if !json.is_object() {
            return Err(Error::ExpectedObject(resource_type.to_string()));
        }
        instantiate_with(&self.catalog, resource_type, json, resource_type)
    }

    /// Instantiate from a JSON object carrying `resourceType`
    pub fn from_json(&self, json: &Value) -> Result<Element> {
        let object = json
            .as_object()
            .ok_or_else(|| Error::ExpectedObject("resource".to_string()))?;
        let resource_type = object
            .get("resourceType")
            .and_then(Value::as_str)
            .ok_or(Error::MissingResourceType)?;
        self.instantiate(resource_type, json)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(&self, json: &str) -> Result<Element> {
        let value: Value = serde_json::from_str(json)?;
        self.from_json(&value)
    }

    pub fn from_reader<R: Read>(&self, reader: R) -> Result<Element> {
        let value: Value = serde_json::from_reader(reader)?;
        self.from_json(&value)
    }

    /// Whether `resource_type` dispatches to a concrete catalog type
    pub fn is_known(&self, resource_type: &str) -> bool {
        is_concrete_resource(&self.catalog, resource_type)
    }

    /// Resource types this factory dispatches, sorted
    pub fn known_resource_types(&self) -> Vec<&str> {
        self.catalog
            .resource_types()
            .into_iter()
            .filter(|t| !t.is_abstract)
            .map(|t| t.name.as_str())
            .collect()
    }
}

fn is_concrete_resource(catalog: &SchemaCatalog, resource_type: &str) -> bool {
    catalog
        .get(resource_type)
        .is_some_and(|t| t.kind == crate::schema::TypeKind::Resource && !t.is_abstract)
}

/// Decode a nested resource (`contained`, `Bundle.entry.resource`)
pub(crate) fn dispatch(catalog: &SchemaCatalog, json: &Value, path: &str) -> Result<Element> {
    match json.get("resourceType").and_then(Value::as_str) {
        Some(resource_type) => instantiate_with(catalog, resource_type, json, path),
        None => fallback(catalog, json, path),
    }
}

fn instantiate_with(
    catalog: &SchemaCatalog,
    resource_type: &str,
    json: &Value,
    path: &str,
) -> Result<Element> {
    if is_concrete_resource(catalog, resource_type) {
        debug!(resource_type, "Instantiating resource");
        let ty = catalog.resolve(resource_type)?;
        return Element::decode(catalog, ty, json, path);
    }

    if is_dstu2_resource(resource_type) {
        warn!(
            resource_type,
            path, "Resource type is not in the catalog, falling back to Element"
        );
    } else {
        warn!(
            resource_type,
            path, "Unknown resource type, falling back to Element"
        );
    }
    fallback(catalog, json, path)
}

fn fallback(catalog: &SchemaCatalog, json: &Value, path: &str) -> Result<Element> {
    let extras = json
        .as_object()
        .cloned()
        .ok_or_else(|| Error::ExpectedObject(path.to_string()))?;
    let ty = catalog.resolve(FALLBACK_TYPE)?;
    Ok(Element::from_resolved(ty).with_extras(extras))
}
