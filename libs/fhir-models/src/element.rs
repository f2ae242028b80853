//! Schema-backed FHIR instances
//!
//! An [`Element`] is one instance of a catalog type: the resolved type it
//! belongs to, the values keyed by JSON property name, and every property the
//! schema does not describe (`_field` primitive extensions, foreign keys) kept
//! verbatim in `extras` so decoding and [`Element::as_json`] round trip
//! without loss.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde_json::{Map, Number, Value};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use crate::catalog::{ResolvedType, SchemaCatalog};
use crate::error::{Error, Result};
use crate::factory;
use crate::primitives::{FhirDate, FhirTime};
use crate::reference::ReferenceTarget;
use crate::schema::{FieldSchema, TypeKind};

/// Value held by one field
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Boolean(bool),
    Integer(i64),
    Decimal(Decimal),
    String(String),
    Date(FhirDate),
    Time(FhirTime),
    Element(Box<Element>),
    /// A nested resource (`contained`, `Bundle.entry.resource`)
    Resource(Box<Element>),
    List(Vec<FieldValue>),
    /// JSON that did not match the declared type; kept as-is
    Json(Value),
}

impl FieldValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            FieldValue::Date(d) => Some(d.as_str()),
            FieldValue::Time(t) => Some(t.as_str()),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FieldValue::Boolean(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_decimal(&self) -> Option<Decimal> {
        match self {
            FieldValue::Decimal(d) => Some(*d),
            FieldValue::Integer(i) => Some(Decimal::from(*i)),
            _ => None,
        }
    }

    pub fn as_element(&self) -> Option<&Element> {
        match self {
            FieldValue::Element(e) | FieldValue::Resource(e) => Some(e),
            _ => None,
        }
    }

    pub fn as_list(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::List(items) => Some(items),
            _ => None,
        }
    }

    pub fn is_list(&self) -> bool {
        matches!(self, FieldValue::List(_))
    }

    pub fn to_json(&self) -> Value {
        match self {
            FieldValue::Boolean(b) => Value::Bool(*b),
            FieldValue::Integer(i) => Value::from(*i),
            FieldValue::Decimal(d) => decimal_to_json(d),
            FieldValue::String(s) => Value::String(s.clone()),
            FieldValue::Date(d) => Value::String(d.as_str().to_string()),
            FieldValue::Time(t) => Value::String(t.as_str().to_string()),
            FieldValue::Element(e) | FieldValue::Resource(e) => e.as_json(),
            FieldValue::List(items) => Value::Array(items.iter().map(FieldValue::to_json).collect()),
            FieldValue::Json(v) => v.clone(),
        }
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<Decimal> for FieldValue {
    fn from(value: Decimal) -> Self {
        FieldValue::Decimal(value)
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<FhirDate> for FieldValue {
    fn from(value: FhirDate) -> Self {
        FieldValue::Date(value)
    }
}

impl From<Element> for FieldValue {
    fn from(value: Element) -> Self {
        if value.ty.is_resource() {
            FieldValue::Resource(Box::new(value))
        } else {
            FieldValue::Element(Box::new(value))
        }
    }
}

impl<T: Into<FieldValue>> From<Vec<T>> for FieldValue {
    fn from(value: Vec<T>) -> Self {
        FieldValue::List(value.into_iter().map(Into::into).collect())
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Boolean(b) => write!(f, "{b}"),
            FieldValue::Integer(i) => write!(f, "{i}"),
            FieldValue::Decimal(d) => write!(f, "{d}"),
            FieldValue::String(s) => write!(f, "{s:?}"),
            FieldValue::Date(d) => write!(f, "{:?}", d.as_str()),
            FieldValue::Time(t) => write!(f, "{:?}", t.as_str()),
            FieldValue::Element(e) | FieldValue::Resource(e) => write!(f, "{e}"),
            FieldValue::List(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
            FieldValue::Json(v) => write!(f, "{v}"),
        }
    }
}

fn decimal_to_json(value: &Decimal) -> Value {
    if value.scale() == 0 {
        if let Some(i) = value.to_i64() {
            return Value::from(i);
        }
    }
    // `arbitrary_precision` keeps the digits, so `1.50` is written back as `1.50`
    let raw = value.to_string();
    serde_json::from_str::<Number>(&raw)
        .map(Value::Number)
        .unwrap_or(Value::String(raw))
}

fn decimal_from_json(number: &Number) -> Option<Decimal> {
    let raw = number.to_string();
    raw.parse::<Decimal>()
        .ok()
        .or_else(|| Decimal::from_scientific(&raw).ok())
}

/// One instance of a catalog type
#[derive(Debug, Clone)]
pub struct Element {
    ty: Arc<ResolvedType>,
    values: BTreeMap<String, FieldValue>,
    extras: Map<String, Value>,
}

impl Element {
    /// Empty instance of `type_name`
    pub fn new(catalog: &SchemaCatalog, type_name: &str) -> Result<Self> {
        Ok(Self::from_resolved(catalog.resolve(type_name)?))
    }

    pub fn from_resolved(ty: Arc<ResolvedType>) -> Self {
        Self {
            ty,
            values: BTreeMap::new(),
            extras: Map::new(),
        }
    }

    /// Positional constructor: one slot per resolved field, in declared order
    ///
    /// Values are stored unchanged; `None` leaves the field unset. Choice
    /// fields are stored under the key of their first allowed type.
    pub fn with_values(
        catalog: &SchemaCatalog,
        type_name: &str,
        values: Vec<Option<FieldValue>>,
    ) -> Result<Self> {
        let mut element = Self::new(catalog, type_name)?;
        if values.len() > element.ty.fields.len() {
            return Err(Error::TooManyValues {
                type_name: type_name.to_string(),
                expected: element.ty.fields.len(),
                actual: values.len(),
            });
        }

        let keys: Vec<String> = element
            .ty
            .fields
            .iter()
            .map(|f| f.json_names().into_iter().next().unwrap_or_else(|| f.name.clone()))
            .collect();
        for (key, value) in keys.into_iter().zip(values) {
            if let Some(value) = value {
                element.values.insert(key, value);
            }
        }
        Ok(element)
    }

    /// Decode a JSON object as an instance of `type_name`
    pub fn from_json(catalog: &SchemaCatalog, type_name: &str, json: &Value) -> Result<Self> {
        let ty = catalog.resolve(type_name)?;
        let path = ty.name.clone();
        Self::decode(catalog, ty, json, &path)
    }

    pub(crate) fn decode(
        catalog: &SchemaCatalog,
        ty: Arc<ResolvedType>,
        json: &Value,
        path: &str,
    ) -> Result<Self> {
        let object = json
            .as_object()
            .ok_or_else(|| Error::ExpectedObject(path.to_string()))?;

        let mut element = Self::from_resolved(ty);
        for (key, value) in object {
            if key == "resourceType" && element.ty.is_resource() {
                continue;
            }
            if key.starts_with('_') {
                element.extras.insert(key.clone(), value.clone());
                continue;
            }
            let Some((field, code)) = element.ty.field_for_json_name(key) else {
                element.extras.insert(key.clone(), value.clone());
                continue;
            };

            let field_path = format!("{path}.{key}");
            let decoded = decode_field(catalog, field, code, value, &field_path)?;
            element.values.insert(key.clone(), decoded);
        }
        Ok(element)
    }

    /// JSON representation; resources lead with `resourceType`
    pub fn as_json(&self) -> Value {
        let mut object = Map::new();
        if self.ty.is_resource() {
            object.insert(
                "resourceType".to_string(),
                Value::String(self.ty.name.clone()),
            );
        } else if let Some(resource_type) = self.extras.get("resourceType") {
            object.insert("resourceType".to_string(), resource_type.clone());
        }

        for (key, value) in self.fields() {
            object.insert(key.to_string(), value.to_json());
            let shadow = format!("_{key}");
            if let Some(extension) = self.extras.get(&shadow) {
                object.insert(shadow, extension.clone());
            }
        }
        for (key, value) in &self.extras {
            if !object.contains_key(key) {
                object.insert(key.clone(), value.clone());
            }
        }
        Value::Object(object)
    }

    pub fn resolved_type(&self) -> &Arc<ResolvedType> {
        &self.ty
    }

    pub fn type_name(&self) -> &str {
        &self.ty.name
    }

    pub fn kind(&self) -> TypeKind {
        self.ty.kind
    }

    /// The `resourceType` of a resource instance
    pub fn resource_type(&self) -> Option<&str> {
        self.ty.is_resource().then_some(self.ty.name.as_str())
    }

    pub fn table_name(&self) -> &str {
        &self.ty.table
    }

    pub fn id(&self) -> Option<&str> {
        self.get("id").and_then(FieldValue::as_str)
    }

    /// Store a value unchanged, returning the previous one
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<FieldValue>) -> Option<FieldValue> {
        self.values.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&FieldValue> {
        self.values.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(FieldValue::as_str)
    }

    pub fn take(&mut self, key: &str) -> Option<FieldValue> {
        self.values.remove(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty() && self.extras.is_empty()
    }

    /// Set values in declared field order; undeclared keys come last
    pub fn fields(&self) -> Vec<(&str, &FieldValue)> {
        let mut fields: Vec<(usize, &str, &FieldValue)> = self
            .values
            .iter()
            .map(|(key, value)| (self.field_position(key), key.as_str(), value))
            .collect();
        fields.sort_by_key(|(position, _, _)| *position);
        fields.into_iter().map(|(_, key, value)| (key, value)).collect()
    }

    fn field_position(&self, key: &str) -> usize {
        self.ty
            .fields
            .iter()
            .position(|f| f.type_for_json_name(key).is_some())
            .unwrap_or(usize::MAX)
    }

    pub fn extras(&self) -> &Map<String, Value> {
        &self.extras
    }

    pub(crate) fn with_extras(mut self, extras: Map<String, Value>) -> Self {
        self.extras = extras;
        self
    }

    /// Parsed `reference` of a `Reference` element
    pub fn reference_target(&self) -> Option<ReferenceTarget> {
        if !self.ty.inherits_from("Reference") {
            return None;
        }
        self.get_str("reference").map(ReferenceTarget::parse)
    }
}

impl PartialEq for Element {
    fn eq(&self, other: &Self) -> bool {
        self.ty.name == other.ty.name && self.values == other.values && self.extras == other.extras
    }
}

impl fmt::Display for Element {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}(", self.ty.name)?;
        let mut first = true;
        for (key, value) in self.fields() {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            write!(f, "{key}={value}")?;
        }
        for (key, value) in &self.extras {
            if !first {
                f.write_str(", ")?;
            }
            first = false;
            write!(f, "{key}={value}")?;
        }
        f.write_str(")")
    }
}

fn decode_field(
    catalog: &SchemaCatalog,
    field: &FieldSchema,
    code: &str,
    value: &Value,
    path: &str,
) -> Result<FieldValue> {
    match (field.cardinality.is_array(), value) {
        (true, Value::Array(items)) => items
            .iter()
            .enumerate()
            .map(|(i, item)| decode_value(catalog, code, item, &format!("{path}[{i}]")))
            .collect::<Result<Vec<_>>>()
            .map(FieldValue::List),
        (true, _) | (false, Value::Array(_)) => Ok(FieldValue::Json(value.clone())),
        (false, _) => decode_value(catalog, code, value, path),
    }
}

fn decode_value(catalog: &SchemaCatalog, code: &str, value: &Value, path: &str) -> Result<FieldValue> {
    let decoded = match (code, value) {
        ("boolean", Value::Bool(b)) => FieldValue::Boolean(*b),
        ("integer" | "unsignedInt" | "positiveInt", Value::Number(n)) => match n.as_i64() {
            Some(i) => FieldValue::Integer(i),
            None => FieldValue::Json(value.clone()),
        },
        ("decimal", Value::Number(n)) => match decimal_from_json(n) {
            Some(d) => FieldValue::Decimal(d),
            None => FieldValue::Json(value.clone()),
        },
        ("date" | "dateTime" | "instant", Value::String(s)) => FieldValue::Date(
            FhirDate::parse(s)
                .map_err(|_| Error::invalid_value(path, format!("'{s}' is not a valid {code}")))?,
        ),
        ("time", Value::String(s)) => FieldValue::Time(
            FhirTime::parse(s)
                .map_err(|_| Error::invalid_value(path, format!("'{s}' is not a valid time")))?,
        ),
        ("Resource", Value::Object(_)) => {
            FieldValue::Resource(Box::new(factory::dispatch(catalog, value, path)?))
        }
        (_, Value::String(s)) if crate::schema::is_primitive_code(code) => {
            FieldValue::String(s.clone())
        }
        (_, Value::Object(_)) if catalog.contains(code) && !crate::schema::is_primitive_code(code) => {
            let ty = catalog.resolve(code)?;
            FieldValue::Element(Box::new(Element::decode(catalog, ty, value, path)?))
        }
        _ => FieldValue::Json(value.clone()),
    };
    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn catalog() -> SchemaCatalog {
        SchemaCatalog::builtin().unwrap()
    }

    #[test]
    fn test_attribute_echo() {
        let catalog = catalog();
        let mut name = Element::new(&catalog, "HumanName").unwrap();
        name.set("family", vec!["Maas"]);
        name.set("use", "official");
        // values are stored as given, even when they do not fit the schema
        name.set("given", 42i64);

        assert_eq!(name.get_str("use"), Some("official"));
        assert_eq!(name.get("given"), Some(&FieldValue::Integer(42)));
        assert_eq!(
            name.get("family"),
            Some(&FieldValue::List(vec![FieldValue::String("Maas".into())]))
        );
    }

    #[test]
    fn test_positional_constructor() {
        let catalog = catalog();
        let period = Element::with_values(
            &catalog,
            "Period",
            vec![
                None,
                None,
                Some(FieldValue::Date(FhirDate::parse("2011-05-23").unwrap())),
                Some(FieldValue::Date(FhirDate::parse("2011-05-27").unwrap())),
            ],
        )
        .unwrap();

        assert_eq!(period.get_str("start"), Some("2011-05-23"));
        assert_eq!(period.get_str("end"), Some("2011-05-27"));
        assert!(period.get("id").is_none());

        let err = Element::with_values(&catalog, "Period", vec![None; 5]).unwrap_err();
        assert!(matches!(
            err,
            Error::TooManyValues { expected: 4, actual: 5, .. }
        ));
    }

    #[test]
    fn test_positional_choice_uses_first_type() {
        let catalog = catalog();
        let fields = catalog.resolve("Extension").unwrap().fields.len();
        let mut values = vec![None; fields];
        values[2] = Some(FieldValue::from("http://example.org/ext"));
        values[3] = Some(FieldValue::Boolean(true));

        let extension = Element::with_values(&catalog, "Extension", values).unwrap();
        assert_eq!(extension.get("valueBoolean"), Some(&FieldValue::Boolean(true)));
        assert_eq!(
            extension.as_json(),
            json!({ "url": "http://example.org/ext", "valueBoolean": true })
        );
    }

    #[test]
    fn test_decode_typed_values() {
        let catalog = catalog();
        let json = json!({
            "resourceType": "Observation",
            "id": "bp",
            "status": "final",
            "code": { "text": "Body weight" },
            "valueQuantity": { "value": 67.5, "unit": "kg" },
            "issued": "2013-04-03T15:30:10+01:00",
            "_status": { "extension": [{ "url": "http://example.org/note" }] }
        });

        let observation = Element::from_json(&catalog, "Observation", &json).unwrap();
        assert_eq!(observation.resource_type(), Some("Observation"));
        assert_eq!(observation.id(), Some("bp"));
        assert!(matches!(observation.get("issued"), Some(FieldValue::Date(_))));

        let quantity = observation.get("valueQuantity").and_then(FieldValue::as_element).unwrap();
        assert_eq!(quantity.type_name(), "Quantity");
        assert_eq!(
            quantity.get("value").and_then(FieldValue::as_decimal),
            Some(Decimal::new(675, 1))
        );
        assert!(observation.extras().contains_key("_status"));

        assert_eq!(observation.as_json(), json);
    }

    #[test]
    fn test_decimal_keeps_lexical_scale() {
        let catalog = catalog();
        let raw = r#"{"value":1.50,"unit":"mg","code":"mg"}"#;
        let json: Value = serde_json::from_str(raw).unwrap();

        let quantity = Element::from_json(&catalog, "Quantity", &json).unwrap();
        let value = quantity.get("value").and_then(FieldValue::as_decimal).unwrap();
        assert_eq!(value.scale(), 2);
        assert_eq!(serde_json::to_string(&quantity.as_json()).unwrap(), raw);

        let precise: Value = serde_json::from_str(r#"{"value":0.123456789012345678901}"#).unwrap();
        let quantity = Element::from_json(&catalog, "Quantity", &precise).unwrap();
        assert_eq!(quantity.as_json(), precise);
    }

    #[test]
    fn test_as_json_order() {
        let catalog = catalog();
        let json = json!({
            "gender": "female",
            "id": "example",
            "resourceType": "Patient",
            "active": true
        });
        let patient = Element::from_json(&catalog, "Patient", &json).unwrap();
        let out = patient.as_json();
        let keys: Vec<&str> = out.as_object().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["resourceType", "id", "active", "gender"]);
    }

    #[test]
    fn test_shape_mismatch_kept_as_json() {
        let catalog = catalog();
        let json = json!({ "family": "Maas", "text": ["a", "b"] });
        let name = Element::from_json(&catalog, "HumanName", &json).unwrap();

        assert_eq!(name.get("family"), Some(&FieldValue::Json(json!("Maas"))));
        assert_eq!(name.get("text"), Some(&FieldValue::Json(json!(["a", "b"]))));
        assert_eq!(name.as_json(), json);
    }

    #[test]
    fn test_invalid_date_reports_path() {
        let catalog = catalog();
        let json = json!({ "resourceType": "Patient", "birthDate": "1960-02-30" });
        let err = Element::from_json(&catalog, "Patient", &json).unwrap_err();
        match err {
            Error::InvalidFieldValue { path, .. } => assert_eq!(path, "Patient.birthDate"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_contained_resources_dispatch() {
        let catalog = catalog();
        let json = json!({
            "resourceType": "Patient",
            "contained": [
                { "resourceType": "Organization", "id": "org1", "name": "Acme" },
                { "resourceType": "ValueSet", "id": "vs1" }
            ]
        });
        let patient = Element::from_json(&catalog, "Patient", &json).unwrap();
        let contained = patient.get("contained").and_then(FieldValue::as_list).unwrap();

        let organization = contained[0].as_element().unwrap();
        assert_eq!(organization.resource_type(), Some("Organization"));
        assert_eq!(organization.get_str("name"), Some("Acme"));

        let fallback = contained[1].as_element().unwrap();
        assert_eq!(fallback.type_name(), "Element");
        assert_eq!(fallback.extras().get("id"), Some(&json!("vs1")));

        assert_eq!(patient.as_json(), json);
    }

    #[test]
    fn test_display_interpolates_values() {
        let catalog = catalog();
        let mut coding = Element::new(&catalog, "Coding").unwrap();
        coding.set("system", "http://loinc.org");
        coding.set("code", "29463-7");
        coding.set("userSelected", false);

        assert_eq!(
            coding.to_string(),
            r#"Coding(system="http://loinc.org", code="29463-7", userSelected=false)"#
        );
    }

    #[test]
    fn test_reference_target() {
        let catalog = catalog();
        let json = json!({ "reference": "Organization/f201", "display": "AUMC" });
        let reference = Element::from_json(&catalog, "Reference", &json).unwrap();
        assert_eq!(reference.table_name(), "FHIRReference");

        let target = reference.reference_target().unwrap();
        assert_eq!(target.resource_type(), Some("Organization"));
        assert_eq!(target.id(), Some("f201"));

        let coding = Element::new(&catalog, "Coding").unwrap();
        assert!(coding.reference_target().is_none());
    }

    #[test]
    fn test_equality() {
        let catalog = catalog();
        let json = json!({ "system": "http://loinc.org", "code": "29463-7" });
        let a = Element::from_json(&catalog, "Coding", &json).unwrap();
        let mut b = Element::from_json(&catalog, "Coding", &json).unwrap();
        assert_eq!(a, b);

        b.set("code", "other");
        assert_ne!(a, b);
    }
}
