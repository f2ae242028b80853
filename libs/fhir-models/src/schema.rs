//! Data-driven structure descriptions
//!
//! A [`TypeSchema`] describes one FHIR structure (resource, data type,
//! primitive or backbone element) as a flat list of [`FieldSchema`]s plus an
//! optional base type. Everything else in the workspace (the generic
//! [`Element`](crate::Element), the factory, the Rust generator and the table
//! mapping) interprets these descriptions instead of carrying one hand-written
//! type per FHIR structure.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Kind of FHIR structure
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TypeKind {
    /// FHIR primitive (e.g. `string`, `dateTime`)
    PrimitiveType,
    /// Reusable composite data type (e.g. `HumanName`, `Quantity`)
    ComplexType,
    /// Top-level resource with its own identity (e.g. `Patient`)
    Resource,
    /// Inline structure nested in a resource (e.g. `Patient.contact`)
    BackboneElement,
}

impl TypeKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TypeKind::PrimitiveType => "primitive-type",
            TypeKind::ComplexType => "complex-type",
            TypeKind::Resource => "resource",
            TypeKind::BackboneElement => "backbone-element",
        }
    }
}

impl fmt::Display for TypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Cardinality of a field (min..max)
///
/// Serialized in the FHIR `"min..max"` notation, `*` meaning unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Cardinality {
    /// Minimum occurrences
    pub min: u32,
    /// Maximum occurrences (None means unbounded/*)
    pub max: Option<u32>,
}

impl Cardinality {
    pub const OPTIONAL: Cardinality = Cardinality { min: 0, max: Some(1) };
    pub const REQUIRED: Cardinality = Cardinality { min: 1, max: Some(1) };
    pub const MANY: Cardinality = Cardinality { min: 0, max: None };

    pub fn new(min: u32, max: Option<u32>) -> Self {
        Self { min, max }
    }

    /// Check if this field is a list/array
    pub fn is_array(&self) -> bool {
        self.max.map(|m| m > 1).unwrap_or(true)
    }

    /// Check if this field is optional
    pub fn is_optional(&self) -> bool {
        self.min == 0
    }

    /// Check if this field is required
    pub fn is_required(&self) -> bool {
        self.min > 0
    }

    /// Check if the field is prohibited (`0..0`)
    pub fn is_prohibited(&self) -> bool {
        self.max == Some(0)
    }
}

impl Default for Cardinality {
    fn default() -> Self {
        Self::OPTIONAL
    }
}

impl fmt::Display for Cardinality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.max {
            Some(max) => write!(f, "{}..{}", self.min, max),
            None => write!(f, "{}..*", self.min),
        }
    }
}

impl FromStr for Cardinality {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let (min, max) = s
            .split_once("..")
            .ok_or_else(|| Error::InvalidCatalog(format!("invalid cardinality '{s}'")))?;
        let min = min
            .trim()
            .parse()
            .map_err(|_| Error::InvalidCatalog(format!("invalid minimum in '{s}'")))?;
        let max = match max.trim() {
            "*" => None,
            n => Some(
                n.parse()
                    .map_err(|_| Error::InvalidCatalog(format!("invalid maximum in '{s}'")))?,
            ),
        };
        Ok(Self { min, max })
    }
}

impl TryFrom<String> for Cardinality {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<Cardinality> for String {
    fn from(value: Cardinality) -> Self {
        value.to_string()
    }
}

/// One field of a structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSchema {
    /// Field name as it appears in the definition (`value[x]` for choices)
    pub name: String,
    /// Allowed type codes
    #[serde(rename = "type", default)]
    pub types: Vec<String>,
    /// Cardinality
    #[serde(rename = "card", default)]
    pub cardinality: Cardinality,
    /// Short human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short: Option<String>,
    /// Resource types a `Reference` field may point to
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<String>,
    /// Whether this field is a modifier element
    #[serde(rename = "modifier", default, skip_serializing_if = "is_false")]
    pub is_modifier: bool,
    /// Whether this field is part of the summary view
    #[serde(rename = "summary", default, skip_serializing_if = "is_false")]
    pub is_summary: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

impl FieldSchema {
    pub fn new(name: impl Into<String>, type_code: impl Into<String>, cardinality: Cardinality) -> Self {
        Self {
            name: name.into(),
            types: vec![type_code.into()],
            cardinality,
            short: None,
            targets: Vec::new(),
            is_modifier: false,
            is_summary: false,
        }
    }

    pub fn with_short(mut self, short: impl Into<String>) -> Self {
        self.short = Some(short.into());
        self
    }

    pub fn with_targets<I, S>(mut self, targets: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.targets = targets.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_types<I, S>(mut self, types: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.types = types.into_iter().map(Into::into).collect();
        self
    }

    /// Whether the field is a choice element (`value[x]`)
    pub fn is_choice(&self) -> bool {
        self.name.ends_with("[x]")
    }

    /// Name without the `[x]` suffix
    pub fn choice_base(&self) -> &str {
        self.name.strip_suffix("[x]").unwrap_or(&self.name)
    }

    /// The single type code of a non-choice field
    pub fn type_code(&self) -> Option<&str> {
        self.types.first().map(String::as_str)
    }

    /// JSON property names this field can appear under
    ///
    /// A choice field yields one name per allowed type (`valueQuantity`,
    /// `valueString`, ...); any other field yields its own name.
    pub fn json_names(&self) -> Vec<String> {
        if self.is_choice() {
            let base = self.choice_base();
            self.types
                .iter()
                .map(|code| format!("{}{}", base, capitalize_first(code)))
                .collect()
        } else {
            vec![self.name.clone()]
        }
    }

    /// Resolve the concrete type code used by a JSON property name
    pub fn type_for_json_name(&self, key: &str) -> Option<&str> {
        if self.is_choice() {
            let suffix = key.strip_prefix(self.choice_base())?;
            self.types
                .iter()
                .find(|code| capitalize_first(code) == suffix)
                .map(String::as_str)
        } else if key == self.name {
            self.type_code()
        } else {
            None
        }
    }
}

/// Description of one FHIR structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypeSchema {
    /// The type name (e.g., "Patient", "HumanName", "string")
    pub name: String,
    /// Kind of type
    pub kind: TypeKind,
    /// Base type this extends (if any)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base: Option<String>,
    /// Persistence table name, defaults to the type name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,
    /// Whether this is an abstract type
    #[serde(rename = "abstract", default, skip_serializing_if = "is_false")]
    pub is_abstract: bool,
    /// Human-readable description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub short: Option<String>,
    /// Fields declared by this type (inherited fields are not repeated)
    #[serde(default)]
    pub fields: Vec<FieldSchema>,
}

impl TypeSchema {
    pub fn new(name: impl Into<String>, kind: TypeKind) -> Self {
        Self {
            name: name.into(),
            kind,
            base: None,
            table: None,
            is_abstract: false,
            short: None,
            fields: Vec::new(),
        }
    }

    pub fn with_base(mut self, base: impl Into<String>) -> Self {
        self.base = Some(base.into());
        self
    }

    pub fn with_field(mut self, field: FieldSchema) -> Self {
        self.fields.push(field);
        self
    }

    pub fn with_abstract(mut self, is_abstract: bool) -> Self {
        self.is_abstract = is_abstract;
        self
    }

    pub fn with_short(mut self, short: impl Into<String>) -> Self {
        self.short = Some(short.into());
        self
    }

    /// Declared table name, or the type name
    pub fn table_name(&self) -> &str {
        self.table.as_deref().unwrap_or(&self.name)
    }
}

/// Check if a type code is a FHIR 1.0.2 primitive
pub fn is_primitive_code(code: &str) -> bool {
    matches!(
        code,
        "boolean"
            | "integer"
            | "unsignedInt"
            | "positiveInt"
            | "decimal"
            | "string"
            | "code"
            | "id"
            | "markdown"
            | "uri"
            | "oid"
            | "uuid"
            | "base64Binary"
            | "date"
            | "dateTime"
            | "instant"
            | "time"
            | "xhtml"
    )
}

/// Capitalize the first letter of a string
pub fn capitalize_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        None => String::new(),
        Some(first) => first.to_uppercase().chain(chars).collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cardinality_parse_and_display() {
        let card: Cardinality = "0..*".parse().unwrap();
        assert_eq!(card, Cardinality::MANY);
        assert!(card.is_array());
        assert!(card.is_optional());
        assert_eq!(card.to_string(), "0..*");

        let card: Cardinality = "1..1".parse().unwrap();
        assert!(card.is_required());
        assert!(!card.is_array());

        assert!("1".parse::<Cardinality>().is_err());
        assert!("a..1".parse::<Cardinality>().is_err());
    }

    #[test]
    fn test_choice_json_names() {
        let field = FieldSchema::new("value[x]", "Quantity", Cardinality::OPTIONAL)
            .with_types(["Quantity", "string", "dateTime"]);

        assert!(field.is_choice());
        assert_eq!(field.choice_base(), "value");
        assert_eq!(
            field.json_names(),
            vec!["valueQuantity", "valueString", "valueDateTime"]
        );
        assert_eq!(field.type_for_json_name("valueString"), Some("string"));
        assert_eq!(field.type_for_json_name("valueBoolean"), None);
        assert_eq!(field.type_for_json_name("other"), None);
    }

    #[test]
    fn test_plain_field_json_name() {
        let field = FieldSchema::new("family", "string", Cardinality::MANY);
        assert_eq!(field.json_names(), vec!["family"]);
        assert_eq!(field.type_for_json_name("family"), Some("string"));
        assert_eq!(field.type_for_json_name("familyString"), None);
    }

    #[test]
    fn test_field_serde_shape() {
        let json = serde_json::json!({
            "name": "subject",
            "type": ["Reference"],
            "card": "1..1",
            "targets": ["Patient", "Group"],
            "summary": true
        });
        let field: FieldSchema = serde_json::from_value(json.clone()).unwrap();
        assert_eq!(field.cardinality, Cardinality::REQUIRED);
        assert_eq!(field.targets, vec!["Patient", "Group"]);
        assert!(field.is_summary);
        assert!(!field.is_modifier);
        assert_eq!(serde_json::to_value(&field).unwrap(), json);
    }

    #[test]
    fn test_table_name_defaults_to_type_name() {
        let schema = TypeSchema::new("Period", TypeKind::ComplexType);
        assert_eq!(schema.table_name(), "Period");

        let mut schema = TypeSchema::new("Reference", TypeKind::ComplexType);
        schema.table = Some("FHIRReference".to_string());
        assert_eq!(schema.table_name(), "FHIRReference");
    }

    #[test]
    fn test_primitive_codes() {
        assert!(is_primitive_code("dateTime"));
        assert!(is_primitive_code("xhtml"));
        assert!(!is_primitive_code("HumanName"));
        assert!(!is_primitive_code("canonical"));
    }
}
