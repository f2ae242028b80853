//! Opt-in structural validation
//!
//! Construction and decoding never reject values. [`validate`] walks an
//! [`Element`] tree afterwards and reports cardinality, type and choice
//! problems against the catalog schema. Terminology bindings and FHIRPath
//! invariants are not checked.

use serde::Serialize;
use serde_json::Value;
use std::fmt;

use crate::element::{Element, FieldValue};
use crate::primitives::{DatePrecision, FhirDate, FhirTime};
use crate::schema::{is_primitive_code, FieldSchema};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => f.write_str("warning"),
            Severity::Error => f.write_str("error"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "code", rename_all = "kebab-case")]
pub enum IssueKind {
    /// A field with min >= 1 is absent (or its list is too short)
    MissingRequired { min: u32, found: usize },
    /// More list items than the declared maximum
    TooMany { max: u32, found: usize },
    /// A list was given for a single-valued field
    UnexpectedList,
    TypeMismatch { expected: String, found: String },
    /// A property the schema does not declare
    UnknownElement,
    /// Several keys of the same `[x]` field are present
    ChoiceConflict { keys: Vec<String> },
    /// The element fell back to `Element` for this resource type
    UnknownResourceType { resource_type: String },
    /// A reference points at a resource type the field does not allow
    ReferenceTarget {
        allowed: Vec<String>,
        found: String,
    },
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IssueKind::MissingRequired { min, found } => {
                write!(f, "required element missing (min {min}, found {found})")
            }
            IssueKind::TooMany { max, found } => {
                write!(f, "too many items (max {max}, found {found})")
            }
            IssueKind::UnexpectedList => f.write_str("list given for a single-valued element"),
            IssueKind::TypeMismatch { expected, found } => {
                write!(f, "expected {expected}, found {found}")
            }
            IssueKind::UnknownElement => f.write_str("element is not defined by the type"),
            IssueKind::ChoiceConflict { keys } => {
                write!(f, "only one of {} may be present", keys.join(", "))
            }
            IssueKind::UnknownResourceType { resource_type } => {
                write!(f, "resource type '{resource_type}' is not in the catalog")
            }
            IssueKind::ReferenceTarget { allowed, found } => {
                write!(f, "reference to {found}, allowed: {}", allowed.join(" | "))
            }
        }
    }
}

/// One validation finding
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Issue {
    pub severity: Severity,
    pub path: String,
    #[serde(flatten)]
    pub kind: IssueKind,
}

impl Issue {
    fn error(path: impl Into<String>, kind: IssueKind) -> Self {
        Self {
            severity: Severity::Error,
            path: path.into(),
            kind,
        }
    }

    fn warning(path: impl Into<String>, kind: IssueKind) -> Self {
        Self {
            severity: Severity::Warning,
            path: path.into(),
            kind,
        }
    }

    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} at {}: {}", self.severity, self.path, self.kind)
    }
}

/// Check an element tree against its schema
pub fn validate(element: &Element) -> Vec<Issue> {
    let mut issues = Vec::new();
    validate_element(element, element.type_name(), &mut issues);
    issues
}

pub fn has_errors(issues: &[Issue]) -> bool {
    issues.iter().any(Issue::is_error)
}

fn validate_element(element: &Element, path: &str, issues: &mut Vec<Issue>) {
    let ty = element.resolved_type();

    if !ty.is_resource() {
        if let Some(resource_type) = element.extras().get("resourceType") {
            issues.push(Issue::warning(
                path,
                IssueKind::UnknownResourceType {
                    resource_type: resource_type.as_str().unwrap_or_default().to_string(),
                },
            ));
            return;
        }
    }

    for field in &ty.fields {
        let present: Vec<String> = field
            .json_names()
            .into_iter()
            .filter(|key| element.contains(key))
            .collect();

        if present.len() > 1 {
            issues.push(Issue::error(
                format!("{path}.{}", field.name),
                IssueKind::ChoiceConflict {
                    keys: present.clone(),
                },
            ));
        }

        if present.is_empty() && field.cardinality.is_required() {
            issues.push(Issue::error(
                format!("{path}.{}", field.name),
                IssueKind::MissingRequired {
                    min: field.cardinality.min,
                    found: 0,
                },
            ));
        }

        for key in &present {
            let (Some(value), Some(code)) = (element.get(key), field.type_for_json_name(key)) else {
                continue;
            };
            validate_field(field, code, value, &format!("{path}.{key}"), issues);
        }
    }

    for (key, _) in element.fields() {
        if ty.field_for_json_name(key).is_none() {
            issues.push(Issue::warning(format!("{path}.{key}"), IssueKind::UnknownElement));
        }
    }

    for key in element.extras().keys() {
        let declared = key
            .strip_prefix('_')
            .is_some_and(|name| ty.field_for_json_name(name).is_some());
        if !declared {
            issues.push(Issue::warning(format!("{path}.{key}"), IssueKind::UnknownElement));
        }
    }
}

fn validate_field(
    field: &FieldSchema,
    code: &str,
    value: &FieldValue,
    path: &str,
    issues: &mut Vec<Issue>,
) {
    let card = field.cardinality;
    if card.is_array() {
        match value {
            FieldValue::List(items) => {
                if let Some(max) = card.max {
                    if items.len() > max as usize {
                        issues.push(Issue::error(
                            path,
                            IssueKind::TooMany {
                                max,
                                found: items.len(),
                            },
                        ));
                    }
                }
                if items.len() < card.min as usize {
                    issues.push(Issue::error(
                        path,
                        IssueKind::MissingRequired {
                            min: card.min,
                            found: items.len(),
                        },
                    ));
                }
                for (i, item) in items.iter().enumerate() {
                    validate_value(field, code, item, &format!("{path}[{i}]"), issues);
                }
            }
            other => issues.push(Issue::error(
                path,
                IssueKind::TypeMismatch {
                    expected: format!("list of {code}"),
                    found: describe(other),
                },
            )),
        }
    } else {
        match value {
            FieldValue::List(_) | FieldValue::Json(Value::Array(_)) => {
                issues.push(Issue::error(path, IssueKind::UnexpectedList))
            }
            other => validate_value(field, code, other, path, issues),
        }
    }
}

fn validate_value(
    field: &FieldSchema,
    code: &str,
    value: &FieldValue,
    path: &str,
    issues: &mut Vec<Issue>,
) {
    let mismatch = |issues: &mut Vec<Issue>| {
        issues.push(Issue::error(
            path,
            IssueKind::TypeMismatch {
                expected: code.to_string(),
                found: describe(value),
            },
        ))
    };

    match (code, value) {
        ("boolean", FieldValue::Boolean(_)) => {}
        ("integer", FieldValue::Integer(_)) => {}
        ("unsignedInt", FieldValue::Integer(i)) if *i >= 0 => {}
        ("positiveInt", FieldValue::Integer(i)) if *i > 0 => {}
        ("decimal", FieldValue::Decimal(_) | FieldValue::Integer(_)) => {}
        ("date" | "dateTime" | "instant", FieldValue::Date(date)) => {
            if !date_fits(code, date) {
                mismatch(issues);
            }
        }
        ("date" | "dateTime" | "instant", FieldValue::String(raw)) => match FhirDate::parse(raw) {
            Ok(date) if date_fits(code, &date) => {}
            _ => mismatch(issues),
        },
        ("time", FieldValue::Time(_)) => {}
        ("time", FieldValue::String(raw)) if FhirTime::parse(raw).is_ok() => {}
        (_, FieldValue::String(s)) if is_string_code(code) => {
            if s.is_empty() || (code == "code" && s.trim() != s) {
                mismatch(issues);
            }
        }
        ("Resource", FieldValue::Resource(resource)) => validate_element(resource, path, issues),
        (_, FieldValue::Element(element)) if element.resolved_type().inherits_from(code) => {
            validate_element(element, path, issues);
            if code == "Reference" && !field.targets.is_empty() {
                validate_reference(field, element, path, issues);
            }
        }
        _ => mismatch(issues),
    }
}

fn validate_reference(field: &FieldSchema, reference: &Element, path: &str, issues: &mut Vec<Issue>) {
    let Some(target) = reference.reference_target() else {
        return;
    };
    let Some(resource_type) = target.resource_type() else {
        return;
    };
    if !field.targets.iter().any(|t| t == resource_type || t == "Resource") {
        issues.push(Issue::warning(
            format!("{path}.reference"),
            IssueKind::ReferenceTarget {
                allowed: field.targets.clone(),
                found: resource_type.to_string(),
            },
        ));
    }
}

/// Precision rules that separate `date`, `dateTime` and `instant`
fn date_fits(code: &str, date: &FhirDate) -> bool {
    match code {
        "date" => date.precision() <= DatePrecision::Day,
        "instant" => date.precision() >= DatePrecision::Second && date.offset().is_some(),
        _ => date.precision() <= DatePrecision::Day || date.offset().is_some(),
    }
}

/// Narrowest of `date`, `instant` and `dateTime` that accepts `date`
fn date_code(date: &FhirDate) -> &'static str {
    if date_fits("date", date) {
        "date"
    } else if date_fits("instant", date) {
        "instant"
    } else {
        "dateTime"
    }
}

fn is_string_code(code: &str) -> bool {
    is_primitive_code(code)
        && !matches!(
            code,
            "boolean"
                | "integer"
                | "unsignedInt"
                | "positiveInt"
                | "decimal"
                | "date"
                | "dateTime"
                | "instant"
                | "time"
        )
}

fn describe(value: &FieldValue) -> String {
    match value {
        FieldValue::Boolean(_) => "boolean".to_string(),
        FieldValue::Integer(_) => "integer".to_string(),
        FieldValue::Decimal(_) => "decimal".to_string(),
        FieldValue::String(_) => "string".to_string(),
        FieldValue::Date(date) => date_code(date).to_string(),
        FieldValue::Time(_) => "time".to_string(),
        FieldValue::Element(e) | FieldValue::Resource(e) => e.type_name().to_string(),
        FieldValue::List(_) => "list".to_string(),
        FieldValue::Json(v) => match v {
            Value::Null => "null".to_string(),
            Value::Bool(_) => "JSON boolean".to_string(),
            Value::Number(_) => "JSON number".to_string(),
            Value::String(_) => "JSON string".to_string(),
            Value::Array(_) => "JSON array".to_string(),
            Value::Object(_) => "JSON object".to_string(),
        },
    }
}
