//! Parser for FHIR StructureDefinitions
//!
//! Turns base StructureDefinitions (DSTU2 `base`/`constrainedType` style as
//! well as the later `baseDefinition`/`targetProfile` style) into catalog
//! [`TypeSchema`]s. Inline backbone elements become their own
//! `BackboneElement` types named after their path (`Patient.contact` becomes
//! `PatientContact`). Profiles are rejected; only base definitions describe
//! storable structures.

use anyhow::{anyhow, bail, Context, Result};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use dstu2_models::{
    capitalize_first, is_primitive_code, Cardinality, FieldSchema, SchemaCatalog, TypeKind,
    TypeSchema,
};

/// Version recorded on catalogs built from definitions lacking `fhirVersion`
pub const DEFAULT_FHIR_VERSION: &str = "1.0.2";

const FHIR_TYPE_EXTENSION: &str =
    "http://hl7.org/fhir/StructureDefinition/structuredefinition-fhir-type";

/// Types allowed where a definition says `*` (open `value[x]` elements)
const OPEN_TYPES: &[&str] = &[
    "boolean",
    "integer",
    "decimal",
    "base64Binary",
    "instant",
    "string",
    "uri",
    "date",
    "dateTime",
    "time",
    "code",
    "oid",
    "id",
    "unsignedInt",
    "positiveInt",
    "markdown",
    "Annotation",
    "Attachment",
    "Identifier",
    "CodeableConcept",
    "Coding",
    "Quantity",
    "Range",
    "Period",
    "Ratio",
    "SampledData",
    "Signature",
    "HumanName",
    "Address",
    "ContactPoint",
    "Timing",
    "Reference",
    "Meta",
];

/// Parse one StructureDefinition into its type and backbone types
///
/// The first schema returned is the defined type itself.
pub fn parse_structure_definition(sd: &Value) -> Result<Vec<TypeSchema>> {
    if sd.get("resourceType").and_then(Value::as_str) != Some("StructureDefinition") {
        bail!("not a StructureDefinition");
    }

    let name = sd
        .get("name")
        .and_then(Value::as_str)
        .ok_or_else(|| anyhow!("StructureDefinition missing 'name'"))?;

    let constrained = sd.get("constrainedType").and_then(Value::as_str);
    let derivation = sd.get("derivation").and_then(Value::as_str);
    if derivation == Some("constraint") || constrained.is_some_and(|c| c != name) {
        bail!("{} is a profile, not a base definition", name);
    }

    let type_name = sd
        .get("type")
        .and_then(Value::as_str)
        .or(constrained)
        .unwrap_or(name)
        .to_string();

    let kind = match sd.get("kind").and_then(Value::as_str) {
        Some("resource") => TypeKind::Resource,
        Some("complex-type") => TypeKind::ComplexType,
        Some("primitive-type") => TypeKind::PrimitiveType,
        Some("datatype") if is_primitive_code(&type_name) => TypeKind::PrimitiveType,
        Some("datatype") => TypeKind::ComplexType,
        other => bail!("{} has unsupported kind {:?}", type_name, other),
    };

    let is_abstract = sd
        .get("abstract")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    let base_type = sd
        .get("baseDefinition")
        .or_else(|| sd.get("base"))
        .and_then(Value::as_str)
        .map(extract_type_name_from_url);

    let mut root = TypeSchema::new(type_name.clone(), kind).with_abstract(is_abstract);
    root.base = base_type;
    root.table = table_override(&type_name).map(String::from);

    let elements = sd
        .get("snapshot")
        .or_else(|| sd.get("differential"))
        .and_then(|s| s.get("element"))
        .and_then(Value::as_array);

    let short = elements
        .and_then(|e| e.first())
        .and_then(|e| e.get("short"))
        .or_else(|| sd.get("description"))
        .and_then(Value::as_str);
    if let Some(short) = short {
        root = root.with_short(short);
    }

    // primitive values are carried by the element itself
    let elements = match elements {
        Some(elements) if kind != TypeKind::PrimitiveType => elements,
        _ => return Ok(vec![root]),
    };

    parse_elements(root, elements)
}

/// Distribute elements over the root type and its backbone types
fn parse_elements(root: TypeSchema, elements: &[Value]) -> Result<Vec<TypeSchema>> {
    let root_path = root.name.clone();
    let mut schemas = vec![root];
    let mut owners: HashMap<String, usize> = HashMap::from([(root_path, 0)]);
    // DSTU2 `nameReference` targets, keyed by element name
    let mut named: HashMap<String, String> = HashMap::new();

    for element in elements.iter().skip(1) {
        let path = element
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow!("Element missing 'path'"))?;

        if path.contains(':') || element.get("sliceName").is_some() {
            continue;
        }
        if let Some(element_name) = element.get("name").and_then(Value::as_str) {
            named.insert(element_name.to_string(), path.to_string());
        }

        let Some((parent, field_name)) = path.rsplit_once('.') else {
            continue;
        };
        let Some(&owner) = owners.get(parent) else {
            debug!(path, "Skipping element without a known owner");
            continue;
        };
        if schemas[owner].fields.iter().any(|f| f.name == field_name) {
            continue;
        }

        let Some(mut field) = parse_element(element, field_name)? else {
            continue;
        };

        if let Some(target) = content_reference(element, &named) {
            field.types = vec![backbone_type_name(&target)];
        } else if let Some(base) = backbone_base(&field) {
            let backbone = backbone_type_name(path);
            let mut schema =
                TypeSchema::new(backbone.clone(), TypeKind::BackboneElement).with_base(base);
            if let Some(short) = &field.short {
                schema = schema.with_short(short.clone());
            }
            schemas.push(schema);
            owners.insert(path.to_string(), schemas.len() - 1);
            field.types = vec![backbone];
        }

        if field.types.is_empty() {
            debug!(path, "Skipping element without a type");
            continue;
        }
        schemas[owner].fields.push(field);
    }

    Ok(schemas)
}

/// Parse a single element into a field, `None` when it is prohibited
fn parse_element(element: &Value, name: &str) -> Result<Option<FieldSchema>> {
    let min = element.get("min").and_then(Value::as_u64).unwrap_or(0) as u32;

    let max = match element.get("max").and_then(Value::as_str) {
        Some("*") => None,
        Some(n) => Some(
            n.parse()
                .with_context(|| format!("invalid max '{}' on {}", n, name))?,
        ),
        None => Some(1),
    };
    let cardinality = Cardinality::new(min, max);
    if cardinality.is_prohibited() {
        return Ok(None);
    }

    let (types, targets) = parse_element_types(element);

    let mut field = FieldSchema::new(name, "", cardinality)
        .with_types(types)
        .with_targets(targets);

    field.short = element
        .get("short")
        .or_else(|| element.get("definition"))
        .and_then(Value::as_str)
        .map(String::from);

    field.is_modifier = element
        .get("isModifier")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    field.is_summary = element
        .get("isSummary")
        .and_then(Value::as_bool)
        .unwrap_or(false);

    Ok(Some(field))
}

/// Type codes (deduplicated, in order) and reference targets of an element
fn parse_element_types(element: &Value) -> (Vec<String>, Vec<String>) {
    let mut codes: Vec<String> = Vec::new();
    let mut targets: Vec<String> = Vec::new();

    let Some(type_array) = element.get("type").and_then(Value::as_array) else {
        return (codes, targets);
    };

    for type_spec in type_array {
        let Some(code) = type_code(type_spec) else {
            continue;
        };

        if code == "*" {
            for open in OPEN_TYPES {
                if !codes.iter().any(|c| c == open) {
                    codes.push(open.to_string());
                }
            }
            continue;
        }

        if code == "Reference" {
            // DSTU2 puts targets in `profile`, later versions in `targetProfile`
            let profiles = type_spec
                .get("targetProfile")
                .or_else(|| type_spec.get("profile"));
            for target in urls(profiles).map(extract_type_name_from_url) {
                if target != "Resource" && !targets.contains(&target) {
                    targets.push(target);
                }
            }
        }

        if !codes.contains(&code) {
            codes.push(code);
        }
    }

    (codes, targets)
}

/// The type code of a type entry, honouring the fhir-type extension
fn type_code(type_spec: &Value) -> Option<String> {
    let overridden = type_spec
        .get("extension")
        .and_then(Value::as_array)
        .and_then(|extensions| {
            extensions.iter().find(|ext| {
                ext.get("url").and_then(Value::as_str) == Some(FHIR_TYPE_EXTENSION)
            })
        })
        .and_then(|ext| ext.get("valueUrl").or_else(|| ext.get("valueUri")))
        .and_then(Value::as_str);

    let code = overridden.or_else(|| type_spec.get("code").and_then(Value::as_str))?;

    let code = match code.strip_prefix("http://hl7.org/fhirpath/System.") {
        Some("String") => "string",
        Some("Boolean") => "boolean",
        Some("Integer") => "integer",
        Some("Decimal") => "decimal",
        Some("Date") => "date",
        Some("DateTime") => "dateTime",
        Some("Time") => "time",
        Some(_) => "string",
        None => code,
    };
    Some(code.to_string())
}

/// String entries of a `profile`/`targetProfile` value (array or single)
fn urls(value: Option<&Value>) -> impl Iterator<Item = &str> {
    let items: Vec<&str> = match value {
        Some(Value::Array(items)) => items.iter().filter_map(Value::as_str).collect(),
        Some(Value::String(url)) => vec![url.as_str()],
        _ => Vec::new(),
    };
    items.into_iter()
}

/// Element path a recursive element points to
fn content_reference(element: &Value, named: &HashMap<String, String>) -> Option<String> {
    if let Some(reference) = element.get("contentReference").and_then(Value::as_str) {
        return Some(reference.trim_start_matches('#').to_string());
    }
    element
        .get("nameReference")
        .and_then(Value::as_str)
        .and_then(|name| named.get(name))
        .cloned()
}

/// Base type of a backbone element root, `None` for ordinary fields
fn backbone_base(field: &FieldSchema) -> Option<&'static str> {
    match field.types.as_slice() {
        [code] if code == "BackboneElement" => Some("BackboneElement"),
        [code] if code == "Element" => Some("Element"),
        _ => None,
    }
}

/// `Bundle.entry.search` -> `BundleEntrySearch`
pub fn backbone_type_name(path: &str) -> String {
    path.split('.')
        .map(|segment| capitalize_first(segment.trim_end_matches("[x]")))
        .collect()
}

/// Tables renamed to stay clear of SQL keywords
fn table_override(type_name: &str) -> Option<&'static str> {
    match type_name {
        "Reference" => Some("FHIRReference"),
        _ => None,
    }
}

/// Build a catalog from StructureDefinitions, skipping profiles and
/// anything that fails to parse
pub fn build_catalog<'a, I>(definitions: I) -> SchemaCatalog
where
    I: IntoIterator<Item = &'a Value>,
{
    let mut fhir_version: Option<String> = None;
    let mut schemas = Vec::new();

    for sd in definitions {
        match parse_structure_definition(sd) {
            Ok(parsed) => {
                if fhir_version.is_none() {
                    fhir_version = sd
                        .get("fhirVersion")
                        .and_then(Value::as_str)
                        .map(String::from);
                }
                schemas.extend(parsed);
            }
            Err(e) => {
                let url = sd.get("url").and_then(Value::as_str).unwrap_or("<no url>");
                debug!(url, error = %e, "Skipping StructureDefinition");
            }
        }
    }

    let mut catalog =
        SchemaCatalog::new(fhir_version.unwrap_or_else(|| DEFAULT_FHIR_VERSION.to_string()));
    for schema in schemas {
        catalog.register(schema);
    }
    strip_inherited(&mut catalog);

    debug!(
        fhir_version = catalog.fhir_version(),
        types = catalog.len(),
        "Built catalog from StructureDefinitions"
    );
    catalog
}

/// Build a catalog from the StructureDefinitions in a Bundle
pub fn parse_bundle(bundle: &Value) -> Result<SchemaCatalog> {
    if bundle.get("resourceType").and_then(Value::as_str) != Some("Bundle") {
        bail!("not a Bundle");
    }
    Ok(build_catalog(structure_definitions(bundle)))
}

/// Build a catalog from every JSON file in `dir`
pub fn parse_directory(dir: &Path) -> Result<SchemaCatalog> {
    parse_paths(&[dir])
}

/// Build a catalog from files and directories of StructureDefinitions or
/// Bundles of them
pub fn parse_paths<P: AsRef<Path>>(paths: &[P]) -> Result<SchemaCatalog> {
    let mut files: Vec<PathBuf> = Vec::new();
    for path in paths {
        let path = path.as_ref();
        if path.is_dir() {
            let entries = fs::read_dir(path)
                .with_context(|| format!("reading directory {}", path.display()))?;
            let mut found: Vec<PathBuf> = entries
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.extension().is_some_and(|ext| ext == "json"))
                .collect();
            found.sort();
            files.extend(found);
        } else {
            files.push(path.to_path_buf());
        }
    }

    let mut documents = Vec::with_capacity(files.len());
    for file in &files {
        let content = fs::read_to_string(file)
            .with_context(|| format!("reading {}", file.display()))?;
        let document: Value = serde_json::from_str(&content)
            .with_context(|| format!("parsing {}", file.display()))?;
        documents.push(document);
    }

    Ok(build_catalog(documents.iter().flat_map(structure_definitions)))
}

/// The document itself, or the StructureDefinition entries of a Bundle
fn structure_definitions(document: &Value) -> Vec<&Value> {
    match document.get("resourceType").and_then(Value::as_str) {
        Some("StructureDefinition") => vec![document],
        Some("Bundle") => document
            .get("entry")
            .and_then(Value::as_array)
            .map(|entries| {
                entries
                    .iter()
                    .filter_map(|entry| entry.get("resource"))
                    .filter(|r| {
                        r.get("resourceType").and_then(Value::as_str)
                            == Some("StructureDefinition")
                    })
                    .collect()
            })
            .unwrap_or_default(),
        _ => Vec::new(),
    }
}

/// Snapshots repeat inherited elements; keep only what each type adds
fn strip_inherited(catalog: &mut SchemaCatalog) {
    let mut stripped = Vec::new();
    for schema in catalog.types() {
        let Some(base) = schema.base.as_deref() else {
            continue;
        };
        let Ok(resolved) = catalog.resolve(base) else {
            continue;
        };
        let inherited: HashSet<&str> = resolved.fields.iter().map(|f| f.name.as_str()).collect();
        if schema.fields.iter().any(|f| inherited.contains(f.name.as_str())) {
            let mut schema = schema.clone();
            schema.fields.retain(|f| !inherited.contains(f.name.as_str()));
            stripped.push(schema);
        }
    }
    for schema in stripped {
        catalog.register(schema);
    }
}

/// Extract the type name from a canonical URL
/// E.g., "http://hl7.org/fhir/StructureDefinition/Patient" -> "Patient"
fn extract_type_name_from_url(url: &str) -> String {
    url.rsplit('/').next().unwrap_or(url).to_string()
}
