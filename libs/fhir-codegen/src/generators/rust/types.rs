//! Struct generation for catalog types

use dstu2_models::{is_primitive_code, ResolvedType, SchemaCatalog, TypeKind};
use heck::ToSnakeCase;
use std::collections::BTreeSet;

use crate::generators::GeneratorConfig;

/// A struct field after choice expansion
#[derive(Debug, Clone)]
pub(super) struct RustField {
    /// JSON property name
    pub json_name: String,
    /// Rust identifier (possibly raw)
    pub ident: String,
    /// Rust type without the `Option`/`Vec` wrapper
    pub base_type: String,
    /// Name of a generated struct used by this field
    pub struct_dep: Option<String>,
    pub optional: bool,
    pub list: bool,
    pub short: Option<String>,
    pub is_modifier: bool,
}

impl RustField {
    /// Full Rust type of the field
    pub fn rust_type(&self) -> String {
        let ty = if self.list {
            format!("Vec<{}>", self.base_type)
        } else {
            self.base_type.clone()
        };
        if self.optional {
            format!("Option<{}>", ty)
        } else {
            ty
        }
    }
}

/// Whether `type_name` gets a generated struct
pub(super) fn is_generated(catalog: &SchemaCatalog, type_name: &str) -> bool {
    catalog
        .get(type_name)
        .is_some_and(|t| !t.is_abstract && t.kind != TypeKind::PrimitiveType)
}

/// Flatten the resolved fields of a type into struct fields
pub(super) fn struct_fields(resolved: &ResolvedType, catalog: &SchemaCatalog) -> Vec<RustField> {
    let mut fields = Vec::new();

    for field in &resolved.fields {
        if field.is_choice() {
            // at most one alternative is present, so every one is optional
            for (json_name, code) in field.json_names().into_iter().zip(field.types.iter()) {
                let (base_type, struct_dep) = field_base_type(catalog, &resolved.name, code);
                fields.push(RustField {
                    ident: sanitize_field_name(&json_name),
                    json_name,
                    base_type,
                    struct_dep,
                    optional: true,
                    list: false,
                    short: field.short.clone(),
                    is_modifier: field.is_modifier,
                });
            }
            continue;
        }

        let code = field.type_code().unwrap_or_default();
        let list = field.cardinality.is_array();
        let (base_type, struct_dep) = if list {
            (map_fhir_type_to_rust(code, catalog), dep_of(catalog, code))
        } else {
            field_base_type(catalog, &resolved.name, code)
        };

        fields.push(RustField {
            json_name: field.name.clone(),
            ident: sanitize_field_name(&field.name),
            base_type,
            struct_dep,
            optional: field.cardinality.is_optional(),
            list,
            short: field.short.clone(),
            is_modifier: field.is_modifier,
        });
    }

    fields
}

/// Base type of a single-valued field, boxed when it leads back to `owner`
fn field_base_type(catalog: &SchemaCatalog, owner: &str, code: &str) -> (String, Option<String>) {
    let ty = map_fhir_type_to_rust(code, catalog);
    let dep = dep_of(catalog, code);
    if dep.is_some() && reaches(catalog, code, owner, &mut BTreeSet::new()) {
        (format!("Box<{}>", ty), dep)
    } else {
        (ty, dep)
    }
}

fn dep_of(catalog: &SchemaCatalog, code: &str) -> Option<String> {
    is_generated(catalog, code).then(|| code.to_string())
}

/// Whether `from` contains `target` through single-valued composite fields
fn reaches(
    catalog: &SchemaCatalog,
    from: &str,
    target: &str,
    seen: &mut BTreeSet<String>,
) -> bool {
    if from == target {
        return true;
    }
    if !seen.insert(from.to_string()) {
        return false;
    }
    let Ok(resolved) = catalog.resolve(from) else {
        return false;
    };
    resolved
        .fields
        .iter()
        .filter(|f| !f.cardinality.is_array())
        .flat_map(|f| f.types.iter())
        .filter(|code| is_generated(catalog, code))
        .any(|code| reaches(catalog, code, target, seen))
}

/// Generate a Rust struct for a resolved type
pub(super) fn generate_struct(
    resolved: &ResolvedType,
    short: Option<&str>,
    fields: &[RustField],
    config: &GeneratorConfig,
) -> String {
    let mut code = String::new();

    // Generate documentation
    if config.generate_docs {
        code.push_str(&format!("/// {}\n", short.unwrap_or(&resolved.name)));
        if let Some(base) = resolved.base() {
            code.push_str(&format!("///\n/// Base: {}\n", base));
        }
        code.push_str(&format!("/// Kind: {}\n", resolved.kind));
    }

    // Generate derive macros
    code.push_str("#[derive(Debug, Clone, PartialEq");
    if config.generate_serde {
        code.push_str(", Serialize, Deserialize");
    }
    code.push_str(")]\n");

    if config.generate_serde {
        if resolved.is_resource() {
            code.push_str("#[serde(tag = \"resourceType\")]\n");
        }
        code.push_str("#[serde(rename_all = \"camelCase\")]\n");
    }

    code.push_str(&format!("pub struct {} {{\n", resolved.name));
    for field in fields {
        code.push_str(&generate_field(field, config));
    }
    code.push('}');

    code
}

/// Generate a field for a struct
fn generate_field(field: &RustField, config: &GeneratorConfig) -> String {
    let mut code = String::new();

    // Documentation
    if config.generate_docs {
        if let Some(short) = &field.short {
            code.push_str(&format!("    /// {}\n", short));
        }
        if field.is_modifier {
            code.push_str("    /// **Modifier element**\n");
        }
    }

    if config.generate_serde {
        if field.optional {
            code.push_str("    #[serde(skip_serializing_if = \"Option::is_none\")]\n");
        }
        let bare = field.ident.trim_start_matches("r#");
        if is_rust_keyword(bare) || serde_camel_case(bare) != field.json_name {
            code.push_str(&format!("    #[serde(rename = \"{}\")]\n", field.json_name));
        }
    }

    code.push_str(&format!("    pub {}: {},\n", field.ident, field.rust_type()));
    code
}

/// `impl` block with the table name and resource type constants
pub(super) fn generate_impl(resolved: &ResolvedType) -> String {
    let mut code = format!("impl {} {{\n", resolved.name);
    code.push_str(&format!(
        "    pub const TABLE_NAME: &'static str = \"{}\";\n",
        resolved.table
    ));
    if resolved.is_resource() {
        code.push_str(&format!(
            "    pub const RESOURCE_TYPE: &'static str = \"{}\";\n\n",
            resolved.name
        ));
        code.push_str("    pub fn resource_type(&self) -> &'static str {\n");
        code.push_str("        Self::RESOURCE_TYPE\n");
        code.push_str("    }\n");
    }
    code.push('}');
    code
}

/// `Display` impl printing `Type(field=value, ...)` for the present fields
pub(super) fn generate_display(resolved: &ResolvedType, fields: &[RustField]) -> String {
    let mut code = format!("impl fmt::Display for {} {{\n", resolved.name);
    code.push_str("    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {\n");

    if fields.is_empty() {
        code.push_str(&format!("        f.write_str(\"{}()\")\n", resolved.name));
        code.push_str("    }\n}");
        return code;
    }

    code.push_str("        let mut parts: Vec<String> = Vec::new();\n");
    for field in fields {
        let ident = &field.ident;
        let label = &field.json_name;
        match (field.optional, field.list) {
            (true, _) => {
                code.push_str(&format!("        if let Some(value) = &self.{} {{\n", ident));
                code.push_str(&format!(
                    "            parts.push(format!(\"{}={{:?}}\", value));\n",
                    label
                ));
                code.push_str("        }\n");
            }
            (false, true) => {
                code.push_str(&format!("        if !self.{}.is_empty() {{\n", ident));
                code.push_str(&format!(
                    "            parts.push(format!(\"{}={{:?}}\", self.{}));\n",
                    label, ident
                ));
                code.push_str("        }\n");
            }
            (false, false) => {
                code.push_str(&format!(
                    "        parts.push(format!(\"{}={{:?}}\", self.{}));\n",
                    label, ident
                ));
            }
        }
    }
    code.push_str(&format!(
        "        write!(f, \"{}({{}})\", parts.join(\", \"))\n",
        resolved.name
    ));
    code.push_str("    }\n}");
    code
}

/// Map a FHIR type to a Rust type
pub(super) fn map_fhir_type_to_rust(code: &str, catalog: &SchemaCatalog) -> String {
    match code {
        // FHIR primitives to Rust primitives
        "boolean" => "bool".to_string(),
        "integer" => "i32".to_string(),
        "unsignedInt" | "positiveInt" => "u32".to_string(),
        "decimal" => "f64".to_string(),
        // dates keep their partial precision as text
        "date" | "dateTime" | "instant" | "time" => "String".to_string(),
        other if is_primitive_code(other) => "String".to_string(),

        // Nested resources are dispatched at runtime
        "Resource" => "serde_json::Value".to_string(),

        other if is_generated(catalog, other) => other.to_string(),

        // Abstract or unknown type
        _ => "serde_json::Value".to_string(),
    }
}

/// Sanitize a field name to be a valid Rust identifier
pub(super) fn sanitize_field_name(name: &str) -> String {
    let snake = name.to_snake_case();

    match snake.as_str() {
        // not allowed as raw identifiers
        "self" | "super" | "crate" => format!("{}_", snake),
        s if is_rust_keyword(s) => format!("r#{}", snake),
        _ => snake,
    }
}

/// The name serde's `rename_all = "camelCase"` derives from a snake_case field
fn serde_camel_case(snake: &str) -> String {
    let mut out = String::with_capacity(snake.len());
    let mut capitalize = false;
    for ch in snake.chars() {
        if ch == '_' {
            capitalize = true;
        } else if capitalize {
            out.push(ch.to_ascii_uppercase());
            capitalize = false;
        } else {
            out.push(ch);
        }
    }
    out
}

/// Check if a string is a Rust keyword
fn is_rust_keyword(s: &str) -> bool {
    matches!(
        s,
        "as" | "break"
            | "const"
            | "continue"
            | "crate"
            | "else"
            | "enum"
            | "extern"
            | "false"
            | "fn"
            | "for"
            | "if"
            | "impl"
            | "in"
            | "let"
            | "loop"
            | "match"
            | "mod"
            | "move"
            | "mut"
            | "pub"
            | "ref"
            | "return"
            | "self"
            | "Self"
            | "static"
            | "struct"
            | "super"
            | "trait"
            | "true"
            | "type"
            | "unsafe"
            | "use"
            | "where"
            | "while"
            | "async"
            | "await"
            | "dyn"
            | "abstract"
            | "become"
            | "box"
            | "do"
            | "final"
            | "macro"
            | "override"
            | "priv"
            | "typeof"
            | "unsized"
            | "virtual"
            | "yield"
    )
}
