//! `element_factory.rs` generation

use super::module_name;

/// Generate the `FhirResource` enum dispatching on `resourceType`
///
/// Resource types without a generated struct are kept as raw JSON in the
/// `Element` variant instead of failing.
pub(super) fn generate_factory(resources: &[&str], prefix: &str) -> String {
    let mut code = String::new();

    code.push_str("//! Resource dispatch by `resourceType`\n\n");
    code.push_str("use serde_json::Value;\n");
    code.push_str("use std::fmt;\n\n");
    for name in resources {
        code.push_str(&format!("use {}::{}::{};\n", prefix, module_name(name), name));
    }
    code.push('\n');

    code.push_str("/// A resource with a generated struct, or the raw payload otherwise\n");
    code.push_str("#[derive(Debug, Clone, PartialEq)]\n");
    code.push_str("pub enum FhirResource {\n");
    for name in resources {
        code.push_str(&format!("    {}(Box<{}>),\n", name, name));
    }
    code.push_str("    /// Resource type without a generated struct\n");
    code.push_str("    Element(Value),\n");
    code.push_str("}\n\n");

    code.push_str("impl FhirResource {\n");

    code.push_str("    /// Deserialize `json` into the struct registered for `resource_type`\n");
    code.push_str(
        "    pub fn instantiate(resource_type: &str, json: Value) -> serde_json::Result<Self> {\n",
    );
    code.push_str("        Ok(match resource_type {\n");
    for name in resources {
        code.push_str(&format!(
            "            \"{}\" => Self::{}(Box::new(serde_json::from_value(json)?)),\n",
            name, name
        ));
    }
    code.push_str("            _ => Self::Element(json),\n");
    code.push_str("        })\n");
    code.push_str("    }\n\n");

    code.push_str("    /// Dispatch on the payload's own `resourceType`\n");
    code.push_str("    pub fn from_json(json: Value) -> serde_json::Result<Self> {\n");
    code.push_str("        let resource_type = json\n");
    code.push_str("            .get(\"resourceType\")\n");
    code.push_str("            .and_then(Value::as_str)\n");
    code.push_str("            .map(str::to_string);\n");
    code.push_str("        match resource_type {\n");
    code.push_str("            Some(resource_type) => Self::instantiate(&resource_type, json),\n");
    code.push_str("            None => Ok(Self::Element(json)),\n");
    code.push_str("        }\n");
    code.push_str("    }\n\n");

    code.push_str("    pub fn resource_type(&self) -> Option<&str> {\n");
    code.push_str("        match self {\n");
    for name in resources {
        code.push_str(&format!(
            "            Self::{}(_) => Some(\"{}\"),\n",
            name, name
        ));
    }
    code.push_str(
        "            Self::Element(json) => json.get(\"resourceType\").and_then(Value::as_str),\n",
    );
    code.push_str("        }\n");
    code.push_str("    }\n\n");

    code.push_str("    pub fn to_json(&self) -> serde_json::Result<Value> {\n");
    code.push_str("        match self {\n");
    for name in resources {
        code.push_str(&format!(
            "            Self::{}(inner) => serde_json::to_value(inner),\n",
            name
        ));
    }
    code.push_str("            Self::Element(json) => Ok(json.clone()),\n");
    code.push_str("        }\n");
    code.push_str("    }\n");
    code.push_str("}\n\n");

    code.push_str("impl fmt::Display for FhirResource {\n");
    code.push_str("    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {\n");
    code.push_str("        match self {\n");
    for name in resources {
        code.push_str(&format!(
            "            Self::{}(inner) => fmt::Display::fmt(inner, f),\n",
            name
        ));
    }
    code.push_str("            Self::Element(json) => write!(f, \"Element({})\", json),\n");
    code.push_str("        }\n");
    code.push_str("    }\n");
    code.push_str("}\n");

    code
}
