//! Rust code generator for catalog types
//!
//! Emits one module per concrete complex, backbone and resource type, an
//! `element_factory.rs` dispatching resources by `resourceType`, and a
//! `mod.rs` re-exporting everything.

mod factory;
mod types;

use anyhow::{Context, Result};
use dstu2_models::{ResolvedType, SchemaCatalog, TypeKind};
use heck::ToSnakeCase;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::debug;

use crate::generators::{Generator, GeneratorConfig};
use types::RustField;

/// Module holding the resource dispatch enum
pub const FACTORY_MODULE: &str = "element_factory";

/// Output of the Rust generator
#[derive(Debug)]
pub struct RustOutput {
    /// Generated modules indexed by file name
    pub modules: BTreeMap<String, String>,
}

/// Rust code generator
pub struct RustGenerator {
    config: GeneratorConfig,
}

impl RustGenerator {
    pub fn new(config: GeneratorConfig) -> Self {
        Self { config }
    }

    pub fn new_default() -> Self {
        Self::new(GeneratorConfig::default())
    }
}

impl Generator for RustGenerator {
    type Output = RustOutput;

    fn generate(&self, catalog: &SchemaCatalog) -> Result<Self::Output> {
        let mut modules = BTreeMap::new();

        let mut generated: Vec<Arc<ResolvedType>> = Vec::new();
        for schema in catalog.types() {
            if !types::is_generated(catalog, &schema.name) {
                continue;
            }
            let resolved = catalog
                .resolve(&schema.name)
                .with_context(|| format!("resolving {}", schema.name))?;
            let code = self.generate_type_module(&resolved, schema.short.as_deref(), catalog);
            modules.insert(file_name(&resolved.name), code);
            generated.push(resolved);
        }

        let resources: Vec<&str> = generated
            .iter()
            .filter(|t| t.kind == TypeKind::Resource)
            .map(|t| t.name.as_str())
            .collect();
        let with_factory = self.config.generate_serde && !resources.is_empty();
        if with_factory {
            let code = factory::generate_factory(&resources, &self.module_prefix());
            modules.insert(format!("{FACTORY_MODULE}.rs"), code);
        }

        let mod_rs = self.generate_mod_rs(catalog, &generated, with_factory);
        modules.insert("mod.rs".to_string(), mod_rs);

        debug!(
            types = generated.len(),
            resources = resources.len(),
            modules = modules.len(),
            "Generated Rust modules"
        );
        Ok(RustOutput { modules })
    }
}

/// Convert a type name to a module name (snake_case)
pub fn module_name(type_name: &str) -> String {
    type_name.to_snake_case()
}

fn file_name(type_name: &str) -> String {
    format!("{}.rs", module_name(type_name))
}

impl RustGenerator {
    fn module_prefix(&self) -> String {
        self.config
            .module_prefix
            .clone()
            .unwrap_or_else(|| "super".to_string())
    }

    /// Generate a complete module for a single type
    fn generate_type_module(
        &self,
        resolved: &ResolvedType,
        short: Option<&str>,
        catalog: &SchemaCatalog,
    ) -> String {
        let fields = types::struct_fields(resolved, catalog);
        let mut code = String::new();

        // Header comment
        code.push_str(&format!("//! {} type definition\n", resolved.name));
        code.push_str(&format!(
            "//! FHIR {} {}, stored in table {}\n\n",
            catalog.fhir_version(),
            resolved.kind,
            resolved.table
        ));

        code.push_str(&self.generate_imports(resolved, &fields));
        code.push('\n');

        code.push_str(&types::generate_struct(resolved, short, &fields, &self.config));
        code.push_str("\n\n");
        code.push_str(&types::generate_impl(resolved));
        code.push_str("\n\n");
        code.push_str(&types::generate_display(resolved, &fields));
        code.push('\n');

        code
    }

    /// Generate imports for a type based on the structs its fields use
    fn generate_imports(&self, resolved: &ResolvedType, fields: &[RustField]) -> String {
        let mut code = String::new();

        if self.config.generate_serde {
            code.push_str("use serde::{Deserialize, Serialize};\n");
        }
        code.push_str("use std::fmt;\n");

        let deps: BTreeSet<&str> = fields
            .iter()
            .filter_map(|f| f.struct_dep.as_deref())
            .filter(|dep| *dep != resolved.name)
            .collect();

        if !deps.is_empty() {
            code.push('\n');
        }
        let prefix = self.module_prefix();
        for dep in deps {
            code.push_str(&format!("use {}::{}::{};\n", prefix, module_name(dep), dep));
        }

        code
    }

    fn generate_mod_rs(
        &self,
        catalog: &SchemaCatalog,
        generated: &[Arc<ResolvedType>],
        with_factory: bool,
    ) -> String {
        let mut code = String::new();

        code.push_str(&format!(
            "//! Generated FHIR {} data models\n\n",
            catalog.fhir_version()
        ));

        for resolved in generated {
            code.push_str(&format!("pub mod {};\n", module_name(&resolved.name)));
        }
        if with_factory {
            code.push_str(&format!("pub mod {FACTORY_MODULE};\n"));
        }

        code.push_str("\n// Re-export all types\n");
        for resolved in generated {
            code.push_str(&format!(
                "pub use {}::{};\n",
                module_name(&resolved.name),
                resolved.name
            ));
        }
        if with_factory {
            code.push_str(&format!("pub use {FACTORY_MODULE}::FhirResource;\n"));
        }

        code
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn generate(config: GeneratorConfig) -> RustOutput {
        let catalog = SchemaCatalog::builtin().unwrap();
        RustGenerator::new(config).generate(&catalog).unwrap()
    }

    #[test]
    fn test_module_per_concrete_type() {
        let output = generate(GeneratorConfig::default());

        assert!(output.modules.contains_key("mod.rs"));
        assert!(output.modules.contains_key("patient.rs"));
        assert!(output.modules.contains_key("patient_contact.rs"));
        assert!(output.modules.contains_key("human_name.rs"));
        assert!(output.modules.contains_key("element_factory.rs"));
        // abstract bases are flattened into their subtypes
        assert!(!output.modules.contains_key("domain_resource.rs"));
        assert!(!output.modules.contains_key("element.rs"));
        assert!(!output.modules.contains_key("string.rs"));
    }

    #[test]
    fn test_resource_module() {
        let output = generate(GeneratorConfig::default());
        let patient = &output.modules["patient.rs"];

        assert!(patient.starts_with("//! Patient type definition\n"));
        assert!(patient.contains("use super::human_name::HumanName;\n"));
        assert!(patient.contains("#[serde(tag = \"resourceType\")]\n"));
        assert!(patient.contains("pub struct Patient {\n"));
        // inherited from Resource and DomainResource
        assert!(patient.contains("    pub id: Option<String>,\n"));
        assert!(patient.contains("    pub implicit_rules: Option<String>,\n"));
        assert!(patient.contains("    pub contained: Option<Vec<serde_json::Value>>,\n"));
        assert!(patient.contains("    pub deceased_date_time: Option<String>,\n"));
        assert!(patient.contains("    pub contact: Option<Vec<PatientContact>>,\n"));
        assert!(patient.contains("pub const TABLE_NAME: &'static str = \"Patient\";"));
        assert!(patient.contains("pub fn resource_type(&self) -> &'static str {"));
        assert!(patient.contains("impl fmt::Display for Patient {"));
    }

    #[test]
    fn test_renames_and_table_names() {
        let output = generate(GeneratorConfig::default());

        let reference = &output.modules["reference.rs"];
        assert!(reference.contains("pub const TABLE_NAME: &'static str = \"FHIRReference\";"));
        assert!(!reference.contains("RESOURCE_TYPE"));

        let identifier = &output.modules["identifier.rs"];
        assert!(identifier.contains("    #[serde(rename = \"use\")]\n    pub r#use: Option<String>,\n"));
    }

    #[test]
    fn test_mod_rs_and_prefix() {
        let output = generate(GeneratorConfig {
            generate_docs: false,
            generate_serde: false,
            module_prefix: Some("crate::models".to_string()),
        });

        let mod_rs = &output.modules["mod.rs"];
        assert!(mod_rs.starts_with("//! Generated FHIR 1.0.2 data models\n"));
        assert!(mod_rs.contains("pub mod range;\n"));
        assert!(mod_rs.contains("pub use range::Range;\n"));
        // no serde, no dispatch module
        assert!(!output.modules.contains_key("element_factory.rs"));

        let range = &output.modules["range.rs"];
        assert!(range.contains("use crate::models::quantity::Quantity;\n"));
        assert!(!range.contains("Serialize"));
        assert!(!range.contains("/// "));
    }
}
