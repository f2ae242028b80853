//! Code generators over a schema catalog
//!
//! Each output format has its own module that implements the `Generator` trait.

pub mod catalog;
pub mod rust;

use anyhow::Result;
use dstu2_models::SchemaCatalog;

/// Trait that all generators must implement
pub trait Generator {
    /// The output type of this generator
    type Output;

    /// Generate output from the schema catalog
    fn generate(&self, catalog: &SchemaCatalog) -> Result<Self::Output>;
}

/// Configuration options for code generation
#[derive(Debug, Clone)]
pub struct GeneratorConfig {
    /// Whether to generate documentation comments
    pub generate_docs: bool,
    /// Whether to generate serde derive macros (for serialization)
    pub generate_serde: bool,
    /// Module path the generated modules live under (`super` when unset)
    pub module_prefix: Option<String>,
}

impl Default for GeneratorConfig {
    fn default() -> Self {
        Self {
            generate_docs: true,
            generate_serde: true,
            module_prefix: None,
        }
    }
}
