//! FHIR 1.0.2 code generator
//!
//! This library turns a [`SchemaCatalog`] into strongly-typed Rust models and
//! builds catalogs from FHIR StructureDefinitions.
//!
//! ## Architecture
//!
//! The generator uses a three-stage pipeline:
//! 1. **Parser**: Extracts type information from FHIR StructureDefinitions
//! 2. **Catalog**: the [`SchemaCatalog`] shared with the runtime models
//! 3. **Generators**: Rust modules or a catalog document from the catalog
//!
//! The builtin catalog can be fed straight to the generators, so a model set
//! can be regenerated without any StructureDefinitions at hand.

pub mod generators;
pub mod parser;
pub mod utils;

use std::path::Path;

use anyhow::{Context, Result};
use dstu2_models::SchemaCatalog;
use generators::rust::RustGenerator;
use generators::GeneratorConfig;

pub use generators::catalog::CatalogExporter;
pub use generators::rust::{RustOutput, FACTORY_MODULE};
pub use generators::Generator;

/// Main entry point for code generation
pub struct CodeGenerator {
    catalog: SchemaCatalog,
}

impl CodeGenerator {
    pub fn new(catalog: SchemaCatalog) -> Self {
        Self { catalog }
    }

    /// Generator over the compiled-in FHIR 1.0.2 catalog
    pub fn builtin() -> Result<Self> {
        let catalog = SchemaCatalog::builtin().context("loading builtin catalog")?;
        Ok(Self::new(catalog))
    }

    /// Create a generator from StructureDefinition files or directories
    pub fn from_structure_definitions<P: AsRef<Path>>(paths: &[P]) -> Result<Self> {
        let catalog = parser::parse_paths(paths)?;
        Ok(Self::new(catalog))
    }

    /// Get the schema catalog
    pub fn catalog(&self) -> &SchemaCatalog {
        &self.catalog
    }

    /// Generate output with the given generator
    pub fn generate<G: generators::Generator>(&self, generator: G) -> Result<G::Output> {
        generator.generate(&self.catalog)
    }
}

/// Convenience helper to run the Rust code generator over a catalog.
///
/// Returns the number of generated modules.
pub fn generate_rust_from_catalog(
    catalog: &SchemaCatalog,
    output_dir: &Path,
    config: GeneratorConfig,
) -> Result<usize> {
    let generator = RustGenerator::new(config);
    let output = generator
        .generate(catalog)
        .context("running Rust generator")?;

    utils::write_modules(output_dir, &output.modules)?;

    Ok(output.modules.len())
}

/// Convenience helper to run the Rust code generator from StructureDefinitions.
///
/// Returns the number of generated modules.
pub fn generate_rust_from_definitions<P: AsRef<Path>>(
    paths: &[P],
    output_dir: &Path,
    config: GeneratorConfig,
) -> Result<usize> {
    let codegen =
        CodeGenerator::from_structure_definitions(paths).context("building schema catalog")?;
    generate_rust_from_catalog(codegen.catalog(), output_dir, config)
}
