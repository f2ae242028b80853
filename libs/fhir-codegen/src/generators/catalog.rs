//! Catalog document export

use anyhow::{Context, Result};
use dstu2_models::SchemaCatalog;
use std::fs;
use std::path::Path;

use super::Generator;

/// Renders a catalog as the JSON document `SchemaCatalog::from_json` reads
#[derive(Debug, Clone, Default)]
pub struct CatalogExporter {
    /// Single-line output instead of pretty-printed JSON
    pub compact: bool,
}

impl CatalogExporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Write the catalog document to `path`
    pub fn export_to(&self, catalog: &SchemaCatalog, path: &Path) -> Result<()> {
        let document = self.generate(catalog)?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .with_context(|| format!("creating directory {}", parent.display()))?;
        }
        fs::write(path, document)
            .with_context(|| format!("writing catalog {}", path.display()))
    }
}

impl Generator for CatalogExporter {
    type Output = String;

    fn generate(&self, catalog: &SchemaCatalog) -> Result<String> {
        let document = catalog.to_document();
        let json = if self.compact {
            serde_json::to_string(&document)
        } else {
            serde_json::to_string_pretty(&document)
        };
        json.context("serializing catalog document")
    }
}
