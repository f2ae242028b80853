//! `convert`

use anyhow::{Context as _, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use dstu2_codegen::{parser, CatalogExporter};

/// Build a catalog document from StructureDefinitions and write it to `out`
pub fn convert(inputs: &[PathBuf], out: &Path) -> Result<bool> {
    let catalog = parser::parse_paths(inputs).context("reading StructureDefinitions")?;

    if catalog.is_empty() {
        warn!("No base StructureDefinitions found");
        return Ok(false);
    }
    // types referencing definitions outside the inputs still convert
    if let Err(e) = catalog.check() {
        warn!(error = %e, "Converted catalog is incomplete");
    }

    CatalogExporter::new().export_to(&catalog, out)?;
    info!(
        path = %out.display(),
        types = catalog.len(),
        fhir_version = catalog.fhir_version(),
        "Wrote catalog"
    );
    Ok(true)
}
