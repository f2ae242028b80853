//! `parse`

use anyhow::{Context as _, Result};
use std::fs;
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use dstu2_models::validation::has_errors;
use dstu2_models::{validate, ElementFactory};

use super::Context;

/// Instantiate `file` through the factory and print the round-tripped JSON
///
/// Validation runs with `--validate` or in strict mode; strict mode also
/// fails on warnings.
pub fn parse(
    ctx: &Context,
    file: &Path,
    run_validation: bool,
    compact: bool,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> Result<bool> {
    let content =
        fs::read_to_string(file).with_context(|| format!("reading {}", file.display()))?;

    let factory = ElementFactory::new(Arc::clone(&ctx.catalog));
    let element = factory
        .from_str(&content)
        .with_context(|| format!("instantiating {}", file.display()))?;
    info!(summary = %element, "Parsed resource");

    let json = element.as_json();
    let rendered = if compact {
        serde_json::to_string(&json)?
    } else {
        serde_json::to_string_pretty(&json)?
    };
    writeln!(out, "{rendered}")?;

    if !run_validation && !ctx.config.strict {
        return Ok(true);
    }

    let issues = validate(&element);
    for issue in &issues {
        writeln!(err, "{issue}")?;
    }
    let failed = if ctx.config.strict {
        !issues.is_empty()
    } else {
        has_errors(&issues)
    };
    Ok(!failed)
}
