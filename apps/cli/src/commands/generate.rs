//! `generate rust` and `generate sql`

use anyhow::{Context as _, Result};
use std::fs;
use std::io::Write;
use std::path::Path;
use tracing::{info, warn};

use dstu2_codegen::generate_rust_from_catalog;
use dstu2_codegen::generators::GeneratorConfig;
use dstu2_store::{Dialect, Migration, MigrationOptions};

use super::Context;

pub fn rust(
    ctx: &Context,
    out: &Path,
    generate_docs: bool,
    generate_serde: bool,
    module_prefix: Option<String>,
) -> Result<bool> {
    let config = GeneratorConfig {
        generate_docs,
        generate_serde,
        module_prefix,
    };
    let count = generate_rust_from_catalog(&ctx.catalog, out, config)?;
    info!(modules = count, output_dir = %out.display(), "Generated Rust models");
    Ok(true)
}

pub fn sql(
    ctx: &Context,
    file: Option<&Path>,
    dialect: Option<Dialect>,
    include_resources: bool,
    downgrade: bool,
    out: &mut dyn Write,
) -> Result<bool> {
    let dialect = match dialect {
        Some(dialect) => dialect,
        None => ctx.config.dialect()?,
    };

    let migration = Migration::for_catalog(
        &ctx.catalog,
        dialect,
        MigrationOptions { include_resources },
    )
    .context("planning migration")?;

    for dropped in migration.dropped_foreign_keys() {
        warn!(
            table = %dropped.table,
            column = %dropped.column,
            references = %dropped.references,
            "Foreign key omitted from DDL"
        );
    }

    let script = if downgrade {
        migration.downgrade()
    } else {
        migration.upgrade()
    };

    match file {
        Some(path) => {
            write_script(path, &script)?;
            info!(
                path = %path.display(),
                tables = migration.tables().len(),
                dialect = %dialect,
                "Wrote migration"
            );
        }
        None => out.write_all(script.as_bytes())?,
    }
    Ok(true)
}

fn write_script(path: &Path, script: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating directory {}", parent.display()))?;
    }
    fs::write(path, script).with_context(|| format!("writing {}", path.display()))
}
