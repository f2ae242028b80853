//! Subcommand implementations
//!
//! Commands write their results to `out` and diagnostics to `err` so they
//! can be driven from tests as well as from the binary. They return whether
//! the command succeeded; hard failures are errors.

mod convert;
mod generate;
mod inspect;
mod parse;

use anyhow::{Context as _, Result};
use std::io::Write;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use dstu2_models::SchemaCatalog;

use crate::cli::{Command, GenerateTarget};
use crate::config::AppConfig;

/// Shared state of one invocation
pub struct Context {
    pub config: AppConfig,
    pub catalog: Arc<SchemaCatalog>,
}

impl Context {
    /// Builtin catalog, with `catalog` (or the configured catalog path)
    /// merged over it
    pub fn new(config: AppConfig, catalog: Option<&Path>) -> Result<Self> {
        let mut merged = SchemaCatalog::builtin().context("loading builtin catalog")?;

        let overlay = catalog
            .map(Path::to_path_buf)
            .or_else(|| config.catalog_path.clone());
        if let Some(path) = overlay {
            let extra = SchemaCatalog::from_path(&path)
                .with_context(|| format!("loading catalog {}", path.display()))?;
            info!(path = %path.display(), types = extra.len(), "Merging catalog");
            merged.merge(extra);
        }

        Ok(Self {
            config,
            catalog: Arc::new(merged),
        })
    }
}

pub fn run(
    ctx: &Context,
    command: &Command,
    out: &mut dyn Write,
    err: &mut dyn Write,
) -> Result<bool> {
    match command {
        Command::Types { kind } => inspect::types(ctx, kind.map(Into::into), out),
        Command::Describe { type_name } => inspect::describe(ctx, type_name, out),
        Command::Parse {
            file,
            validate,
            compact,
        } => parse::parse(ctx, file, *validate, *compact, out, err),
        Command::Generate { target } => match target {
            GenerateTarget::Rust {
                out: dir,
                no_docs,
                no_serde,
                module_prefix,
            } => generate::rust(ctx, dir, !no_docs, !no_serde, module_prefix.clone()),
            GenerateTarget::Sql {
                out: file,
                dialect,
                resources,
                downgrade,
            } => generate::sql(ctx, file.as_deref(), *dialect, *resources, *downgrade, out),
        },
        Command::Convert { inputs, out: file } => convert::convert(inputs, file),
    }
}
