//! `types` and `describe`

use anyhow::{Context as _, Result};
use std::io::Write;

use dstu2_models::TypeKind;

use super::Context;

pub fn types(ctx: &Context, kind: Option<TypeKind>, out: &mut dyn Write) -> Result<bool> {
    for schema in ctx.catalog.types() {
        if kind.is_some_and(|k| k != schema.kind) {
            continue;
        }
        let mut line = format!("{:<32} {:<16}", schema.name, schema.kind.as_str());
        if let Some(base) = &schema.base {
            line.push_str(&format!(" : {base}"));
        }
        if schema.is_abstract {
            line.push_str(" (abstract)");
        }
        writeln!(out, "{}", line.trim_end())?;
    }
    Ok(true)
}

pub fn describe(ctx: &Context, type_name: &str, out: &mut dyn Write) -> Result<bool> {
    let resolved = ctx
        .catalog
        .resolve(type_name)
        .with_context(|| format!("describing {type_name}"))?;

    write!(out, "{} ({}", resolved.name, resolved.kind)?;
    if let Some(base) = resolved.base() {
        write!(out, ", base {base}")?;
    }
    if resolved.is_abstract {
        write!(out, ", abstract")?;
    }
    writeln!(out, ", table {})", resolved.table)?;

    for field in &resolved.fields {
        let mut types = field.types.join("|");
        if !field.targets.is_empty() {
            types.push_str(&format!("({})", field.targets.join("|")));
        }
        let line = format!(
            "  {:<28} {:<40} {:<6} {}",
            field.name,
            types,
            field.cardinality.to_string(),
            field.short.as_deref().unwrap_or_default()
        );
        writeln!(out, "{}", line.trim_end())?;
    }
    Ok(true)
}
