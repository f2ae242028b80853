//! Command line arguments

use clap::{Parser, Subcommand, ValueEnum};
use dstu2_models::TypeKind;
use dstu2_store::Dialect;
use std::path::PathBuf;

use crate::config::Environment;

#[derive(Debug, Parser)]
#[command(
    name = "dstu2",
    version,
    about = "FHIR 1.0.2 model catalog, migrations and code generation"
)]
pub struct Cli {
    /// Catalog document merged over the builtin catalog
    #[arg(long, global = true)]
    pub catalog: Option<PathBuf>,

    /// Configuration file (TOML, JSON or YAML)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Configuration profile
    #[arg(long = "env", global = true, value_enum)]
    pub environment: Option<Environment>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List catalog types
    Types {
        #[arg(long, value_enum)]
        kind: Option<KindFilter>,
    },
    /// Show the resolved fields of a type
    Describe { type_name: String },
    /// Instantiate a JSON resource and print it back
    Parse {
        file: PathBuf,
        /// Report validation issues; errors make the command fail
        #[arg(long)]
        validate: bool,
        /// Single-line JSON output
        #[arg(long)]
        compact: bool,
    },
    /// Generate Rust models or SQL migrations
    Generate {
        #[command(subcommand)]
        target: GenerateTarget,
    },
    /// Build a catalog document from StructureDefinitions
    Convert {
        /// StructureDefinition or Bundle files, or directories of them
        #[arg(required = true)]
        inputs: Vec<PathBuf>,
        #[arg(long)]
        out: PathBuf,
    },
}

#[derive(Debug, Subcommand)]
pub enum GenerateTarget {
    /// One Rust module per concrete type
    Rust {
        #[arg(long)]
        out: PathBuf,
        #[arg(long)]
        no_docs: bool,
        #[arg(long)]
        no_serde: bool,
        /// Module path the generated modules are mounted at
        #[arg(long)]
        module_prefix: Option<String>,
    },
    /// CREATE TABLE (or DROP TABLE) script
    Sql {
        /// Output file, stdout when omitted
        #[arg(long)]
        out: Option<PathBuf>,
        /// Defaults to the dialect of the configured database_url
        #[arg(long)]
        dialect: Option<Dialect>,
        /// Also create tables for resources
        #[arg(long)]
        resources: bool,
        #[arg(long)]
        downgrade: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum KindFilter {
    Resource,
    Complex,
    Primitive,
    Backbone,
}

impl From<KindFilter> for TypeKind {
    fn from(value: KindFilter) -> Self {
        match value {
            KindFilter::Resource => TypeKind::Resource,
            KindFilter::Complex => TypeKind::ComplexType,
            KindFilter::Primitive => TypeKind::PrimitiveType,
            KindFilter::Backbone => TypeKind::BackboneElement,
        }
    }
}
