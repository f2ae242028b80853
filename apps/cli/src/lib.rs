//! Command line tooling for the FHIR 1.0.2 model catalog
//!
//! The `dstu2` binary lists and describes catalog types, instantiates JSON
//! resources through the element factory, generates Rust models and SQL
//! migrations, and converts StructureDefinitions into catalog documents.

pub mod cli;
pub mod commands;
pub mod config;
pub mod logging;

pub use cli::{Cli, Command, GenerateTarget};
pub use commands::{run, Context};
pub use config::{AppConfig, Environment, LogConfig};
