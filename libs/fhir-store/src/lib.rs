//! Relational persistence layout for FHIR 1.0.2 catalog types
//!
//! This crate maps catalog types to SQL tables, renders migration DDL for a
//! whole catalog and flattens element trees into parameterised `INSERT`
//! statements. It produces SQL text and bind values only; executing them is
//! left to the caller's database driver.
//!
//! # Example
//!
//! ```rust
//! use dstu2_models::SchemaCatalog;
//! use dstu2_store::{Dialect, Migration, MigrationOptions};
//!
//! let catalog = SchemaCatalog::builtin().unwrap();
//! let migration =
//!     Migration::for_catalog(&catalog, Dialect::Postgres, MigrationOptions::default()).unwrap();
//! assert!(migration.upgrade().contains("CREATE TABLE IF NOT EXISTS \"Range\""));
//! ```

pub mod dialect;
pub mod error;
pub mod mapping;
pub mod migration;
pub mod rows;

pub use dialect::{quote_ident, Dialect};
pub use error::{Error, Result};
pub use mapping::{Column, ColumnKind, ScalarType, TableMapping};
pub use migration::{DroppedForeignKey, Migration, MigrationOptions};
pub use rows::{BindValue, InsertStatement, Row, RowPlanner};
