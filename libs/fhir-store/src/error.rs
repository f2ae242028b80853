//! Error types for the store layer

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Model(#[from] dstu2_models::Error),

    #[error("Type {0} has no table mapping")]
    UnmappedType(String),

    #[error("Unsupported database URL: {0}")]
    UnsupportedDatabaseUrl(String),

    #[error("Unknown SQL dialect: {0}")]
    UnknownDialect(String),
}

pub type Result<T> = std::result::Result<T, Error>;
