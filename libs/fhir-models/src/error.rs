//! Error types for FHIR models

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Unknown type: {0}")]
    UnknownType(String),

    #[error("Type {type_name} extends unknown base {base}")]
    UnknownBase { type_name: String, base: String },

    #[error("Cyclic base chain starting at {0}")]
    CyclicBase(String),

    #[error("expected a JSON object for {0}")]
    ExpectedObject(String),

    #[error("missing resourceType property")]
    MissingResourceType,

    #[error("Invalid value at {path}: {message}")]
    InvalidFieldValue { path: String, message: String },

    #[error("{type_name} declares {expected} fields, got {actual} values")]
    TooManyValues {
        type_name: String,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid catalog: {0}")]
    InvalidCatalog(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn invalid_value(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidFieldValue {
            path: path.into(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
