//! Unified error types for the domain layer
//!
//! `DomainError` covers value-object and invariant failures. `SchemaError`
//! is reserved for stored data that cannot be materialized: the normalizer
//! repairs everything it can and only reports genuine corruption.

use thiserror::Error;

use crate::value_objects::SemVerParseError;

/// Unified error type for domain operations
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomainError {
    /// Validation failed (e.g., invalid field values)
    #[error("Validation failed: {0}")]
    Validation(String),

    /// Parse error (for value objects)
    #[error("Parse error: {0}")]
    Parse(String),

    /// Stored document could not be materialized
    #[error(transparent)]
    Schema(#[from] SchemaError),
}

impl DomainError {
    /// Create a validation error
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    /// Creates a parse error for string-to-type conversion failures.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse(msg.into())
    }
}

impl From<SemVerParseError> for DomainError {
    fn from(err: SemVerParseError) -> Self {
        Self::Parse(err.to_string())
    }
}

/// Corrupt stored data detected while materializing a document.
///
/// These are surfaced to the caller instead of being masked.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SchemaError {
    /// An entry of the `actions` array is null or not an object
    #[error("Corrupt power data: actions[{index}] is {found}")]
    CorruptAction { index: usize, found: &'static str },

    /// The stored document has no usable `_id`
    #[error("Stored document has no id")]
    MissingId,

    /// The stored payload is not a JSON object
    #[error("Stored document is not an object: {0}")]
    NotAnObject(&'static str),

    /// The stored payload is not JSON at all
    #[error("Stored document is not valid JSON: {0}")]
    InvalidJson(String),
}

/// Short JSON type name for error messages.
pub(crate) fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "an array",
        serde_json::Value::Object(_) => "an object",
    }
}
