//! Error types for the schema registry

use thiserror::Error;

use crate::descriptor::ModelHandle;

/// Result type for schema operations
pub type Result<T> = std::result::Result<T, SchemaError>;

/// Schema registry errors
#[derive(Error, Debug)]
pub enum SchemaError {
    #[error("Schema not found: {name} version {version}")]
    NotFound { name: String, version: String },

    #[error("Model not registered: {0}")]
    ModelNotRegistered(ModelHandle),

    #[error("Registration of {name} rejected: {reason}")]
    Registration { name: String, reason: String },

    #[error("Invalid schema shape: {0}")]
    SchemaShape(String),

    #[error("Unsupported shape: {0}")]
    UnsupportedShape(String),

    #[error("Unresolvable reference: {0}")]
    UnresolvableReference(String),

    #[error("Malformed schema correlation: {0:?}")]
    MalformedCorrelation(String),

    #[error("Invalid schema identity: {0}")]
    InvalidIdentity(String),

    #[error("Payload does not match schema at {path}: {reason}")]
    InvalidPayload { path: String, reason: String },

    #[error("Directory error: {0}")]
    Directory(DirectoryError),

    #[error("Event bus error: {0}")]
    Bus(#[from] BusError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl SchemaError {
    pub(crate) fn not_found(name: impl Into<String>, version: Option<&str>) -> Self {
        SchemaError::NotFound {
            name: name.into(),
            version: version.unwrap_or("default").to_string(),
        }
    }

    pub(crate) fn invalid_payload(path: &str, reason: impl Into<String>) -> Self {
        let path = if path.is_empty() { "$" } else { path };
        SchemaError::InvalidPayload {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

impl From<DirectoryError> for SchemaError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::NotFound { name, version } => SchemaError::NotFound { name, version },
            other => SchemaError::Directory(other),
        }
    }
}

/// Failures reported by a schema directory
#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("Schema not found in directory: {name} version {version}")]
    NotFound { name: String, version: String },

    /// The submitted content is identical to the current version
    #[error("Schema content unchanged: {name}")]
    Conflict { name: String },

    #[error("Request rejected: {0}")]
    Rejected(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failures reported by an event bus
#[derive(Error, Debug)]
pub enum BusError {
    #[error("Event bus {bus} rejected the event: {reason}")]
    Rejected { bus: String, reason: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
