//! Error types for wwt-core
//!
//! Every fallible operation returns [`WwtResult`]. The variants map onto the
//! failure classes a host sees:
//! - Validation: a value was rejected before any message was sent
//! - Key mismatch: an unknown attribute name was passed to a factory
//! - Stale entity: an annotation or layer was used after removal
//! - Transport / timeout: the engine could not be reached or did not answer

use thiserror::Error;

/// Main error type for wwt operations
#[derive(Error, Debug)]
pub enum WwtError {
    /// A value failed its attribute validator
    #[error("{message}")]
    Validation { attribute: String, message: String },

    /// Keyword arguments that do not name a declared attribute
    #[error("{entity} got unexpected attribute(s): {}", .keys.join(", "))]
    KeyMismatch { entity: String, keys: Vec<String> },

    /// Operation on an entity that has been removed
    #[error("{kind} '{id}' has been removed")]
    StaleEntity { kind: String, id: String },

    /// Engine unreachable or the transport failed
    #[error("Transport error: {0}")]
    Transport(String),

    /// Read-back did not get a reply in time
    #[error("Timed out after {waited_ms} ms waiting for view field '{field}'")]
    Timeout { field: String, waited_ms: u64 },

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Malformed imagery catalog document
    #[error("Invalid WTML document: {0}")]
    Wtml(String),

    /// JSON encoding errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Table or image data errors
    #[error("Data error: {0}")]
    Data(#[from] wwt_io::IoError),
}

impl WwtError {
    /// Build a validation error for an attribute
    pub fn validation(attribute: impl Into<String>, message: impl Into<String>) -> Self {
        WwtError::Validation {
            attribute: attribute.into(),
            message: message.into(),
        }
    }

    /// Build a stale-entity error
    pub fn stale(kind: impl Into<String>, id: impl Into<String>) -> Self {
        WwtError::StaleEntity {
            kind: kind.into(),
            id: id.into(),
        }
    }

    /// Whether this error came from the transport layer (timeouts included)
    pub fn is_transport(&self) -> bool {
        matches!(self, WwtError::Transport(_) | WwtError::Timeout { .. })
    }
}

/// Result type alias for wwt operations
pub type WwtResult<T> = Result<T, WwtError>;
