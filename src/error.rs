//! Error types for tutorlens.

use thiserror::Error;

/// Result type alias using tutorlens' Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that abort an operation.
///
/// Recoverable anomalies (unparsable grammar rules, undecodable generation
/// payloads) are not errors; they travel as reason codes next to a
/// substituted value.
#[derive(Error, Debug)]
pub enum Error {
    /// Raw record is missing a field or has a badly shaped value
    #[error("Malformed record {id}: {reason}")]
    MalformedRecord { id: String, reason: String },

    /// Generation service call failed
    #[error("Generation failed for {model}: {message}")]
    Generation { model: String, message: String },

    /// Two distributions cannot be compared label for label
    #[error("Label mismatch: {0}")]
    LabelMismatch(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// File system error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// Create a malformed-record error.
    pub fn malformed(id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            id: id.into(),
            reason: reason.into(),
        }
    }

    /// Create a generation error.
    pub fn generation(model: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Generation {
            model: model.into(),
            message: message.into(),
        }
    }

    /// Whether retrying the same call could succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Generation { .. })
    }
}
