//! Protocol error types.

use thiserror::Error;

/// Result alias for protocol operations.
pub type Result<T> = std::result::Result<T, ProtocolError>;

/// Errors raised while parsing or validating wire data.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A step string deviates from the step grammar.
    #[error("malformed step at byte {position}: {reason}")]
    MalformedStep {
        /// Byte offset of the first offending character
        position: usize,
        /// What the parser expected
        reason: &'static str,
    },

    /// Steps of one descriptor carry different channels.
    #[error("channel mismatch: expected {expected}, found {found}")]
    ChannelMismatch {
        /// Channel of the first step
        expected: String,
        /// Conflicting channel
        found: String,
    },

    /// Descriptor document violates a structural rule.
    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),

    /// Unknown message format tag.
    #[error("unknown message format: {0}")]
    UnknownFormat(String),

    /// Unknown HTTP method.
    #[error("unknown http method: {0}")]
    UnknownMethod(String),

    /// JSON (de)serialization failed.
    #[error("json error: {0}")]
    Json(String),
}

impl From<serde_json::Error> for ProtocolError {
    fn from(err: serde_json::Error) -> Self {
        Self::Json(err.to_string())
    }
}
