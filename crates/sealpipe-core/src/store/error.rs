//! Storage error types.

use thiserror::Error;

/// Errors from route storage.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// Backend could not be reached or read
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// Stored record could not be decoded
    #[error("corrupt route record {route}: {reason}")]
    Corrupt {
        /// Route id of the record
        route: String,
        /// Decoding failure
        reason: String,
    },
}
