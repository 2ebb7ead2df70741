//! Error types for pipeline building, evaluation and submission.
//!
//! [`ProcedureError`] carries full detail for logs and tests. Anything that
//! crosses the gateway is first collapsed into a [`Rejection`] so clients
//! cannot tell a wrong key from a tampered ciphertext or a missing route
//! from a broken one.

use chrono::{DateTime, Utc};
use sealpipe_crypto::CryptoError;
use sealpipe_proto::{MessageFormat, ProtocolError};
use thiserror::Error;

use crate::store::StoreError;

/// Result alias for pipeline operations.
pub type Result<T> = std::result::Result<T, ProcedureError>;

/// Errors raised by the procedural value machinery.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProcedureError {
    /// The route identity lacks a field required for key derivation.
    #[error("key derivation unavailable: identity field `{missing}` is empty")]
    KeyDerivationUnavailable {
        /// Name of the missing identity field
        missing: &'static str,
    },

    /// Ciphertext could not be decoded, opened or parsed.
    #[error("decryption failed: {reason}")]
    DecryptionFailed {
        /// Reason for failure (logged, never returned to clients)
        reason: String,
    },

    /// Payload could not be encoded or sealed.
    #[error("encryption failed: {reason}")]
    EncryptionFailed {
        /// Reason for failure
        reason: String,
    },

    /// Operation name is not on the whitelist.
    #[error("unknown operation: {name}")]
    UnknownOperation {
        /// Rejected name
        name: String,
    },

    /// Declared or supplied argument count differs from the operation's.
    #[error("arity mismatch for {operation}: expected {expected}, got {got}")]
    ArityMismatch {
        /// Operation or function being called
        operation: &'static str,
        /// Arity the operation requires
        expected: usize,
        /// Arity that was declared or supplied
        got: usize,
    },

    /// A step targets a slot the invoked function does not have.
    #[error("no such slot: {selector}")]
    MissingInputSlot {
        /// Offending selector, in wire form
        selector: String,
    },

    /// An operation received a value it cannot work with.
    #[error("type mismatch in {operation}: expected {expected}, found {found}")]
    TypeMismatch {
        /// Operation that rejected the value
        operation: &'static str,
        /// What the operation needs
        expected: &'static str,
        /// What it was given
        found: &'static str,
    },

    /// A decrypted payload or argument does not match its declared format.
    #[error("`{field}` does not match format {expected}: found {found}")]
    PayloadTypeMismatch {
        /// Request parameter that failed validation
        field: String,
        /// Declared format
        expected: MessageFormat,
        /// Kind of the received value
        found: &'static str,
    },

    /// Descriptor validity window has passed.
    #[error("descriptor expired at {expires_at} (now {now})")]
    DescriptorExpired {
        /// Descriptor expiry
        expires_at: DateTime<Utc>,
        /// Evaluation time
        now: DateTime<Utc>,
    },

    /// Descriptor violates the wire protocol.
    #[error("malformed descriptor: {0}")]
    MalformedDescriptor(#[from] ProtocolError),

    /// Submission lacks a required request parameter.
    #[error("missing parameter: {name}")]
    MissingParameter {
        /// Parameter name
        name: String,
    },

    /// Route names an encryption service that is not registered.
    #[error("unsupported algorithm: {name}")]
    UnsupportedAlgorithm {
        /// Algorithm name from the route record
        name: String,
    },

    /// Route configuration cannot produce a valid descriptor.
    #[error("invalid route config: {0}")]
    InvalidRouteConfig(String),

    /// No route with this id exists.
    #[error("route not found: {route}")]
    RouteNotFound {
        /// Requested route id
        route: String,
    },

    /// Route storage failed.
    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl ProcedureError {
    /// Returns true if the request itself was at fault.
    ///
    /// Client faults are rejected; everything else means the route or the
    /// server cannot currently serve the request.
    pub fn is_client_fault(&self) -> bool {
        matches!(
            self,
            Self::DecryptionFailed { .. }
                | Self::UnknownOperation { .. }
                | Self::ArityMismatch { .. }
                | Self::MissingInputSlot { .. }
                | Self::TypeMismatch { .. }
                | Self::PayloadTypeMismatch { .. }
                | Self::DescriptorExpired { .. }
                | Self::MalformedDescriptor(_)
                | Self::MissingParameter { .. }
        )
    }
}

impl From<CryptoError> for ProcedureError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::KeyDerivationUnavailable { missing } => {
                Self::KeyDerivationUnavailable { missing }
            },
            CryptoError::DecryptionFailed { reason } => Self::DecryptionFailed { reason },
            err @ (CryptoError::InvalidPublicKey { .. } | CryptoError::EncryptionFailed) => {
                Self::EncryptionFailed { reason: err.to_string() }
            },
        }
    }
}

/// Outcome reported to clients.
///
/// Carries no detail beyond its kind. The full [`ProcedureError`] is logged
/// at the gateway.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    /// Route does not exist.
    #[error("not found")]
    NotFound,

    /// Route exists but cannot currently be served.
    #[error("unavailable")]
    Unavailable,

    /// Request was invalid.
    #[error("rejected")]
    Rejected,
}

impl From<&ProcedureError> for Rejection {
    fn from(err: &ProcedureError) -> Self {
        match err {
            ProcedureError::RouteNotFound { .. } => Self::NotFound,
            err if err.is_client_fault() => Self::Rejected,
            _ => Self::Unavailable,
        }
    }
}
