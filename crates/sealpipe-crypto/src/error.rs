//! Error types for route keys and sealed boxes.

use thiserror::Error;

/// Errors from key derivation and sealed-box operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// The route identity lacks a field required for key derivation.
    #[error("key derivation unavailable: identity field `{missing}` is empty")]
    KeyDerivationUnavailable {
        /// Name of the missing identity field
        missing: &'static str,
    },

    /// Sealed box could not be opened (wrong key, tampering, truncation).
    #[error("decryption failed: {reason}")]
    DecryptionFailed {
        /// Reason for failure
        reason: String,
    },

    /// Public key bytes have the wrong length.
    #[error("invalid public key: expected 32 bytes, got {len}")]
    InvalidPublicKey {
        /// Length of the rejected key material
        len: usize,
    },

    /// Sealing failed inside the AEAD.
    #[error("encryption failed")]
    EncryptionFailed,
}
