//! Anonymous sealed boxes (libsodium `crypto_box_seal`).
//!
//! Format: `[ephemeral_pubkey:32][ciphertext][tag:16]`. The nonce is not
//! transmitted; both sides derive it as BLAKE2b(ephemeral_pk || recipient_pk).
//!
//! Sealing takes a caller-provided RNG for the ephemeral key pair, so tests can
//! seal deterministically.

use crypto_box::PublicKey;
use rand::{CryptoRng, RngCore};

use crate::{CryptoError, KEY_SIZE, RouteKeyPair};

/// Size of the ephemeral public key prefix
pub const EPHEMERAL_KEY_LEN: usize = KEY_SIZE;

/// Poly1305 tag size
pub const TAG_LEN: usize = 16;

/// Bytes a sealed box adds on top of its plaintext
pub const SEAL_OVERHEAD: usize = EPHEMERAL_KEY_LEN + TAG_LEN;

/// Seal `plaintext` for `recipient`.
///
/// The ephemeral sender key pair is generated from `rng` and dropped before
/// returning. The result is `plaintext.len() + SEAL_OVERHEAD` bytes long.
///
/// # Security
///
/// - Caller MUST provide a cryptographically secure RNG in production
/// - The sender is anonymous; the recipient learns nothing about them
pub fn seal<R: RngCore + CryptoRng>(
    plaintext: &[u8],
    recipient: &PublicKey,
    rng: &mut R,
) -> Result<Vec<u8>, CryptoError> {
    recipient.seal(rng, plaintext).map_err(|_| CryptoError::EncryptionFailed)
}

/// Open a sealed box with the recipient's key pair.
///
/// # Errors
///
/// - `DecryptionFailed`: ciphertext is truncated, was sealed for another key,
///   or has been tampered with
pub fn open(ciphertext: &[u8], keypair: &RouteKeyPair) -> Result<Vec<u8>, CryptoError> {
    if ciphertext.len() < SEAL_OVERHEAD {
        return Err(CryptoError::DecryptionFailed {
            reason: format!(
                "ciphertext too short: {} bytes (minimum {SEAL_OVERHEAD})",
                ciphertext.len()
            ),
        });
    }

    keypair.secret_key().unseal(ciphertext).map_err(|_| CryptoError::DecryptionFailed {
        reason: "authentication failed".to_string(),
    })
}

/// Parse raw public key bytes.
///
/// # Errors
///
/// - `InvalidPublicKey`: input is not exactly 32 bytes
pub fn public_key_from_bytes(bytes: &[u8]) -> Result<PublicKey, CryptoError> {
    let key: [u8; KEY_SIZE] =
        bytes.try_into().map_err(|_| CryptoError::InvalidPublicKey { len: bytes.len() })?;
    Ok(PublicKey::from(key))
}
