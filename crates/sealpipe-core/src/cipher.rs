//! Direct payload encryption and decryption.
//!
//! [`encrypt_payload`] is the reference a descriptor pipeline must
//! reproduce: evaluating a freshly built descriptor on a message yields a
//! value that [`decrypt_payload`] opens to the same message.

use rand::{CryptoRng, RngCore};
use sealpipe_crypto::{RouteIdentity, derive_route_keypair, get_public_key};
use serde_json::Value;
use tracing::trace;

use crate::{ProcedureError, Result, codec};

/// Seal `payload` to the route and return its transport form.
///
/// # Errors
///
/// - `KeyDerivationUnavailable`: identity lacks secret, slug or algorithm
/// - `EncryptionFailed`: payload cannot be encoded
pub fn encrypt_payload<R: RngCore + CryptoRng>(
    payload: &Value,
    identity: &RouteIdentity,
    rng: &mut R,
) -> Result<String> {
    let public = get_public_key(identity)?;
    let plaintext = codec::encode_structured(payload)
        .map_err(|e| ProcedureError::EncryptionFailed { reason: e.to_string() })?;
    let sealed = sealpipe_crypto::seal(&plaintext, &public, rng)?;

    trace!(route = %identity.slug, len = sealed.len(), "sealed payload");
    Ok(codec::encode_transport(&sealed))
}

/// Open a transport-form ciphertext addressed to the route.
///
/// # Errors
///
/// - `KeyDerivationUnavailable`: identity lacks secret, slug or algorithm
/// - `DecryptionFailed`: anything wrong with the ciphertext (encoding,
///   truncation, wrong key, tampering, undecodable plaintext)
pub fn decrypt_payload(ciphertext: &str, identity: &RouteIdentity) -> Result<Value> {
    identity.ensure_complete()?;

    let sealed = codec::decode_transport(ciphertext)
        .map_err(|e| ProcedureError::DecryptionFailed { reason: e.to_string() })?;

    let plaintext = {
        let keypair = derive_route_keypair(identity)?;
        sealpipe_crypto::open(&sealed, &keypair)?
    };

    codec::decode_structured(&plaintext)
        .map_err(|e| ProcedureError::DecryptionFailed { reason: e.to_string() })
}

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;
    use serde_json::json;

    use super::*;

    fn identity() -> RouteIdentity {
        RouteIdentity {
            secret: "s3cr3t".to_string(),
            last_modified_at: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            owner_login: "alice".to_string(),
            owner_email: "a@x.io".to_string(),
            slug: "my-route".to_string(),
            algorithm_name: "sealedbox-x25519xsalsa20poly1305".to_string(),
        }
    }

    #[test]
    fn roundtrip_preserves_values() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        for payload in [json!("hello"), json!({"a": [1, 2]}), json!(12), json!(null)] {
            let ciphertext = encrypt_payload(&payload, &identity(), &mut rng).unwrap();
            assert_eq!(decrypt_payload(&ciphertext, &identity()).unwrap(), payload);
        }
    }

    #[test]
    fn ciphertexts_are_randomized() {
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        let a = encrypt_payload(&json!("hello"), &identity(), &mut rng).unwrap();
        let b = encrypt_payload(&json!("hello"), &identity(), &mut rng).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn other_route_cannot_decrypt() {
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let ciphertext = encrypt_payload(&json!("hello"), &identity(), &mut rng).unwrap();

        let mut edited = identity();
        edited.last_modified_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 1).unwrap();

        assert!(matches!(
            decrypt_payload(&ciphertext, &edited),
            Err(ProcedureError::DecryptionFailed { .. })
        ));
    }

    #[test]
    fn garbage_is_decryption_failure() {
        for ciphertext in ["", "%%%", "AAAA", "not base64!"] {
            assert!(
                matches!(
                    decrypt_payload(ciphertext, &identity()),
                    Err(ProcedureError::DecryptionFailed { .. })
                ),
                "{ciphertext:?}"
            );
        }
    }

    #[test]
    fn incomplete_identity_is_unavailable() {
        let mut rng = ChaCha20Rng::seed_from_u64(4);
        let mut incomplete = identity();
        incomplete.secret.clear();

        assert_eq!(
            encrypt_payload(&json!("x"), &incomplete, &mut rng),
            Err(ProcedureError::KeyDerivationUnavailable { missing: "secret" })
        );
        assert_eq!(
            decrypt_payload("AAAA", &incomplete),
            Err(ProcedureError::KeyDerivationUnavailable { missing: "secret" })
        );
    }
}
