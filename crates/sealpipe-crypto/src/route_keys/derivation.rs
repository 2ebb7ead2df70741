//! Key derivation for route key pairs using HKDF

use std::fmt;

use crypto_box::{PublicKey, SecretKey};
use hkdf::Hkdf;
use sha2::{Digest, Sha256, Sha512};
use zeroize::Zeroizing;

use super::RouteIdentity;
use crate::CryptoError;

/// Label used for route seed derivation
const ROUTE_KEY_LABEL: &[u8] = b"sealpipeRouteV1";

/// Size of a derived route seed (32 bytes)
pub const SEED_SIZE: usize = 32;

/// Size of X25519 public and secret keys (32 bytes)
pub const KEY_SIZE: usize = 32;

/// X25519 key pair owned by a single route.
///
/// Never persisted. The secret half zeroizes itself on drop, so a key pair
/// derived for one decrypt call leaves nothing behind once the call returns.
pub struct RouteKeyPair {
    secret: SecretKey,
    public: PublicKey,
}

impl RouteKeyPair {
    /// Public half of the key pair.
    pub fn public_key(&self) -> &PublicKey {
        &self.public
    }

    /// Public key bytes.
    pub fn public_bytes(&self) -> [u8; KEY_SIZE] {
        *self.public.as_bytes()
    }

    pub(crate) fn secret_key(&self) -> &SecretKey {
        &self.secret
    }
}

impl fmt::Debug for RouteKeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteKeyPair")
            .field("public", &self.public)
            .field("secret", &"<redacted>")
            .finish()
    }
}

/// Derive the 32-byte key seed of a route.
///
/// The secret is the HKDF input key material. The remaining identity fields
/// are bound through the HKDF info parameter, each prefixed with its length
/// so that no two distinct identities share an encoding.
///
/// # Security
///
/// - Deterministic: same identity always produces the same seed
/// - Any identity change (including `last_modified_at`) changes the seed
/// - Entropy is bounded by the route secret, which is human-chosen
///
/// # Errors
///
/// - `KeyDerivationUnavailable`: secret, slug or algorithm name is empty
pub fn derive_seed(identity: &RouteIdentity) -> Result<Zeroizing<[u8; SEED_SIZE]>, CryptoError> {
    identity.ensure_complete()?;

    let hkdf = Hkdf::<Sha256>::new(None, identity.secret.as_bytes());

    let last_modified = identity.last_modified_rfc3339();
    let fields: [&[u8]; 5] = [
        last_modified.as_bytes(),
        identity.owner_login.as_bytes(),
        identity.owner_email.as_bytes(),
        identity.slug.as_bytes(),
        identity.algorithm_name.as_bytes(),
    ];

    // Build the info parameter: label || (len || field)*
    let capacity = ROUTE_KEY_LABEL.len() + fields.iter().map(|field| 4 + field.len()).sum::<usize>();
    let mut info = Vec::with_capacity(capacity);
    info.extend_from_slice(ROUTE_KEY_LABEL);
    for field in fields {
        info.extend_from_slice(&(field.len() as u32).to_be_bytes());
        info.extend_from_slice(field);
    }

    let mut seed = Zeroizing::new([0u8; SEED_SIZE]);
    let Ok(()) = hkdf.expand(&info, &mut seed[..]) else {
        unreachable!("32 bytes is a valid HKDF-SHA256 output length");
    };

    Ok(seed)
}

/// Expand a seed into an X25519 key pair.
///
/// Matches libsodium's `crypto_box_seed_keypair`: the secret key is the
/// first 32 bytes of SHA-512(seed). No randomness is involved.
pub fn derive_keypair(seed: &[u8; SEED_SIZE]) -> RouteKeyPair {
    let digest = Sha512::digest(seed);

    let mut secret_bytes = Zeroizing::new([0u8; KEY_SIZE]);
    secret_bytes.copy_from_slice(&digest[..KEY_SIZE]);

    let secret = SecretKey::from(*secret_bytes);
    let public = secret.public_key();

    RouteKeyPair { secret, public }
}

/// Derive the full key pair of a route.
pub fn derive_route_keypair(identity: &RouteIdentity) -> Result<RouteKeyPair, CryptoError> {
    let seed = derive_seed(identity)?;
    Ok(derive_keypair(&seed))
}

/// Public key of a route.
///
/// # Errors
///
/// - `KeyDerivationUnavailable`: identity is incomplete
pub fn get_public_key(identity: &RouteIdentity) -> Result<PublicKey, CryptoError> {
    let keypair = derive_route_keypair(identity)?;
    Ok(keypair.public.clone())
}
