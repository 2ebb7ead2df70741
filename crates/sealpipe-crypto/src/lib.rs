//! Sealpipe Cryptographic Primitives
//!
//! Cryptographic building blocks for sealpipe routes. Pure functions with
//! deterministic outputs. Callers provide random number generators so tests
//! can run with seeded randomness.
//!
//! # Key Lifecycle
//!
//! Every route owns an X25519 key pair that is never stored anywhere. It is
//! recomputed from the route's identity fields whenever it is needed:
//!
//! ```text
//! RouteIdentity (secret, last modified, owner, slug, algorithm)
//!        │
//!        ▼
//! HKDF-SHA256 → 32-byte seed
//!        │
//!        ▼
//! SHA-512(seed)[..32] → X25519 secret key → public key
//!        │
//!        ▼
//! Sealed box (ephemeral X25519 + XSalsa20-Poly1305)
//! ```
//!
//! Changing any identity field (including the last-modified timestamp)
//! produces an unrelated key pair, so editing a route implicitly rotates its
//! keys.
//!
//! # Security
//!
//! Anonymity:
//! - Each sealed box uses a fresh ephemeral sender key pair that is dropped
//!   immediately after encryption
//! - Only the recipient key pair can open a sealed box; the sender cannot
//!
//! Authenticity:
//! - Poly1305 tag covers the whole ciphertext
//! - Failed authentication tag -> reject message, never partial plaintext
//!
//! Key hygiene:
//! - Seeds are zeroized on drop
//! - Secret keys zeroize on drop and are never serialized

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod error;
pub mod route_keys;
pub mod sealed_box;

pub use crypto_box::PublicKey;
pub use error::CryptoError;
pub use route_keys::{
    KEY_SIZE, RouteIdentity, RouteKeyPair, SEED_SIZE, derive_keypair, derive_route_keypair,
    derive_seed, get_public_key,
};
pub use sealed_box::{SEAL_OVERHEAD, open, public_key_from_bytes, seal};
