//! Route key pairs derived from route identity.
//!
//! A route never stores key material. Its identity snapshot is the only
//! input: [`derive_seed`] reduces the identity to a 32-byte seed and
//! [`derive_keypair`] expands the seed into an X25519 key pair.

mod derivation;

use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
pub use derivation::{
    KEY_SIZE, RouteKeyPair, SEED_SIZE, derive_keypair, derive_route_keypair, derive_seed,
    get_public_key,
};
use serde::{Deserialize, Serialize};

use crate::CryptoError;

/// Read-only snapshot of the route fields that feed key derivation.
///
/// Changing any field yields an unrelated key pair.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteIdentity {
    /// Route secret set by the route owner
    pub secret: String,
    /// Last modification time of the route record
    pub last_modified_at: DateTime<Utc>,
    /// Login of the route owner
    pub owner_login: String,
    /// Email of the route owner
    pub owner_email: String,
    /// Route slug, also used as the route id
    pub slug: String,
    /// Name of the encryption service the route uses
    pub algorithm_name: String,
}

impl RouteIdentity {
    /// Fail with [`CryptoError::KeyDerivationUnavailable`] unless secret,
    /// slug and algorithm name are all present.
    pub fn ensure_complete(&self) -> Result<(), CryptoError> {
        let required: [(&'static str, &str); 3] = [
            ("secret", &self.secret),
            ("slug", &self.slug),
            ("algorithmName", &self.algorithm_name),
        ];

        for (missing, value) in required {
            if value.is_empty() {
                return Err(CryptoError::KeyDerivationUnavailable { missing });
            }
        }

        Ok(())
    }

    /// Canonical text form of the last-modified timestamp.
    ///
    /// RFC 3339 with second precision and a `Z` suffix, e.g.
    /// `2024-01-01T00:00:00Z`.
    pub fn last_modified_rfc3339(&self) -> String {
        self.last_modified_at.to_rfc3339_opts(SecondsFormat::Secs, true)
    }
}

impl fmt::Debug for RouteIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteIdentity")
            .field("secret", &"<redacted>")
            .field("last_modified_at", &self.last_modified_at)
            .field("owner_login", &self.owner_login)
            .field("owner_email", &self.owner_email)
            .field("slug", &self.slug)
            .field("algorithm_name", &self.algorithm_name)
            .finish()
    }
}
