//! Encryption services by algorithm name.

use std::fmt;

use chrono::{DateTime, Utc};
use sealpipe_crypto::RouteIdentity;
use sealpipe_proto::PipelineDescriptor;
use serde_json::Value;

use crate::{DescriptorBuilder, ProcedureError, Result, cipher, route::RouteRecord};

/// Algorithm name of the sealed-box service.
pub const SEALED_BOX_ALGORITHM: &str = "sealedbox-x25519xsalsa20poly1305";

/// Server side of one encryption algorithm.
pub trait RouteService: Send + Sync {
    /// Algorithm name routes refer to.
    fn algorithm(&self) -> &'static str;

    /// Descriptor for `route` as observed at `now`.
    fn describe(&self, route: &RouteRecord, now: DateTime<Utc>) -> Result<PipelineDescriptor>;

    /// Open a submitted ciphertext.
    fn decrypt(&self, ciphertext: &str, identity: &RouteIdentity) -> Result<Value>;
}

/// Anonymous sealed boxes over X25519 + XSalsa20-Poly1305.
#[derive(Debug, Clone, Copy, Default)]
pub struct SealedBoxService;

impl RouteService for SealedBoxService {
    fn algorithm(&self) -> &'static str {
        SEALED_BOX_ALGORITHM
    }

    fn describe(&self, route: &RouteRecord, now: DateTime<Utc>) -> Result<PipelineDescriptor> {
        DescriptorBuilder::new().build(route, now)
    }

    fn decrypt(&self, ciphertext: &str, identity: &RouteIdentity) -> Result<Value> {
        cipher::decrypt_payload(ciphertext, identity)
    }
}

static BUILTIN: [&dyn RouteService; 1] = [&SealedBoxService];

/// Read-only map from algorithm name to service.
#[derive(Clone, Copy)]
pub struct ServiceRegistry {
    services: &'static [&'static dyn RouteService],
}

impl ServiceRegistry {
    /// Registry of the built-in services.
    pub fn builtin() -> Self {
        Self { services: &BUILTIN }
    }

    /// Service for `algorithm`.
    pub fn get(&self, algorithm: &str) -> Result<&'static dyn RouteService> {
        self.services
            .iter()
            .copied()
            .find(|service| service.algorithm() == algorithm)
            .ok_or_else(|| ProcedureError::UnsupportedAlgorithm { name: algorithm.to_string() })
    }

    /// Registered algorithm names.
    pub fn algorithms(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.services.iter().map(|service| service.algorithm())
    }
}

impl Default for ServiceRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.algorithms()).finish()
    }
}
