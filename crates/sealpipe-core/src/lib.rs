//! Sealpipe Core
//!
//! Procedural values: a server publishes, per route, a descriptor that tells
//! a remote client how to encrypt a message so that only the server can read
//! it. The descriptor is pure data. It names operations from a closed
//! whitelist and arranges them around an anonymous sealed box:
//!
//! ```text
//! RouteRecord ──DescriptorBuilder──▶ PipelineDescriptor ──(client)──▶ PipelineEvaluator
//!      │                                                                   │
//!      │                                                   {param: ciphertext}
//!      ▼                                                                   ▼
//! RouteIdentity ───────────────── decrypt_payload ◀──────────── open_submission
//!                                        │
//!                                  TypeValidator ──▶ PayloadHandler
//! ```
//!
//! # Components
//!
//! - [`WhitelistRegistry`]: the only mapping from operation names to code
//! - [`DescriptorBuilder`]: per-route descriptors with anchored validity
//!   windows
//! - [`PipelineEvaluator`]: validates a descriptor completely, then runs it
//! - [`encrypt_payload`] / [`decrypt_payload`]: the direct cipher a pipeline
//!   reproduces
//! - [`TypeValidator`]: declared-format checks on decrypted payloads
//! - [`Gateway`]: store, cache and environment glue with opaque rejections
//!
//! # Invariants
//!
//! - An operation outside the whitelist is never executed
//! - A rejected descriptor produces no output and consumes no randomness
//! - Route secret keys are recomputed per use and never stored or logged

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod builder;
pub mod cipher;
pub mod codec;
pub mod datum;
pub mod env;
pub mod error;
pub mod evaluator;
pub mod gateway;
pub mod registry;
pub mod route;
pub mod service;
pub mod store;
pub mod submission;
pub mod validator;

pub use builder::{DescriptorBuilder, ValidityWindow, channel_for};
pub use cipher::{decrypt_payload, encrypt_payload};
pub use datum::Datum;
pub use env::{Environment, SeededEnv, SystemEnv};
pub use error::{ProcedureError, Rejection, Result};
pub use evaluator::{CompiledPipeline, PipelineEvaluator, PipelineOutput};
pub use gateway::Gateway;
pub use registry::{Operation, REGISTRY_VERSION, SEAL_FUNCTION, WhitelistRegistry};
pub use route::{DEFAULT_MESSAGE_PARAM, DEFAULT_TTL_SECS, IssuanceMode, RouteConfig, RouteRecord};
pub use service::{RouteService, SEALED_BOX_ALGORITHM, SealedBoxService, ServiceRegistry};
pub use store::{
    CacheKey, DescriptorCache, MemoryDescriptorCache, MemoryRouteStore, NoCache, RouteStore,
    StoreError,
};
pub use submission::{AcceptedPayload, PayloadHandler, open_submission};
pub use validator::TypeValidator;
