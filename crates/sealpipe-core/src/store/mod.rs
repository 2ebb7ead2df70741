//! Route storage and descriptor caching.
//!
//! Both collaborators are synchronous traits, shared between request
//! handlers by cloning. Implementations typically share internal state via
//! `Arc`, so clones see the same data.

mod error;
mod memory;

use std::fmt;

use chrono::{DateTime, Utc};
pub use error::StoreError;
pub use memory::{MemoryDescriptorCache, MemoryRouteStore};
use sealpipe_proto::PipelineDescriptor;

use crate::route::RouteRecord;

/// Source of route records.
pub trait RouteStore: Clone + Send + Sync + 'static {
    /// Load a route by id. `None` if it does not exist.
    fn load_route(&self, route_id: &str) -> Result<Option<RouteRecord>, StoreError>;

    /// Ids of all stored routes, sorted.
    fn route_ids(&self) -> Result<Vec<String>, StoreError>;
}

/// Cache identity of a built descriptor.
///
/// A route edit changes `last_modified` (and with it the key pair), and
/// each validity window has its own `expires`, so a key never outlives the
/// descriptor it names.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    /// Route id
    pub route: String,
    /// Route last-modified time
    pub last_modified: DateTime<Utc>,
    /// Expiry of the validity window
    pub expires: DateTime<Utc>,
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}/{}", self.route, self.last_modified.timestamp(), self.expires.timestamp())
    }
}

/// Optional store of built descriptors.
///
/// # Invariants
///
/// - `get` never returns a descriptor that is expired at `now`
/// - A hit is identical to the descriptor that was `put`
pub trait DescriptorCache: Clone + Send + Sync + 'static {
    /// Cached descriptor for `key`, if present and still valid at `now`.
    fn get(&self, key: &CacheKey, now: DateTime<Utc>) -> Option<PipelineDescriptor>;

    /// Store a descriptor.
    fn put(&self, key: CacheKey, descriptor: PipelineDescriptor);
}

/// Cache that never stores anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoCache;

impl DescriptorCache for NoCache {
    fn get(&self, _key: &CacheKey, _now: DateTime<Utc>) -> Option<PipelineDescriptor> {
        None
    }

    fn put(&self, _key: CacheKey, _descriptor: PipelineDescriptor) {}
}
