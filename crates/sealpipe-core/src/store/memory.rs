use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use chrono::{DateTime, Utc};
use sealpipe_proto::PipelineDescriptor;

use super::{CacheKey, DescriptorCache, RouteStore, StoreError};
use crate::route::RouteRecord;

/// In-memory route store for tests, the CLI and embedding.
///
/// All state is wrapped in `Arc<Mutex<>>` so clones share routes. Uses
/// `lock().expect()`, which panics if the mutex is poisoned.
#[derive(Debug, Clone, Default)]
pub struct MemoryRouteStore {
    inner: Arc<Mutex<HashMap<String, RouteRecord>>>,
}

impl MemoryRouteStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Store holding `routes`, keyed by slug. Later duplicates win.
    pub fn with_routes(routes: impl IntoIterator<Item = RouteRecord>) -> Self {
        let store = Self::new();
        for route in routes {
            store.insert(route);
        }
        store
    }

    /// Insert or replace a route.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    pub fn insert(&self, route: RouteRecord) -> Option<RouteRecord> {
        let mut routes = self.inner.lock().expect("Mutex poisoned");
        routes.insert(route.id().to_string(), route)
    }

    /// Remove a route.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    pub fn remove(&self, route_id: &str) -> Option<RouteRecord> {
        self.inner.lock().expect("Mutex poisoned").remove(route_id)
    }

    /// Number of stored routes.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    pub fn len(&self) -> usize {
        self.inner.lock().expect("Mutex poisoned").len()
    }

    /// True if no routes are stored.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl RouteStore for MemoryRouteStore {
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    fn load_route(&self, route_id: &str) -> Result<Option<RouteRecord>, StoreError> {
        Ok(self.inner.lock().expect("Mutex poisoned").get(route_id).cloned())
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    fn route_ids(&self) -> Result<Vec<String>, StoreError> {
        let mut ids: Vec<String> = self.inner.lock().expect("Mutex poisoned").keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

/// In-memory descriptor cache.
///
/// Holds at most one entry per route. Storing a descriptor drops the
/// route's previous entry and every entry expired at the new descriptor's
/// issue time. Expired entries are also dropped when they are looked up or
/// by [`MemoryDescriptorCache::purge_expired`].
#[derive(Debug, Clone, Default)]
pub struct MemoryDescriptorCache {
    inner: Arc<Mutex<HashMap<CacheKey, PipelineDescriptor>>>,
}

impl MemoryDescriptorCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every entry expired at `now`. Returns how many were dropped.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    pub fn purge_expired(&self, now: DateTime<Utc>) -> usize {
        let mut entries = self.inner.lock().expect("Mutex poisoned");
        let before = entries.len();
        entries.retain(|_, descriptor| !descriptor.is_expired(now));
        before - entries.len()
    }

    /// Number of cached entries, expired or not.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    pub fn len(&self) -> usize {
        self.inner.lock().expect("Mutex poisoned").len()
    }

    /// True if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl DescriptorCache for MemoryDescriptorCache {
    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    fn get(&self, key: &CacheKey, now: DateTime<Utc>) -> Option<PipelineDescriptor> {
        let mut entries = self.inner.lock().expect("Mutex poisoned");
        match entries.get(key) {
            Some(descriptor) if !descriptor.is_expired(now) => Some(descriptor.clone()),
            Some(_) => {
                entries.remove(key);
                None
            },
            None => None,
        }
    }

    /// # Panics
    ///
    /// Panics if the internal mutex is poisoned.
    #[allow(clippy::expect_used)]
    fn put(&self, key: CacheKey, descriptor: PipelineDescriptor) {
        let mut entries = self.inner.lock().expect("Mutex poisoned");
        entries.retain(|existing, cached| {
            existing.route != key.route && !cached.is_expired(descriptor.issued_at)
        });
        entries.insert(key, descriptor);
    }
}
