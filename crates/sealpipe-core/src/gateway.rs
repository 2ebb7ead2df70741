//! Request-facing entry points.
//!
//! The gateway ties a [`RouteStore`], a [`DescriptorCache`] and an
//! [`Environment`] together and serves the two client requests: fetching a
//! route's descriptor and submitting an encrypted payload.
//!
//! # Security
//!
//! Every failure is logged with full detail and returned as a bare
//! [`Rejection`]. A client learns only whether the route exists, whether it
//! is usable, and that its request was rejected. It never learns which check
//! failed.

use chrono::{DateTime, Utc};
use sealpipe_proto::PipelineDescriptor;
use serde_json::{Map, Value};
use tracing::{debug, info, warn};

use crate::{
    Environment, ProcedureError, Rejection,
    builder::ValidityWindow,
    route::{IssuanceMode, RouteRecord},
    service::{RouteService, ServiceRegistry},
    store::{CacheKey, DescriptorCache, RouteStore},
    submission::{PayloadHandler, open_submission},
};

/// Descriptor and submission front end.
#[derive(Debug, Clone)]
pub struct Gateway<S, C, E> {
    store: S,
    cache: C,
    env: E,
    services: ServiceRegistry,
}

impl<S, C, E> Gateway<S, C, E>
where
    S: RouteStore,
    C: DescriptorCache,
    E: Environment,
{
    /// Gateway over the built-in services.
    pub fn new(store: S, cache: C, env: E) -> Self {
        Self { store, cache, env, services: ServiceRegistry::builtin() }
    }

    /// The route store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Current descriptor of `route_id`.
    ///
    /// Window-aligned routes are served from the cache while the current
    /// validity window lasts. Instant routes are built per request.
    pub fn descriptor(&self, route_id: &str) -> Result<PipelineDescriptor, Rejection> {
        self.try_descriptor(route_id).map_err(|err| reject("descriptor", route_id, &err))
    }

    /// Open a submission for `route_id` and pass it to `handler`.
    ///
    /// Handler failures are reported as [`Rejection::Unavailable`].
    pub fn submit<H: PayloadHandler>(
        &self,
        route_id: &str,
        params: &Map<String, Value>,
        handler: &H,
    ) -> Result<H::Output, Rejection> {
        let accepted = self
            .load(route_id)
            .and_then(|route| open_submission(&route, &self.services, params))
            .map_err(|err| reject("submission", route_id, &err))?;

        debug!(route = route_id, "accepted submission");
        handler.handle(accepted).map_err(|err| {
            warn!(route = route_id, error = %err, "payload handler failed");
            Rejection::Unavailable
        })
    }

    fn try_descriptor(&self, route_id: &str) -> Result<PipelineDescriptor, ProcedureError> {
        let route = self.load(route_id)?;
        let now = self.env.now();
        let service = self.services.get(&route.identity.algorithm_name)?;

        // Instant descriptors carry the request second, so no stored build
        // equals a fresh one.
        if route.config.issuance == IssuanceMode::Instant {
            return self.issue(service, &route, now);
        }

        let window = ValidityWindow::containing(&route, now)?;
        let key = CacheKey {
            route: route.id().to_string(),
            last_modified: route.identity.last_modified_at,
            expires: window.expires,
        };
        if let Some(cached) = self.cache.get(&key, now) {
            debug!(key = %key, "descriptor cache hit");
            return Ok(cached);
        }

        let descriptor = self.issue(service, &route, now)?;
        self.cache.put(key, descriptor.clone());
        Ok(descriptor)
    }

    fn issue(
        &self,
        service: &dyn RouteService,
        route: &RouteRecord,
        now: DateTime<Utc>,
    ) -> Result<PipelineDescriptor, ProcedureError> {
        let descriptor = service.describe(route, now)?;
        info!(
            route = route.id(),
            issued = descriptor.issued_at.timestamp(),
            expires = descriptor.expires_at.timestamp(),
            "issued descriptor"
        );
        Ok(descriptor)
    }

    fn load(&self, route_id: &str) -> Result<RouteRecord, ProcedureError> {
        self.store
            .load_route(route_id)?
            .ok_or_else(|| ProcedureError::RouteNotFound { route: route_id.to_string() })
    }
}

fn reject(request: &'static str, route_id: &str, err: &ProcedureError) -> Rejection {
    let rejection = Rejection::from(err);
    debug!(request, route = route_id, error = %err, rejection = %rejection, "request rejected");
    rejection
}
