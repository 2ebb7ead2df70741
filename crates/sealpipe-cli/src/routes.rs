//! Routes file loading.
//!
//! A routes file is a JSON array of route records. Every record is
//! validated before the store is built, so commands never see a route
//! they could not describe.

use std::{collections::HashSet, fs, path::Path};

use sealpipe_core::{MemoryRouteStore, ProcedureError, RouteRecord, RouteStore};

use crate::CliError;

/// Read, validate and index a routes file.
pub fn load_routes(path: &Path) -> Result<MemoryRouteStore, CliError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| CliError::Read { path: path.to_path_buf(), source })?;
    let routes: Vec<RouteRecord> = serde_json::from_str(&raw)
        .map_err(|source| CliError::Parse { path: path.to_path_buf(), source })?;

    let mut seen = HashSet::new();
    for route in &routes {
        route
            .config
            .validate()
            .map_err(|source| CliError::InvalidRoute { route: route.id().to_string(), source })?;
        if !seen.insert(route.id()) {
            return Err(CliError::DuplicateRoute(route.id().to_string()));
        }
    }

    tracing::debug!(count = routes.len(), path = %path.display(), "loaded routes");
    Ok(MemoryRouteStore::with_routes(routes))
}

/// Look up a route the command addresses directly.
pub fn find_route(store: &MemoryRouteStore, route_id: &str) -> Result<RouteRecord, CliError> {
    store
        .load_route(route_id)
        .map_err(ProcedureError::from)?
        .ok_or_else(|| ProcedureError::RouteNotFound { route: route_id.to_string() }.into())
}
