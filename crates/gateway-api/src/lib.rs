//! HTTP surface (spec §6): request auth, blob storage, shared state, and
//! the route tree. Orchestration itself lives in `gateway-orchestration`.

pub mod auth;
pub mod blob;
pub mod routes;
pub mod state;
pub mod stream;

use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Builds the full route tree with the cross-cutting middleware every
/// handler gets: request tracing and a permissive CORS layer suitable for
/// a single-tenant-per-deployment API gateway.
pub fn build_app(state: AppState) -> Router {
    routes::router().layer(TraceLayer::new_for_http()).layer(CorsLayer::permissive()).with_state(state)
}
