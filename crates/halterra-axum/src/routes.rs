//! Route definitions and router construction.
//!
//! `/api` routes sit behind the origin gate; each one carries its own quota
//! layer. `/health` is neither gated nor metered.

use std::sync::Arc;

use axum::Router;
use axum::middleware::from_fn_with_state;
use axum::routing::{MethodRouter, get, post};
use halterra_core::ResourceKey;
use tower_http::trace::TraceLayer;

use crate::allowlist::allowlist_gate;
use crate::bootstrap::AxumContext;
use crate::handlers;
use crate::quota::{QuotaGuard, enforce_quota};
use crate::state::AppState;

/// Health check endpoint.
async fn health_check() -> &'static str {
    "OK"
}

/// Attach the quota layer for `resource` to a method router.
///
/// `route_layer` runs only on a matched method, so a 405 never consumes
/// quota.
fn metered(
    state: &AppState,
    resource: ResourceKey,
    route: MethodRouter<AppState>,
) -> MethodRouter<AppState> {
    let guard = QuotaGuard {
        tracker: Arc::clone(&state.quotas),
        resource,
    };
    route.route_layer(from_fn_with_state(guard, enforce_quota))
}

/// Build the `/api` routes (without prefix, for nesting).
pub(crate) fn api_routes(state: &AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/meditation",
            metered(
                state,
                ResourceKey::generate_text(),
                post(handlers::meditation::generate),
            ),
        )
        .route(
            "/audio",
            metered(
                state,
                ResourceKey::synthesize_audio(),
                post(handlers::audio::synthesize),
            ),
        )
        .route(
            "/quote",
            metered(state, ResourceKey::quote(), get(handlers::quote::random)),
        )
        .layer(from_fn_with_state(state.allowlist.clone(), allowlist_gate))
}

/// Create the application router.
pub fn create_router(ctx: AxumContext) -> Router {
    let state: AppState = Arc::new(ctx);

    Router::new()
        .route("/health", get(health_check))
        .nest("/api", api_routes(&state))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
