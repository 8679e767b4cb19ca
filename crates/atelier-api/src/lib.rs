//! REST API for the atelier generation router.
//!
//! Every route lives under `/api`. Handlers validate the request body,
//! translate it into a [`GenerationRequest`](atelier_router::GenerationRequest)
//! and hand it to the shared [`FallbackRouter`]. Failures are reported in a
//! uniform `{success: false, error: {...}}` envelope (see [`error::ApiError`]).

pub mod error;
pub mod handlers;

use std::sync::Arc;

use atelier_router::FallbackRouter;
use axum::Router;
use axum::http::{HeaderValue, Method, header};
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

/// Shared state accessible by all API handlers.
#[derive(Clone)]
pub struct AppState {
    /// Router that owns the registry, route tables and connection pool.
    pub router: Arc<FallbackRouter>,
}

impl AppState {
    pub fn new(router: FallbackRouter) -> Self {
        Self {
            router: Arc::new(router),
        }
    }
}

/// Build the API router with all routes.
///
/// With no configured origins every origin is echoed back, so browsers may
/// send credentials from any page. Otherwise only the listed origins are
/// allowed.
pub fn build_router(state: AppState, cors_origins: &[String]) -> Router {
    let origin = if cors_origins.is_empty() {
        AllowOrigin::mirror_request()
    } else {
        let origins: Vec<HeaderValue> = cors_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        AllowOrigin::list(origins)
    };
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_credentials(true)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION]);

    Router::new()
        .nest("/api", handlers::api_routes())
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
