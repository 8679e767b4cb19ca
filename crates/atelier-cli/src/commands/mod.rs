//! CLI command implementations for `atelier`.
//!
//! - [`serve`] -- HTTP API server.
//! - [`models`] -- Registry listing.
//! - [`probe`] -- Backend reachability check.

pub mod models;
pub mod probe;
pub mod serve;

use std::sync::Arc;

use atelier_router::{FallbackRouter, HttpBackendClient, RouterConfig};

/// Build a router backed by the HTTP transports.
pub fn http_router(config: &RouterConfig) -> FallbackRouter {
    let client = Arc::new(HttpBackendClient::new(config.clone()));
    FallbackRouter::new(client, config.clone())
}
