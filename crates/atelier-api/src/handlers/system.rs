//! Registry listing, backend probes and health.

use axum::Json;
use axum::extract::{Path, Query, State};
use serde::Deserialize;
use serde_json::{Value, json};

use atelier_router::{Category, ProbeReport, RouterError};

use crate::AppState;
use crate::error::ApiError;

#[derive(Debug, Deserialize)]
pub struct ModelsQuery {
    category: Option<String>,
}

/// List registered backends, optionally filtered by `?category=`.
pub async fn list_models(
    State(state): State<AppState>,
    Query(query): Query<ModelsQuery>,
) -> Result<Json<Value>, ApiError> {
    let registry = state.router.registry();
    let models: Vec<_> = match query.category.as_deref() {
        None => registry.all().iter().map(|b| b.summary()).collect(),
        Some(raw) => {
            let category = Category::parse(raw)
                .ok_or_else(|| ApiError::invalid_request(format!("Unknown category: {raw}")))?;
            registry
                .by_category(category)
                .into_iter()
                .map(|b| b.summary())
                .collect()
        }
    };
    Ok(Json(json!({ "success": true, "data": { "models": models } })))
}

/// Open a fresh connection to one backend and report its availability.
pub async fn space_status(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ProbeReport>, ApiError> {
    match state.router.probe(&id).await {
        Ok(report) => Ok(Json(report)),
        Err(RouterError::UnknownBackend(id)) => {
            Err(ApiError::invalid_request(format!("Unknown backend: {id}")))
        }
        Err(e) => Err(ApiError::internal(e.to_string())),
    }
}

/// Server start time, set once at process start.
static START_TIME: std::sync::OnceLock<std::time::Instant> = std::sync::OnceLock::new();

/// Marks the server start for [`health_check`] uptime.
pub fn mark_started() {
    START_TIME.get_or_init(std::time::Instant::now);
}

/// Returns basic health status, version, and uptime.
pub async fn health_check() -> Json<Value> {
    let start = START_TIME.get_or_init(std::time::Instant::now);
    let uptime_secs = start.elapsed().as_secs();
    Json(json!({
        "status": "ok",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_secs": uptime_secs
    }))
}
