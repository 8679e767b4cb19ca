//! HTTP request handlers for the REST API.

pub mod chat;
pub mod edit;
pub mod generate;
pub mod session;
pub mod system;

use axum::Router;
use axum::body::Bytes;
use axum::routing::{get, post};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::AppState;
use crate::error::ApiError;

/// Build all API routes.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        // Generation
        .route(
            "/generate/image",
            post(generate::generate_image).get(generate::image_models),
        )
        .route(
            "/generate/video",
            post(generate::generate_video).get(generate::video_models),
        )
        // Chat
        .route("/chat", post(chat::chat).get(chat::chat_models))
        // Editing
        .route("/edit/image", post(edit::edit_image))
        .route("/edit/video", post(edit::edit_video))
        // Sessions
        .route("/session", get(session::create_session).post(session::create_session))
        // Registry and diagnostics
        .route("/models", get(system::list_models))
        .route("/spaces/{id}/status", get(system::space_status))
        .route("/health", get(system::health_check))
}

/// Parse a JSON request body. A body that is not valid JSON for `T` is an
/// internal error carrying the parser message.
pub(crate) fn parse_body<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    serde_json::from_slice(body).map_err(|e| {
        tracing::debug!(error = %e, "malformed request body");
        ApiError::internal(e.to_string())
    })
}

/// Return the value of a required string field, rejecting absent or empty
/// values with `"{label} is required"`.
pub(crate) fn required(value: Option<String>, label: &str) -> Result<String, ApiError> {
    value
        .filter(|v| !v.is_empty())
        .ok_or_else(|| ApiError::invalid_request(format!("{label} is required")))
}

/// Milliseconds since the Unix epoch.
pub(crate) fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Drop `null` members from a JSON object so absent optional fields are
/// omitted rather than sent as `null`.
pub(crate) fn strip_nulls(mut value: Value) -> Value {
    if let Value::Object(map) = &mut value {
        map.retain(|_, v| !v.is_null());
    }
    value
}

/// Provider label of the backend that served a request.
pub(crate) fn provider_of(state: &AppState, backend_id: &str) -> &'static str {
    state
        .router
        .registry()
        .lookup(backend_id)
        .map(|b| b.kind.provider_label())
        .unwrap_or("unknown")
}
