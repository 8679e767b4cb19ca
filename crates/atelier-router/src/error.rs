//! Router error types for atelier-router.
//!
//! Every backend operation returns [`Result<T>`], which uses [`RouterError`]
//! as the error type. The fallback router treats every variant the same way:
//! record it, invalidate the backend's connection, and move on.

use thiserror::Error;

/// Errors that can occur while talking to a generation backend.
#[derive(Error, Debug)]
pub enum RouterError {
    /// The HTTP request to the backend failed or returned a non-success status.
    #[error("request failed: {0}")]
    RequestFailed(String),

    /// The backend needs credentials or settings that are not present
    /// (e.g. a missing Cloudflare account id).
    #[error("backend not configured: {0}")]
    NotConfigured(String),

    /// No backend with this id exists in the registry.
    #[error("unknown backend: {0}")]
    UnknownBackend(String),

    /// The backend answered, but the body could not be interpreted.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    /// The backend answered with nothing usable for the requested modality.
    #[error("empty response from {0}")]
    EmptyResponse(String),

    /// The remote application reported an error (e.g. a Gradio `error` event).
    #[error("remote error: {0}")]
    Remote(String),

    /// The call exceeded its per-call deadline.
    #[error("timeout after {0}s")]
    Timeout(u64),

    /// The caller cancelled the request (streaming only).
    #[error("cancelled")]
    Cancelled,

    /// An HTTP-level error from reqwest.
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// A JSON serialization/deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A convenience type alias for router operations.
pub type Result<T> = std::result::Result<T, RouterError>;
