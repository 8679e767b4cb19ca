//! The failure envelope returned by every handler.
//!
//! ```json
//! {
//!   "success": false,
//!   "error": { "code": "GENERATION_FAILED", "message": "...", "details": "...", "attempted": ["..."] },
//!   "availableModels": ["..."]
//! }
//! ```

use atelier_router::GenerationResult;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use serde_json::{Value, json};
use thiserror::Error;

/// Machine-readable error code carried in the envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidRequest,
    GenerationFailed,
    EditFailed,
    ChatFailed,
    InternalError,
}

impl ErrorCode {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorCode::InvalidRequest => "INVALID_REQUEST",
            ErrorCode::GenerationFailed => "GENERATION_FAILED",
            ErrorCode::EditFailed => "EDIT_FAILED",
            ErrorCode::ChatFailed => "CHAT_FAILED",
            ErrorCode::InternalError => "INTERNAL_ERROR",
        }
    }

    pub fn status(self) -> StatusCode {
        match self {
            ErrorCode::InvalidRequest => StatusCode::BAD_REQUEST,
            ErrorCode::GenerationFailed | ErrorCode::EditFailed | ErrorCode::ChatFailed => {
                StatusCode::SERVICE_UNAVAILABLE
            }
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An error response.
#[derive(Debug, Error)]
#[error("{code}: {message}")]
pub struct ApiError {
    code: ErrorCode,
    message: String,
    details: Option<String>,
    attempted: Vec<String>,
    available_models: Vec<String>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
            attempted: Vec::new(),
            available_models: Vec::new(),
        }
    }

    /// 400: the request is missing a required field or names an unknown value.
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    /// 500: the body could not be parsed or something unexpected happened.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    /// 503: every candidate backend failed. `details` carries the last
    /// backend error and `attempted` the backends tried, in order.
    pub fn unavailable(code: ErrorCode, message: impl Into<String>, result: &GenerationResult) -> Self {
        Self {
            details: result.error_message().map(str::to_string),
            attempted: result.attempted(),
            ..Self::new(code, message)
        }
    }

    pub fn with_available_models(mut self, models: Vec<String>) -> Self {
        self.available_models = models;
        self
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn details(&self) -> Option<&str> {
        self.details.as_deref()
    }

    fn body(&self) -> Value {
        let mut error = json!({
            "code": self.code,
            "message": self.message,
        });
        if let Some(details) = &self.details {
            error["details"] = json!(details);
        }
        if !self.attempted.is_empty() {
            error["attempted"] = json!(self.attempted);
        }
        let mut body = json!({ "success": false, "error": error });
        if !self.available_models.is_empty() {
            body["availableModels"] = json!(self.available_models);
        }
        body
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.code.status(), Json(self.body())).into_response()
    }
}
