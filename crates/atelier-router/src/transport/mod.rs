//! Network transports for each [`BackendKind`].
//!
//! [`HttpBackendClient`] is the production [`BackendClient`]. It dispatches on
//! the descriptor's kind to the Gradio, Hugging Face Inference, or Cloudflare
//! transport, and handles the passthrough kind locally.

pub mod cloudflare;
pub mod gradio;
pub mod hf_inference;
pub mod passthrough;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::backend::{BackendClient, send_whole};
use crate::config::RouterConfig;
use crate::error::{Result, RouterError};
use crate::pool::ConnectionHandle;
use crate::registry::{BackendDescriptor, BackendKind};
use crate::types::{Payload, RawResponse};

/// Talks to real backends over HTTP.
#[derive(Debug, Clone)]
pub struct HttpBackendClient {
    http: reqwest::Client,
    config: RouterConfig,
}

impl HttpBackendClient {
    pub fn new(config: RouterConfig) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
        }
    }

    /// Use an existing reqwest client (shared connection pool, custom TLS).
    pub fn with_http(config: RouterConfig, http: reqwest::Client) -> Self {
        Self { http, config }
    }

    pub fn config(&self) -> &RouterConfig {
        &self.config
    }
}

#[async_trait]
impl BackendClient for HttpBackendClient {
    async fn connect(&self, backend: &BackendDescriptor) -> Result<ConnectionHandle> {
        match backend.kind {
            BackendKind::GradioSpace => gradio::connect(&self.http, &self.config, backend).await,
            BackendKind::HfInference => Ok(hf_inference::connect(&self.config, backend)),
            BackendKind::CloudflareAi => cloudflare::connect(&self.config, backend),
            BackendKind::Passthrough => Ok(passthrough::connect(backend)),
        }
    }

    async fn invoke(
        &self,
        handle: &ConnectionHandle,
        backend: &BackendDescriptor,
        payload: &Payload,
    ) -> Result<RawResponse> {
        match backend.kind {
            BackendKind::GradioSpace => {
                gradio::predict(&self.http, &self.config, handle, backend, payload).await
            }
            BackendKind::HfInference => {
                hf_inference::run(&self.http, &self.config, handle, backend, payload).await
            }
            BackendKind::CloudflareAi => {
                cloudflare::run(&self.http, &self.config, handle, backend, payload).await
            }
            BackendKind::Passthrough => passthrough::echo(payload),
        }
    }

    async fn invoke_stream(
        &self,
        handle: &ConnectionHandle,
        backend: &BackendDescriptor,
        payload: &Payload,
        tx: mpsc::Sender<String>,
    ) -> Result<String> {
        match backend.kind {
            BackendKind::GradioSpace => {
                gradio::stream(&self.http, &self.config, handle, backend, payload, tx).await
            }
            BackendKind::CloudflareAi => {
                cloudflare::stream(&self.http, &self.config, handle, backend, payload, tx).await
            }
            BackendKind::HfInference | BackendKind::Passthrough => {
                let raw = self.invoke(handle, backend, payload).await?;
                send_whole(&raw, backend, &tx).await
            }
        }
    }
}

/// Build a [`RouterError::RequestFailed`] from a non-success response,
/// preferring the provider's own error message when the body carries one.
pub(crate) async fn status_error(response: reqwest::Response) -> RouterError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    let detail = extract_error_message(&body).unwrap_or(body);
    RouterError::RequestFailed(format!("HTTP {status}: {detail}"))
}

/// Extract a human-readable error message from a JSON error body.
///
/// Understands `{"error": "..."}`, `{"error": {"message": "..."}}` and
/// Cloudflare's `{"errors": [{"message": "..."}]}`.
pub(crate) fn extract_error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    if let Some(err) = value.get("error") {
        return err
            .get("message")
            .and_then(|m| m.as_str())
            .or_else(|| err.as_str())
            .map(String::from);
    }
    value
        .get("errors")
        .and_then(|e| e.as_array())
        .and_then(|e| e.first())
        .and_then(|e| e.get("message"))
        .and_then(|m| m.as_str())
        .map(String::from)
}

/// Attach `Authorization: Bearer` when a token is available.
pub(crate) fn with_bearer(req: reqwest::RequestBuilder, token: Option<&str>) -> reqwest::RequestBuilder {
    match token {
        Some(t) => req.header("Authorization", format!("Bearer {t}")),
        None => req,
    }
}
