//! Hugging Face Inference API transport.
//!
//! `POST {hf_inference_url}/{model}` with a JSON body. Text-to-image models
//! answer with raw image bytes; errors (including "model is loading") come
//! back as JSON.

use tracing::debug;

use super::{status_error, with_bearer};
use crate::config::RouterConfig;
use crate::error::{Result, RouterError};
use crate::pool::ConnectionHandle;
use crate::registry::{BackendDescriptor, BackendKind};
use crate::types::{Payload, RawResponse};

/// The Inference API needs no handshake; the handle just records the URL.
pub fn connect(config: &RouterConfig, backend: &BackendDescriptor) -> ConnectionHandle {
    let base = config.hf_inference_url.trim_end_matches('/');
    ConnectionHandle::new(
        backend.endpoint.clone(),
        format!("{base}/{}", backend.endpoint),
        BackendKind::HfInference,
    )
}

pub async fn run(
    http: &reqwest::Client,
    config: &RouterConfig,
    handle: &ConnectionHandle,
    backend: &BackendDescriptor,
    payload: &Payload,
) -> Result<RawResponse> {
    debug!(backend = %backend.id, url = %handle.root_url, "calling inference api");

    let token = RouterConfig::secret(&config.hf_token_env);
    let response = with_bearer(http.post(&handle.root_url), token.as_deref())
        .json(payload)
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(status_error(response).await);
    }

    let content_type = response
        .headers()
        .get(reqwest::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    let bytes = response.bytes().await?;

    if content_type.starts_with("application/json") {
        let value: serde_json::Value = serde_json::from_slice(&bytes)?;
        if let Some(err) = value.get("error").and_then(|e| e.as_str()) {
            return Err(RouterError::Remote(err.to_string()));
        }
        return Ok(RawResponse::Json(value));
    }

    Ok(RawResponse::Binary {
        bytes: bytes.to_vec(),
        content_type,
    })
}
