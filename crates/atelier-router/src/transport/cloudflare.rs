//! Cloudflare Workers AI transport.
//!
//! `POST {cloudflare_api_url}/accounts/{account}/ai/run/{model}` with a
//! Bearer token. Image models return raw bytes; text models return
//! `{"success": true, "result": {"response": "..."}}`. With `"stream": true`
//! text models answer with SSE `data: {"response": "..."}` lines followed by
//! `data: [DONE]`.

use futures_util::StreamExt;
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use super::{extract_error_message, status_error};
use crate::config::RouterConfig;
use crate::error::{Result, RouterError};
use crate::pool::ConnectionHandle;
use crate::registry::{BackendDescriptor, BackendKind};
use crate::sse::{SseEvent, SseParser};
use crate::types::{Payload, RawResponse};

/// Resolve the account-scoped model URL.
///
/// # Errors
///
/// Returns [`RouterError::NotConfigured`] when the account id is not set.
pub fn connect(config: &RouterConfig, backend: &BackendDescriptor) -> Result<ConnectionHandle> {
    let account = RouterConfig::secret(&config.cloudflare_account_env).ok_or_else(|| {
        RouterError::NotConfigured(format!("set {} env var", config.cloudflare_account_env))
    })?;
    let base = config.cloudflare_api_url.trim_end_matches('/');
    Ok(ConnectionHandle::new(
        backend.endpoint.clone(),
        format!("{base}/accounts/{account}/ai/run/{}", backend.endpoint),
        BackendKind::CloudflareAi,
    ))
}

fn api_token(config: &RouterConfig) -> Result<String> {
    RouterConfig::secret(&config.cloudflare_token_env).ok_or_else(|| {
        RouterError::NotConfigured(format!("set {} env var", config.cloudflare_token_env))
    })
}

pub async fn run(
    http: &reqwest::Client,
    config: &RouterConfig,
    handle: &ConnectionHandle,
    backend: &BackendDescriptor,
    payload: &Payload,
) -> Result<RawResponse> {
    let token = api_token(config)?;
    debug!(backend = %backend.id, model = %backend.endpoint, "calling workers ai");

    let response = http
        .post(&handle.root_url)
        .header("Authorization", format!("Bearer {token}"))
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

    if !content_type.starts_with("application/json") {
        return Ok(RawResponse::Binary {
            bytes: bytes.to_vec(),
            content_type,
        });
    }

    let value: Value = serde_json::from_slice(&bytes)?;
    if value.get("success").and_then(Value::as_bool) == Some(false) {
        let body = String::from_utf8_lossy(&bytes);
        let message = extract_error_message(&body).unwrap_or_else(|| "request unsuccessful".into());
        return Err(RouterError::Remote(message));
    }
    Ok(RawResponse::Json(value))
}

/// Stream a chat completion, forwarding each `response` fragment on `tx`.
pub async fn stream(
    http: &reqwest::Client,
    config: &RouterConfig,
    handle: &ConnectionHandle,
    backend: &BackendDescriptor,
    payload: &Payload,
    tx: mpsc::Sender<String>,
) -> Result<String> {
    let token = api_token(config)?;
    debug!(backend = %backend.id, model = %backend.endpoint, "streaming from workers ai");

    let mut body = payload.clone();
    body.insert("stream".into(), Value::Bool(true));

    let response = http
        .post(&handle.root_url)
        .header("Authorization", format!("Bearer {token}"))
        .header("Accept", "text/event-stream")
        .json(&body)
        .send()
        .await?;

    if !response.status().is_success() {
        return Err(status_error(response).await);
    }

    let mut parser = SseParser::new();
    let mut full = String::new();
    let mut byte_stream = response.bytes_stream();

    // A last event without its trailing blank line only surfaces from
    // `finish()`.
    let mut pending: Vec<SseEvent> = Vec::new();
    let mut ended = false;
    'read: while !ended {
        match byte_stream.next().await {
            Some(chunk) => {
                let bytes = chunk
                    .map_err(|e| RouterError::RequestFailed(format!("stream read error: {e}")))?;
                pending.extend(parser.feed(&bytes));
            }
            None => {
                pending.extend(parser.finish());
                ended = true;
            }
        }

        for event in pending.drain(..) {
            if event.is_done() {
                break 'read;
            }
            let Some(fragment) = response_fragment(&event, backend) else {
                continue;
            };
            trace!(backend = %backend.id, chunk = %fragment, "streaming chunk");
            full.push_str(&fragment);
            if tx.send(fragment).await.is_err() {
                debug!(backend = %backend.id, "stream receiver dropped, stopping");
                return Err(RouterError::Cancelled);
            }
        }
    }

    if full.is_empty() {
        return Err(RouterError::EmptyResponse(backend.id.clone()));
    }
    Ok(full)
}

/// The non-empty `response` text of one streamed event.
fn response_fragment(event: &SseEvent, backend: &BackendDescriptor) -> Option<String> {
    match serde_json::from_str::<Value>(&event.data) {
        Ok(v) => v
            .get("response")
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
            .map(str::to_string),
        Err(e) => {
            warn!(backend = %backend.id, error = %e, "SSE parse error, skipping event");
            None
        }
    }
}
