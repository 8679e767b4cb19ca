//! Gradio Space transport over the Gradio REST queue protocol.
//!
//! Connecting resolves the Space's host through the Hub
//! (`GET {hub}/api/spaces/{owner}/{name}/host`), reads `api_prefix` from
//! `{root}/config` (Gradio 5 serves its REST routes under `/gradio_api`,
//! Gradio 4 under the root), and then reads `{root}{prefix}/info` to learn
//! the parameter order of each named endpoint. A call is two requests:
//!
//! ```text
//! POST {root}{prefix}/call/{api}            {"data": [...]}   -> {"event_id": "..."}
//! GET  {root}{prefix}/call/{api}/{event_id}                   -> SSE stream
//! ```
//!
//! The SSE stream carries `generating` events with partial outputs, then a
//! `complete` event with the final output array, or an `error` event.

use std::collections::HashMap;

use futures_util::StreamExt;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use super::{status_error, with_bearer};
use crate::config::RouterConfig;
use crate::error::{Result, RouterError};
use crate::normalize::normalize;
use crate::pool::ConnectionHandle;
use crate::registry::{BackendDescriptor, BackendKind};
use crate::sse::{SseEvent, SseParser};
use crate::types::{Modality, NormalizedPayload, Payload, RawResponse};

const DEFAULT_API_PATH: &str = "/predict";

#[derive(Debug, Deserialize)]
struct SpaceHost {
    host: String,
}

#[derive(Debug, Deserialize)]
struct EventId {
    event_id: String,
}

#[derive(Debug, Default, Deserialize)]
struct AppConfig {
    #[serde(default)]
    api_prefix: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct ApiInfo {
    #[serde(default)]
    named_endpoints: HashMap<String, EndpointInfo>,
}

#[derive(Debug, Default, Deserialize)]
struct EndpointInfo {
    #[serde(default)]
    parameters: Vec<ParameterInfo>,
}

#[derive(Debug, Deserialize)]
struct ParameterInfo {
    parameter_name: Option<String>,
    label: Option<String>,
}

/// Resolve the Space's host and learn its endpoint signatures.
///
/// # Errors
///
/// Fails when the Hub does not know the Space or returns no host. A
/// missing `/config` means no route prefix. A missing or unreadable `/info`
/// is tolerated; payload values are then sent in insertion order.
pub async fn connect(
    http: &reqwest::Client,
    config: &RouterConfig,
    backend: &BackendDescriptor,
) -> Result<ConnectionHandle> {
    let token = RouterConfig::secret(&config.hf_token_env);
    let hub = config.hub_url.trim_end_matches('/');
    let url = format!("{hub}/api/spaces/{}/host", backend.endpoint);

    debug!(backend = %backend.id, space = %backend.endpoint, "resolving space host");
    let response = with_bearer(http.get(&url), token.as_deref()).send().await?;
    if !response.status().is_success() {
        return Err(status_error(response).await);
    }
    let host: SpaceHost = response
        .json()
        .await
        .map_err(|e| RouterError::InvalidResponse(format!("failed to parse space host: {e}")))?;
    let root = host.host.trim_end_matches('/').to_string();
    if root.is_empty() {
        return Err(RouterError::InvalidResponse(format!(
            "space {} has no host",
            backend.endpoint
        )));
    }

    let config_url = format!("{root}/config");
    let prefix = match fetch_json::<AppConfig>(http, &config_url, token.as_deref()).await {
        Ok(app) => app.api_prefix.unwrap_or_default(),
        Err(e) => {
            debug!(backend = %backend.id, error = %e, "space config unavailable, assuming no api prefix");
            String::new()
        }
    };
    let handle = ConnectionHandle::new(backend.endpoint.clone(), root, BackendKind::GradioSpace)
        .with_api_prefix(&prefix);

    let named = match fetch_json::<ApiInfo>(http, &handle.api_url("/info"), token.as_deref()).await {
        Ok(info) => parameter_orders(info),
        Err(e) => {
            debug!(backend = %backend.id, error = %e, "space info unavailable, using payload order");
            HashMap::new()
        }
    };

    Ok(handle.with_named_endpoints(named))
}

async fn fetch_json<T: DeserializeOwned>(
    http: &reqwest::Client,
    url: &str,
    token: Option<&str>,
) -> Result<T> {
    let response = with_bearer(http.get(url), token).send().await?;
    if !response.status().is_success() {
        return Err(status_error(response).await);
    }
    Ok(response.json().await?)
}

fn parameter_orders(info: ApiInfo) -> HashMap<String, Vec<String>> {
    info.named_endpoints
        .into_iter()
        .map(|(path, endpoint)| {
            let names = endpoint
                .parameters
                .into_iter()
                .map(|p| p.parameter_name.or(p.label).unwrap_or_default())
                .collect();
            (path, names)
        })
        .collect()
}

/// Arrange payload values into the positional `data` array.
///
/// With a known signature, values follow the parameter order and missing
/// names are sent as `null`. Otherwise values keep payload order.
pub fn positional_args(handle: &ConnectionHandle, api_path: &str, payload: &Payload) -> Vec<Value> {
    match handle.parameter_order(api_path) {
        Some(names) if !names.is_empty() => names
            .iter()
            .map(|n| payload.get(n).cloned().unwrap_or(Value::Null))
            .collect(),
        _ => payload.values().cloned().collect(),
    }
}

/// Submit a call and open its result stream.
async fn open_call(
    http: &reqwest::Client,
    config: &RouterConfig,
    handle: &ConnectionHandle,
    backend: &BackendDescriptor,
    payload: &Payload,
) -> Result<reqwest::Response> {
    let token = RouterConfig::secret(&config.hf_token_env);
    let api_path = backend.api_path_or(DEFAULT_API_PATH);
    let call_url = handle.api_url(&format!("/call{api_path}"));
    let data = positional_args(handle, api_path, payload);

    debug!(backend = %backend.id, url = %call_url, args = data.len(), "submitting gradio call");
    let response = with_bearer(http.post(&call_url), token.as_deref())
        .json(&json!({ "data": data }))
        .send()
        .await?;
    if !response.status().is_success() {
        return Err(status_error(response).await);
    }
    let EventId { event_id } = response
        .json()
        .await
        .map_err(|e| RouterError::InvalidResponse(format!("failed to parse event id: {e}")))?;

    let response = with_bearer(http.get(format!("{call_url}/{event_id}")), token.as_deref())
        .header("Accept", "text/event-stream")
        .send()
        .await?;
    if !response.status().is_success() {
        return Err(status_error(response).await);
    }
    Ok(response)
}

fn parse_data(event: &SseEvent) -> Result<Value> {
    serde_json::from_str(&event.data)
        .map_err(|e| RouterError::InvalidResponse(format!("bad {} event: {e}", event.name())))
}

fn remote_error(event: &SseEvent) -> RouterError {
    let data = event.data.trim();
    let message = match serde_json::from_str::<Value>(data) {
        Ok(Value::String(s)) => s,
        Ok(Value::Null) => "space reported an error".to_string(),
        Ok(other) => other.to_string(),
        Err(_) if data.is_empty() => "space reported an error".to_string(),
        Err(_) => data.to_string(),
    };
    RouterError::Remote(message)
}

/// Run a call to completion and return the final output array.
pub async fn predict(
    http: &reqwest::Client,
    config: &RouterConfig,
    handle: &ConnectionHandle,
    backend: &BackendDescriptor,
    payload: &Payload,
) -> Result<RawResponse> {
    let response = open_call(http, config, handle, backend, payload).await?;
    let mut parser = SseParser::new();
    let mut byte_stream = response.bytes_stream();

    while let Some(chunk) = byte_stream.next().await {
        let bytes =
            chunk.map_err(|e| RouterError::RequestFailed(format!("stream read error: {e}")))?;
        for event in parser.feed(&bytes) {
            match event.name() {
                "complete" => return Ok(RawResponse::Json(parse_data(&event)?)),
                "error" => return Err(remote_error(&event)),
                other => trace!(backend = %backend.id, event = other, "gradio event"),
            }
        }
    }
    match parser.finish() {
        Some(event) if event.name() == "complete" => Ok(RawResponse::Json(parse_data(&event)?)),
        Some(event) if event.name() == "error" => Err(remote_error(&event)),
        _ => Err(RouterError::InvalidResponse(
            "event stream ended without a result".into(),
        )),
    }
}

/// Text of a chat output array.
fn chat_text(value: Value, backend: &BackendDescriptor) -> String {
    match normalize(&RawResponse::Json(value), backend, Modality::Chat) {
        NormalizedPayload::Text { response, .. } => response,
        NormalizedPayload::Media { .. } => String::new(),
    }
}

/// Stream a chat call. Gradio reports the cumulative reply on each
/// `generating` event; only the new suffix is sent on `tx`.
pub async fn stream(
    http: &reqwest::Client,
    config: &RouterConfig,
    handle: &ConnectionHandle,
    backend: &BackendDescriptor,
    payload: &Payload,
    tx: mpsc::Sender<String>,
) -> Result<String> {
    let response = open_call(http, config, handle, backend, payload).await?;
    let mut parser = SseParser::new();
    let mut byte_stream = response.bytes_stream();
    let mut sent = String::new();

    let mut pending: Vec<SseEvent> = Vec::new();
    let mut ended = false;
    while !ended {
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
            let is_complete = match event.name() {
                "generating" => false,
                "complete" => true,
                "error" => return Err(remote_error(&event)),
                _ => continue,
            };
            let text = chat_text(parse_data(&event)?, backend);
            if let Some(delta) = text.strip_prefix(sent.as_str())
                && !delta.is_empty()
            {
                let delta = delta.to_string();
                sent = text.clone();
                if tx.send(delta).await.is_err() {
                    debug!(backend = %backend.id, "stream receiver dropped, stopping");
                    return Err(RouterError::Cancelled);
                }
            }
            if is_complete {
                if text.is_empty() && sent.is_empty() {
                    return Err(RouterError::EmptyResponse(backend.id.clone()));
                }
                return Ok(if text.is_empty() { sent } else { text });
            }
        }
    }

    Err(RouterError::InvalidResponse(
        "event stream ended without a result".into(),
    ))
}
