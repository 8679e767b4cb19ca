//! Chat completion, buffered or streamed as server-sent events.
//!
//! A streamed reply is a sequence of
//! `data: {"choices":[{"delta":{"content":"..."},"finish_reason":null}]}`
//! events terminated by `data: [DONE]`. Streaming uses only the resolved
//! backend; a failure is reported inline as `data: {"error":{"message":..}}`
//! before the terminator. Buffered chat falls back across candidates.

use std::convert::Infallible;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use axum::response::{IntoResponse, Response};
use futures_util::Stream;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::{mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use atelier_router::sse::DONE_SENTINEL;
use atelier_router::{Category, ChatTurn, GenerationRequest, Modality, NormalizedPayload};

use super::{parse_body, provider_of, required};
use crate::AppState;
use crate::error::{ApiError, ErrorCode};

const CHUNK_BUFFER: usize = 32;

#[derive(Debug, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ChatBody {
    message: Option<String>,
    history: Vec<ChatTurn>,
    system_prompt: Option<String>,
    model: Option<String>,
    temperature: Option<f64>,
    max_tokens: Option<u32>,
    stream: bool,
}

impl Default for ChatBody {
    fn default() -> Self {
        Self {
            message: None,
            history: Vec::new(),
            system_prompt: None,
            model: None,
            temperature: None,
            max_tokens: None,
            stream: true,
        }
    }
}

/// `POST /api/chat`
pub async fn chat(State(state): State<AppState>, body: Bytes) -> Result<Response, ApiError> {
    let body: ChatBody = parse_body(&body)?;
    let message = required(body.message, "Message")?;
    let request = GenerationRequest {
        prompt: Some(message),
        history: body.history,
        system_prompt: body.system_prompt,
        temperature: body.temperature,
        max_tokens: body.max_tokens,
        ..GenerationRequest::default()
    };

    if body.stream {
        Ok(stream_reply(state, body.model, request).into_response())
    } else {
        Ok(buffered_reply(&state, body.model.as_deref(), &request)
            .await?
            .into_response())
    }
}

async fn buffered_reply(
    state: &AppState,
    model: Option<&str>,
    request: &GenerationRequest,
) -> Result<Json<Value>, ApiError> {
    let result = state.router.route(Modality::Chat, model, request).await;

    let (Some(backend), Some(NormalizedPayload::Text { response, history })) =
        (result.backend_used(), result.payload())
    else {
        return Err(ApiError::unavailable(
            ErrorCode::ChatFailed,
            "All chat providers are currently unavailable.",
            &result,
        )
        .with_available_models(state.router.registry().ids_in(Category::Chat)));
    };

    Ok(Json(json!({
        "success": true,
        "data": {
            "response": response,
            "history": history,
            "model": backend,
            "provider": provider_of(state, backend),
            "duration": result.elapsed_ms(),
            "attempted": result.attempted(),
        },
    })))
}

fn delta_event(chunk: &str) -> String {
    json!({
        "choices": [{
            "delta": { "content": chunk },
            "finish_reason": null,
        }],
    })
    .to_string()
}

fn error_event(message: &str) -> String {
    json!({ "error": { "message": message } }).to_string()
}

/// Spawn the producer and adapt its chunks into SSE events.
///
/// The cancellation guard lives inside the response stream, so a client
/// disconnect drops the stream and aborts the in-flight backend call.
fn stream_reply(
    state: AppState,
    model: Option<String>,
    request: GenerationRequest,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (chunk_tx, mut chunk_rx) = mpsc::channel::<String>(CHUNK_BUFFER);
    let (done_tx, done_rx) = oneshot::channel::<Result<(), String>>();
    let cancel = CancellationToken::new();
    let guard = cancel.clone().drop_guard();

    tokio::spawn(async move {
        let outcome = state
            .router
            .stream_chat(model.as_deref(), &request, chunk_tx, cancel)
            .await
            .map(|_| ())
            .map_err(|e| e.to_string());
        let _ = done_tx.send(outcome);
    });

    let stream = async_stream::stream! {
        let _guard = guard;
        while let Some(chunk) = chunk_rx.recv().await {
            yield Ok(Event::default().data(delta_event(&chunk)));
        }
        if let Ok(Err(message)) = done_rx.await {
            debug!(error = %message, "chat stream ended with error");
            yield Ok(Event::default().data(error_event(&message)));
        }
        yield Ok(Event::default().data(DONE_SENTINEL));
    };

    Sse::new(stream).keep_alive(KeepAlive::default())
}

/// `GET /api/chat`
pub async fn chat_models(State(state): State<AppState>) -> Json<Value> {
    let models: Vec<Value> = state
        .router
        .registry()
        .by_category(Category::Chat)
        .into_iter()
        .map(|b| json!({ "id": b.id, "name": b.display_name, "description": b.description }))
        .collect();
    Json(json!({ "success": true, "data": { "models": models } }))
}
