//! HTTP-level tests for the atelier REST API.
//!
//! Requests are driven through the full axum router with
//! `tower::ServiceExt::oneshot`; backends are replaced with a scripted
//! `BackendClient` so no network is involved.
//!
//! Coverage:
//! - Image generation fallback end to end
//! - Chat buffered failure envelope
//! - Validation before routing (no connection setup)
//! - SSE chat framing, including inline stream errors
//! - Client disconnect mid-stream aborts the backend call
//! - Edit operation validation and passthrough video edits
//! - Malformed JSON, model listing, sessions, health, CORS

use std::collections::HashSet;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use futures_util::StreamExt;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tower::ServiceExt;

use atelier_api::{AppState, build_router};
use atelier_router::{
    BackendClient, BackendDescriptor, BackendKind, Category, ConnectionHandle, FallbackRouter,
    Payload, RawResponse, RouterConfig, RouterError,
};

// ── Scripted backend ───────────────────────────────────────────────────

struct FakeClient {
    failing: HashSet<String>,
    invoked: Mutex<Vec<String>>,
}

impl FakeClient {
    fn failing(ids: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            failing: ids.iter().map(|s| s.to_string()).collect(),
            invoked: Mutex::new(Vec::new()),
        })
    }

    fn invoked(&self) -> Vec<String> {
        self.invoked.lock().unwrap().clone()
    }
}

#[async_trait]
impl BackendClient for FakeClient {
    async fn connect(&self, backend: &BackendDescriptor) -> atelier_router::Result<ConnectionHandle> {
        Ok(ConnectionHandle::new(backend.endpoint.clone(), "http://fake", backend.kind))
    }

    async fn invoke(
        &self,
        _handle: &ConnectionHandle,
        backend: &BackendDescriptor,
        payload: &Payload,
    ) -> atelier_router::Result<RawResponse> {
        self.invoked.lock().unwrap().push(backend.id.clone());
        if self.failing.contains(&backend.id) {
            return Err(RouterError::RequestFailed(format!("HTTP 503: {} is sleeping", backend.id)));
        }
        let id = &backend.id;
        let value = match (backend.kind, backend.category) {
            (BackendKind::Passthrough, _) => payload.get("source").cloned().unwrap_or(Value::Null),
            (_, Category::Chat) => json!(format!("hello from {id}")),
            // Video Spaces return the clip, a download copy, then a poster frame.
            (_, Category::VideoGen) => json!([
                format!("https://cdn.test/{id}.mp4"),
                format!("https://cdn.test/{id}-download.mp4"),
                format!("https://cdn.test/{id}-poster.webp"),
            ]),
            _ => json!([format!("https://cdn.test/{id}.png")]),
        };
        Ok(RawResponse::Json(value))
    }
}

/// Sets its flag when dropped.
struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

/// Streams one chunk, then stalls as a slow model would.
struct StallingStream {
    dropped: Arc<AtomicBool>,
}

#[async_trait]
impl BackendClient for StallingStream {
    async fn connect(&self, backend: &BackendDescriptor) -> atelier_router::Result<ConnectionHandle> {
        Ok(ConnectionHandle::new(backend.endpoint.clone(), "http://fake", backend.kind))
    }

    async fn invoke(
        &self,
        _handle: &ConnectionHandle,
        _backend: &BackendDescriptor,
        _payload: &Payload,
    ) -> atelier_router::Result<RawResponse> {
        Ok(RawResponse::Json(json!("unused")))
    }

    async fn invoke_stream(
        &self,
        _handle: &ConnectionHandle,
        _backend: &BackendDescriptor,
        _payload: &Payload,
        tx: mpsc::Sender<String>,
    ) -> atelier_router::Result<String> {
        let _flag = DropFlag(self.dropped.clone());
        let _ = tx.send("first".to_string()).await;
        tokio::time::sleep(Duration::from_secs(60)).await;
        Ok("first".into())
    }
}

// ── Helpers ────────────────────────────────────────────────────────────

fn app_with(client: Arc<dyn BackendClient>) -> (Router, AppState) {
    let state = AppState::new(FallbackRouter::new(client, RouterConfig::default()));
    (build_router(state.clone(), &[]), state)
}

fn post_json(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

async fn send_text(app: Router, request: Request<Body>) -> (StatusCode, Option<String>, String) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let content_type = response
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, content_type, String::from_utf8(bytes.to_vec()).unwrap())
}

fn sse_data(body: &str) -> Vec<String> {
    body.lines()
        .filter_map(|l| l.strip_prefix("data: ").or_else(|| l.strip_prefix("data:")))
        .map(str::to_string)
        .collect()
}

// ── Generation ─────────────────────────────────────────────────────────

#[tokio::test]
async fn image_generation_falls_back_to_next_backend() {
    let client = FakeClient::failing(&["flux-schnell"]);
    let (app, _) = app_with(client.clone());

    let (status, body) = send(
        app,
        post_json("/api/generate/image", r#"{"prompt":"a cat","model":"flux"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["model"], "sdxl-lightning");
    assert_eq!(body["data"]["provider"], "huggingface-spaces");
    assert_eq!(body["data"]["status"], "completed");
    assert_eq!(
        body["data"]["images"][0]["url"],
        "https://cdn.test/sdxl-lightning.png"
    );
    assert_eq!(client.invoked(), ["flux-schnell", "sdxl-lightning"]);
}

#[tokio::test]
async fn image_generation_applies_style_and_aspect_ratio() {
    let (app, _) = app_with(FakeClient::failing(&[]));
    let (status, body) = send(
        app,
        post_json(
            "/api/generate/image",
            r#"{"prompt":"a cat","stylePreset":"anime","aspectRatio":"16:9"}"#,
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["prompt"], "a cat, anime style");
    assert_eq!(body["data"]["parameters"]["width"], 1024);
    assert_eq!(body["data"]["parameters"]["height"], 576);
    assert!(body["data"].get("negativePrompt").is_none());
}

#[tokio::test]
async fn image_generation_total_failure_is_503_with_models() {
    let client = FakeClient::failing(&[
        "flux-schnell",
        "sdxl-lightning",
        "stable-diffusion-3",
        "hf-flux-schnell",
    ]);
    let (app, _) = app_with(client);

    let (status, body) = send(app, post_json("/api/generate/image", r#"{"prompt":"x"}"#)).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "GENERATION_FAILED");
    assert_eq!(
        body["error"]["details"],
        "request failed: HTTP 503: hf-flux-schnell is sleeping"
    );
    assert_eq!(
        body["error"]["attempted"],
        json!(["flux-schnell", "sdxl-lightning", "stable-diffusion-3", "hf-flux-schnell"])
    );
    let models = body["availableModels"].as_array().unwrap();
    assert!(models.contains(&json!("flux-dev")));
}

#[tokio::test]
async fn missing_prompt_is_rejected_before_routing() {
    let (app, state) = app_with(FakeClient::failing(&[]));

    let (status, body) = send(app, post_json("/api/generate/image", r#"{"model":"flux"}"#)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(
        body,
        json!({
            "success": false,
            "error": { "code": "INVALID_REQUEST", "message": "Prompt is required" }
        })
    );
    assert_eq!(state.router.pool().setup_count(), 0);
}

#[tokio::test]
async fn video_generation_merges_motion_preset() {
    let (app, _) = app_with(FakeClient::failing(&[]));
    let (status, body) = send(
        app,
        post_json("/api/generate/video", r#"{"prompt":"waves","motionPreset":"orbit"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["model"], "animatediff-lightning");
    assert_eq!(data["videoUrl"], "https://cdn.test/animatediff-lightning.mp4");
    assert_eq!(
        data["thumbnailUrl"],
        "https://cdn.test/animatediff-lightning-poster.webp"
    );
    assert_eq!(data["duration"], 4.0);
    assert_eq!(data["fps"], 24);
    assert_eq!(data["width"], 1024);
    assert_eq!(data["height"], 576);
    assert_eq!(data["motionPreset"], "orbit");
    assert_eq!(data["motionStrength"], 0.7);
}

#[tokio::test]
async fn unknown_motion_preset_is_invalid() {
    let (app, state) = app_with(FakeClient::failing(&[]));
    let (status, body) = send(
        app,
        post_json("/api/generate/video", r#"{"prompt":"waves","motionPreset":"spin"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "Unknown motion preset: spin");
    assert_eq!(state.router.pool().setup_count(), 0);
}

#[tokio::test]
async fn malformed_json_is_internal_error() {
    let (app, _) = app_with(FakeClient::failing(&[]));
    let (status, body) = send(app, post_json("/api/generate/image", "{prompt:")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"]["code"], "INTERNAL_ERROR");
    assert!(!body["error"]["message"].as_str().unwrap().is_empty());
}

// ── Chat ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn buffered_chat_returns_reply() {
    let (app, _) = app_with(FakeClient::failing(&[]));
    let (status, body) = send(
        app,
        post_json("/api/chat", r#"{"message":"hi","model":"llama","stream":false}"#),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["response"], "hello from llama-3-70b");
    assert_eq!(body["data"]["model"], "llama-3-70b");
    assert_eq!(body["data"]["provider"], "huggingface-spaces");
}

#[tokio::test]
async fn buffered_chat_total_failure_is_chat_failed() {
    let client = FakeClient::failing(&["qwen-72b", "llama-3-70b", "mistral-nemo", "cf-llama"]);
    let (app, _) = app_with(client.clone());

    let (status, body) = send(
        app,
        post_json("/api/chat", r#"{"message":"hi","stream":false}"#),
    )
    .await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "CHAT_FAILED");
    assert_eq!(
        body["error"]["message"],
        "All chat providers are currently unavailable."
    );
    assert_eq!(
        body["error"]["details"],
        "request failed: HTTP 503: cf-llama is sleeping"
    );
    assert_eq!(
        client.invoked(),
        ["qwen-72b", "llama-3-70b", "mistral-nemo", "cf-llama"]
    );
}

#[tokio::test]
async fn missing_message_is_rejected() {
    let (app, state) = app_with(FakeClient::failing(&[]));
    let (status, body) = send(app, post_json("/api/chat", r#"{"history":[]}"#)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "Message is required");
    assert_eq!(state.router.pool().setup_count(), 0);
}

#[tokio::test]
async fn streamed_chat_emits_deltas_then_done() {
    let (app, _) = app_with(FakeClient::failing(&[]));
    let (status, content_type, body) =
        send_text(app, post_json("/api/chat", r#"{"message":"hi"}"#)).await;

    assert_eq!(status, StatusCode::OK);
    assert!(content_type.unwrap().starts_with("text/event-stream"));

    let events = sse_data(&body);
    assert_eq!(events.len(), 2, "events: {events:?}");
    let delta: Value = serde_json::from_str(&events[0]).unwrap();
    assert_eq!(delta["choices"][0]["delta"]["content"], "hello from qwen-72b");
    assert!(delta["choices"][0]["finish_reason"].is_null());
    assert_eq!(events[1], "[DONE]");
}

#[tokio::test]
async fn streamed_chat_reports_error_inline() {
    let client = FakeClient::failing(&["qwen-72b"]);
    let (app, _) = app_with(client.clone());
    let (status, _, body) = send_text(app, post_json("/api/chat", r#"{"message":"hi"}"#)).await;

    assert_eq!(status, StatusCode::OK);
    let events = sse_data(&body);
    assert_eq!(events.len(), 2, "events: {events:?}");
    let error: Value = serde_json::from_str(&events[0]).unwrap();
    assert_eq!(
        error["error"]["message"],
        "request failed: HTTP 503: qwen-72b is sleeping"
    );
    assert_eq!(events[1], "[DONE]");
    // No fallback while streaming.
    assert_eq!(client.invoked(), ["qwen-72b"]);
}

#[tokio::test]
async fn client_disconnect_aborts_backend_stream() {
    let dropped = Arc::new(AtomicBool::new(false));
    let (app, _) = app_with(Arc::new(StallingStream {
        dropped: dropped.clone(),
    }));

    let response = app
        .oneshot(post_json("/api/chat", r#"{"message":"hi"}"#))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let mut body = response.into_body().into_data_stream();
    let first = tokio::time::timeout(Duration::from_secs(5), body.next())
        .await
        .expect("no frame within 5s")
        .unwrap()
        .unwrap();
    let first = String::from_utf8(first.to_vec()).unwrap();
    let delta: Value = serde_json::from_str(&sse_data(&first)[0]).unwrap();
    assert_eq!(delta["choices"][0]["delta"]["content"], "first");
    assert!(!dropped.load(Ordering::SeqCst));

    // The client goes away while the backend is still generating.
    drop(body);

    tokio::time::timeout(Duration::from_secs(5), async {
        while !dropped.load(Ordering::SeqCst) {
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    })
    .await
    .expect("backend call still running after disconnect");
}

#[tokio::test]
async fn chat_models_lists_chat_backends() {
    let (app, _) = app_with(FakeClient::failing(&[]));
    let (status, body) = send(app, get("/api/chat")).await;
    assert_eq!(status, StatusCode::OK);
    let models = body["data"]["models"].as_array().unwrap();
    assert!(models.iter().any(|m| m["id"] == "qwen-72b"));
    assert!(models.iter().all(|m| m.get("name").is_some()));
}

// ── Editing ────────────────────────────────────────────────────────────

#[tokio::test]
async fn invalid_edit_operation_is_rejected() {
    let (app, state) = app_with(FakeClient::failing(&[]));
    let (status, body) = send(
        app,
        post_json("/api/edit/image", r#"{"image":"https://x/a.png","operation":"explode"}"#),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["message"], "Invalid operation");
    assert_eq!(state.router.pool().setup_count(), 0);
}

#[tokio::test]
async fn upscale_falls_back_along_its_chain() {
    let client = FakeClient::failing(&["finegrain-enhancer"]);
    let (app, _) = app_with(client);
    let (status, body) = send(
        app,
        post_json("/api/edit/image", r#"{"image":"https://x/a.png","operation":"upscale"}"#),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    let data = &body["data"];
    assert_eq!(data["model"], "real-esrgan");
    assert_eq!(data["outputUrl"], "https://cdn.test/real-esrgan.png");
    assert_eq!(data["originalUrl"], "https://x/a.png");
    assert_eq!(data["parameters"]["strength"], 0.8);
}

#[tokio::test]
async fn inpaint_prefers_inference_model_then_space() {
    let client = FakeClient::failing(&[]);
    let (app, _) = app_with(client.clone());
    let (status, body) = send(
        app,
        post_json(
            "/api/edit/image",
            r#"{"image":"https://x/a.png","mask":"https://x/m.png","operation":"inpaint"}"#,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["model"], "hf-sd-inpainting");
    assert_eq!(body["data"]["provider"], "huggingface-inference");

    let client = FakeClient::failing(&["hf-sd-inpainting"]);
    let (app, _) = app_with(client.clone());
    let (_, body) = send(
        app,
        post_json("/api/edit/image", r#"{"image":"https://x/a.png","operation":"outpaint"}"#),
    )
    .await;
    assert_eq!(body["data"]["model"], "instruct-pix2pix");
    assert_eq!(client.invoked(), ["hf-sd-inpainting", "instruct-pix2pix"]);
}

#[tokio::test]
async fn video_edit_passes_source_through() {
    let (app, _) = app_with(FakeClient::failing(&[]));
    let (status, body) = send(
        app,
        post_json(
            "/api/edit/video",
            r#"{"video":"https://x/clip.mp4","operation":"trim","params":{"start":1}}"#,
        ),
    )
    .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["outputUrl"], "https://x/clip.mp4");
    assert_eq!(body["data"]["model"], "video-passthrough");
    assert_eq!(body["data"]["parameters"], json!({ "start": 1 }));
}

// ── Registry, sessions, health ─────────────────────────────────────────

#[tokio::test]
async fn models_filter_by_category() {
    let (app, _) = app_with(FakeClient::failing(&[]));
    let (status, body) = send(app.clone(), get("/api/models?category=upscale")).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = body["data"]["models"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|m| m["id"].as_str())
        .collect();
    assert_eq!(ids, ["finegrain-enhancer", "real-esrgan", "hf-swin2sr"]);

    let (status, _) = send(app, get("/api/models?category=nope")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn space_status_probes_backend() {
    let (app, _) = app_with(FakeClient::failing(&[]));
    let (status, body) = send(app.clone(), get("/api/spaces/flux-dev/status")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["available"], true);
    assert!(body["latencyMs"].is_u64());

    let (status, _) = send(app, get("/api/spaces/nope/status")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn session_is_minted_on_get_and_post() {
    let (app, _) = app_with(FakeClient::failing(&[]));
    let (_, a) = send(app.clone(), get("/api/session")).await;
    let (_, b) = send(app, post_json("/api/session", "")).await;
    assert_ne!(a["id"], b["id"]);
    assert!(a["createdAt"].is_i64());
    assert_eq!(a["createdAt"], a["lastActiveAt"]);
}

#[tokio::test]
async fn health_reports_version() {
    let (app, _) = app_with(FakeClient::failing(&[]));
    let (status, body) = send(app, get("/api/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
}

#[tokio::test]
async fn cors_allows_credentialed_origins() {
    let (app, _) = app_with(FakeClient::failing(&[]));
    let request = Request::builder()
        .uri("/api/health")
        .header(header::ORIGIN, "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    let headers = response.headers();
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_ORIGIN).unwrap(),
        "http://localhost:3000"
    );
    assert_eq!(
        headers.get(header::ACCESS_CONTROL_ALLOW_CREDENTIALS).unwrap(),
        "true"
    );
}

#[tokio::test]
async fn cors_preflight_lists_methods() {
    let (app, _) = app_with(FakeClient::failing(&[]));
    let request = Request::builder()
        .method("OPTIONS")
        .uri("/api/chat")
        .header(header::ORIGIN, "http://localhost:3000")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let methods = response
        .headers()
        .get(header::ACCESS_CONTROL_ALLOW_METHODS)
        .unwrap()
        .to_str()
        .unwrap()
        .to_string();
    assert!(methods.contains("POST"));
}
