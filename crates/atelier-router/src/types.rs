//! Request, response, and result types shared by the router and its callers.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Backend-specific request parameters, in the order they were inserted.
pub type Payload = Map<String, Value>;

/// One exchange of chat history: `(user message, assistant reply)`.
pub type ChatTurn = (String, String);

/// The kind of work a request asks for. Determines required fields, the
/// backend categories that may serve it, and the shape of its result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Modality {
    ImageGeneration,
    VideoGeneration,
    Chat,
    ImageEdit,
    VideoEdit,
}

impl Modality {
    /// Whether results of this modality are text rather than media references.
    pub fn is_text(self) -> bool {
        matches!(self, Modality::Chat)
    }
}

impl std::fmt::Display for Modality {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Modality::ImageGeneration => "image-generation",
            Modality::VideoGeneration => "video-generation",
            Modality::Chat => "chat",
            Modality::ImageEdit => "image-edit",
            Modality::VideoEdit => "video-edit",
        };
        f.write_str(s)
    }
}

/// A normalized generation request.
///
/// Every field is optional here; the HTTP layer enforces the field a given
/// modality requires before the router ever sees the request. Payload
/// builders pick the fields their backend understands and ignore the rest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GenerationRequest {
    /// Text prompt (generation) or user message (chat).
    pub prompt: Option<String>,
    pub negative_prompt: Option<String>,
    pub width: Option<u32>,
    pub height: Option<u32>,
    pub steps: Option<u32>,
    pub guidance_scale: Option<f64>,
    pub seed: Option<u64>,
    /// Video length in seconds.
    pub duration: Option<f64>,
    pub fps: Option<u32>,
    /// Input image or video reference for edits and image-to-video.
    pub source_media: Option<String>,
    pub mask_media: Option<String>,
    /// Edit operation kind (e.g. "upscale", "trim").
    pub operation: Option<String>,
    pub strength: Option<f64>,
    pub history: Vec<ChatTurn>,
    pub system_prompt: Option<String>,
    pub temperature: Option<f64>,
    pub max_tokens: Option<u32>,
    /// Free-form extra parameters forwarded to backends that accept them.
    pub params: Map<String, Value>,
}

impl GenerationRequest {
    /// Create a request carrying only a prompt.
    pub fn with_prompt(prompt: impl Into<String>) -> Self {
        Self {
            prompt: Some(prompt.into()),
            ..Self::default()
        }
    }

    /// The prompt, or an empty string when absent.
    pub fn prompt_or_empty(&self) -> &str {
        self.prompt.as_deref().unwrap_or_default()
    }
}

/// A response exactly as a backend returned it, before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RawResponse {
    /// A JSON document (Gradio output arrays, Cloudflare envelopes, ...).
    Json(Value),
    /// A binary body such as a PNG returned by the Inference API.
    Binary { bytes: Vec<u8>, content_type: String },
}

/// The backend-agnostic result of a successful call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum NormalizedPayload {
    /// Media references (URLs, file paths, or `data:` URLs), in backend order.
    Media { urls: Vec<String> },
    /// A chat reply and the conversation history the backend returned.
    Text {
        response: String,
        history: Vec<ChatTurn>,
    },
}

impl NormalizedPayload {
    /// An empty media list; the result for unrecognized response shapes.
    pub fn empty_media() -> Self {
        NormalizedPayload::Media { urls: Vec::new() }
    }

    /// `true` when the payload carries nothing a caller could use.
    pub fn is_empty(&self) -> bool {
        match self {
            NormalizedPayload::Media { urls } => urls.is_empty(),
            NormalizedPayload::Text { response, .. } => response.is_empty(),
        }
    }

    /// Media references, or an empty slice for text payloads.
    pub fn urls(&self) -> &[String] {
        match self {
            NormalizedPayload::Media { urls } => urls,
            NormalizedPayload::Text { .. } => &[],
        }
    }
}

/// Terminal status of a routed request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum GenerationStatus {
    Completed,
    Failed,
}

/// One backend attempt made while routing a request.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Attempt {
    pub backend: String,
    /// `None` for the attempt that succeeded.
    pub error: Option<String>,
}

/// The outcome of routing one request.
///
/// Only two constructors exist, so a completed result always carries a
/// non-empty payload and a failed one always carries an error message and
/// no payload.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationResult {
    id: String,
    status: GenerationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    payload: Option<NormalizedPayload>,
    #[serde(skip_serializing_if = "Option::is_none")]
    backend_used: Option<String>,
    elapsed_ms: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    error_message: Option<String>,
    attempts: Vec<Attempt>,
}

impl GenerationResult {
    /// A successful result. Returns `None` if `payload` is empty.
    pub fn completed(
        backend: impl Into<String>,
        payload: NormalizedPayload,
        elapsed_ms: u64,
        attempts: Vec<Attempt>,
    ) -> Option<Self> {
        if payload.is_empty() {
            return None;
        }
        Some(Self {
            id: uuid::Uuid::new_v4().to_string(),
            status: GenerationStatus::Completed,
            payload: Some(payload),
            backend_used: Some(backend.into()),
            elapsed_ms,
            error_message: None,
            attempts,
        })
    }

    /// A failed result. A blank message is replaced with a generic one.
    pub fn failed(error: impl Into<String>, elapsed_ms: u64, attempts: Vec<Attempt>) -> Self {
        let mut message = error.into();
        if message.trim().is_empty() {
            message = "unknown error".into();
        }
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            status: GenerationStatus::Failed,
            payload: None,
            backend_used: None,
            elapsed_ms,
            error_message: Some(message),
            attempts,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn status(&self) -> GenerationStatus {
        self.status
    }

    pub fn is_completed(&self) -> bool {
        self.status == GenerationStatus::Completed
    }

    pub fn payload(&self) -> Option<&NormalizedPayload> {
        self.payload.as_ref()
    }

    pub fn backend_used(&self) -> Option<&str> {
        self.backend_used.as_deref()
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.elapsed_ms
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    /// Every attempt in the order it was made.
    pub fn attempts(&self) -> &[Attempt] {
        &self.attempts
    }

    /// Ids of every backend tried, in order.
    pub fn attempted(&self) -> Vec<String> {
        self.attempts.iter().map(|a| a.backend.clone()).collect()
    }
}
