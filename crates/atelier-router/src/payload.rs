//! Per-backend payload builders.
//!
//! Each builder maps a [`GenerationRequest`] onto the parameter names and
//! defaults one backend expects. Builders are pure: the same descriptor and
//! request always produce the same payload, with keys in a fixed order.
//! Request fields a backend does not understand are dropped.
//!
//! A value is chosen in this order: the request field, then the backend's
//! `default_params` entry, then the literal in the builder.

use serde_json::{Value, json};

use crate::registry::BackendDescriptor;
use crate::types::{GenerationRequest, Payload};

/// Build the payload for `backend` using its own mapping function.
pub fn build_payload(backend: &BackendDescriptor, request: &GenerationRequest) -> Payload {
    (backend.build)(backend, request)
}

const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful AI assistant.";

fn pick<T: Into<Value>>(
    requested: Option<T>,
    backend: &BackendDescriptor,
    key: &str,
    literal: impl Into<Value>,
) -> Value {
    match requested {
        Some(v) => v.into(),
        None => backend
            .default_params
            .get(key)
            .cloned()
            .unwrap_or_else(|| literal.into()),
    }
}

fn prompt(request: &GenerationRequest) -> Value {
    Value::String(request.prompt_or_empty().to_string())
}

fn negative_prompt(request: &GenerationRequest) -> Value {
    Value::String(request.negative_prompt.clone().unwrap_or_default())
}

/// A numeric backend default, or `literal` when absent.
fn default_number(backend: &BackendDescriptor, key: &str, literal: f64) -> f64 {
    backend
        .default_params
        .get(key)
        .and_then(Value::as_f64)
        .unwrap_or(literal)
}

fn source(request: &GenerationRequest) -> Value {
    Value::String(request.source_media.clone().unwrap_or_default())
}

/// Insert every entry of `extra` whose key is not already present.
fn merge_missing(payload: &mut Payload, extra: &Payload) {
    for (k, v) in extra {
        if !payload.contains_key(k) {
            payload.insert(k.clone(), v.clone());
        }
    }
}

/// FLUX.1 Schnell and Dev. `guidance_scale` is only sent to variants whose
/// defaults declare it.
pub fn flux(backend: &BackendDescriptor, request: &GenerationRequest) -> Payload {
    let mut p = Payload::new();
    p.insert("prompt".into(), prompt(request));
    p.insert("seed".into(), pick(request.seed, backend, "seed", 0));
    p.insert("randomize_seed".into(), Value::Bool(request.seed.is_none()));
    p.insert("width".into(), pick(request.width, backend, "width", 1024));
    p.insert("height".into(), pick(request.height, backend, "height", 1024));
    if backend.default_params.contains_key("guidance_scale") {
        p.insert(
            "guidance_scale".into(),
            pick(request.guidance_scale, backend, "guidance_scale", 3.5),
        );
    }
    p.insert(
        "num_inference_steps".into(),
        pick(request.steps, backend, "num_inference_steps", 4),
    );
    p
}

pub fn sdxl_lightning(backend: &BackendDescriptor, request: &GenerationRequest) -> Payload {
    let mut p = Payload::new();
    p.insert("prompt".into(), prompt(request));
    p.insert("ckpt".into(), pick(None::<String>, backend, "ckpt", "4-Step"));
    p
}

pub fn stable_diffusion_3(backend: &BackendDescriptor, request: &GenerationRequest) -> Payload {
    let mut p = Payload::new();
    p.insert("prompt".into(), prompt(request));
    p.insert("negative_prompt".into(), negative_prompt(request));
    p.insert("seed".into(), pick(request.seed, backend, "seed", 0));
    p.insert("randomize_seed".into(), Value::Bool(request.seed.is_none()));
    p.insert("width".into(), pick(request.width, backend, "width", 1024));
    p.insert("height".into(), pick(request.height, backend, "height", 1024));
    p.insert(
        "guidance_scale".into(),
        pick(request.guidance_scale, backend, "guidance_scale", 4.5),
    );
    p.insert(
        "num_inference_steps".into(),
        pick(request.steps, backend, "num_inference_steps", 40),
    );
    p
}

pub fn playground(backend: &BackendDescriptor, request: &GenerationRequest) -> Payload {
    let mut p = Payload::new();
    p.insert("prompt".into(), prompt(request));
    p.insert("negative_prompt".into(), negative_prompt(request));
    p.insert(
        "guidance_scale".into(),
        pick(request.guidance_scale, backend, "guidance_scale", 3),
    );
    p.insert(
        "num_inference_steps".into(),
        pick(request.steps, backend, "num_inference_steps", 25),
    );
    p
}

/// Image Spaces without a dedicated mapping: prompt and negative prompt
/// followed by the backend's defaults.
pub fn generic_image(backend: &BackendDescriptor, request: &GenerationRequest) -> Payload {
    let mut p = Payload::new();
    p.insert("prompt".into(), prompt(request));
    p.insert("negative_prompt".into(), negative_prompt(request));
    merge_missing(&mut p, &backend.default_params);
    p
}

pub fn animatediff(backend: &BackendDescriptor, request: &GenerationRequest) -> Payload {
    let mut p = Payload::new();
    p.insert("prompt".into(), prompt(request));
    p.insert("base".into(), pick(None::<String>, backend, "base", "ToonYou"));
    p.insert("step".into(), pick(request.steps, backend, "step", 4));
    merge_missing(&mut p, &request.params);
    p
}

pub fn i2vgen(_backend: &BackendDescriptor, request: &GenerationRequest) -> Payload {
    let mut p = Payload::new();
    p.insert("image".into(), source(request));
    p.insert("prompt".into(), prompt(request));
    p.insert("negative_prompt".into(), negative_prompt(request));
    p
}

pub fn cogvideox(backend: &BackendDescriptor, request: &GenerationRequest) -> Payload {
    let mut p = Payload::new();
    p.insert("prompt".into(), prompt(request));
    p.insert(
        "num_inference_steps".into(),
        pick(request.steps, backend, "num_inference_steps", 50),
    );
    p
}

/// Chat Spaces: `message, history, system_prompt, temperature, max_new_tokens`.
pub fn gradio_chat(backend: &BackendDescriptor, request: &GenerationRequest) -> Payload {
    let history: Vec<Value> = request
        .history
        .iter()
        .map(|(user, assistant)| json!([user, assistant]))
        .collect();

    let mut p = Payload::new();
    p.insert("message".into(), prompt(request));
    p.insert("history".into(), Value::Array(history));
    p.insert(
        "system_prompt".into(),
        Value::String(
            request
                .system_prompt
                .clone()
                .unwrap_or_else(|| DEFAULT_SYSTEM_PROMPT.into()),
        ),
    );
    p.insert(
        "temperature".into(),
        pick(request.temperature, backend, "temperature", 0.7),
    );
    p.insert(
        "max_new_tokens".into(),
        pick(request.max_tokens, backend, "max_tokens", 2048),
    );
    p
}

/// Hugging Face Inference API text-to-image. Steps are capped by the
/// backend's `max_steps` default.
pub fn hf_text_to_image(backend: &BackendDescriptor, request: &GenerationRequest) -> Payload {
    let default_steps = backend
        .default_params
        .get("num_inference_steps")
        .and_then(Value::as_u64)
        .unwrap_or(30);
    let max_steps = backend
        .default_params
        .get("max_steps")
        .and_then(Value::as_u64)
        .unwrap_or(50);
    let steps = request
        .steps
        .map(u64::from)
        .unwrap_or(default_steps)
        .min(max_steps);

    let mut params = Payload::new();
    if let Some(neg) = &request.negative_prompt {
        params.insert("negative_prompt".into(), Value::String(neg.clone()));
    }
    params.insert("width".into(), pick(request.width, backend, "width", 1024));
    params.insert("height".into(), pick(request.height, backend, "height", 1024));
    params.insert("num_inference_steps".into(), json!(steps));
    params.insert(
        "guidance_scale".into(),
        pick(request.guidance_scale, backend, "guidance_scale", 7.5),
    );
    if let Some(seed) = request.seed {
        params.insert("seed".into(), json!(seed));
    }

    let mut p = Payload::new();
    p.insert("inputs".into(), prompt(request));
    p.insert("parameters".into(), Value::Object(params));
    p
}

/// Hugging Face Inference API text-to-video.
///
/// The clip length is `duration` capped at the backend's `max_duration`;
/// `num_frames = round(duration * fps)` with the backend's native `fps` unless
/// the request names one. Motion parameters ride along in `parameters`.
pub fn hf_text_to_video(backend: &BackendDescriptor, request: &GenerationRequest) -> Payload {
    let default_duration = default_number(backend, "duration", 2.0);
    let duration = request
        .duration
        .unwrap_or(default_duration)
        .min(default_number(backend, "max_duration", default_duration));
    let fps = request
        .fps
        .map(f64::from)
        .unwrap_or_else(|| default_number(backend, "fps", 8.0));
    let num_frames = (duration * fps).round().max(1.0) as u64;

    let mut params = Payload::new();
    params.insert("negative_prompt".into(), negative_prompt(request));
    params.insert("num_frames".into(), json!(num_frames));
    params.insert("width".into(), pick(request.width, backend, "width", 576));
    params.insert("height".into(), pick(request.height, backend, "height", 320));
    merge_missing(&mut params, &request.params);

    let mut p = Payload::new();
    p.insert("inputs".into(), prompt(request));
    p.insert("parameters".into(), Value::Object(params));
    p
}

/// Inference API models that take the source image alone (background
/// removal).
pub fn hf_image_input(_backend: &BackendDescriptor, request: &GenerationRequest) -> Payload {
    let mut p = Payload::new();
    p.insert("inputs".into(), source(request));
    p
}

/// Inference API super-resolution: `scale` from the request params, then the
/// backend default, then 4.
pub fn hf_upscale(backend: &BackendDescriptor, request: &GenerationRequest) -> Payload {
    let mut params = Payload::new();
    params.insert(
        "scale".into(),
        pick(request.params.get("scale").cloned(), backend, "scale", 4),
    );

    let mut p = Payload::new();
    p.insert("inputs".into(), source(request));
    p.insert("parameters".into(), Value::Object(params));
    p
}

const INPAINT_PROMPT: &str = "seamless fill";
const INPAINT_NEGATIVE_PROMPT: &str = "blurry, low quality, artifacts";

/// Inference API inpainting: image, optional mask, and a fill prompt packed
/// into `inputs`.
pub fn hf_inpaint(backend: &BackendDescriptor, request: &GenerationRequest) -> Payload {
    let mut inputs = Payload::new();
    inputs.insert("image".into(), source(request));
    if let Some(mask) = &request.mask_media {
        inputs.insert("mask".into(), Value::String(mask.clone()));
    }
    inputs.insert(
        "prompt".into(),
        Value::String(
            request
                .prompt
                .clone()
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| INPAINT_PROMPT.into()),
        ),
    );
    inputs.insert(
        "negative_prompt".into(),
        Value::String(
            request
                .negative_prompt
                .clone()
                .unwrap_or_else(|| INPAINT_NEGATIVE_PROMPT.into()),
        ),
    );
    inputs.insert("strength".into(), pick(request.strength, backend, "strength", 0.8));

    let mut p = Payload::new();
    p.insert("inputs".into(), Value::Object(inputs));
    p
}

pub fn cloudflare_image(backend: &BackendDescriptor, request: &GenerationRequest) -> Payload {
    let mut p = Payload::new();
    p.insert("prompt".into(), prompt(request));
    p.insert("num_steps".into(), pick(request.steps, backend, "num_steps", 20));
    p.insert(
        "guidance".into(),
        pick(request.guidance_scale, backend, "guidance", 7.5),
    );
    p
}

/// Cloudflare chat: an OpenAI-style `messages` list built from the system
/// prompt, the history turns, and the new user message.
pub fn cloudflare_chat(backend: &BackendDescriptor, request: &GenerationRequest) -> Payload {
    let mut messages = Vec::with_capacity(request.history.len() * 2 + 2);
    if let Some(system) = &request.system_prompt {
        messages.push(json!({ "role": "system", "content": system }));
    }
    for (user, assistant) in &request.history {
        messages.push(json!({ "role": "user", "content": user }));
        messages.push(json!({ "role": "assistant", "content": assistant }));
    }
    messages.push(json!({ "role": "user", "content": request.prompt_or_empty() }));

    let mut p = Payload::new();
    p.insert("messages".into(), Value::Array(messages));
    p.insert(
        "max_tokens".into(),
        pick(request.max_tokens, backend, "max_tokens", 1024),
    );
    p.insert(
        "temperature".into(),
        pick(request.temperature, backend, "temperature", 0.7),
    );
    p
}

/// Image edit Spaces: source image, optional instruction, mask and strength,
/// then any extra parameters.
pub fn image_edit(_backend: &BackendDescriptor, request: &GenerationRequest) -> Payload {
    let mut p = Payload::new();
    p.insert("image".into(), source(request));
    if let Some(text) = &request.prompt {
        p.insert("prompt".into(), Value::String(text.clone()));
    }
    if let Some(mask) = &request.mask_media {
        p.insert("mask".into(), Value::String(mask.clone()));
    }
    if let Some(strength) = request.strength {
        p.insert("strength".into(), json!(strength));
    }
    merge_missing(&mut p, &request.params);
    p
}

/// Single-input Spaces (background removal, upscalers).
pub fn image_only(_backend: &BackendDescriptor, request: &GenerationRequest) -> Payload {
    let mut p = Payload::new();
    p.insert("image".into(), source(request));
    merge_missing(&mut p, &request.params);
    p
}

pub fn generic_audio(backend: &BackendDescriptor, request: &GenerationRequest) -> Payload {
    let mut p = Payload::new();
    p.insert("prompt".into(), prompt(request));
    if let Some(duration) = request.duration {
        p.insert("duration".into(), json!(duration));
    }
    merge_missing(&mut p, &backend.default_params);
    p
}

pub fn passthrough(_backend: &BackendDescriptor, request: &GenerationRequest) -> Payload {
    let mut p = Payload::new();
    p.insert("source".into(), source(request));
    p
}
