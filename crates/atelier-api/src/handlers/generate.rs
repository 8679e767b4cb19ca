//! Image and video generation.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::debug;

use atelier_router::{
    Category, GenerationRequest, Modality, complete_dimensions, dimensions_for_aspect_ratio,
    motion_preset, motion_presets,
};

use super::{now_ms, parse_body, provider_of, required, strip_nulls};
use crate::AppState;
use crate::error::{ApiError, ErrorCode};

const IMAGE_SIZE: (u32, u32) = (1024, 1024);
const VIDEO_SIZE: (u32, u32) = (1024, 576);
const MAX_DIMENSION: u32 = 1024;
const VIDEO_DURATION_SECS: f64 = 4.0;
const VIDEO_FPS: u32 = 24;
const MOTION_STRENGTH: f64 = 0.5;

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ImageGenerateBody {
    prompt: Option<String>,
    negative_prompt: Option<String>,
    model: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    steps: Option<u32>,
    guidance_scale: Option<f64>,
    seed: Option<u64>,
    style_preset: Option<String>,
    aspect_ratio: Option<String>,
    params: Map<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VideoGenerateBody {
    prompt: Option<String>,
    negative_prompt: Option<String>,
    model: Option<String>,
    duration: Option<f64>,
    fps: Option<u32>,
    width: Option<u32>,
    height: Option<u32>,
    aspect_ratio: Option<String>,
    steps: Option<u32>,
    seed: Option<u64>,
    motion_preset: Option<String>,
    motion_strength: Option<f64>,
    start_frame: Option<String>,
    params: Map<String, Value>,
}

/// Dimensions the caller asked for, explicitly or through an aspect ratio.
/// `None` leaves the choice to the backend's defaults.
fn requested_dimensions(
    width: Option<u32>,
    height: Option<u32>,
    aspect_ratio: Option<&str>,
    fallback: (u32, u32),
) -> Option<(u32, u32)> {
    match (width, height, aspect_ratio) {
        (None, None, Some(ratio)) => Some(dimensions_for_aspect_ratio(ratio, MAX_DIMENSION)),
        (None, None, None) => None,
        (w, h, Some(ratio)) if w.is_none() || h.is_none() => complete_dimensions(ratio, w, h),
        (w, h, _) => Some((w.unwrap_or(fallback.0), h.unwrap_or(fallback.1))),
    }
}

const IMAGE_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "webp", "gif"];

/// Whether a media reference points at a still image.
fn looks_like_image(url: &str) -> bool {
    if url.starts_with("data:") {
        return url.starts_with("data:image/");
    }
    let path = url.split(['?', '#']).next().unwrap_or_default();
    path.rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.as_str()))
}

fn styled_prompt(prompt: String, style: Option<&str>) -> String {
    match style.filter(|s| !s.is_empty()) {
        Some(style) => format!("{prompt}, {style} style"),
        None => prompt,
    }
}

/// `POST /api/generate/image`
pub async fn generate_image(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let body: ImageGenerateBody = parse_body(&body)?;
    let prompt = styled_prompt(required(body.prompt, "Prompt")?, body.style_preset.as_deref());
    let dims = requested_dimensions(
        body.width,
        body.height,
        body.aspect_ratio.as_deref(),
        IMAGE_SIZE,
    );

    let request = GenerationRequest {
        prompt: Some(prompt.clone()),
        negative_prompt: body.negative_prompt.clone(),
        width: dims.map(|d| d.0),
        height: dims.map(|d| d.1),
        steps: body.steps,
        guidance_scale: body.guidance_scale,
        seed: body.seed,
        params: body.params,
        ..GenerationRequest::default()
    };

    let created_at = now_ms();
    let result = state
        .router
        .route(Modality::ImageGeneration, body.model.as_deref(), &request)
        .await;

    if !result.is_completed() {
        return Err(ApiError::unavailable(
            ErrorCode::GenerationFailed,
            "All image generation providers are currently unavailable.",
            &result,
        )
        .with_available_models(state.router.registry().ids_in(Category::ImageGen)));
    }

    let backend = result.backend_used().unwrap_or_default();
    let (width, height) = dims.unwrap_or(IMAGE_SIZE);
    let images: Vec<Value> = result
        .payload()
        .map(|p| p.urls())
        .unwrap_or_default()
        .iter()
        .map(|url| strip_nulls(json!({ "url": url, "width": width, "height": height, "seed": body.seed })))
        .collect();
    debug!(backend, images = images.len(), "image generation served");

    Ok(Json(json!({
        "success": true,
        "data": strip_nulls(json!({
            "id": result.id(),
            "status": result.status(),
            "images": images,
            "prompt": prompt,
            "negativePrompt": body.negative_prompt,
            "model": backend,
            "provider": provider_of(&state, backend),
            "parameters": strip_nulls(json!({
                "width": width,
                "height": height,
                "steps": body.steps,
                "guidanceScale": body.guidance_scale,
                "seed": body.seed,
            })),
            "attempted": result.attempted(),
            "elapsedMs": result.elapsed_ms(),
            "createdAt": created_at,
            "completedAt": now_ms(),
        })),
    })))
}

/// `GET /api/generate/image`
pub async fn image_models(State(state): State<AppState>) -> Json<Value> {
    let table = state.router.routes().table(Modality::ImageGeneration);
    let models: Vec<_> = state
        .router
        .registry()
        .by_category(Category::ImageGen)
        .into_iter()
        .map(|b| b.summary())
        .collect();
    let aliases: Vec<&str> = table.alias_keys().collect();
    Json(json!({
        "success": true,
        "data": {
            "models": models,
            "aliases": aliases,
            "defaultModel": table.default_backend(),
        },
    }))
}

/// `POST /api/generate/video`
pub async fn generate_video(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let body: VideoGenerateBody = parse_body(&body)?;
    let prompt = required(body.prompt, "Prompt")?;

    let preset = match body.motion_preset.as_deref() {
        Some(id) => Some(
            motion_preset(id)
                .ok_or_else(|| ApiError::invalid_request(format!("Unknown motion preset: {id}")))?,
        ),
        None => None,
    };

    let (width, height) = requested_dimensions(
        body.width,
        body.height,
        body.aspect_ratio.as_deref(),
        VIDEO_SIZE,
    )
    .unwrap_or(VIDEO_SIZE);
    let duration = body.duration.unwrap_or(VIDEO_DURATION_SECS);
    let fps = body.fps.unwrap_or(VIDEO_FPS);

    let mut params = body.params;
    if let Some(preset) = &preset {
        for (key, value) in preset.params_map() {
            params.entry(key).or_insert(value);
        }
    }
    if let Some(strength) = body.motion_strength {
        params.insert("motion_strength".into(), json!(strength));
    }
    let motion_strength = params
        .get("motion_strength")
        .and_then(Value::as_f64)
        .unwrap_or(MOTION_STRENGTH);

    let request = GenerationRequest {
        prompt: Some(prompt.clone()),
        negative_prompt: body.negative_prompt.clone(),
        width: Some(width),
        height: Some(height),
        steps: body.steps,
        seed: body.seed,
        duration: body.duration,
        fps: body.fps,
        source_media: body.start_frame,
        params,
        ..GenerationRequest::default()
    };

    let created_at = now_ms();
    let result = state
        .router
        .route(Modality::VideoGeneration, body.model.as_deref(), &request)
        .await;

    if !result.is_completed() {
        return Err(ApiError::unavailable(
            ErrorCode::GenerationFailed,
            "All video generation providers are currently unavailable.",
            &result,
        )
        .with_available_models(state.router.registry().ids_in(Category::VideoGen)));
    }

    let backend = result.backend_used().unwrap_or_default();
    let urls = result.payload().map(|p| p.urls()).unwrap_or_default();
    let thumbnail = urls.iter().skip(1).find(|u| looks_like_image(u));

    Ok(Json(json!({
        "success": true,
        "data": strip_nulls(json!({
            "id": result.id(),
            "status": result.status(),
            "videoUrl": urls.first(),
            "thumbnailUrl": thumbnail,
            "prompt": prompt,
            "negativePrompt": body.negative_prompt,
            "model": backend,
            "provider": provider_of(&state, backend),
            "duration": duration,
            "fps": fps,
            "width": width,
            "height": height,
            "motionPreset": body.motion_preset,
            "motionStrength": motion_strength,
            "attempted": result.attempted(),
            "elapsedMs": result.elapsed_ms(),
            "createdAt": created_at,
            "completedAt": now_ms(),
        })),
    })))
}

/// `GET /api/generate/video`
pub async fn video_models(State(state): State<AppState>) -> Json<Value> {
    let table = state.router.routes().table(Modality::VideoGeneration);
    let models: Vec<_> = state
        .router
        .registry()
        .by_category(Category::VideoGen)
        .into_iter()
        .map(|b| b.summary())
        .collect();
    let presets: Vec<Value> = motion_presets()
        .into_iter()
        .map(|p| json!({ "id": p.id, "name": p.name, "description": p.description }))
        .collect();
    Json(json!({
        "success": true,
        "data": {
            "models": models,
            "motionPresets": presets,
            "defaultModel": table.default_backend(),
        },
    }))
}
