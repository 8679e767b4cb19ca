//! Image and video editing.
//!
//! The operation name doubles as the logical model id: image operations are
//! aliased to the edit or upscale backend that performs them, video
//! operations all resolve to the passthrough backend.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use serde::Deserialize;
use serde_json::{Map, Value, json};

use atelier_router::{Category, GenerationRequest, GenerationResult, Modality};

use super::{now_ms, parse_body, provider_of, required, strip_nulls};
use crate::AppState;
use crate::error::{ApiError, ErrorCode};

pub const IMAGE_OPERATIONS: &[&str] = &[
    "inpaint",
    "outpaint",
    "upscale",
    "background-remove",
    "background-replace",
    "style-transfer",
    "colorize",
    "denoise",
    "enhance",
    "relight",
];

pub const VIDEO_OPERATIONS: &[&str] = &[
    "trim",
    "speed",
    "reverse",
    "loop",
    "transition",
    "effect",
    "stabilize",
    "interpolate",
];

const DEFAULT_STRENGTH: f64 = 0.8;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct ImageEditBody {
    image: Option<String>,
    operation: Option<String>,
    mask: Option<String>,
    prompt: Option<String>,
    strength: Option<f64>,
    params: Map<String, Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct VideoEditBody {
    video: Option<String>,
    operation: Option<String>,
    params: Map<String, Value>,
}

fn validate_operation(operation: Option<String>, allowed: &[&str]) -> Result<String, ApiError> {
    let operation = required(operation, "Operation")?;
    if !allowed.contains(&operation.as_str()) {
        return Err(ApiError::invalid_request("Invalid operation"));
    }
    Ok(operation)
}

fn edit_failed(state: &AppState, what: &str, category: Category, result: &GenerationResult) -> ApiError {
    ApiError::unavailable(
        ErrorCode::EditFailed,
        format!("All {what} editing providers are currently unavailable."),
        result,
    )
    .with_available_models(state.router.registry().ids_in(category))
}

/// `POST /api/edit/image`
pub async fn edit_image(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let body: ImageEditBody = parse_body(&body)?;
    let image = required(body.image, "Image")?;
    let operation = validate_operation(body.operation, IMAGE_OPERATIONS)?;
    let strength = body.strength.unwrap_or(DEFAULT_STRENGTH);

    let request = GenerationRequest {
        prompt: body.prompt.clone(),
        source_media: Some(image.clone()),
        mask_media: body.mask,
        operation: Some(operation.clone()),
        strength: Some(strength),
        params: body.params.clone(),
        ..GenerationRequest::default()
    };

    let created_at = now_ms();
    let result = state
        .router
        .route(Modality::ImageEdit, Some(&operation), &request)
        .await;
    if !result.is_completed() {
        return Err(edit_failed(&state, "image", Category::ImageEdit, &result));
    }

    let backend = result.backend_used().unwrap_or_default();
    let urls = result.payload().map(|p| p.urls()).unwrap_or_default();

    let mut parameters = Map::new();
    parameters.insert("strength".into(), json!(strength));
    if let Some(prompt) = body.prompt {
        parameters.insert("prompt".into(), json!(prompt));
    }
    parameters.extend(body.params);

    Ok(Json(json!({
        "success": true,
        "data": strip_nulls(json!({
            "id": result.id(),
            "status": result.status(),
            "outputUrl": urls.first(),
            "originalUrl": image,
            "operation": operation,
            "parameters": parameters,
            "model": backend,
            "provider": provider_of(&state, backend),
            "attempted": result.attempted(),
            "elapsedMs": result.elapsed_ms(),
            "createdAt": created_at,
            "completedAt": now_ms(),
        })),
    })))
}

/// `POST /api/edit/video`
pub async fn edit_video(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<Json<Value>, ApiError> {
    let body: VideoEditBody = parse_body(&body)?;
    let video = required(body.video, "Video")?;
    let operation = validate_operation(body.operation, VIDEO_OPERATIONS)?;

    let request = GenerationRequest {
        source_media: Some(video.clone()),
        operation: Some(operation.clone()),
        params: body.params.clone(),
        ..GenerationRequest::default()
    };

    let created_at = now_ms();
    let result = state
        .router
        .route(Modality::VideoEdit, Some(&operation), &request)
        .await;
    if !result.is_completed() {
        return Err(edit_failed(&state, "video", Category::VideoEdit, &result));
    }

    let backend = result.backend_used().unwrap_or_default();
    let urls = result.payload().map(|p| p.urls()).unwrap_or_default();

    Ok(Json(json!({
        "success": true,
        "data": strip_nulls(json!({
            "id": result.id(),
            "status": result.status(),
            "outputUrl": urls.first(),
            "originalUrl": video,
            "operation": operation,
            "parameters": body.params,
            "model": backend,
            "provider": provider_of(&state, backend),
            "elapsedMs": result.elapsed_ms(),
            "createdAt": created_at,
            "completedAt": now_ms(),
        })),
    })))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operations_are_validated() {
        assert_eq!(
            validate_operation(Some("upscale".into()), IMAGE_OPERATIONS).unwrap(),
            "upscale"
        );
        let err = validate_operation(Some("explode".into()), IMAGE_OPERATIONS).unwrap_err();
        assert_eq!(err.message(), "Invalid operation");
        let err = validate_operation(None, VIDEO_OPERATIONS).unwrap_err();
        assert_eq!(err.message(), "Operation is required");
        assert!(validate_operation(Some("upscale".into()), VIDEO_OPERATIONS).is_err());
    }
}
