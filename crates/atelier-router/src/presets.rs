//! Named presets that expand into concrete request parameters.

use serde::Serialize;
use serde_json::{Value, json};

use crate::types::Payload;

/// A camera motion preset for video generation.
#[derive(Debug, Clone, Serialize)]
pub struct MotionPreset {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub params: Value,
}

impl MotionPreset {
    /// The preset's parameters as a payload map.
    pub fn params_map(&self) -> Payload {
        match &self.params {
            Value::Object(map) => map.clone(),
            _ => Payload::new(),
        }
    }
}

/// Every known motion preset, in display order.
pub fn motion_presets() -> Vec<MotionPreset> {
    let preset = |id, name, description, strength: f64, camera: &str, speed: Option<f64>| {
        let mut params = json!({ "motion_strength": strength, "camera_movement": camera });
        if let (Some(speed), Value::Object(map)) = (speed, &mut params) {
            map.insert("speed".into(), json!(speed));
        }
        MotionPreset {
            id,
            name,
            description,
            params,
        }
    };

    vec![
        preset("static", "Static", "No camera movement, subtle animation", 0.3, "none", None),
        preset("slow-zoom-in", "Slow Zoom In", "Gradual zoom towards subject", 0.5, "zoom_in", Some(0.3)),
        preset("slow-zoom-out", "Slow Zoom Out", "Gradual zoom away from subject", 0.5, "zoom_out", Some(0.3)),
        preset("pan-left", "Pan Left", "Smooth horizontal pan to the left", 0.6, "pan_left", Some(0.4)),
        preset("pan-right", "Pan Right", "Smooth horizontal pan to the right", 0.6, "pan_right", Some(0.4)),
        preset("tilt-up", "Tilt Up", "Camera tilts upward", 0.6, "tilt_up", Some(0.4)),
        preset("tilt-down", "Tilt Down", "Camera tilts downward", 0.6, "tilt_down", Some(0.4)),
        preset("orbit", "Orbit", "Camera orbits around subject", 0.7, "orbit", Some(0.5)),
        preset("dolly-in", "Dolly In", "Camera moves towards subject", 0.6, "dolly_in", Some(0.4)),
        preset("dynamic", "Dynamic", "High motion with dramatic movement", 0.9, "dynamic", Some(0.7)),
        preset("cinematic", "Cinematic", "Film-like movement and pacing", 0.6, "cinematic", Some(0.5)),
    ]
}

/// Look up a motion preset by id.
pub fn motion_preset(id: &str) -> Option<MotionPreset> {
    motion_presets().into_iter().find(|p| p.id == id)
}

fn ratio_parts(aspect_ratio: &str) -> (f64, f64) {
    match aspect_ratio {
        "4:3" => (4.0, 3.0),
        "3:4" => (3.0, 4.0),
        "16:9" => (16.0, 9.0),
        "9:16" => (9.0, 16.0),
        "21:9" => (21.0, 9.0),
        "9:21" => (9.0, 21.0),
        "3:2" => (3.0, 2.0),
        "2:3" => (2.0, 3.0),
        _ => (1.0, 1.0),
    }
}

fn round_to(v: f64, step: f64) -> u32 {
    ((v / step).round() * step).max(step) as u32
}

/// Width and height for an aspect ratio such as `"16:9"`.
///
/// The longer side is `max_dimension`; both sides are rounded to the nearest
/// multiple of 64. Unknown ratios are treated as square.
pub fn dimensions_for_aspect_ratio(aspect_ratio: &str, max_dimension: u32) -> (u32, u32) {
    let (w, h) = ratio_parts(aspect_ratio);
    let scale = f64::from(max_dimension) / w.max(h);
    (round_to(w * scale, 64.0), round_to(h * scale, 64.0))
}

/// Fill in the missing side of a half-specified size so the pair keeps
/// `aspect_ratio`. The derived side is rounded to a multiple of 8, the
/// latent grid of the diffusion backends. Returns `None` unless exactly one
/// side is given.
pub fn complete_dimensions(
    aspect_ratio: &str,
    width: Option<u32>,
    height: Option<u32>,
) -> Option<(u32, u32)> {
    let (rw, rh) = ratio_parts(aspect_ratio);
    match (width, height) {
        (Some(w), None) => Some((w, round_to(f64::from(w) * rh / rw, 8.0))),
        (None, Some(h)) => Some((round_to(f64::from(h) * rw / rh, 8.0), h)),
        _ => None,
    }
}
