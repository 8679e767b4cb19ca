//! Response normalization.
//!
//! Backends answer in many shapes: a bare URL string, a Gradio file object
//! with `url`/`path`, arrays of either, a Cloudflare JSON envelope, or raw
//! image bytes. [`normalize`] folds all of them into a [`NormalizedPayload`].
//! Shapes it does not recognize produce an empty payload rather than an
//! error; the router decides what an empty payload means.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde_json::Value;
use tracing::trace;

use crate::registry::BackendDescriptor;
use crate::types::{ChatTurn, Modality, NormalizedPayload, RawResponse};

/// Normalize a raw backend response for `modality`.
pub fn normalize(raw: &RawResponse, backend: &BackendDescriptor, modality: Modality) -> NormalizedPayload {
    let normalized = if modality.is_text() {
        normalize_text(raw)
    } else {
        NormalizedPayload::Media {
            urls: normalize_media(raw),
        }
    };
    if normalized.is_empty() {
        trace!(backend = %backend.id, %modality, "response normalized to empty payload");
    }
    normalized
}

fn normalize_media(raw: &RawResponse) -> Vec<String> {
    match raw {
        RawResponse::Binary { bytes, content_type } => {
            if bytes.is_empty() {
                Vec::new()
            } else {
                vec![data_url(bytes, content_type)]
            }
        }
        RawResponse::Json(value) => {
            let mut urls = Vec::new();
            collect_media(value, &mut urls);
            urls
        }
    }
}

/// Encode bytes as a `data:` URL.
pub fn data_url(bytes: &[u8], content_type: &str) -> String {
    let mime = if content_type.trim().is_empty() {
        "application/octet-stream"
    } else {
        content_type
    };
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

fn collect_media(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) if !s.is_empty() => out.push(s.clone()),
        Value::Object(map) => {
            let reference = ["url", "path", "video_url"]
                .iter()
                .filter_map(|k| map.get(*k).and_then(Value::as_str))
                .find(|s| !s.is_empty());
            match reference {
                Some(r) => out.push(r.to_string()),
                // Gradio wraps video and gallery files one level deep.
                None => {
                    for key in ["video", "image"] {
                        if let Some(inner) = map.get(key) {
                            collect_media(inner, out);
                        }
                    }
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                collect_media(item, out);
            }
        }
        _ => {}
    }
}

fn normalize_text(raw: &RawResponse) -> NormalizedPayload {
    let (response, history) = match raw {
        RawResponse::Json(Value::String(s)) => (s.clone(), Vec::new()),
        RawResponse::Json(Value::Array(items)) => {
            let history = items.get(1).map(parse_history).unwrap_or_default();
            let mut response = items.first().map(scalar_text).unwrap_or_default();
            // Chatbot UIs often clear the textbox and put the reply in history.
            if response.is_empty()
                && let Some((_, last)) = history.last()
            {
                response = last.clone();
            }
            (response, history)
        }
        RawResponse::Json(Value::Object(map)) => {
            let response = map
                .get("result")
                .and_then(|r| r.get("response"))
                .or_else(|| map.get("response"))
                .and_then(Value::as_str)
                .unwrap_or_default()
                .to_string();
            (response, Vec::new())
        }
        _ => (String::new(), Vec::new()),
    };
    NormalizedPayload::Text { response, history }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(b) => b.to_string(),
        _ => String::new(),
    }
}

/// Parse `[[user, assistant], ...]` history, skipping malformed turns.
fn parse_history(value: &Value) -> Vec<ChatTurn> {
    let Some(turns) = value.as_array() else {
        return Vec::new();
    };
    turns
        .iter()
        .filter_map(|turn| {
            let pair = turn.as_array()?;
            let user = pair.first()?.as_str().unwrap_or_default();
            let assistant = pair.get(1)?.as_str().unwrap_or_default();
            Some((user.to_string(), assistant.to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::BackendRegistry;
    use serde_json::json;

    fn media(raw: RawResponse) -> Vec<String> {
        let reg = BackendRegistry::builtin();
        let backend = reg.lookup("flux-schnell").unwrap();
        normalize(&raw, backend, Modality::ImageGeneration)
            .urls()
            .to_vec()
    }

    fn text(raw: RawResponse) -> NormalizedPayload {
        let reg = BackendRegistry::builtin();
        normalize(&raw, reg.lookup("qwen-72b").unwrap(), Modality::Chat)
    }

    #[test]
    fn bare_string_is_a_reference() {
        assert_eq!(
            media(RawResponse::Json(json!("https://x/y.png"))),
            ["https://x/y.png"]
        );
    }

    #[test]
    fn array_of_strings_keeps_order() {
        let urls = media(RawResponse::Json(json!(["https://x/1.png", "https://x/2.png"])));
        assert_eq!(urls, ["https://x/1.png", "https://x/2.png"]);
    }

    #[test]
    fn object_prefers_url_over_path() {
        let urls = media(RawResponse::Json(json!({ "path": "/tmp/a.png", "url": "https://x/a.png" })));
        assert_eq!(urls, ["https://x/a.png"]);
        let urls = media(RawResponse::Json(json!({ "path": "/tmp/a.png", "url": null })));
        assert_eq!(urls, ["/tmp/a.png"]);
    }

    #[test]
    fn gradio_output_array_skips_scalars() {
        let raw = json!([{ "url": "https://x/out.webp", "path": "/tmp/out.webp" }, 1234]);
        assert_eq!(media(RawResponse::Json(raw)), ["https://x/out.webp"]);
    }

    #[test]
    fn nested_video_object() {
        let raw = json!([{ "video": { "url": "https://x/v.mp4" }, "subtitles": null }]);
        assert_eq!(media(RawResponse::Json(raw)), ["https://x/v.mp4"]);
    }

    #[test]
    fn inference_video_url_field() {
        let raw = json!({ "video_url": "https://x/clip.mp4" });
        assert_eq!(media(RawResponse::Json(raw)), ["https://x/clip.mp4"]);
    }

    #[test]
    fn binary_becomes_data_url() {
        let urls = media(RawResponse::Binary {
            bytes: vec![1, 2, 3],
            content_type: "image/png".into(),
        });
        assert_eq!(urls, ["data:image/png;base64,AQID"]);
    }

    #[test]
    fn unrecognized_shapes_are_empty() {
        assert!(media(RawResponse::Json(json!(null))).is_empty());
        assert!(media(RawResponse::Json(json!({ "status": "queued" }))).is_empty());
        assert!(media(RawResponse::Json(json!(""))).is_empty());
        assert!(
            media(RawResponse::Binary {
                bytes: vec![],
                content_type: "image/png".into()
            })
            .is_empty()
        );
    }

    #[test]
    fn chat_array_with_history() {
        let raw = RawResponse::Json(json!(["Hello!", [["hi", "Hello!"]]]));
        assert_eq!(
            text(raw),
            NormalizedPayload::Text {
                response: "Hello!".into(),
                history: vec![("hi".into(), "Hello!".into())],
            }
        );
    }

    #[test]
    fn chat_reply_taken_from_history_when_textbox_cleared() {
        let raw = RawResponse::Json(json!(["", [["hi", "there"]], "system"]));
        match text(raw) {
            NormalizedPayload::Text { response, .. } => assert_eq!(response, "there"),
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn cloudflare_envelope() {
        let raw = RawResponse::Json(json!({ "result": { "response": "ok" }, "success": true }));
        match text(raw) {
            NormalizedPayload::Text { response, history } => {
                assert_eq!(response, "ok");
                assert!(history.is_empty());
            }
            other => panic!("unexpected payload: {other:?}"),
        }
    }

    #[test]
    fn chat_binary_is_empty() {
        let raw = RawResponse::Binary {
            bytes: b"hi".to_vec(),
            content_type: "text/plain".into(),
        };
        assert!(text(raw).is_empty());
    }
}
