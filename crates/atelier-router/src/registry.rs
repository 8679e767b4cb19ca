//! The backend registry: a closed table of every external model host the
//! router can talk to.
//!
//! Each [`BackendDescriptor`] carries its own payload mapping function, so
//! adding a backend means adding one table row rather than editing a central
//! dispatch. The table is built once at startup and never mutated.

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::payload;
use crate::types::{GenerationRequest, Payload};

/// Grouping used for listing endpoints and for deciding which backends may
/// serve a [`Modality`](crate::types::Modality).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "image-gen")]
    ImageGen,
    #[serde(rename = "video-gen")]
    VideoGen,
    #[serde(rename = "chat")]
    Chat,
    #[serde(rename = "audio")]
    Audio,
    #[serde(rename = "image-edit")]
    ImageEdit,
    #[serde(rename = "upscale")]
    Upscale,
    #[serde(rename = "video-edit")]
    VideoEdit,
}

impl Category {
    pub const ALL: [Category; 7] = [
        Category::ImageGen,
        Category::VideoGen,
        Category::Chat,
        Category::Audio,
        Category::ImageEdit,
        Category::Upscale,
        Category::VideoEdit,
    ];

    /// The wire name, e.g. `"image-gen"`.
    pub fn as_str(self) -> &'static str {
        match self {
            Category::ImageGen => "image-gen",
            Category::VideoGen => "video-gen",
            Category::Chat => "chat",
            Category::Audio => "audio",
            Category::ImageEdit => "image-edit",
            Category::Upscale => "upscale",
            Category::VideoEdit => "video-edit",
        }
    }

    /// Parse a wire name. Returns `None` for unknown names.
    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.as_str() == s)
    }
}

/// Which transport speaks to the backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BackendKind {
    /// A Hugging Face Space exposing a Gradio app.
    GradioSpace,
    /// A model on the Hugging Face Inference API.
    HfInference,
    /// A model on Cloudflare Workers AI.
    CloudflareAi,
    /// Local echo of the source media; no network involved.
    Passthrough,
}

impl BackendKind {
    /// Provider label reported to API callers.
    pub fn provider_label(self) -> &'static str {
        match self {
            BackendKind::GradioSpace => "huggingface-spaces",
            BackendKind::HfInference => "huggingface-inference",
            BackendKind::CloudflareAi => "cloudflare-workers-ai",
            BackendKind::Passthrough => "passthrough",
        }
    }
}

/// A backend's pure mapping from a normalized request to its parameters.
pub type PayloadFn = fn(&BackendDescriptor, &GenerationRequest) -> Payload;

/// Static connection metadata for one backend.
#[derive(Debug, Clone)]
pub struct BackendDescriptor {
    /// Unique id (e.g. "flux-schnell").
    pub id: String,
    /// Human-readable name.
    pub display_name: String,
    pub description: String,
    /// Space id, model id, or Cloudflare model string.
    pub endpoint: String,
    pub category: Category,
    pub kind: BackendKind,
    /// Gradio API route (e.g. "/infer"). Ignored by non-Gradio kinds.
    pub api_path: Option<String>,
    /// Defaults consulted by the payload builder before hardcoded literals.
    pub default_params: Payload,
    /// Payload mapping owned by this backend.
    pub build: PayloadFn,
}

impl BackendDescriptor {
    /// Create a descriptor with no defaults and no api path.
    pub fn new(
        id: impl Into<String>,
        display_name: impl Into<String>,
        description: impl Into<String>,
        endpoint: impl Into<String>,
        category: Category,
        kind: BackendKind,
        build: PayloadFn,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            description: description.into(),
            endpoint: endpoint.into(),
            category,
            kind,
            api_path: None,
            default_params: Payload::new(),
            build,
        }
    }

    /// Set the Gradio API route.
    pub fn with_api_path(mut self, path: impl Into<String>) -> Self {
        self.api_path = Some(path.into());
        self
    }

    /// Set default parameters from a JSON object literal. Non-object values
    /// are ignored.
    pub fn with_defaults(mut self, defaults: Value) -> Self {
        if let Value::Object(map) = defaults {
            self.default_params = map;
        }
        self
    }

    /// The Gradio API route, falling back to `fallback` when unset.
    pub fn api_path_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.api_path.as_deref().unwrap_or(fallback)
    }

    /// Listing view of this backend.
    pub fn summary(&self) -> BackendSummary {
        BackendSummary {
            id: self.id.clone(),
            name: self.display_name.clone(),
            description: self.description.clone(),
            category: self.category,
            provider: self.kind.provider_label().to_string(),
        }
    }
}

/// The public, serializable view of a backend used by listing endpoints.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackendSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub category: Category,
    pub provider: String,
}

/// Lookup table of every known backend, in registration order.
#[derive(Debug, Clone)]
pub struct BackendRegistry {
    backends: Vec<BackendDescriptor>,
}

impl BackendRegistry {
    /// Build a registry from explicit descriptors. Later duplicates of an id
    /// are dropped so lookups stay unambiguous.
    pub fn from_descriptors(descriptors: Vec<BackendDescriptor>) -> Self {
        let mut backends: Vec<BackendDescriptor> = Vec::with_capacity(descriptors.len());
        for d in descriptors {
            if !backends.iter().any(|b| b.id == d.id) {
                backends.push(d);
            }
        }
        Self { backends }
    }

    /// The built-in table of supported providers.
    pub fn builtin() -> Self {
        Self::from_descriptors(builtin_backends())
    }

    /// Look up a backend by id.
    pub fn lookup(&self, id: &str) -> Option<&BackendDescriptor> {
        self.backends.iter().find(|b| b.id == id)
    }

    /// All backends in one category, in registration order.
    pub fn by_category(&self, category: Category) -> Vec<&BackendDescriptor> {
        self.backends
            .iter()
            .filter(|b| b.category == category)
            .collect()
    }

    /// All backends in registration order.
    pub fn all(&self) -> &[BackendDescriptor] {
        &self.backends
    }

    /// Ids of every backend in one category.
    pub fn ids_in(&self, category: Category) -> Vec<String> {
        self.by_category(category)
            .into_iter()
            .map(|b| b.id.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.backends.len()
    }

    pub fn is_empty(&self) -> bool {
        self.backends.is_empty()
    }
}

impl Default for BackendRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Returns the built-in backend table.
pub fn builtin_backends() -> Vec<BackendDescriptor> {
    use BackendKind::{CloudflareAi, GradioSpace, HfInference, Passthrough};
    use Category::*;

    vec![
        // Image generation
        BackendDescriptor::new(
            "flux-schnell",
            "FLUX.1 Schnell",
            "Ultra-fast 4-step image generation with excellent quality",
            "black-forest-labs/FLUX.1-schnell",
            ImageGen,
            GradioSpace,
            payload::flux,
        )
        .with_api_path("/infer")
        .with_defaults(json!({
            "seed": 0, "randomize_seed": true, "width": 1024, "height": 1024,
            "num_inference_steps": 4
        })),
        BackendDescriptor::new(
            "flux-dev",
            "FLUX.1 Dev",
            "High-quality FLUX model for detailed image generation",
            "black-forest-labs/FLUX.1-dev",
            ImageGen,
            GradioSpace,
            payload::flux,
        )
        .with_api_path("/infer")
        .with_defaults(json!({
            "seed": 0, "randomize_seed": true, "width": 1024, "height": 1024,
            "guidance_scale": 3.5, "num_inference_steps": 28
        })),
        BackendDescriptor::new(
            "sdxl-lightning",
            "SDXL Lightning",
            "ByteDance ultra-fast SDXL in 4 steps",
            "ByteDance/SDXL-Lightning",
            ImageGen,
            GradioSpace,
            payload::sdxl_lightning,
        )
        .with_api_path("/generate")
        .with_defaults(json!({ "ckpt": "4-Step" })),
        BackendDescriptor::new(
            "stable-diffusion-3",
            "Stable Diffusion 3.5 Large",
            "Latest SD model with improved text rendering",
            "stabilityai/stable-diffusion-3.5-large",
            ImageGen,
            GradioSpace,
            payload::stable_diffusion_3,
        )
        .with_api_path("/infer")
        .with_defaults(json!({
            "seed": 0, "randomize_seed": true, "width": 1024, "height": 1024,
            "guidance_scale": 4.5, "num_inference_steps": 40
        })),
        BackendDescriptor::new(
            "playground-v2",
            "Playground v2.5",
            "Aesthetic-focused model for artistic images",
            "playgroundai/playground-v2.5-1024px-aesthetic",
            ImageGen,
            GradioSpace,
            payload::playground,
        )
        .with_api_path("/run")
        .with_defaults(json!({ "guidance_scale": 3, "num_inference_steps": 25 })),
        BackendDescriptor::new(
            "kolors",
            "Kolors",
            "Kwai high-quality diffusion model",
            "Kwai-Kolors/Kolors",
            ImageGen,
            GradioSpace,
            payload::generic_image,
        )
        .with_api_path("/generate"),
        BackendDescriptor::new(
            "hf-sdxl",
            "Stable Diffusion XL",
            "High-quality 1024x1024 images with excellent detail",
            "stabilityai/stable-diffusion-xl-base-1.0",
            ImageGen,
            HfInference,
            payload::hf_text_to_image,
        )
        .with_defaults(json!({ "num_inference_steps": 30, "max_steps": 50 })),
        BackendDescriptor::new(
            "hf-sd3-medium",
            "Stable Diffusion 3 Medium",
            "Latest SD model with improved text rendering",
            "stabilityai/stable-diffusion-3-medium-diffusers",
            ImageGen,
            HfInference,
            payload::hf_text_to_image,
        )
        .with_defaults(json!({ "num_inference_steps": 28, "max_steps": 50 })),
        BackendDescriptor::new(
            "hf-flux-schnell",
            "FLUX.1 Schnell (Inference API)",
            "Ultra-fast generation (4 steps) with great quality",
            "black-forest-labs/FLUX.1-schnell",
            ImageGen,
            HfInference,
            payload::hf_text_to_image,
        )
        .with_defaults(json!({ "num_inference_steps": 4, "max_steps": 4 })),
        BackendDescriptor::new(
            "hf-flux-dev",
            "FLUX.1 Dev (Inference API)",
            "High-quality FLUX model for detailed generations",
            "black-forest-labs/FLUX.1-dev",
            ImageGen,
            HfInference,
            payload::hf_text_to_image,
        )
        .with_defaults(json!({ "num_inference_steps": 30, "max_steps": 50 })),
        BackendDescriptor::new(
            "hf-sdxl-turbo",
            "SDXL Turbo",
            "Lightning-fast single-step generation",
            "stabilityai/sdxl-turbo",
            ImageGen,
            HfInference,
            payload::hf_text_to_image,
        )
        .with_defaults(json!({ "num_inference_steps": 1, "max_steps": 4 })),
        BackendDescriptor::new(
            "hf-playground-v2",
            "Playground v2.5 (Inference API)",
            "Aesthetic-focused model for artistic images",
            "playgroundai/playground-v2.5-1024px-aesthetic",
            ImageGen,
            HfInference,
            payload::hf_text_to_image,
        )
        .with_defaults(json!({ "num_inference_steps": 30, "max_steps": 50 })),
        BackendDescriptor::new(
            "hf-kandinsky-3",
            "Kandinsky 3",
            "Multilingual model with unique artistic style",
            "kandinsky-community/kandinsky-3",
            ImageGen,
            HfInference,
            payload::hf_text_to_image,
        )
        .with_defaults(json!({ "num_inference_steps": 25, "max_steps": 50 })),
        BackendDescriptor::new(
            "cf-sdxl",
            "SDXL (Cloudflare)",
            "Stable Diffusion XL on Cloudflare Workers AI",
            "@cf/stabilityai/stable-diffusion-xl-base-1.0",
            ImageGen,
            CloudflareAi,
            payload::cloudflare_image,
        ),
        BackendDescriptor::new(
            "cf-dreamshaper",
            "DreamShaper 8 LCM (Cloudflare)",
            "Fast latent-consistency image model on Cloudflare Workers AI",
            "@cf/lykon/dreamshaper-8-lcm",
            ImageGen,
            CloudflareAi,
            payload::cloudflare_image,
        ),
        // Video generation
        BackendDescriptor::new(
            "animatediff-lightning",
            "AnimateDiff Lightning",
            "Fast text-to-video with AnimateDiff",
            "ByteDance/AnimateDiff-Lightning",
            VideoGen,
            GradioSpace,
            payload::animatediff,
        )
        .with_api_path("/generate")
        .with_defaults(json!({ "base": "ToonYou", "step": 4 })),
        BackendDescriptor::new(
            "i2vgen-xl",
            "I2VGen-XL",
            "High-quality image-to-video generation",
            "ali-vilab/i2vgen-xl",
            VideoGen,
            GradioSpace,
            payload::i2vgen,
        )
        .with_api_path("/predict"),
        BackendDescriptor::new(
            "cogvideox",
            "CogVideoX",
            "Advanced text-to-video model",
            "THUDM/CogVideoX-5B-Space",
            VideoGen,
            GradioSpace,
            payload::cogvideox,
        )
        .with_api_path("/generate"),
        BackendDescriptor::new(
            "hf-animatediff",
            "AnimateDiff (Inference API)",
            "Motion adapter for Stable Diffusion 1.5",
            "guoyww/animatediff-motion-adapter-v1-5-2",
            VideoGen,
            HfInference,
            payload::hf_text_to_video,
        )
        .with_defaults(json!({ "duration": 2, "max_duration": 4, "fps": 8 })),
        BackendDescriptor::new(
            "hf-stable-video-diffusion",
            "Stable Video Diffusion",
            "Image-to-video with smooth, consistent motion",
            "stabilityai/stable-video-diffusion-img2vid-xt",
            VideoGen,
            HfInference,
            payload::hf_text_to_video,
        )
        .with_defaults(json!({ "duration": 3, "max_duration": 4, "fps": 14 })),
        BackendDescriptor::new(
            "hf-modelscope",
            "ModelScope Text-to-Video",
            "Short clips from text prompts",
            "damo-vilab/text-to-video-ms-1.7b",
            VideoGen,
            HfInference,
            payload::hf_text_to_video,
        )
        .with_defaults(json!({ "duration": 2, "max_duration": 2, "fps": 8 })),
        BackendDescriptor::new(
            "hf-zeroscope",
            "Zeroscope v2",
            "Watermark-free 576w text-to-video",
            "cerspense/zeroscope_v2_576w",
            VideoGen,
            HfInference,
            payload::hf_text_to_video,
        )
        .with_defaults(json!({ "duration": 2, "max_duration": 3, "fps": 8 })),
        BackendDescriptor::new(
            "hf-text2video-zero",
            "Text2Video-Zero",
            "Zero-shot video from a text-to-image model",
            "PAIR/Text2Video-Zero",
            VideoGen,
            HfInference,
            payload::hf_text_to_video,
        )
        .with_defaults(json!({ "duration": 2, "max_duration": 2, "fps": 8 })),
        // Chat
        BackendDescriptor::new(
            "qwen-72b",
            "Qwen 2.5 72B Instruct",
            "Powerful 72B parameter model for complex tasks",
            "Qwen/Qwen2.5-72B-Instruct",
            Chat,
            GradioSpace,
            payload::gradio_chat,
        )
        .with_api_path("/model_chat")
        .with_defaults(json!({ "temperature": 0.7, "max_tokens": 2048 })),
        BackendDescriptor::new(
            "qwen-32b",
            "Qwen 2.5 32B Instruct",
            "Fast and capable 32B model",
            "Qwen/Qwen2.5-32B-Instruct",
            Chat,
            GradioSpace,
            payload::gradio_chat,
        )
        .with_api_path("/model_chat"),
        BackendDescriptor::new(
            "llama-3-70b",
            "Llama 3.1 70B",
            "Meta Llama 3.1 for general purpose chat",
            "meta-llama/Llama-3.1-70B-Instruct",
            Chat,
            GradioSpace,
            payload::gradio_chat,
        )
        .with_api_path("/chat"),
        BackendDescriptor::new(
            "mistral-nemo",
            "Mistral Nemo",
            "Efficient Mistral model for fast responses",
            "mistralai/Mistral-Nemo-Instruct-2407",
            Chat,
            GradioSpace,
            payload::gradio_chat,
        )
        .with_api_path("/chat"),
        BackendDescriptor::new(
            "gemma-2-27b",
            "Gemma 2 27B",
            "Google Gemma 2 with 27B parameters",
            "google/gemma-2-27b-it",
            Chat,
            GradioSpace,
            payload::gradio_chat,
        )
        .with_api_path("/chat"),
        BackendDescriptor::new(
            "cf-llama",
            "Llama 3.1 8B (Cloudflare)",
            "Meta Llama 3.1 8B Instruct on Cloudflare Workers AI",
            "@cf/meta/llama-3.1-8b-instruct",
            Chat,
            CloudflareAi,
            payload::cloudflare_chat,
        ),
        BackendDescriptor::new(
            "cf-llama-3b",
            "Llama 3.2 3B (Cloudflare)",
            "Small, fast Llama 3.2 Instruct on Cloudflare Workers AI",
            "@cf/meta/llama-3.2-3b-instruct",
            Chat,
            CloudflareAi,
            payload::cloudflare_chat,
        ),
        BackendDescriptor::new(
            "cf-mistral-7b",
            "Mistral 7B (Cloudflare)",
            "Mistral 7B Instruct on Cloudflare Workers AI",
            "@cf/mistral/mistral-7b-instruct-v0.1",
            Chat,
            CloudflareAi,
            payload::cloudflare_chat,
        ),
        BackendDescriptor::new(
            "cf-qwen-14b",
            "Qwen 1.5 14B (Cloudflare)",
            "Qwen 1.5 14B Chat (AWQ) on Cloudflare Workers AI",
            "@cf/qwen/qwen1.5-14b-chat-awq",
            Chat,
            CloudflareAi,
            payload::cloudflare_chat,
        ),
        // Audio
        BackendDescriptor::new(
            "musicgen",
            "MusicGen",
            "Generate music from text descriptions",
            "facebook/MusicGen",
            Audio,
            GradioSpace,
            payload::generic_audio,
        )
        .with_api_path("/predict")
        .with_defaults(json!({ "duration": 8 })),
        BackendDescriptor::new(
            "bark",
            "Bark",
            "Text-to-speech with emotions and music",
            "suno/bark",
            Audio,
            GradioSpace,
            payload::generic_audio,
        )
        .with_api_path("/predict"),
        // Image editing
        BackendDescriptor::new(
            "ic-light",
            "IC-Light",
            "Relight images with AI",
            "lllyasviel/IC-Light",
            ImageEdit,
            GradioSpace,
            payload::image_edit,
        )
        .with_api_path("/process"),
        BackendDescriptor::new(
            "instruct-pix2pix",
            "InstructPix2Pix",
            "Edit images with text instructions",
            "timbrooks/instruct-pix2pix",
            ImageEdit,
            GradioSpace,
            payload::image_edit,
        )
        .with_api_path("/predict"),
        BackendDescriptor::new(
            "remove-bg",
            "Remove Background",
            "Remove image backgrounds instantly",
            "ECCV2022/dis-background-removal",
            ImageEdit,
            GradioSpace,
            payload::image_only,
        )
        .with_api_path("/predict"),
        BackendDescriptor::new(
            "hf-rmbg",
            "RMBG 1.4",
            "Background removal on the Inference API",
            "briaai/RMBG-1.4",
            ImageEdit,
            HfInference,
            payload::hf_image_input,
        ),
        BackendDescriptor::new(
            "hf-sd-inpainting",
            "Stable Diffusion Inpainting",
            "Mask-guided object removal, replacement and outpainting",
            "runwayml/stable-diffusion-inpainting",
            ImageEdit,
            HfInference,
            payload::hf_inpaint,
        ),
        // Upscaling
        BackendDescriptor::new(
            "finegrain-enhancer",
            "Finegrain Image Enhancer",
            "4x image upscaling with detail enhancement",
            "finegrain/finegrain-image-enhancer",
            Upscale,
            GradioSpace,
            payload::image_only,
        )
        .with_api_path("/predict"),
        BackendDescriptor::new(
            "real-esrgan",
            "Real-ESRGAN",
            "General-purpose image upscaling",
            "ai-forever/Real-ESRGAN",
            Upscale,
            GradioSpace,
            payload::image_only,
        )
        .with_api_path("/predict"),
        BackendDescriptor::new(
            "hf-swin2sr",
            "Swin2SR x4",
            "Real-world 4x super-resolution on the Inference API",
            "caidas/swin2SR-realworld-sr-x4-64-bsrgan-psnr",
            Upscale,
            HfInference,
            payload::hf_upscale,
        )
        .with_defaults(json!({ "scale": 4 })),
        // Video editing
        BackendDescriptor::new(
            "video-passthrough",
            "Video Passthrough",
            "Returns the source video unchanged",
            "local/video-passthrough",
            VideoEdit,
            Passthrough,
            payload::passthrough,
        ),
    ]
}
