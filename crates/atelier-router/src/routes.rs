//! Logical model ids, aliases, and fallback chains per modality.
//!
//! Callers name models loosely ("flux", "llama", an edit operation such as
//! "upscale"). A [`RouteTable`] turns that name into a primary backend id and
//! an ordered candidate list. Resolution never fails: unknown names resolve
//! to the modality's default backend.

use crate::registry::{BackendRegistry, Category};
use crate::types::Modality;

/// Alias table and fallback chain for one modality.
#[derive(Debug, Clone)]
pub struct RouteTable {
    pub modality: Modality,
    /// `(logical id, backend id)` pairs.
    aliases: Vec<(String, String)>,
    /// Registry categories a logical id may name directly.
    categories: Vec<Category>,
    default_backend: String,
    fallbacks: Vec<String>,
    /// Fallback chains that replace `fallbacks` for a specific primary.
    chains: Vec<(String, Vec<String>)>,
}

impl RouteTable {
    pub fn new(modality: Modality, default_backend: impl Into<String>) -> Self {
        Self {
            modality,
            aliases: Vec::new(),
            categories: Vec::new(),
            default_backend: default_backend.into(),
            fallbacks: Vec::new(),
            chains: Vec::new(),
        }
    }

    pub fn alias(mut self, logical: &str, backend: &str) -> Self {
        self.aliases.push((logical.to_string(), backend.to_string()));
        self
    }

    pub fn categories(mut self, categories: &[Category]) -> Self {
        self.categories = categories.to_vec();
        self
    }

    pub fn fallbacks(mut self, ids: &[&str]) -> Self {
        self.fallbacks = ids.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn chain(mut self, primary: &str, ids: &[&str]) -> Self {
        self.chains.push((
            primary.to_string(),
            ids.iter().map(|s| s.to_string()).collect(),
        ));
        self
    }

    /// The backend used when a logical id is absent or unknown.
    pub fn default_backend(&self) -> &str {
        &self.default_backend
    }

    /// Every alias key, in declaration order.
    pub fn alias_keys(&self) -> impl Iterator<Item = &str> {
        self.aliases.iter().map(|(k, _)| k.as_str())
    }

    /// Resolve a logical id to a primary backend id.
    ///
    /// Order: alias table, then a registry id in one of the table's
    /// categories, then the default.
    pub fn resolve(&self, logical: Option<&str>, registry: &BackendRegistry) -> String {
        let Some(logical) = logical.map(str::trim).filter(|s| !s.is_empty()) else {
            return self.default_backend.clone();
        };
        if let Some((_, backend)) = self.aliases.iter().find(|(k, _)| k == logical) {
            return backend.clone();
        }
        match registry.lookup(logical) {
            Some(b) if self.categories.contains(&b.category) => b.id.clone(),
            _ => self.default_backend.clone(),
        }
    }

    /// Fixed fallback list for `primary`, before deduplication.
    pub fn fallbacks_for(&self, primary: &str) -> &[String] {
        self.chains
            .iter()
            .find(|(p, _)| p == primary)
            .map(|(_, ids)| ids.as_slice())
            .unwrap_or(self.fallbacks.as_slice())
    }

    /// `[primary] ++ (fallbacks - primary)`, deduplicated, primary first.
    pub fn candidates(&self, primary: &str) -> Vec<String> {
        let mut out = vec![primary.to_string()];
        for id in self.fallbacks_for(primary) {
            if !out.contains(id) {
                out.push(id.clone());
            }
        }
        out
    }
}

/// Route tables for every modality.
#[derive(Debug, Clone)]
pub struct Routes {
    tables: Vec<RouteTable>,
}

impl Routes {
    pub fn from_tables(tables: Vec<RouteTable>) -> Self {
        Self { tables }
    }

    /// The built-in tables.
    pub fn builtin() -> Self {
        Self::from_tables(builtin_tables())
    }

    /// The table for `modality`.
    ///
    /// Every modality has a built-in table; a table set missing one falls back
    /// to an empty table whose default is the empty id, which the registry
    /// will not find.
    pub fn table(&self, modality: Modality) -> RouteTable {
        self.tables
            .iter()
            .find(|t| t.modality == modality)
            .cloned()
            .unwrap_or_else(|| RouteTable::new(modality, ""))
    }

    pub fn tables(&self) -> &[RouteTable] {
        &self.tables
    }
}

impl Default for Routes {
    fn default() -> Self {
        Self::builtin()
    }
}

fn builtin_tables() -> Vec<RouteTable> {
    let image = RouteTable::new(Modality::ImageGeneration, "flux-schnell")
        .categories(&[Category::ImageGen])
        .alias("flux", "flux-schnell")
        .alias("sdxl", "sdxl-lightning")
        .alias("sd3", "stable-diffusion-3")
        .alias("playground", "playground-v2")
        .alias("stable-diffusion-xl", "hf-sdxl")
        .alias("sd3-medium", "hf-sd3-medium")
        .alias("sdxl-turbo", "hf-sdxl-turbo")
        .alias("kandinsky", "hf-kandinsky-3")
        .alias("kandinsky-3", "hf-kandinsky-3")
        .alias("dreamshaper", "cf-dreamshaper")
        .fallbacks(&["flux-schnell", "sdxl-lightning", "stable-diffusion-3", "hf-flux-schnell"]);

    let video = RouteTable::new(Modality::VideoGeneration, "animatediff-lightning")
        .categories(&[Category::VideoGen])
        .alias("animatediff", "animatediff-lightning")
        .alias("i2vgen", "i2vgen-xl")
        .alias("stable-video-diffusion", "hf-stable-video-diffusion")
        .alias("svd", "hf-stable-video-diffusion")
        .alias("modelscope", "hf-modelscope")
        .alias("zeroscope", "hf-zeroscope")
        .alias("text2video-zero", "hf-text2video-zero")
        .fallbacks(&["animatediff-lightning", "cogvideox", "hf-modelscope"]);

    let chat = RouteTable::new(Modality::Chat, "qwen-72b")
        .categories(&[Category::Chat])
        .alias("qwen", "qwen-72b")
        .alias("llama", "llama-3-70b")
        .alias("llama-70b", "llama-3-70b")
        .alias("mistral", "mistral-nemo")
        .alias("gemma", "gemma-2-27b")
        .alias("llama-3b", "cf-llama-3b")
        .alias("mistral-7b", "cf-mistral-7b")
        .alias("qwen-14b", "cf-qwen-14b")
        .fallbacks(&["qwen-72b", "llama-3-70b", "mistral-nemo", "cf-llama"]);

    let image_edit = RouteTable::new(Modality::ImageEdit, "instruct-pix2pix")
        .categories(&[Category::ImageEdit, Category::Upscale])
        .alias("upscale", "finegrain-enhancer")
        .alias("denoise", "finegrain-enhancer")
        .alias("enhance", "finegrain-enhancer")
        .alias("background-remove", "remove-bg")
        .alias("background-replace", "hf-sd-inpainting")
        .alias("inpaint", "hf-sd-inpainting")
        .alias("outpaint", "hf-sd-inpainting")
        .alias("style-transfer", "instruct-pix2pix")
        .alias("colorize", "instruct-pix2pix")
        .alias("relight", "ic-light")
        .chain("finegrain-enhancer", &["real-esrgan", "hf-swin2sr"])
        .chain("remove-bg", &["hf-rmbg"])
        .chain("hf-sd-inpainting", &["instruct-pix2pix"]);

    let video_edit = RouteTable::new(Modality::VideoEdit, "video-passthrough")
        .categories(&[Category::VideoEdit]);

    vec![image, video, chat, image_edit, video_edit]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_alias_and_default_exists_in_registry() {
        let reg = BackendRegistry::builtin();
        for table in Routes::builtin().tables() {
            assert!(reg.lookup(table.default_backend()).is_some());
            for key in table.alias_keys() {
                let id = table.resolve(Some(key), &reg);
                assert!(reg.lookup(&id).is_some(), "{key} -> {id} missing");
            }
            for id in table.candidates(table.default_backend()) {
                assert!(reg.lookup(&id).is_some(), "fallback {id} missing");
            }
        }
    }

    #[test]
    fn unknown_ids_resolve_to_default() {
        let reg = BackendRegistry::builtin();
        let routes = Routes::builtin();
        let image = routes.table(Modality::ImageGeneration);
        assert_eq!(image.resolve(Some("dall-e-9"), &reg), "flux-schnell");
        assert_eq!(image.resolve(None, &reg), "flux-schnell");
        assert_eq!(image.resolve(Some("  "), &reg), "flux-schnell");
        // A chat backend is not a valid image model.
        assert_eq!(image.resolve(Some("qwen-72b"), &reg), "flux-schnell");
    }

    #[test]
    fn direct_ids_resolve_to_themselves() {
        let reg = BackendRegistry::builtin();
        let routes = Routes::builtin();
        assert_eq!(routes.table(Modality::ImageGeneration).resolve(Some("kolors"), &reg), "kolors");
        assert_eq!(routes.table(Modality::Chat).resolve(Some("cf-llama"), &reg), "cf-llama");
        assert_eq!(routes.table(Modality::Chat).resolve(Some("llama-70b"), &reg), "llama-3-70b");
    }

    #[test]
    fn candidates_put_primary_first_without_repeats() {
        let image = Routes::builtin().table(Modality::ImageGeneration);
        assert_eq!(
            image.candidates("sdxl-lightning"),
            ["sdxl-lightning", "flux-schnell", "stable-diffusion-3", "hf-flux-schnell"]
        );
        assert_eq!(
            image.candidates("kolors"),
            ["kolors", "flux-schnell", "sdxl-lightning", "stable-diffusion-3", "hf-flux-schnell"]
        );
    }

    #[test]
    fn upscale_operations_fall_back_to_esrgan() {
        let reg = BackendRegistry::builtin();
        let edit = Routes::builtin().table(Modality::ImageEdit);
        let primary = edit.resolve(Some("upscale"), &reg);
        assert_eq!(
            edit.candidates(&primary),
            ["finegrain-enhancer", "real-esrgan", "hf-swin2sr"]
        );
        let primary = edit.resolve(Some("colorize"), &reg);
        assert_eq!(edit.candidates(&primary), ["instruct-pix2pix"]);
    }

    #[test]
    fn inference_backends_back_up_spaces() {
        let reg = BackendRegistry::builtin();
        let routes = Routes::builtin();

        let edit = routes.table(Modality::ImageEdit);
        let primary = edit.resolve(Some("background-remove"), &reg);
        assert_eq!(edit.candidates(&primary), ["remove-bg", "hf-rmbg"]);
        let primary = edit.resolve(Some("inpaint"), &reg);
        assert_eq!(edit.candidates(&primary), ["hf-sd-inpainting", "instruct-pix2pix"]);

        let video = routes.table(Modality::VideoGeneration);
        assert_eq!(video.resolve(Some("zeroscope"), &reg), "hf-zeroscope");
        assert_eq!(
            video.candidates("hf-zeroscope"),
            ["hf-zeroscope", "animatediff-lightning", "cogvideox", "hf-modelscope"]
        );

        let chat = routes.table(Modality::Chat);
        assert_eq!(chat.resolve(Some("mistral-7b"), &reg), "cf-mistral-7b");
        assert_eq!(
            chat.candidates("qwen-72b"),
            ["qwen-72b", "llama-3-70b", "mistral-nemo", "cf-llama"]
        );
    }

    #[test]
    fn video_edit_always_passthrough() {
        let reg = BackendRegistry::builtin();
        let edit = Routes::builtin().table(Modality::VideoEdit);
        assert_eq!(edit.resolve(Some("trim"), &reg), "video-passthrough");
    }
}
