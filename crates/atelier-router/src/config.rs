//! Router configuration.
//!
//! [`RouterConfig`] holds the base URLs of the hosted inference services, the
//! names of the environment variables that carry their credentials, and the
//! per-call timeouts. Secrets are never stored in the config itself; they are
//! resolved from the environment at request time.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Connection settings shared by every backend transport.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct RouterConfig {
    /// Hugging Face Hub base URL, used to resolve a Space's host.
    pub hub_url: String,

    /// Hugging Face Inference API base URL (models are appended as a path).
    pub hf_inference_url: String,

    /// Cloudflare REST API base URL.
    pub cloudflare_api_url: String,

    /// Environment variable holding an optional Hugging Face token.
    pub hf_token_env: String,

    /// Environment variable holding the Cloudflare account id.
    pub cloudflare_account_env: String,

    /// Environment variable holding the Cloudflare API token.
    pub cloudflare_token_env: String,

    /// Deadline for image/video generation and edit calls.
    pub generation_timeout_secs: u64,

    /// Deadline for buffered chat calls.
    pub chat_timeout_secs: u64,

    /// Deadline for a whole streamed chat response.
    pub stream_timeout_secs: u64,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            hub_url: "https://huggingface.co".into(),
            hf_inference_url: "https://api-inference.huggingface.co/models".into(),
            cloudflare_api_url: "https://api.cloudflare.com/client/v4".into(),
            hf_token_env: "HF_TOKEN".into(),
            cloudflare_account_env: "CLOUDFLARE_ACCOUNT_ID".into(),
            cloudflare_token_env: "CLOUDFLARE_API_TOKEN".into(),
            generation_timeout_secs: 120,
            chat_timeout_secs: 30,
            stream_timeout_secs: 120,
        }
    }
}

impl RouterConfig {
    /// Timeout applied to a single generation or edit call.
    pub fn generation_timeout(&self) -> Duration {
        Duration::from_secs(self.generation_timeout_secs)
    }

    /// Timeout applied to a single buffered chat call.
    pub fn chat_timeout(&self) -> Duration {
        Duration::from_secs(self.chat_timeout_secs)
    }

    /// Timeout applied to a streamed chat response from start to finish.
    pub fn stream_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_timeout_secs)
    }

    /// Read an optional secret from the environment variable named `env`.
    ///
    /// Empty values are treated as unset.
    pub fn secret(env: &str) -> Option<String> {
        std::env::var(env).ok().filter(|v| !v.trim().is_empty())
    }
}
