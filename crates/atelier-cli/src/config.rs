//! Configuration file discovery and loading.
//!
//! The discovery order is:
//! 1. `--config <path>` flag.
//! 2. `ATELIER_CONFIG` environment variable.
//! 3. `~/.atelier/config.json`
//! 4. If none found, defaults.

use std::path::{Path, PathBuf};

use atelier_router::RouterConfig;
use serde::{Deserialize, Serialize};

/// Environment variable naming an explicit config file.
pub const CONFIG_ENV: &str = "ATELIER_CONFIG";

/// Top-level configuration for the `atelier` binary.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AppConfig {
    pub server: ServerConfig,
    pub router: RouterConfig,
}

/// HTTP listener settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Allowed CORS origins. Empty echoes any origin.
    pub cors_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".into(),
            port: 3000,
            cors_origins: Vec::new(),
        }
    }
}

/// Discover the config file path from the environment or home directory.
///
/// `ATELIER_CONFIG` is returned as-is; the home path only when it exists.
pub fn discover_config_path(home_dir: Option<PathBuf>) -> Option<PathBuf> {
    if let Ok(env_path) = std::env::var(CONFIG_ENV)
        && !env_path.trim().is_empty()
    {
        return Some(PathBuf::from(env_path));
    }
    let path = home_dir?.join(".atelier").join("config.json");
    path.exists().then_some(path)
}

/// Load configuration from the given path override or via auto-discovery.
///
/// An explicit override that does not exist is an error. A discovered path
/// that does not exist falls back to defaults.
pub async fn load_config(config_override: Option<&str>) -> anyhow::Result<AppConfig> {
    if let Some(path_str) = config_override {
        let path = Path::new(path_str);
        if !path.exists() {
            anyhow::bail!("config file not found: {path_str}");
        }
        return read_config(path).await;
    }

    let Some(path) = discover_config_path(dirs::home_dir()) else {
        tracing::info!("no config file found, using defaults");
        return Ok(AppConfig::default());
    };
    if !path.exists() {
        tracing::warn!(
            path = %path.display(),
            "config path does not exist, using defaults"
        );
        return Ok(AppConfig::default());
    }
    read_config(&path).await
}

async fn read_config(path: &Path) -> anyhow::Result<AppConfig> {
    tracing::debug!(path = %path.display(), "loading config file");
    let contents = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| anyhow::anyhow!("failed to read config file {}: {e}", path.display()))?;
    let config = serde_json::from_str(&contents)
        .map_err(|e| anyhow::anyhow!("failed to parse config file {}: {e}", path.display()))?;
    Ok(config)
}
