//! Initialize the configuration directory: create ~/.hfbot and a default config file.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

use crate::config::{self, Config, DEFAULT_MODEL_PREFIX};

/// Default config written by `hfbot init`: every section spelled out so it can be edited in place.
pub fn default_config_json() -> Result<String> {
    let mut config = Config::default();
    config.matrix.homeserver_url = Some("https://matrix.org".to_string());
    config.inference.model_prefix = Some(DEFAULT_MODEL_PREFIX.to_string());
    serde_json::to_string_pretty(&config).context("serializing default config")
}

/// Create the config directory and default files if they do not exist.
/// - Creates the config directory (parent of config file path).
/// - Writes `config.json` with the default config if missing; an existing file is left untouched.
pub fn init_config_dir(config_path: &Path) -> Result<PathBuf> {
    let config_dir = config::config_dir(config_path);
    std::fs::create_dir_all(config_dir)
        .with_context(|| format!("creating config directory {}", config_dir.display()))?;

    if !config_path.exists() {
        std::fs::write(config_path, default_config_json()?)
            .with_context(|| format!("writing default config to {}", config_path.display()))?;
        log::info!("created default config at {}", config_path.display());
    } else {
        log::debug!("config already exists at {}, skipping", config_path.display());
    }

    Ok(config_dir.to_path_buf())
}
