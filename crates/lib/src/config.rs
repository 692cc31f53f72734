//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.hfbot/config.json`) and environment.
//! Environment variables override the file for secrets and deployment-specific values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Placeholder replaced by the user's question in the model prefix template.
pub const QUESTION_PLACEHOLDER: &str = "${question}";

/// Model prefix used when neither config nor HF_MODEL_PREFIX sets one (ChatML-style turn markers).
pub const DEFAULT_MODEL_PREFIX: &str =
    "<|im_start|>user<|im_sep|>${question}<|im_end|><|im_start|>assistant<|im_sep|>";

const DEFAULT_ERROR_MESSAGE: &str = "Something went wrong, please try again.";

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// Matrix connection and reply behaviour.
    #[serde(default)]
    pub matrix: MatrixConfig,

    /// Text-generation endpoint settings.
    #[serde(default)]
    pub inference: InferenceConfig,
}

/// Matrix account and reply settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixConfig {
    /// Homeserver base URL, e.g. `https://matrix.org`. Overridden by MATRIX_HOMESERVER_URL env.
    pub homeserver_url: Option<String>,
    /// Full bot user id (`@bot:example.org`). Overridden by MATRIX_BOT_USERNAME env.
    pub user_id: Option<String>,
    /// Access token of an existing session. Overridden by MATRIX_ACCESS_TOKEN env.
    pub access_token: Option<String>,
    /// Device id of that session. When unset a fixed bot device id is used.
    pub device_id: Option<String>,
    /// Directory for the matrix-sdk state store. Relative paths are resolved against the config file's parent; default `matrix-store`.
    pub store_path: Option<PathBuf>,
    /// When set, only messages starting with this prefix (e.g. "!gpt") are answered, outside threads the bot already joined.
    pub prefix: Option<String>,
    /// Reply in a thread rooted at the question (default true).
    #[serde(default = "default_true")]
    pub threads: bool,
    /// Render replies as markdown HTML (default true).
    #[serde(default = "default_true")]
    pub rich_text: bool,
    /// Join rooms the bot is invited to (default true).
    #[serde(default = "default_true")]
    pub auto_join: bool,
    /// Typing indicator timeout while waiting for the model, in milliseconds (default 10000).
    #[serde(default = "default_typing_timeout_ms")]
    pub typing_timeout_ms: u64,
    /// Text posted into the room when answering fails.
    pub error_message: Option<String>,
}

/// Inference endpoint settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InferenceConfig {
    /// Full URL of the text-generation endpoint. Overridden by HF_ENDPOINT_URL env.
    pub endpoint_url: Option<String>,
    /// API token sent as bearer auth. Overridden by HF_TOKEN env.
    pub token: Option<String>,
    /// Prompt template containing `${question}`. Overridden by HF_MODEL_PREFIX env.
    pub model_prefix: Option<String>,
    /// Cap on generated tokens (default 1024). Overridden by HF_MAX_NEW_TOKENS env.
    #[serde(default = "default_max_new_tokens")]
    pub max_new_tokens: u32,
    /// Optional system text placed before the template, followed by the current date.
    pub system_prompt: Option<String>,
}

fn default_true() -> bool {
    true
}

fn default_typing_timeout_ms() -> u64 {
    10_000
}

fn default_max_new_tokens() -> u32 {
    1024
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            homeserver_url: None,
            user_id: None,
            access_token: None,
            device_id: None,
            store_path: None,
            prefix: None,
            threads: default_true(),
            rich_text: default_true(),
            auto_join: default_true(),
            typing_timeout_ms: default_typing_timeout_ms(),
            error_message: None,
        }
    }
}

impl Default for InferenceConfig {
    fn default() -> Self {
        Self {
            endpoint_url: None,
            token: None,
            model_prefix: None,
            max_new_tokens: default_max_new_tokens(),
            system_prompt: None,
        }
    }
}

/// Trimmed, non-empty value of an env var.
fn env_non_empty(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

/// Trimmed, non-empty config value.
fn non_empty(value: Option<&String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Resolve the homeserver URL: env MATRIX_HOMESERVER_URL overrides config.
pub fn resolve_homeserver_url(config: &Config) -> Option<String> {
    env_non_empty("MATRIX_HOMESERVER_URL").or_else(|| non_empty(config.matrix.homeserver_url.as_ref()))
}

/// Resolve the bot user id: env MATRIX_BOT_USERNAME overrides config.
pub fn resolve_bot_user_id(config: &Config) -> Option<String> {
    env_non_empty("MATRIX_BOT_USERNAME").or_else(|| non_empty(config.matrix.user_id.as_ref()))
}

/// Resolve the Matrix access token: env MATRIX_ACCESS_TOKEN overrides config.
pub fn resolve_access_token(config: &Config) -> Option<String> {
    env_non_empty("MATRIX_ACCESS_TOKEN").or_else(|| non_empty(config.matrix.access_token.as_ref()))
}

/// Resolve the inference endpoint URL: env HF_ENDPOINT_URL overrides config.
pub fn resolve_endpoint_url(config: &Config) -> Option<String> {
    env_non_empty("HF_ENDPOINT_URL").or_else(|| non_empty(config.inference.endpoint_url.as_ref()))
}

/// Resolve the inference API token: env HF_TOKEN overrides config.
pub fn resolve_hf_token(config: &Config) -> Option<String> {
    env_non_empty("HF_TOKEN").or_else(|| non_empty(config.inference.token.as_ref()))
}

/// Resolve the model prefix template: env HF_MODEL_PREFIX, then config, then [`DEFAULT_MODEL_PREFIX`].
pub fn resolve_model_prefix(config: &Config) -> String {
    let prefix = std::env::var("HF_MODEL_PREFIX")
        .ok()
        .filter(|s| !s.trim().is_empty())
        .or_else(|| {
            config
                .inference
                .model_prefix
                .clone()
                .filter(|s| !s.trim().is_empty())
        })
        .unwrap_or_else(|| DEFAULT_MODEL_PREFIX.to_string());
    if !prefix.contains(QUESTION_PLACEHOLDER) {
        log::warn!(
            "model prefix has no {} placeholder; the question will not be sent",
            QUESTION_PLACEHOLDER
        );
    }
    prefix
}

/// Resolve max new tokens: env HF_MAX_NEW_TOKENS overrides config. Unparseable env values are ignored.
pub fn resolve_max_new_tokens(config: &Config) -> u32 {
    match env_non_empty("HF_MAX_NEW_TOKENS") {
        Some(raw) => parse_max_new_tokens(&raw).unwrap_or_else(|| {
            log::warn!("ignoring invalid HF_MAX_NEW_TOKENS value: {}", raw);
            config.inference.max_new_tokens
        }),
        None => config.inference.max_new_tokens,
    }
}

fn parse_max_new_tokens(raw: &str) -> Option<u32> {
    raw.trim().parse::<u32>().ok().filter(|n| *n > 0)
}

/// Text posted into the room when answering fails.
pub fn resolve_error_message(config: &Config) -> String {
    non_empty(config.matrix.error_message.as_ref())
        .unwrap_or_else(|| DEFAULT_ERROR_MESSAGE.to_string())
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("HFBOT_CONFIG_PATH").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".hfbot").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

/// Parent directory of the config file (`.` when the path has none).
pub fn config_dir(config_path: &Path) -> &Path {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

/// Resolve the matrix-sdk store directory: `matrix.storePath` if set (relative paths resolved against the config file's parent), otherwise `matrix-store` next to the config file.
pub fn resolve_store_path(config: &Config, config_path: &Path) -> PathBuf {
    let parent = config_dir(config_path);
    match &config.matrix.store_path {
        Some(p) if !p.as_os_str().is_empty() => {
            if p.is_absolute() {
                p.clone()
            } else {
                parent.join(p)
            }
        }
        _ => parent.join("matrix-store"),
    }
}

/// Load config from the given path, or the default path (or HFBOT_CONFIG_PATH). Missing file => default config.
/// Returns the config and the path that was used.
pub fn load_config(path: Option<PathBuf>) -> Result<(Config, PathBuf)> {
    let path = path.unwrap_or_else(default_config_path);
    let config = if !path.exists() {
        log::debug!("config file not found, using defaults: {}", path.display());
        Config::default()
    } else {
        let s = std::fs::read_to_string(&path)
            .with_context(|| format!("reading config from {}", path.display()))?;
        serde_json::from_str(&s)
            .with_context(|| format!("parsing config from {}", path.display()))?
    };
    Ok((config, path))
}
