//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.assist/config.json`) and environment.
//! Secrets (verify token, page access token) may come from the environment so the
//! file can be committed without them.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level application config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// HTTP server settings.
    #[serde(default)]
    pub gateway: GatewayConfig,

    /// Messaging platform settings (webhook handshake, Send API).
    #[serde(default)]
    pub messenger: MessengerConfig,

    /// Completion backend settings.
    #[serde(default)]
    pub llm: LlmConfig,

    /// Tenant directory location and resolver retry policy.
    #[serde(default)]
    pub tenants: TenantsConfig,

    /// Answer decoding options.
    #[serde(default)]
    pub answer: AnswerConfig,

    /// Work queue between the webhook and the reply pipeline.
    #[serde(default)]
    pub dispatch: DispatchConfig,
}

/// Gateway bind and port.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Port for HTTP (default 15152).
    #[serde(default = "default_gateway_port")]
    pub port: u16,

    /// Bind address (default "127.0.0.1").
    #[serde(default = "default_gateway_bind")]
    pub bind: String,
}

fn default_gateway_port() -> u16 {
    15152
}

fn default_gateway_bind() -> String {
    "127.0.0.1".to_string()
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_gateway_port(),
            bind: default_gateway_bind(),
        }
    }
}

/// Messenger platform config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessengerConfig {
    /// Pre-shared secret for the subscription handshake. Overridden by FB_VERIFY_TOKEN env.
    pub verify_token: Option<String>,
    /// Send API credential, one per deployment. Overridden by FB_PAGE_ACCESS_TOKEN env.
    pub page_access_token: Option<String>,
    /// Graph API origin (default "https://graph.facebook.com").
    #[serde(default = "default_graph_api_base")]
    pub graph_api_base: String,
    /// Graph API version path segment (default "v19.0").
    #[serde(default = "default_graph_api_version")]
    pub graph_api_version: String,
}

fn default_graph_api_base() -> String {
    "https://graph.facebook.com".to_string()
}

fn default_graph_api_version() -> String {
    "v19.0".to_string()
}

impl Default for MessengerConfig {
    fn default() -> Self {
        Self {
            verify_token: None,
            page_access_token: None,
            graph_api_base: default_graph_api_base(),
            graph_api_version: default_graph_api_version(),
        }
    }
}

/// Completion backend config (Ollama).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmConfig {
    /// Ollama base URL. When unset, http://127.0.0.1:11434 is used.
    pub base_url: Option<String>,
    /// Model name as shown by `ollama list` (e.g. "llama3.2:latest").
    pub model: Option<String>,
}

pub const DEFAULT_MODEL: &str = "llama3.2:latest";

impl LlmConfig {
    /// Configured model, or [`DEFAULT_MODEL`] when empty or unset.
    pub fn model_name(&self) -> String {
        self.model
            .as_deref()
            .map(str::trim)
            .filter(|m| !m.is_empty())
            .unwrap_or(DEFAULT_MODEL)
            .to_string()
    }
}

/// Tenant directory config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantsConfig {
    /// Tenants JSON file. Relative paths are resolved against the config file's parent.
    /// Default: `tenants.json` next to the config file.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Extra attempts after a transient lookup failure (default 1).
    #[serde(default = "default_resolve_retries")]
    pub resolve_retries: u32,
    /// Delay between lookup attempts in milliseconds (default 200).
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    /// Append-only interaction log (JSON lines), resolved like `path`.
    /// Default: `interactions.jsonl` next to the config file.
    #[serde(default)]
    pub interactions_path: Option<PathBuf>,
}

fn default_resolve_retries() -> u32 {
    1
}

fn default_retry_backoff_ms() -> u64 {
    200
}

impl Default for TenantsConfig {
    fn default() -> Self {
        Self {
            path: None,
            resolve_retries: default_resolve_retries(),
            retry_backoff_ms: default_retry_backoff_ms(),
            interactions_path: None,
        }
    }
}

/// How the `answer` field is recovered from streamed model output.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ExtractStrategy {
    /// Parse the span from the first `{` to the last `}` of the buffer.
    #[default]
    BraceSpan,
    /// Track brace depth and string state; parse the first balanced top-level object.
    Balanced,
}

/// Answer decoding config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerConfig {
    #[serde(default)]
    pub extract_strategy: ExtractStrategy,
}

/// Dispatch queue config.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchConfig {
    /// Events buffered between the webhook and the workers (default 64).
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Pipelines allowed to run at once (default 4).
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

fn default_queue_capacity() -> usize {
    64
}

fn default_max_concurrent() -> usize {
    4
}

impl Default for DispatchConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            max_concurrent: default_max_concurrent(),
        }
    }
}

fn env_secret(name: &str) -> Option<String> {
    std::env::var(name).ok().and_then(|s| {
        let t = s.trim();
        if t.is_empty() {
            None
        } else {
            Some(t.to_string())
        }
    })
}

fn config_secret(value: Option<&String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Resolve the webhook verify token: env FB_VERIFY_TOKEN overrides config.
pub fn resolve_verify_token(config: &Config) -> Option<String> {
    env_secret("FB_VERIFY_TOKEN").or_else(|| config_secret(config.messenger.verify_token.as_ref()))
}

/// Resolve the Send API access token: env FB_PAGE_ACCESS_TOKEN overrides config.
pub fn resolve_page_access_token(config: &Config) -> Option<String> {
    env_secret("FB_PAGE_ACCESS_TOKEN")
        .or_else(|| config_secret(config.messenger.page_access_token.as_ref()))
}

/// True if the bind address is loopback (127.0.0.1, ::1, etc.).
pub fn is_loopback_bind(bind: &str) -> bool {
    let b = bind.trim();
    b == "127.0.0.1" || b == "::1" || b == "localhost"
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("ASSIST_CONFIG_PATH")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            dirs::home_dir()
                .map(|h| h.join(".assist").join("config.json"))
                .unwrap_or_else(|| PathBuf::from("config.json"))
        })
}

fn config_parent(config_path: &Path) -> &Path {
    config_path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."))
}

fn resolve_beside_config(
    configured: Option<&PathBuf>,
    config_path: &Path,
    default_name: &str,
) -> PathBuf {
    let parent = config_parent(config_path);
    match configured {
        Some(p) if !p.as_os_str().is_empty() => {
            if p.is_absolute() {
                p.clone()
            } else {
                parent.join(p)
            }
        }
        _ => parent.join(default_name),
    }
}

/// Resolve the tenants file: `tenants.path` if set (relative to the config file's parent), otherwise `tenants.json` beside the config.
pub fn resolve_tenants_path(config: &Config, config_path: &Path) -> PathBuf {
    resolve_beside_config(config.tenants.path.as_ref(), config_path, "tenants.json")
}

/// Resolve the interaction log: `tenants.interactionsPath` if set, otherwise `interactions.jsonl` beside the config.
pub fn resolve_interactions_path(config: &Config, config_path: &Path) -> PathBuf {
    resolve_beside_config(
        config.tenants.interactions_path.as_ref(),
        config_path,
        "interactions.jsonl",
    )
}

/// Load config from the given path (or the default). Missing file => default config.
/// Returns the config and the path that was used (for resolving the tenants file).
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
