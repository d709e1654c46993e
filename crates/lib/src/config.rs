//! Configuration types and loading.
//!
//! Config is loaded from a JSON file (e.g. `~/.m2x/config.json`) and environment.
//! The feed section stands in for the credential node a flow would share between
//! M2X nodes.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::api::DEFAULT_ENDPOINT;

/// Top-level node config.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    /// M2X feed credential.
    #[serde(default)]
    pub feed: FeedConfig,

    /// API endpoint and invocation limits.
    #[serde(default)]
    pub api: ApiConfig,

    /// Node behavior (error mode, label).
    #[serde(default)]
    pub node: NodeConfig,
}

/// Feed credential: the M2X API key. Overridden by M2X_API_KEY env.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedConfig {
    pub api_key: Option<String>,
    /// Display name of the feed, for logs.
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiConfig {
    /// API base URL (default https://api-m2x.att.com/v2). Overridden by M2X_ENDPOINT env.
    pub endpoint: Option<String>,
    /// Upper bound on one invocation, in seconds. Absent or 0 = wait as long as the client does.
    pub timeout_secs: Option<u64>,
}

/// Node settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeConfig {
    pub name: Option<String>,

    /// What to do with messages rejected before invocation: "emit" (default) or "log".
    #[serde(default)]
    pub error_mode: ErrorMode,
}

/// Handling of input errors (invalid topic, invalid action, missing field).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorMode {
    /// Emit a diagnostic message (status 400, reason as payload) on the main output.
    #[default]
    Emit,
    /// Report on the error port only, with the message attached.
    Log,
}

/// Resolve the API key: env M2X_API_KEY overrides config.
pub fn resolve_api_key(config: &Config) -> Option<String> {
    env_or(env_var("M2X_API_KEY"), config.feed.api_key.as_deref())
}

/// Resolve the endpoint: env M2X_ENDPOINT overrides config, then the hosted default.
pub fn resolve_endpoint(config: &Config) -> String {
    env_or(env_var("M2X_ENDPOINT"), config.api.endpoint.as_deref())
        .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
}

pub fn resolve_timeout(config: &Config) -> Option<Duration> {
    config
        .api
        .timeout_secs
        .filter(|s| *s > 0)
        .map(Duration::from_secs)
}

fn env_var(name: &str) -> Option<String> {
    std::env::var(name).ok()
}

/// First non-blank of the env value and the configured value, trimmed.
fn env_or(env: Option<String>, configured: Option<&str>) -> Option<String> {
    env.as_deref()
        .into_iter()
        .chain(configured)
        .map(str::trim)
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// Resolve config path from env or default.
pub fn default_config_path() -> PathBuf {
    std::env::var("M2X_CONFIG_PATH").map(PathBuf::from).unwrap_or_else(|_| {
        dirs::home_dir()
            .map(|h| h.join(".m2x").join("config.json"))
            .unwrap_or_else(|| PathBuf::from("config.json"))
    })
}

/// Load config from the given path, else the default path (or M2X_CONFIG_PATH).
/// Missing file => default config. Returns the config and the path that was used.
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
