use anyhow::{Context, Result};
use clip_bridge_core::render::OutputFormat;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::cache::CachePolicy;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub db: DbConfig,
    pub server: ServerConfig,
    #[serde(default)]
    pub synthesis: SynthesisConfig,
    #[serde(default)]
    pub bridge: BridgeConfig,
    #[serde(default)]
    pub cache: CacheConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct DbConfig {
    pub path: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SynthesisConfig {
    #[serde(default = "default_provider")]
    pub provider: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Environment variable holding the process-wide default API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            model: default_model(),
            api_key_env: default_api_key_env(),
            base_url: default_base_url(),
            max_retries: default_max_retries(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_provider() -> String {
    "gemini".to_string()
}
fn default_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_api_key_env() -> String {
    "GEMINI_API_KEY".to_string()
}
fn default_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_max_retries() -> u32 {
    2
}
fn default_timeout_secs() -> u64 {
    30
}

impl SynthesisConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct BridgeConfig {
    #[serde(default = "default_format")]
    pub default_format: String,
    /// Token ceiling applied when a request does not pass one.
    #[serde(default)]
    pub max_tokens: Option<usize>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            default_format: default_format(),
            max_tokens: None,
        }
    }
}

fn default_format() -> String {
    "yaml".to_string()
}

impl BridgeConfig {
    pub fn format(&self) -> Result<OutputFormat> {
        self.default_format.parse()
    }
}

/// Synthesis cache limits. Zero means unbounded / never expires.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct CacheConfig {
    #[serde(default)]
    pub max_entries: usize,
    #[serde(default)]
    pub ttl_secs: u64,
}

impl CacheConfig {
    pub fn policy(&self) -> CachePolicy {
        CachePolicy {
            max_entries: self.max_entries,
            ttl: (self.ttl_secs > 0).then(|| Duration::from_secs(self.ttl_secs)),
        }
    }
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    match config.synthesis.provider.as_str() {
        "disabled" | "gemini" => {}
        other => anyhow::bail!(
            "Unknown synthesis provider: '{}'. Must be disabled or gemini.",
            other
        ),
    }

    if config.synthesis.is_enabled() && config.synthesis.model.trim().is_empty() {
        anyhow::bail!("synthesis.model must not be empty");
    }

    if config.synthesis.timeout_secs == 0 {
        anyhow::bail!("synthesis.timeout_secs must be > 0");
    }

    config
        .bridge
        .format()
        .with_context(|| "Invalid bridge.default_format")?;

    if config.bridge.max_tokens == Some(0) {
        anyhow::bail!("bridge.max_tokens must be > 0");
    }

    Ok(())
}
