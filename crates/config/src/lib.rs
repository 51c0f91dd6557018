//! Configuration loading, validation, and management for Palaver.
//!
//! Loads configuration from a TOML file with environment variable
//! overrides (`PALAVER_CREDENTIAL_<NAME>` for API keys). Validates all
//! settings before the pipeline is wired up.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// The root configuration structure.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API keys, keyed by credential reference name
    /// (model records point here via `credential_ref`).
    #[serde(default)]
    pub credentials: HashMap<String, String>,

    /// Per-provider base URL overrides (testing, proxies).
    #[serde(default)]
    pub providers: HashMap<String, ProviderConfig>,

    /// Completion request defaults
    #[serde(default)]
    pub request: RequestConfig,

    /// Network timeouts
    #[serde(default)]
    pub timeouts: TimeoutConfig,

    /// Conversation memory bounds
    #[serde(default)]
    pub memory: MemoryConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            credentials: HashMap::new(),
            providers: HashMap::new(),
            request: RequestConfig::default(),
            timeouts: TimeoutConfig::default(),
            memory: MemoryConfig::default(),
        }
    }
}

/// Redact a secret string for Debug output.
fn redact_map(map: &HashMap<String, String>) -> HashMap<&str, &'static str> {
    map.keys().map(|k| (k.as_str(), "[REDACTED]")).collect()
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("credentials", &redact_map(&self.credentials))
            .field("providers", &self.providers)
            .field("request", &self.request)
            .field("timeouts", &self.timeouts)
            .field("memory", &self.memory)
            .finish()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProviderConfig {
    /// Override the provider's default base URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestConfig {
    /// Maximum tokens requested per completion.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

fn default_max_tokens() -> u32 {
    4000
}
fn default_temperature() -> f32 {
    0.7
}

impl Default for RequestConfig {
    fn default() -> Self {
        Self {
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Provider completion request timeout, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub provider_secs: u64,

    /// Tool server call timeout, in seconds.
    #[serde(default = "default_timeout_secs")]
    pub tool_server_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            provider_secs: default_timeout_secs(),
            tool_server_secs: default_timeout_secs(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Cap on stored conversation history entries (N). Oldest entries are
    /// evicted first once exceeded.
    #[serde(default = "default_max_history")]
    pub max_history: usize,

    /// How many recent entries feed each prompt (K, must be <= N).
    #[serde(default = "default_context_window")]
    pub context_window: usize,

    /// Cache entry time-to-live, in seconds.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

fn default_max_history() -> usize {
    50
}
fn default_context_window() -> usize {
    10
}
fn default_cache_ttl_secs() -> u64 {
    3600
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_history: default_max_history(),
            context_window: default_context_window(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

/// Environment prefix for credential overrides:
/// `PALAVER_CREDENTIAL_OPENAI_KEY=sk-...` becomes credential `openai_key`.
const CREDENTIAL_ENV_PREFIX: &str = "PALAVER_CREDENTIAL_";

impl AppConfig {
    /// Load configuration from a TOML file, apply environment overrides,
    /// and validate.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path.as_ref())?;
        let mut config: AppConfig = toml::from_str(&raw)?;
        config.apply_env_overrides();
        config.validate()?;
        debug!(path = %path.as_ref().display(), "Loaded configuration");
        Ok(config)
    }

    /// Pull credential overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        for (key, value) in std::env::vars() {
            if let Some(name) = key.strip_prefix(CREDENTIAL_ENV_PREFIX) {
                if !value.is_empty() {
                    self.credentials.insert(name.to_lowercase(), value);
                }
            }
        }
    }

    /// Check cross-field invariants.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.memory.max_history == 0 {
            return Err(ConfigError::Invalid(
                "memory.max_history must be at least 1".into(),
            ));
        }
        if self.memory.context_window == 0 {
            return Err(ConfigError::Invalid(
                "memory.context_window must be at least 1".into(),
            ));
        }
        if self.memory.context_window > self.memory.max_history {
            return Err(ConfigError::Invalid(format!(
                "memory.context_window ({}) must not exceed memory.max_history ({})",
                self.memory.context_window, self.memory.max_history
            )));
        }
        if self.timeouts.provider_secs == 0 || self.timeouts.tool_server_secs == 0 {
            return Err(ConfigError::Invalid("timeouts must be non-zero".into()));
        }
        Ok(())
    }

    /// Look up a credential by reference name.
    pub fn credential(&self, reference: &str) -> Option<&str> {
        self.credentials
            .get(reference)
            .map(String::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Base URL override for a provider tag, if configured.
    pub fn provider_base_url(&self, provider: &str) -> Option<&str> {
        self.providers
            .get(provider)
            .and_then(|p| p.base_url.as_deref())
    }
}
