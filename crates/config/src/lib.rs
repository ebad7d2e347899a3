//! Configuration loading, validation, and management for ankigen.
//!
//! Loads configuration from `~/.ankigen/config.toml` with environment
//! variable overrides. Validates all settings at startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The root configuration structure.
///
/// Maps directly to `~/.ankigen/config.toml`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Chat model endpoint
    #[serde(default)]
    pub provider: ProviderConfig,

    /// Web search backend
    #[serde(default)]
    pub search: SearchConfig,

    /// Embedding endpoint for the semantic filter
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Agent loop budgets and retrieval tuning
    #[serde(default)]
    pub agent: AgentConfig,
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

/// OpenAI-compatible chat completion endpoint.
#[derive(Clone, Serialize, Deserialize)]
pub struct ProviderConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Primary model. Empty means "first model the server lists".
    #[serde(default)]
    pub model: String,

    /// Model used for the cheap stages (terms, summary) and for `--fast`.
    /// Falls back to `model` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fast_model: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    #[serde(default = "default_provider_timeout")]
    pub timeout_secs: u64,
}

fn default_api_url() -> String {
    "http://localhost:4000/v1".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    2048
}
fn default_provider_timeout() -> u64 {
    60
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            api_key: None,
            model: String::new(),
            fast_model: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_provider_timeout(),
        }
    }
}

impl std::fmt::Debug for ProviderConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProviderConfig")
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("fast_model", &self.fast_model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Which web search API to call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SearchBackend {
    #[default]
    Exa,
    Google,
}

#[derive(Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default)]
    pub backend: SearchBackend,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exa_api_key: Option<String>,

    #[serde(default = "default_exa_url")]
    pub exa_url: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_api_key: Option<String>,

    /// Google Programmable Search engine id.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub google_cx: Option<String>,

    /// Results requested per search term during retrieval.
    #[serde(default = "default_num_results")]
    pub num_results: usize,

    /// Upper bound on concurrent search requests.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

fn default_exa_url() -> String {
    "https://api.exa.ai".into()
}
fn default_num_results() -> usize {
    5
}
fn default_max_concurrency() -> usize {
    8
}
fn default_search_timeout() -> u64 {
    30
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            backend: SearchBackend::default(),
            exa_api_key: None,
            exa_url: default_exa_url(),
            google_api_key: None,
            google_cx: None,
            num_results: default_num_results(),
            max_concurrency: default_max_concurrency(),
            timeout_secs: default_search_timeout(),
        }
    }
}

impl std::fmt::Debug for SearchConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SearchConfig")
            .field("backend", &self.backend)
            .field("exa_api_key", &redact(&self.exa_api_key))
            .field("exa_url", &self.exa_url)
            .field("google_api_key", &redact(&self.google_api_key))
            .field("google_cx", &self.google_cx)
            .field("num_results", &self.num_results)
            .field("max_concurrency", &self.max_concurrency)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Set to false to always use direct retrieval.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Embedding endpoint. Falls back to `provider.api_url` when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_embed_model")]
    pub model: String,

    #[serde(default = "default_embed_timeout")]
    pub timeout_secs: u64,

    /// Timeout of the liveness probe run before semantic retrieval.
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout_secs: u64,
}

fn default_true() -> bool {
    true
}
fn default_embed_model() -> String {
    "qwen-embed".into()
}
fn default_embed_timeout() -> u64 {
    60
}
fn default_probe_timeout() -> u64 {
    3
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            api_url: None,
            api_key: None,
            model: default_embed_model(),
            timeout_secs: default_embed_timeout(),
            probe_timeout_secs: default_probe_timeout(),
        }
    }
}

impl std::fmt::Debug for EmbeddingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingConfig")
            .field("enabled", &self.enabled)
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("timeout_secs", &self.timeout_secs)
            .field("probe_timeout_secs", &self.probe_timeout_secs)
            .finish()
    }
}

/// Retrieval strategy for stage 2.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetrievalStrategy {
    /// Plain concurrent fan-out, results concatenated.
    Direct,
    /// Creative terms plus embedding relevance filter when the embedder is up.
    #[default]
    Semantic,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Agent turns allowed per generation attempt
    #[serde(default = "default_max_turns")]
    pub max_turns: u32,

    /// Auxiliary searches allowed per attempt; -1 for unlimited
    #[serde(default = "default_max_searches")]
    pub max_searches: i64,

    /// Paragraph similarity threshold for the semantic filter
    #[serde(default = "default_focus_threshold")]
    pub focus_threshold: f32,

    #[serde(default)]
    pub strategy: RetrievalStrategy,

    /// Results fetched by an agent-initiated search
    #[serde(default = "default_aux_num_results")]
    pub aux_num_results: usize,

    /// Characters of an agent-initiated search kept in the context
    #[serde(default = "default_aux_result_chars")]
    pub aux_result_chars: usize,

    /// Card-writing guidelines. Replaces the built-in prompt when set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

fn default_max_turns() -> u32 {
    3
}
fn default_max_searches() -> i64 {
    3
}
fn default_focus_threshold() -> f32 {
    0.7
}
fn default_aux_num_results() -> usize {
    3
}
fn default_aux_result_chars() -> usize {
    2000
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            max_searches: default_max_searches(),
            focus_threshold: default_focus_threshold(),
            strategy: RetrievalStrategy::default(),
            aux_num_results: default_aux_num_results(),
            aux_result_chars: default_aux_result_chars(),
            system_prompt: None,
        }
    }
}

impl AppConfig {
    /// Load configuration from the default path (~/.ankigen/config.toml).
    ///
    /// Environment variables override the file:
    /// - `ANKIGEN_API_KEY`, then `OPENAI_API_KEY`
    /// - `ANKIGEN_API_URL`, `ANKIGEN_MODEL`
    /// - `EXA_API_KEY`
    /// - `SEMSEARCH_GOOGLE_API_KEY`, `SEMSEARCH_GOOGLE_CX`
    /// - `ANKIGEN_EMBED_URL`
    pub fn load() -> Result<Self, ConfigError> {
        let mut config = Self::load_from(&Self::config_path())?;
        config.apply_env(|name| std::env::var(name).ok().filter(|v| !v.is_empty()));
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file path.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::info!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Apply environment overrides using `lookup` to read variables.
    ///
    /// API keys from the environment only fill keys the file left unset;
    /// URLs and the model always win.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if self.provider.api_key.is_none() {
            self.provider.api_key =
                lookup("ANKIGEN_API_KEY").or_else(|| lookup("OPENAI_API_KEY"));
        }
        if let Some(url) = lookup("ANKIGEN_API_URL") {
            self.provider.api_url = url;
        }
        if let Some(model) = lookup("ANKIGEN_MODEL") {
            self.provider.model = model;
        }

        if self.search.exa_api_key.is_none() {
            self.search.exa_api_key = lookup("EXA_API_KEY");
        }
        if self.search.google_api_key.is_none() {
            self.search.google_api_key = lookup("SEMSEARCH_GOOGLE_API_KEY");
        }
        if self.search.google_cx.is_none() {
            self.search.google_cx = lookup("SEMSEARCH_GOOGLE_CX");
        }

        if let Some(url) = lookup("ANKIGEN_EMBED_URL") {
            self.embedding.api_url = Some(url);
        }
    }

    /// Get the configuration directory path.
    pub fn config_dir() -> PathBuf {
        dirs_home().join(".ankigen")
    }

    pub fn config_path() -> PathBuf {
        Self::config_dir().join("config.toml")
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(0.0..=2.0).contains(&self.provider.temperature) {
            return Err(ConfigError::ValidationError(
                "provider.temperature must be between 0.0 and 2.0".into(),
            ));
        }

        if !(0.0..=1.0).contains(&self.agent.focus_threshold) {
            return Err(ConfigError::ValidationError(
                "agent.focus_threshold must be between 0.0 and 1.0".into(),
            ));
        }

        if self.agent.max_turns == 0 {
            return Err(ConfigError::ValidationError(
                "agent.max_turns must be at least 1".into(),
            ));
        }

        if self.agent.max_searches < -1 {
            return Err(ConfigError::ValidationError(
                "agent.max_searches must be -1 (unlimited) or >= 0".into(),
            ));
        }

        if self.search.num_results == 0 || self.agent.aux_num_results == 0 {
            return Err(ConfigError::ValidationError(
                "search.num_results and agent.aux_num_results must be > 0".into(),
            ));
        }

        if self.search.max_concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "search.max_concurrency must be > 0".into(),
            ));
        }

        Ok(())
    }

    /// Embedding endpoint, defaulting to the chat endpoint.
    pub fn embedding_url(&self) -> &str {
        self.embedding
            .api_url
            .as_deref()
            .unwrap_or(&self.provider.api_url)
    }

    /// Model for fast-tier calls.
    pub fn fast_model(&self) -> &str {
        self.provider
            .fast_model
            .as_deref()
            .unwrap_or(&self.provider.model)
    }

    /// Generate a default config TOML string (for `init` command).
    pub fn default_toml() -> String {
        let config = Self::default();
        toml::to_string_pretty(&config).unwrap_or_default()
    }
}

/// Get the user's home directory.
fn dirs_home() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        std::env::var("USERPROFILE")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("C:\\Users\\Default"))
    }
    #[cfg(not(target_os = "windows"))]
    {
        std::env::var("HOME")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("/tmp"))
    }
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),
}
