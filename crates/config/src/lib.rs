//! Configuration loading, validation, and management for shelftalk.
//!
//! Loads configuration from a TOML file with environment variable
//! overrides (`SHELFTALK_*`). Every field has a serde default so an empty
//! file — or no file at all — yields a working configuration.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// The root configuration structure.
#[derive(Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// API key for the model gateway
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Sampling temperature for answer generation
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens for the final answer
    #[serde(default = "default_max_answer_tokens")]
    pub max_answer_tokens: u32,

    /// Per-purpose model names
    #[serde(default)]
    pub models: ModelsConfig,

    /// Context assembly and cache settings
    #[serde(default)]
    pub context: ContextConfig,

    /// Summarization thresholds
    #[serde(default)]
    pub summarize: SummarizeConfig,

    /// Storage settings
    #[serde(default)]
    pub storage: StorageConfig,

    /// Per-model price overrides (USD per 1M tokens)
    #[serde(default)]
    pub pricing: HashMap<String, PriceOverride>,
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_answer_tokens() -> u32 {
    600
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
            temperature: default_temperature(),
            max_answer_tokens: default_max_answer_tokens(),
            models: ModelsConfig::default(),
            context: ContextConfig::default(),
            summarize: SummarizeConfig::default(),
            storage: StorageConfig::default(),
            pricing: HashMap::new(),
        }
    }
}

fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for PipelineConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PipelineConfig")
            .field("api_key", &redact(&self.api_key))
            .field("base_url", &self.base_url)
            .field("temperature", &self.temperature)
            .field("max_answer_tokens", &self.max_answer_tokens)
            .field("models", &self.models)
            .field("context", &self.context)
            .field("summarize", &self.summarize)
            .field("storage", &self.storage)
            .field("pricing", &self.pricing)
            .finish()
    }
}

/// Which model serves which call site. Cheap models carry the metadata
/// calls; the chat model carries tool selection and the final answer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    #[serde(default = "default_chat_model")]
    pub chat: String,

    #[serde(default = "default_utility_model")]
    pub title: String,

    #[serde(default = "default_utility_model")]
    pub intent: String,

    #[serde(default = "default_utility_model")]
    pub summary: String,
}

fn default_chat_model() -> String {
    "gpt-4.1".into()
}
fn default_utility_model() -> String {
    "gpt-4.1-mini".into()
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            chat: default_chat_model(),
            title: default_utility_model(),
            intent: default_utility_model(),
            summary: default_utility_model(),
        }
    }
}

/// Context assembly and cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Cap on messages included in a full-context read.
    #[serde(default = "default_max_messages")]
    pub max_messages: usize,

    /// Character threshold above which assembled context is cascaded
    /// into a digest plus the last exchange.
    #[serde(default = "default_cascade_threshold")]
    pub cascade_threshold: usize,

    /// Time-to-live for cached compact context, in seconds.
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
}

fn default_max_messages() -> usize {
    50
}
fn default_cascade_threshold() -> usize {
    2000
}
fn default_cache_ttl_secs() -> u64 {
    60
}

impl Default for ContextConfig {
    fn default() -> Self {
        Self {
            max_messages: default_max_messages(),
            cascade_threshold: default_cascade_threshold(),
            cache_ttl_secs: default_cache_ttl_secs(),
        }
    }
}

/// Summarization thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummarizeConfig {
    /// User messages longer than this (chars) get a stored summary.
    #[serde(default = "default_user_threshold")]
    pub user_threshold: usize,

    /// Assistant messages longer than this (chars) get a stored summary.
    #[serde(default = "default_assistant_threshold")]
    pub assistant_threshold: usize,

    /// Word budget passed to the summarize call.
    #[serde(default = "default_max_words")]
    pub max_words: usize,
}

fn default_user_threshold() -> usize {
    400
}
fn default_assistant_threshold() -> usize {
    600
}
fn default_max_words() -> usize {
    80
}

impl Default for SummarizeConfig {
    fn default() -> Self {
        Self {
            user_threshold: default_user_threshold(),
            assistant_threshold: default_assistant_threshold(),
            max_words: default_max_words(),
        }
    }
}

/// Storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// SQLite database path. `":memory:"` gives an ephemeral store.
    #[serde(default = "default_database_path")]
    pub database_path: String,
}

fn default_database_path() -> String {
    "shelftalk.sqlite3".into()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// A per-model price override, USD per 1M tokens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceOverride {
    pub input: f64,
    pub output: f64,
    #[serde(default)]
    pub cached_input: f64,
}

impl PipelineConfig {
    /// Parse a configuration from TOML text and apply env overrides.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let mut config: PipelineConfig = toml::from_str(text)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file. A missing file yields the defaults
    /// (still subject to env overrides).
    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "No config file, using defaults");
            let mut config = PipelineConfig::default();
            config.apply_env_overrides();
            config.validate()?;
            return Ok(config);
        }
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Environment variables win over file values.
    fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("SHELFTALK_API_KEY") {
            if !key.is_empty() {
                self.api_key = Some(key);
            }
        }
        if let Ok(url) = std::env::var("SHELFTALK_BASE_URL") {
            if !url.is_empty() {
                self.base_url = url;
            }
        }
        if let Ok(model) = std::env::var("SHELFTALK_CHAT_MODEL") {
            if !model.is_empty() {
                self.models.chat = model;
            }
        }
        if let Ok(path) = std::env::var("SHELFTALK_DATABASE_PATH") {
            if !path.is_empty() {
                self.storage.database_path = path;
            }
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.context.max_messages == 0 {
            return Err(ConfigError::Invalid(
                "context.max_messages must be at least 1".into(),
            ));
        }
        if self.context.cascade_threshold == 0 {
            return Err(ConfigError::Invalid(
                "context.cascade_threshold must be nonzero".into(),
            ));
        }
        if self.summarize.max_words == 0 {
            return Err(ConfigError::Invalid(
                "summarize.max_words must be nonzero".into(),
            ));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::Invalid(format!(
                "temperature {} out of range [0.0, 2.0]",
                self.temperature
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let config = PipelineConfig::from_toml_str("").unwrap();
        assert_eq!(config.context.max_messages, 50);
        assert_eq!(config.context.cascade_threshold, 2000);
        assert_eq!(config.context.cache_ttl_secs, 60);
        assert_eq!(config.summarize.user_threshold, 400);
        assert_eq!(config.summarize.assistant_threshold, 600);
        assert_eq!(config.summarize.max_words, 80);
    }

    #[test]
    fn partial_toml_overrides_only_named_fields() {
        let config = PipelineConfig::from_toml_str(
            r#"
            temperature = 0.2

            [models]
            chat = "gpt-4o"

            [context]
            max_messages = 10
            "#,
        )
        .unwrap();
        assert_eq!(config.models.chat, "gpt-4o");
        assert_eq!(config.models.title, "gpt-4.1-mini");
        assert_eq!(config.context.max_messages, 10);
        assert_eq!(config.context.cache_ttl_secs, 60);
        assert!((config.temperature - 0.2).abs() < f32::EPSILON);
    }

    #[test]
    fn pricing_overrides_parse() {
        let config = PipelineConfig::from_toml_str(
            r#"
            [pricing."my-model"]
            input = 1.0
            output = 2.0
            cached_input = 0.5
            "#,
        )
        .unwrap();
        let p = config.pricing.get("my-model").unwrap();
        assert!((p.input - 1.0).abs() < 1e-12);
        assert!((p.cached_input - 0.5).abs() < 1e-12);
    }

    #[test]
    fn invalid_values_rejected() {
        let err = PipelineConfig::from_toml_str("[context]\nmax_messages = 0").unwrap_err();
        assert!(err.to_string().contains("max_messages"));

        let err = PipelineConfig::from_toml_str("temperature = 9.0").unwrap_err();
        assert!(err.to_string().contains("temperature"));
    }

    #[test]
    fn debug_redacts_api_key() {
        let config = PipelineConfig {
            api_key: Some("sk-secret".into()),
            ..Default::default()
        };
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn missing_file_yields_defaults() {
        let config = PipelineConfig::load_from_path("/nonexistent/shelftalk.toml").unwrap();
        assert_eq!(config.base_url, "https://api.openai.com/v1");
    }
}
