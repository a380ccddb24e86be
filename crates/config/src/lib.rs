//! Configuration loading, validation, and management for CodeQuill.
//!
//! Loads configuration from `~/.codequill/config.toml` with environment
//! variable overrides. The loaded value is passed explicitly to the loop at
//! construction — nothing reads configuration globals mid-run. Tunables can
//! be swapped between runs via `TaskRunner::reconfigure`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// The root configuration structure.
///
/// Maps directly to `~/.codequill/config.toml`.
#[derive(Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// API key for the model/embedding endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Base URL of the OpenAI-compatible endpoint
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Chat model name
    #[serde(default = "default_model")]
    pub model: String,

    /// Embedding model name
    #[serde(default = "default_embedding_model")]
    pub embedding_model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Max tokens per model response
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Orchestration loop tunables
    #[serde(default)]
    pub runner: RunnerConfig,

    /// Memory store settings
    #[serde(default)]
    pub memory: MemoryConfig,

    /// Directory receiving pre-overwrite file backups
    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,
}

fn default_api_url() -> String {
    "http://localhost:11434/v1".into()
}
fn default_model() -> String {
    "qwen2.5-coder".into()
}
fn default_embedding_model() -> String {
    "nomic-embed-text".into()
}
fn default_temperature() -> f32 {
    0.7
}
fn default_max_tokens() -> u32 {
    4096
}
fn default_backup_dir() -> PathBuf {
    home_dir().join(".codequill").join("backups")
}

fn home_dir() -> PathBuf {
    std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("."))
}

/// Redact a secret for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("api_key", &redact(&self.api_key))
            .field("api_url", &self.api_url)
            .field("model", &self.model)
            .field("embedding_model", &self.embedding_model)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("runner", &self.runner)
            .field("memory", &self.memory)
            .field("backup_dir", &self.backup_dir)
            .finish()
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: default_api_url(),
            model: default_model(),
            embedding_model: default_embedding_model(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            runner: RunnerConfig::default(),
            memory: MemoryConfig::default(),
            backup_dir: default_backup_dir(),
        }
    }
}

/// Ceilings and timeouts for the orchestration loop.
///
/// One shared set of tunables for every front end — there is deliberately
/// no per-front-end copy of these constants.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct RunnerConfig {
    /// Maximum loop steps before forcing a terminal outcome
    #[serde(default = "default_step_ceiling")]
    pub step_ceiling: u32,

    /// Consecutive failed-step retries before forcing Failed
    #[serde(default = "default_retry_ceiling")]
    pub retry_ceiling: u32,

    /// Wall-clock timeout for each individual capability call
    #[serde(default = "default_per_tool_timeout_secs")]
    pub per_tool_timeout_secs: u64,
}

fn default_step_ceiling() -> u32 {
    12
}
fn default_retry_ceiling() -> u32 {
    2
}
fn default_per_tool_timeout_secs() -> u64 {
    60
}

impl RunnerConfig {
    pub fn per_tool_timeout(&self) -> Duration {
        Duration::from_secs(self.per_tool_timeout_secs)
    }
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            step_ceiling: default_step_ceiling(),
            retry_ceiling: default_retry_ceiling(),
            per_tool_timeout_secs: default_per_tool_timeout_secs(),
        }
    }
}

/// Similarity memory store settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MemoryConfig {
    /// Path of the append-only JSONL index
    #[serde(default = "default_memory_path")]
    pub index_path: PathBuf,

    /// Path of the bounded short-term conversation file
    #[serde(default = "default_short_term_path")]
    pub short_term_path: PathBuf,

    /// Hard cap on stored entries; oldest are evicted past this
    #[serde(default = "default_capacity")]
    pub capacity: usize,

    /// Entries shorter than this are treated as noise and dropped
    #[serde(default = "default_min_content_len")]
    pub min_content_len: usize,

    /// How many memories to recall per run
    #[serde(default = "default_recall_limit")]
    pub recall_limit: usize,
}

fn default_memory_path() -> PathBuf {
    home_dir().join(".codequill").join("memory.jsonl")
}
fn default_short_term_path() -> PathBuf {
    home_dir().join(".codequill").join("recent.json")
}
fn default_capacity() -> usize {
    2048
}
fn default_min_content_len() -> usize {
    24
}
fn default_recall_limit() -> usize {
    5
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            index_path: default_memory_path(),
            short_term_path: default_short_term_path(),
            capacity: default_capacity(),
            min_content_len: default_min_content_len(),
            recall_limit: default_recall_limit(),
        }
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

impl AppConfig {
    /// Default config file path: `~/.codequill/config.toml`.
    pub fn default_path() -> PathBuf {
        home_dir().join(".codequill").join("config.toml")
    }

    /// Load from `path`, falling back to defaults if the file is absent,
    /// then apply environment overrides and validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            toml::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            debug!(path = %path.display(), "No config file, using defaults");
            Self::default()
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Environment variables take precedence over the file.
    fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("CODEQUILL_API_KEY") {
            self.api_key = Some(key);
        }
        if let Ok(url) = std::env::var("CODEQUILL_API_URL") {
            self.api_url = url;
        }
        if let Ok(model) = std::env::var("CODEQUILL_MODEL") {
            self.model = model;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.runner.step_ceiling == 0 {
            return Err(ConfigError::Invalid("runner.step_ceiling must be > 0".into()));
        }
        if self.runner.per_tool_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "runner.per_tool_timeout_secs must be > 0".into(),
            ));
        }
        if self.memory.capacity == 0 {
            return Err(ConfigError::Invalid("memory.capacity must be > 0".into()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(ConfigError::Invalid(
                "temperature must be within [0.0, 2.0]".into(),
            ));
        }
        Ok(())
    }
}
