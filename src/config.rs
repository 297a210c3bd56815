//! Configuration management for MetaRetrieval
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.
//! Precedence is CLI over environment over file over built-in defaults.

use crate::error::{MetaRetrievalError, Result};
use crate::providers::SamplingParams;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure for MetaRetrieval
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Completion endpoint settings
    #[serde(default)]
    pub endpoint: EndpointConfig,
    /// Model registry
    #[serde(default)]
    pub models: ModelsConfig,
    /// Default sampling parameters
    #[serde(default)]
    pub sampling: SamplingParams,
    /// Prompt and language settings
    #[serde(default)]
    pub conversation: ConversationConfig,
    /// Conversation store settings
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Completion endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Full URL requests are posted to
    #[serde(default = "default_endpoint_url")]
    pub url: String,

    /// Bearer credential; usually supplied through the environment
    #[serde(default)]
    pub api_key: Option<String>,

    /// Request timeout (seconds)
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,
}

fn default_endpoint_url() -> String {
    "http://localhost:11434/v1/chat/completions".to_string()
}

fn default_timeout() -> u64 {
    120
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            url: default_endpoint_url(),
            api_key: None,
            timeout_seconds: default_timeout(),
        }
    }
}

/// Model registry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    /// Model used when the caller does not pick one
    #[serde(default = "default_model")]
    pub default: String,

    /// Models callers may request
    #[serde(default = "default_allowed_models")]
    pub allowed: Vec<String>,
}

fn default_model() -> String {
    "mixtral:latest".to_string()
}

fn default_allowed_models() -> Vec<String> {
    vec![
        "mixtral:latest".to_string(),
        "llama3.1:latest".to_string(),
        "llama3.1:70b".to_string(),
        "llama3.1:70b-instruct-q8_0".to_string(),
    ]
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            default: default_model(),
            allowed: default_allowed_models(),
        }
    }
}

/// Prompt and answer-language configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// Optional system message placed first in every request
    #[serde(default = "default_system_prompt")]
    pub system_prompt: Option<String>,

    /// Language answers are requested in unless the caller picks another
    #[serde(default = "default_language")]
    pub default_language: String,

    /// Languages a caller may pick
    #[serde(default = "default_languages")]
    pub languages: Vec<String>,
}

fn default_system_prompt() -> Option<String> {
    Some("You are a helpful assistant.".to_string())
}

fn default_language() -> String {
    "English".to_string()
}

fn default_languages() -> Vec<String> {
    vec!["English".to_string(), "German".to_string()]
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            system_prompt: default_system_prompt(),
            default_language: default_language(),
            languages: default_languages(),
        }
    }
}

impl ConversationConfig {
    /// Resolve a caller's language choice, falling back to the default
    ///
    /// # Errors
    ///
    /// Returns `InvalidInput` for languages outside the configured list
    pub fn resolve_language(&self, requested: Option<&str>) -> Result<String> {
        match requested {
            None => Ok(self.default_language.clone()),
            Some(language) if self.languages.iter().any(|l| l == language) => {
                Ok(language.to_string())
            }
            Some(language) => Err(MetaRetrievalError::InvalidInput(format!(
                "Unsupported language: {}. Must be one of: {}",
                language,
                self.languages.join(", ")
            ))
            .into()),
        }
    }
}

/// Conversation store configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Database file; defaults to the user's data directory
    #[serde(default)]
    pub path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// A missing file is not an error; defaults are used instead.
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: &str, cli: &crate::cli::Cli) -> Result<Self> {
        let mut config = if Path::new(path).exists() {
            Self::from_file(path)?
        } else {
            tracing::warn!("Config file not found at {}, using defaults", path);
            Self::default()
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| MetaRetrievalError::Config(format!("Failed to read config file: {}", e)))?;
        let config = serde_yaml::from_str(&contents).map_err(MetaRetrievalError::from)?;
        Ok(config)
    }

    fn apply_env_vars(&mut self) {
        if let Ok(url) = std::env::var("METARETRIEVAL_API_URL") {
            self.endpoint.url = url;
        }

        if let Ok(api_key) = std::env::var("METARETRIEVAL_API_KEY") {
            self.endpoint.api_key = Some(api_key);
        }

        if let Ok(timeout) = std::env::var("METARETRIEVAL_TIMEOUT_SECONDS") {
            if let Ok(value) = timeout.parse() {
                self.endpoint.timeout_seconds = value;
            } else {
                tracing::warn!("Invalid METARETRIEVAL_TIMEOUT_SECONDS: {}", timeout);
            }
        }

        if let Ok(model) = std::env::var("METARETRIEVAL_MODEL") {
            self.models.default = model;
        }

        if let Ok(max_tokens) = std::env::var("METARETRIEVAL_MAX_TOKENS") {
            if let Ok(value) = max_tokens.parse() {
                self.sampling.max_tokens = value;
            } else {
                tracing::warn!("Invalid METARETRIEVAL_MAX_TOKENS: {}", max_tokens);
            }
        }

        if let Ok(db_path) = std::env::var("METARETRIEVAL_HISTORY_DB") {
            self.storage.path = Some(PathBuf::from(db_path));
        }
    }

    fn apply_cli_overrides(&mut self, cli: &crate::cli::Cli) {
        if let Some(path) = &cli.storage_path {
            tracing::debug!("Using storage path override from CLI: {}", path.display());
            self.storage.path = Some(path.clone());
        }
    }

    /// Validate the configuration
    ///
    /// Ensures all configuration values are within acceptable ranges
    /// and that required fields are properly set. The API key is not
    /// checked here; commands that never reach the endpoint work without
    /// one.
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        if self.endpoint.url.trim().is_empty() {
            return Err(
                MetaRetrievalError::Config("endpoint.url cannot be empty".to_string()).into(),
            );
        }

        if let Err(e) = url::Url::parse(&self.endpoint.url) {
            return Err(MetaRetrievalError::Config(format!(
                "endpoint.url is not a valid URL ({}): {}",
                self.endpoint.url, e
            ))
            .into());
        }

        if self.endpoint.timeout_seconds == 0 {
            return Err(MetaRetrievalError::Config(
                "endpoint.timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        crate::providers::ModelRegistry::from_config(&self.models)?;

        self.sampling
            .validate()
            .map_err(|e| MetaRetrievalError::Config(format!("sampling: {}", e)))?;

        if self.conversation.languages.is_empty() {
            return Err(MetaRetrievalError::Config(
                "conversation.languages cannot be empty".to_string(),
            )
            .into());
        }

        if !self
            .conversation
            .languages
            .contains(&self.conversation.default_language)
        {
            return Err(MetaRetrievalError::Config(format!(
                "conversation.default_language {} is not one of: {}",
                self.conversation.default_language,
                self.conversation.languages.join(", ")
            ))
            .into());
        }

        Ok(())
    }
}
