//! SDK Configuration
//!
//! Configuration is loaded from multiple sources with precedence:
//! 1. Environment variables (AURA_*)
//! 2. Config file (`$AURA_CONFIG` or ~/.aura/config.toml)
//! 3. Default values

use std::path::{Path, PathBuf};
use std::time::Duration;

use aura_core::RetryPolicy;
use serde::{Deserialize, Serialize};

/// SDK configuration options
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuraConfig {
    /// Path to the SQLite database file
    pub database_path: PathBuf,

    /// Completion backend
    pub completion: CompletionConfig,

    /// Retry policy for model calls
    pub retry: RetryConfig,

    /// Retrieval defaults
    pub retrieval: RetrievalConfig,

    /// Embedding settings
    pub embeddings: EmbeddingsConfig,

    /// Verification pipeline settings
    pub verification: VerificationConfig,
}

/// Completion backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// Base URL of the completion service
    pub base_url: String,

    /// Chat endpoint path (default: /api/ai/chat)
    pub endpoint: String,

    /// Default model id
    pub model: Option<String>,

    /// Bearer token
    pub api_key: Option<String>,

    /// Request timeout in seconds (default: 60)
    pub timeout_seconds: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            endpoint: "/api/ai/chat".to_string(),
            model: None,
            api_key: None,
            timeout_seconds: 60,
        }
    }
}

/// Retry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum attempts including the first (default: 5)
    pub max_attempts: u32,

    /// First backoff delay in milliseconds (default: 1000)
    pub initial_delay_ms: u64,

    /// Backoff cap in milliseconds (default: 32000)
    pub max_delay_ms: u64,

    /// Exponential growth factor (default: 2.0)
    pub backoff_factor: f64,

    /// Full jitter (default: true)
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_delay_ms: 1000,
            max_delay_ms: 32_000,
            backoff_factor: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Build the retry policy with the default classifier
    pub fn policy(&self) -> RetryPolicy {
        RetryPolicy::default()
            .with_max_attempts(self.max_attempts)
            .with_delays(
                Duration::from_millis(self.initial_delay_ms),
                Duration::from_millis(self.max_delay_ms),
            )
            .with_backoff_factor(self.backoff_factor)
            .with_jitter(self.jitter)
    }
}

/// Retrieval configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrievalConfig {
    /// Search result limit (default: 10)
    pub default_limit: usize,

    /// Minimum search score (default: 0.5)
    pub default_threshold: f32,

    /// Context token budget (default: 4000)
    pub default_max_tokens: usize,

    /// Knowledge sources considered for context (default: 20)
    pub context_sources: usize,

    /// Conversation messages included in context (default: 10)
    pub recent_messages: usize,

    /// Semantic search cutoff, exclusive (default: 0.5)
    pub semantic_threshold: f32,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_limit: 10,
            default_threshold: 0.5,
            default_max_tokens: 4000,
            context_sources: 20,
            recent_messages: 10,
            semantic_threshold: 0.5,
        }
    }
}

/// Embedding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbeddingsConfig {
    /// Placeholder embedding dimensions (default: 1536)
    pub dimensions: usize,

    /// Cache TTL in seconds (default: 3600 = 1 hour)
    pub cache_ttl_seconds: u64,

    /// Maximum cached embeddings (default: 1000)
    pub cache_capacity: usize,
}

impl Default for EmbeddingsConfig {
    fn default() -> Self {
        Self {
            dimensions: 1536,
            cache_ttl_seconds: 3600,
            cache_capacity: 1000,
        }
    }
}

/// Verification pipeline configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VerificationConfig {
    /// Concurrent verification questions (default: 4)
    pub max_concurrency: usize,

    /// Model used for the planning phase, if different
    pub plan_model: Option<String>,

    /// System instruction for the planning phase
    pub fact_checker_instruction: String,
}

impl Default for VerificationConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 4,
            plan_model: None,
            fact_checker_instruction: "You are a skeptical fact-checker.".to_string(),
        }
    }
}

impl AuraConfig {
    /// Create a config for the given database path
    pub fn new(database_path: impl Into<PathBuf>) -> Self {
        Self {
            database_path: database_path.into(),
            ..Default::default()
        }
    }

    /// Set the completion base URL
    pub fn with_completion_url(mut self, url: impl Into<String>) -> Self {
        self.completion.base_url = url.into();
        self
    }

    /// Set the retry configuration
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Load configuration from file and environment
    pub fn load() -> aura_core::Result<Self> {
        let mut config = Self::load_file(&Self::config_path())?;
        config.apply_env(|key| std::env::var(key).ok());
        if config.database_path.as_os_str().is_empty() {
            config.database_path = default_data_dir().join("aura.db");
        }
        Ok(config)
    }

    /// Read a TOML config file; a missing file yields defaults
    pub fn load_file(path: &Path) -> aura_core::Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content)
            .map_err(|e| aura_core::Error::Config(format!("Failed to parse {}: {}", path.display(), e)))
    }

    /// Apply AURA_* overrides from a variable lookup
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup("AURA_DATABASE_PATH") {
            self.database_path = PathBuf::from(path);
        }
        if let Some(url) = lookup("AURA_COMPLETION_URL") {
            self.completion.base_url = url;
        }
        if let Some(key) = lookup("AURA_API_KEY") {
            self.completion.api_key = Some(key);
        }
        if let Some(model) = lookup("AURA_MODEL") {
            self.completion.model = Some(model);
        }
    }

    /// Get the config file path
    pub fn config_path() -> PathBuf {
        match std::env::var("AURA_CONFIG") {
            Ok(path) => PathBuf::from(path),
            Err(_) => default_data_dir().join("config.toml"),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.completion.base_url.trim().is_empty() {
            return Err(ConfigValidationError::MissingCompletionUrl);
        }

        if self.retry.max_attempts == 0 {
            return Err(ConfigValidationError::InvalidValue {
                field: "retry.max_attempts".into(),
                message: "must be greater than 0".into(),
            });
        }

        if self.retry.backoff_factor < 1.0 {
            return Err(ConfigValidationError::InvalidValue {
                field: "retry.backoff_factor".into(),
                message: "must be at least 1".into(),
            });
        }

        if self.retry.max_delay_ms < self.retry.initial_delay_ms {
            return Err(ConfigValidationError::InvalidValue {
                field: "retry.max_delay_ms".into(),
                message: "must not be less than retry.initial_delay_ms".into(),
            });
        }

        if self.verification.max_concurrency == 0 {
            return Err(ConfigValidationError::InvalidValue {
                field: "verification.max_concurrency".into(),
                message: "must be greater than 0".into(),
            });
        }

        for (field, value) in [
            ("retrieval.default_threshold", self.retrieval.default_threshold),
            ("retrieval.semantic_threshold", self.retrieval.semantic_threshold),
        ] {
            if !(-1.0..=1.0).contains(&value) {
                return Err(ConfigValidationError::InvalidValue {
                    field: field.into(),
                    message: "must be between -1 and 1".into(),
                });
            }
        }

        Ok(())
    }
}

fn default_data_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".aura")
}

/// Configuration validation errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigValidationError {
    #[error("completion.base_url is required")]
    MissingCompletionUrl,

    #[error("invalid value for {field}: {message}")]
    InvalidValue { field: String, message: String },
}

impl From<ConfigValidationError> for aura_core::Error {
    fn from(err: ConfigValidationError) -> Self {
        aura_core::Error::Config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = AuraConfig::default();
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.max_delay_ms, 32_000);
        assert_eq!(config.retrieval.default_max_tokens, 4000);
        assert_eq!(config.embeddings.dimensions, 1536);
        assert_eq!(config.verification.max_concurrency, 4);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_retry_policy_from_config() {
        let policy = RetryConfig::default().policy();
        assert_eq!(policy.max_attempts, 5);
        assert_eq!(policy.initial_delay, Duration::from_secs(1));
        assert_eq!(policy.max_delay, Duration::from_secs(32));
    }

    #[test]
    fn test_load_partial_file() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
database_path = "/tmp/aura-test.db"

[retry]
max_attempts = 3

[verification]
plan_model = "gemini-pro"
"#,
        )
        .unwrap();

        let config = AuraConfig::load_file(&path).unwrap();
        assert_eq!(config.database_path, PathBuf::from("/tmp/aura-test.db"));
        assert_eq!(config.retry.max_attempts, 3);
        assert_eq!(config.retry.initial_delay_ms, 1000);
        assert_eq!(config.verification.plan_model.as_deref(), Some("gemini-pro"));
        assert_eq!(config.completion.endpoint, "/api/ai/chat");
    }

    #[test]
    fn test_missing_file_is_default() {
        let dir = tempdir().unwrap();
        let config = AuraConfig::load_file(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.retry.max_attempts, 5);
    }

    #[test]
    fn test_malformed_file_is_config_error() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "retry = 12").unwrap();

        let err = AuraConfig::load_file(&path).unwrap_err();
        assert!(matches!(err, aura_core::Error::Config(_)));
    }

    #[test]
    fn test_env_overrides_file() {
        let vars: HashMap<&str, &str> = [
            ("AURA_COMPLETION_URL", "https://models.internal"),
            ("AURA_MODEL", "gemini-1.5-pro"),
        ]
        .into_iter()
        .collect();

        let mut config = AuraConfig::new("file.db");
        config.apply_env(|key| vars.get(key).map(|v| v.to_string()));

        assert_eq!(config.completion.base_url, "https://models.internal");
        assert_eq!(config.completion.model.as_deref(), Some("gemini-1.5-pro"));
        assert_eq!(config.database_path, PathBuf::from("file.db"));
        assert!(config.completion.api_key.is_none());
    }

    #[test]
    fn test_config_validation() {
        let mut config = AuraConfig::default();
        config.retry.max_attempts = 0;
        assert!(config.validate().is_err());

        let mut config = AuraConfig::default();
        config.retry.backoff_factor = 0.5;
        assert!(config.validate().is_err());

        let mut config = AuraConfig::default();
        config.retry.max_delay_ms = 10;
        assert!(config.validate().is_err());

        let mut config = AuraConfig::default();
        config.retrieval.default_threshold = 1.5;
        assert!(config.validate().is_err());

        let config = AuraConfig::default().with_completion_url("  ");
        let err: aura_core::Error = config.validate().unwrap_err().into();
        assert!(matches!(err, aura_core::Error::Config(_)));
    }
}
