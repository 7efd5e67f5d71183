use crate::error::{ConfigError, CoreError};
use serde::Deserialize;
use std::path::Path;

/// Explicit configuration for every external collaborator. Nothing in the
/// pipeline reads the environment on its own; env vars are folded in here
/// once, at load time.
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    pub youtube: YouTubeConfig,
    pub openai: OpenAiConfig,
    pub quota: QuotaConfig,
    pub retry: RetrySettings,
    pub database: DatabaseConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct YouTubeConfig {
    pub api_base: String,
    pub api_key: String,
    pub request_timeout_secs: u64,
}

impl Default for YouTubeConfig {
    fn default() -> Self {
        Self {
            api_base: "https://www.googleapis.com/youtube/v3".to_string(),
            api_key: String::new(),
            request_timeout_secs: 30,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct OpenAiConfig {
    pub api_base: String,
    pub api_key: String,
    pub model: String,
    pub request_timeout_secs: u64,
}

impl Default for OpenAiConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.openai.com/v1".to_string(),
            api_key: String::new(),
            model: "gpt-3.5-turbo-1106".to_string(),
            request_timeout_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct QuotaConfig {
    /// Lifetime reply ceiling per identity.
    pub ceiling: i64,
}

impl Default for QuotaConfig {
    fn default() -> Self {
        Self { ceiling: 100 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    /// Total attempts for the model call; 1 means no retries.
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub jitter_factor: f64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 1,
            base_delay_ms: 1000,
            max_delay_ms: 30000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: "sqlite://commentquick.db".to_string(),
        }
    }
}

impl AppConfig {
    /// Loads configuration from an optional TOML file, applies environment
    /// overrides, then validates required credentials.
    pub fn load(path: Option<&Path>) -> Result<Self, CoreError> {
        let mut config = match path {
            Some(p) => {
                let raw =
                    std::fs::read_to_string(p).map_err(|_| ConfigError::FileNotFound {
                        path: p.display().to_string(),
                    })?;
                toml::from_str(&raw).map_err(ConfigError::Parse)?
            }
            None => AppConfig::default(),
        };
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("YOUTUBE_API_KEY") {
            self.youtube.api_key = key;
        }
        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            self.openai.api_key = key;
        }
        if let Ok(url) = std::env::var("DATABASE_URL") {
            self.database.url = url;
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.youtube.api_key.is_empty() {
            return Err(ConfigError::MissingEnvironmentVariable {
                var_name: "YOUTUBE_API_KEY".to_string(),
            });
        }
        if self.openai.api_key.is_empty() {
            return Err(ConfigError::MissingEnvironmentVariable {
                var_name: "OPENAI_API_KEY".to_string(),
            });
        }
        if self.quota.ceiling <= 0 {
            return Err(ConfigError::InvalidValue {
                field: "quota.ceiling".to_string(),
                value: self.quota.ceiling.to_string(),
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(ConfigError::InvalidValue {
                field: "retry.max_attempts".to_string(),
                value: "0".to_string(),
            });
        }
        Ok(())
    }
}
