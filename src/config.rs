use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::ai::DEFAULT_OPENAI_BASE_URL;
use crate::error::{AppError, Result};
use crate::services::{RetryPolicy, DEFAULT_USER_AGENT};

const APP_DIR: &str = "tech-radar";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub db_path: String,

    /// Overridden by `OPENAI_API_KEY` when that is set.
    pub openai_api_key: Option<String>,
    pub openai_base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,

    pub fetch_timeout_secs: u64,
    pub ai_timeout_secs: u64,
    pub article_concurrency: usize,
    pub source_concurrency: usize,
    pub max_retries: u32,
    pub retry_base_delay_ms: u64,
    pub user_agent: String,
}

fn default_db_path() -> String {
    let data_dir = dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR);
    std::fs::create_dir_all(&data_dir).ok();
    data_dir.join("radar.db").to_string_lossy().to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            openai_api_key: None,
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            model: "gpt-4".to_string(),
            temperature: 0.3,
            max_tokens: 1000,
            fetch_timeout_secs: 30,
            ai_timeout_secs: 60,
            article_concurrency: 4,
            source_concurrency: 2,
            max_retries: 2,
            retry_base_delay_ms: 1000,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl Config {
    /// Load from the default location, writing a default file on first run.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            toml::from_str::<Config>(&content)?
        } else {
            let config = Config::default();
            config.save_to(path)?;
            tracing::info!(path = %path.display(), "wrote default config");
            config
        };

        if let Ok(key) = std::env::var("OPENAI_API_KEY") {
            if !key.trim().is_empty() {
                config.openai_api_key = Some(key);
            }
        }

        config.validate()?;
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)
            .map_err(|e| AppError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        Ok(())
    }

    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(APP_DIR)
            .join("config.toml")
    }

    pub fn validate(&self) -> Result<()> {
        if self.article_concurrency == 0 || self.source_concurrency == 0 {
            return Err(AppError::Config("concurrency settings must be at least 1".into()));
        }
        if self.fetch_timeout_secs == 0 || self.ai_timeout_secs == 0 {
            return Err(AppError::Config("timeouts must be at least 1 second".into()));
        }
        if !(0.0..=2.0).contains(&self.temperature) {
            return Err(AppError::Config(format!(
                "temperature must be within 0.0..=2.0, got {}",
                self.temperature
            )));
        }
        if self.max_tokens == 0 {
            return Err(AppError::Config("max_tokens must be at least 1".into()));
        }
        Ok(())
    }

    /// The API key, or a config error naming both ways to provide one.
    pub fn require_api_key(&self) -> Result<&str> {
        self.openai_api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| {
                AppError::Config(format!(
                    "no OpenAI API key: set OPENAI_API_KEY or openai_api_key in {}",
                    Self::config_path().display()
                ))
            })
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }

    pub fn ai_timeout(&self) -> Duration {
        Duration::from_secs(self.ai_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            Duration::from_millis(self.retry_base_delay_ms),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_file_falls_back_to_defaults() {
        let config: Config = toml::from_str(
            r#"
            db_path = "/tmp/radar.db"
            article_concurrency = 8
            "#,
        )
        .unwrap();
        assert_eq!(config.db_path, "/tmp/radar.db");
        assert_eq!(config.article_concurrency, 8);
        assert_eq!(config.model, "gpt-4");
        assert_eq!(config.max_tokens, 1000);
        assert_eq!(config.fetch_timeout(), Duration::from_secs(30));
        assert_eq!(config.retry_policy().max_retries, 2);
    }

    #[test]
    fn first_load_writes_default_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let config = Config::load_from(&path).unwrap();
        assert!(path.exists());
        assert_eq!(config.source_concurrency, 2);

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded.db_path, config.db_path);
    }

    #[test]
    fn validate_rejects_bad_values() {
        let mut config = Config::default();
        config.article_concurrency = 0;
        assert!(matches!(config.validate(), Err(AppError::Config(_))));

        let mut config = Config::default();
        config.temperature = 3.5;
        assert!(config.validate().is_err());

        let mut config = Config::default();
        config.ai_timeout_secs = 0;
        assert!(config.validate().is_err());

        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn missing_api_key_is_a_config_error() {
        let mut config = Config::default();
        config.openai_api_key = Some("   ".into());
        assert!(matches!(config.require_api_key(), Err(AppError::Config(_))));
        config.openai_api_key = Some("sk-live".into());
        assert_eq!(config.require_api_key().unwrap(), "sk-live");
    }
}
