#[cfg(feature = "cli")]
pub mod cli;
pub mod toml_config;

use crate::adapters::gemini::DEFAULT_BASE_URL;
use crate::core::embedder::DEFAULT_EMBEDDING_MODEL;
use crate::core::moderation::DEFAULT_MODERATION_MODEL;
use crate::core::rate_limiter::RateLimits;
use crate::core::resilient::RetryPolicy;
use crate::domain::ports::ConfigProvider;
use crate::utils::error::Result;
use crate::utils::validation::{
    validate_non_empty_string, validate_required_field, validate_url,
    Validate,
};
use std::path::Path;
use std::time::Duration;
use toml_config::TomlConfig;

pub const API_KEY_VAR: &str = "GEMINI_API_KEY";
pub const MODEL_VAR: &str = "GEMINI_MODEL";
pub const DEFAULT_MODEL: &str = "gemini-1.5-flash";

/// 執行期設定：環境變數為主，TOML 檔可覆蓋模型與限流參數
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub api_key: String,
    pub model: String,
    pub embedding_model: String,
    pub moderation_model: String,
    pub base_url: String,
    pub request_timeout: Option<Duration>,
    pub rate_limits: RateLimits,
    pub retry: RetryPolicy,
}

impl ServiceConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
            moderation_model: DEFAULT_MODERATION_MODEL.to_string(),
            base_url: DEFAULT_BASE_URL.to_string(),
            request_timeout: None,
            rate_limits: RateLimits::default(),
            retry: RetryPolicy::default(),
        }
    }

    /// 讀取 `.env` 後從行程環境變數建立設定
    pub fn from_env() -> Result<Self> {
        if let Err(e) = dotenvy::dotenv() {
            tracing::debug!("No .env file loaded: {}", e);
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// 以查詢函數取得變數，方便在測試中不修改行程環境
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let api_key = lookup(API_KEY_VAR).filter(|v| !v.trim().is_empty());
        let api_key = validate_required_field(API_KEY_VAR, &api_key)?;

        let mut config = Self::new(api_key.clone());
        if let Some(model) = lookup(MODEL_VAR).filter(|v| !v.trim().is_empty()) {
            config.model = model;
        }
        Ok(config)
    }

    /// 環境變數設定加上 TOML 檔覆蓋
    pub fn from_env_and_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = TomlConfig::from_file(path)?;
        file.validate()?;
        let mut config = Self::from_env()?;
        config.apply(&file);
        Ok(config)
    }

    pub fn apply(&mut self, file: &TomlConfig) {
        if let Some(model) = &file.model {
            if let Some(name) = &model.name {
                self.model = name.clone();
            }
            if let Some(embedding) = &model.embedding_model {
                self.embedding_model = embedding.clone();
            }
            if let Some(moderation) = &model.moderation_model {
                self.moderation_model = moderation.clone();
            }
            if let Some(base_url) = &model.base_url {
                self.base_url = base_url.clone();
            }
            if let Some(seconds) = model.request_timeout_seconds {
                self.request_timeout = Some(Duration::from_secs(seconds));
            }
        }
        if let Some(limits) = &file.rate_limit {
            if let Some(per_minute) = limits.requests_per_minute {
                self.rate_limits.requests_per_minute = per_minute as usize;
            }
            if let Some(per_day) = limits.requests_per_day {
                self.rate_limits.requests_per_day = per_day as usize;
            }
        }
        if let Some(retry) = &file.retry {
            if let Some(max_retries) = retry.max_retries {
                self.retry.max_retries = max_retries;
            }
            if let Some(delay) = retry.base_delay_ms {
                self.retry.base_delay = Duration::from_millis(delay);
            }
        }
    }

    /// 只顯示金鑰前 10 個字元
    pub fn masked_api_key(&self) -> String {
        let prefix: String = self.api_key.chars().take(10).collect();
        format!("{}...", prefix)
    }
}

impl ConfigProvider for ServiceConfig {
    fn api_key(&self) -> &str {
        &self.api_key
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn embedding_model(&self) -> &str {
        &self.embedding_model
    }

    fn moderation_model(&self) -> &str {
        &self.moderation_model
    }

    fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Validate for ServiceConfig {
    fn validate(&self) -> Result<()> {
        validate_non_empty_string(API_KEY_VAR, &self.api_key)?;
        validate_non_empty_string("model", &self.model)?;
        validate_url("model.base_url", &self.base_url)?;
        self.rate_limits.validate()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::error::NlpError;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_missing_api_key_is_reported() {
        let result = ServiceConfig::from_lookup(lookup(&[(MODEL_VAR, "gemini-pro")]));
        match result {
            Err(NlpError::MissingConfigError { field }) => assert_eq!(field, API_KEY_VAR),
            other => panic!("expected missing config error, got {:?}", other),
        }

        let blank = ServiceConfig::from_lookup(lookup(&[(API_KEY_VAR, "  ")]));
        assert!(blank.is_err());
    }

    #[test]
    fn test_model_defaults_and_override() {
        let config = ServiceConfig::from_lookup(lookup(&[(API_KEY_VAR, "abc")])).unwrap();
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.embedding_model, "models/text-embedding-004");
        assert!(config.validate().is_ok());

        let config = ServiceConfig::from_lookup(lookup(&[
            (API_KEY_VAR, "abc"),
            (MODEL_VAR, "gemini-2.0-flash-exp"),
        ]))
        .unwrap();
        assert_eq!(config.model_name(), "gemini-2.0-flash-exp");
    }

    #[test]
    fn test_apply_toml_overrides() {
        let mut config = ServiceConfig::new("abc");
        let file = TomlConfig::from_toml_str(
            r#"
[model]
base_url = "http://127.0.0.1:8080"
request_timeout_seconds = 5

[rate_limit]
requests_per_minute = 2

[retry]
max_retries = 0
base_delay_ms = 10
"#,
        )
        .unwrap();

        config.apply(&file);

        assert_eq!(config.base_url, "http://127.0.0.1:8080");
        assert_eq!(config.request_timeout, Some(Duration::from_secs(5)));
        assert_eq!(config.rate_limits.requests_per_minute, 2);
        assert_eq!(config.rate_limits.requests_per_day, 1500);
        assert_eq!(config.retry.max_retries, 0);
        assert_eq!(config.retry.base_delay, Duration::from_millis(10));
    }

    #[test]
    fn test_masked_api_key() {
        let config = ServiceConfig::new("AIzaSyExampleKey1234567");
        assert_eq!(config.masked_api_key(), "AIzaSyExam...");
    }
}
