use crate::utils::error::{NlpError, Result};
use crate::utils::validation::{validate_positive_number, validate_url, Validate};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// 選用的 TOML 設定檔；所有區段與欄位都可省略
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TomlConfig {
    pub model: Option<ModelSection>,
    pub rate_limit: Option<RateLimitSection>,
    pub retry: Option<RetrySection>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelSection {
    pub name: Option<String>,
    pub embedding_model: Option<String>,
    pub moderation_model: Option<String>,
    pub base_url: Option<String>,
    pub request_timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RateLimitSection {
    pub requests_per_minute: Option<u64>,
    pub requests_per_day: Option<u64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetrySection {
    pub max_retries: Option<u32>,
    pub base_delay_ms: Option<u64>,
}

impl TomlConfig {
    /// 從 TOML 檔案載入配置
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(&path).map_err(NlpError::IoError)?;
        Self::from_toml_str(&content)
    }

    /// 從 TOML 字串解析配置
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let processed_content = Self::substitute_env_vars(content);

        toml::from_str(&processed_content).map_err(|e| NlpError::ConfigValidationError {
            field: "toml_parsing".to_string(),
            message: format!("TOML parsing error: {}", e),
        })
    }

    /// 替換環境變數 (例如 ${GEMINI_MODEL})；未設定的變數保留原樣
    fn substitute_env_vars(content: &str) -> String {
        let re = Regex::new(r"\$\{([^}]+)\}").expect("static env var pattern");

        re.replace_all(content, |caps: &regex::Captures| {
            let var_name = &caps[1];
            std::env::var(var_name).unwrap_or_else(|_| format!("${{{}}}", var_name))
        })
        .to_string()
    }

    pub fn base_url(&self) -> Option<&str> {
        self.model.as_ref().and_then(|m| m.base_url.as_deref())
    }
}

impl Validate for TomlConfig {
    fn validate(&self) -> Result<()> {
        if let Some(base_url) = self.base_url() {
            validate_url("model.base_url", base_url)?;
        }
        if let Some(timeout) = self.model.as_ref().and_then(|m| m.request_timeout_seconds) {
            validate_positive_number("model.request_timeout_seconds", timeout, 1)?;
        }
        if let Some(limits) = &self.rate_limit {
            if let Some(per_minute) = limits.requests_per_minute {
                validate_positive_number("rate_limit.requests_per_minute", per_minute, 1)?;
            }
            if let Some(per_day) = limits.requests_per_day {
                validate_positive_number("rate_limit.requests_per_day", per_day, 1)?;
            }
            if let (Some(per_minute), Some(per_day)) =
                (limits.requests_per_minute, limits.requests_per_day)
            {
                if per_minute > per_day {
                    return Err(NlpError::InvalidConfigValueError {
                        field: "rate_limit.requests_per_minute".to_string(),
                        value: per_minute.to_string(),
                        reason: "Cannot exceed rate_limit.requests_per_day".to_string(),
                    });
                }
            }
        }
        Ok(())
    }
}
