use thiserror::Error;

/// 配額範圍：每分鐘配額可等待，每日配額用盡後直到重啟都不再嘗試
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuotaScope {
    PerMinute,
    PerDay,
}

impl std::fmt::Display for QuotaScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            QuotaScope::PerMinute => write!(f, "per-minute"),
            QuotaScope::PerDay => write!(f, "per-day"),
        }
    }
}

#[derive(Error, Debug)]
pub enum NlpError {
    #[error("API request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Missing required configuration: {field}")]
    MissingConfigError { field: String },

    #[error("Invalid value '{value}' for {field}: {reason}")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration validation failed for {field}: {message}")]
    ConfigValidationError { field: String, message: String },

    #[error("Remote API returned {status}: {message}")]
    ApiError { status: u16, message: String },

    #[error("Quota exceeded ({scope}): {message}")]
    QuotaExceeded { scope: QuotaScope, message: String },

    #[error("Daily request quota exhausted for this process")]
    DailyQuotaExhausted,

    #[error("Malformed model response: {message}")]
    MalformedResponse { message: String },

    #[error("Schema error: {message}")]
    SchemaError { message: String },

    #[error("Tool '{name}' failed: {message}")]
    ToolError { name: String, message: String },
}

pub type Result<T> = std::result::Result<T, NlpError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Configuration,
    Network,
    Quota,
    Response,
    Schema,
    Tool,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl NlpError {
    pub fn config(message: impl Into<String>) -> Self {
        NlpError::ConfigError {
            message: message.into(),
        }
    }

    pub fn schema(message: impl Into<String>) -> Self {
        NlpError::SchemaError {
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        NlpError::MalformedResponse {
            message: message.into(),
        }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            NlpError::ConfigError { .. }
            | NlpError::MissingConfigError { .. }
            | NlpError::InvalidConfigValueError { .. }
            | NlpError::ConfigValidationError { .. } => ErrorCategory::Configuration,
            NlpError::HttpError(_) | NlpError::ApiError { .. } => ErrorCategory::Network,
            NlpError::QuotaExceeded { .. } | NlpError::DailyQuotaExhausted => ErrorCategory::Quota,
            NlpError::MalformedResponse { .. } | NlpError::SerializationError(_) => {
                ErrorCategory::Response
            }
            NlpError::SchemaError { .. } => ErrorCategory::Schema,
            NlpError::ToolError { .. } => ErrorCategory::Tool,
            NlpError::IoError(_) => ErrorCategory::System,
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Tool => ErrorSeverity::Low,
            ErrorCategory::Network | ErrorCategory::Quota | ErrorCategory::Response => {
                ErrorSeverity::Medium
            }
            ErrorCategory::Configuration | ErrorCategory::Schema => ErrorSeverity::High,
            ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    pub fn is_daily_quota(&self) -> bool {
        matches!(
            self,
            NlpError::QuotaExceeded {
                scope: QuotaScope::PerDay,
                ..
            } | NlpError::DailyQuotaExhausted
        )
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            NlpError::MissingConfigError { field } => {
                format!("{} environment variable is required", field)
            }
            NlpError::InvalidConfigValueError { field, reason, .. } => {
                format!("Invalid configuration for {}: {}", field, reason)
            }
            NlpError::HttpError(_) => "Could not reach the generative AI API".to_string(),
            NlpError::QuotaExceeded { scope, .. } => {
                format!("The API {} request quota has been exceeded", scope)
            }
            NlpError::DailyQuotaExhausted => {
                "The daily API quota is exhausted for this process".to_string()
            }
            other => other.to_string(),
        }
    }

    pub fn recovery_suggestion(&self) -> &'static str {
        match self.category() {
            ErrorCategory::Configuration => {
                "Create a .env file with GEMINI_API_KEY or check the TOML configuration"
            }
            ErrorCategory::Network => "Check network connectivity and the API base URL",
            ErrorCategory::Quota => "Wait for the quota window to reset or restart the process",
            ErrorCategory::Response => "Retry the request; the model output was not valid JSON",
            ErrorCategory::Schema => "Give every required field a kind, enum value, or default",
            ErrorCategory::Tool => "Check the tool name and its JSON arguments",
            ErrorCategory::System => "Check file permissions and available disk space",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_daily_quota_detection() {
        let err = NlpError::QuotaExceeded {
            scope: QuotaScope::PerDay,
            message: "GenerateRequestsPerDay".to_string(),
        };
        assert!(err.is_daily_quota());
        assert_eq!(err.category(), ErrorCategory::Quota);
    }

    #[test]
    fn test_minute_quota_is_not_daily() {
        let err = NlpError::QuotaExceeded {
            scope: QuotaScope::PerMinute,
            message: "slow down".to_string(),
        };
        assert!(!err.is_daily_quota());
        assert_eq!(err.severity(), ErrorSeverity::Medium);
    }

    #[test]
    fn test_missing_config_severity() {
        let err = NlpError::MissingConfigError {
            field: "GEMINI_API_KEY".to_string(),
        };
        assert_eq!(err.severity(), ErrorSeverity::High);
        assert!(err.user_friendly_message().contains("GEMINI_API_KEY"));
    }
}
