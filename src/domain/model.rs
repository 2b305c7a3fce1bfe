use serde::{Deserialize, Serialize};
use std::time::Duration;

/// fallback 結果的模型名稱後綴
pub const FALLBACK_MODEL_SUFFIX: &str = "-fallback";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageInfo {
    pub input_tokens: u32,
    pub output_tokens: u32,
}

impl UsageInfo {
    pub fn zero() -> Self {
        Self::default()
    }

    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationInfo {
    pub schema_name: String,
    pub model: String,
    pub duration: Duration,
    pub usage: UsageInfo,
}

impl GenerationInfo {
    /// fallback 的生成資訊：模型名稱加上標記、用量與耗時歸零
    pub fn fallback(schema_name: &str, model: &str) -> Self {
        Self {
            schema_name: schema_name.to_string(),
            model: format!("{}{}", model, FALLBACK_MODEL_SUFFIX),
            duration: Duration::ZERO,
            usage: UsageInfo::zero(),
        }
    }

    pub fn is_fallback(&self) -> bool {
        self.model.ends_with(FALLBACK_MODEL_SUFFIX)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchematicGenerationResult<T> {
    pub content: T,
    pub info: GenerationInfo,
}

impl<T> SchematicGenerationResult<T> {
    pub fn is_fallback(&self) -> bool {
        self.info.is_fallback()
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> SchematicGenerationResult<U> {
        SchematicGenerationResult {
            content: f(self.content),
            info: self.info,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmbeddingResult {
    pub vectors: Vec<Vec<f32>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModerationCheck {
    pub flagged: bool,
    pub tags: Vec<String>,
}

impl ModerationCheck {
    pub fn unflagged() -> Self {
        Self::default()
    }
}

/// 生成參數提示；未指定的欄位使用預設值
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GenerationHints {
    pub temperature: f32,
    pub top_p: f32,
    pub max_tokens: u32,
}

impl Default for GenerationHints {
    fn default() -> Self {
        Self {
            temperature: 0.1,
            top_p: 0.9,
            max_tokens: 2048,
        }
    }
}

/// 遠端模型的一次文字回應
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    pub text: String,
    pub usage: Option<UsageInfo>,
}

/// 工具結果在宿主對話中的保存範圍
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lifespan {
    Session,
    Response,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub data: serde_json::Value,
    pub lifespan: Lifespan,
}

impl ToolResult {
    pub fn session(data: serde_json::Value) -> Self {
        Self {
            data,
            lifespan: Lifespan::Session,
        }
    }

    pub fn response(data: serde_json::Value) -> Self {
        Self {
            data,
            lifespan: Lifespan::Response,
        }
    }

    /// 失敗結果只保留到本次回應
    pub fn failure(message: impl Into<String>) -> Self {
        Self::response(serde_json::json!({
            "error": message.into(),
            "success": false,
        }))
    }

    pub fn is_success(&self) -> bool {
        self.data
            .get("success")
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fallback_info_is_marked() {
        let info = GenerationInfo::fallback("Reply", "gemini-1.5-flash");
        assert_eq!(info.model, "gemini-1.5-flash-fallback");
        assert!(info.is_fallback());
        assert_eq!(info.usage.total(), 0);
        assert_eq!(info.duration, Duration::ZERO);
    }

    #[test]
    fn test_lifespan_serializes_lowercase() {
        let result = ToolResult::session(serde_json::json!({"success": true}));
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["lifespan"], "session");
        assert!(result.is_success());
        assert!(!ToolResult::failure("boom").is_success());
    }
}
