//! Gemini REST API 用戶端 (`v1beta`)。

use crate::domain::model::{Completion, GenerationHints, UsageInfo};
use crate::domain::ports::GenerativeBackend;
use crate::utils::error::{NlpError, QuotaScope, Result};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";
const API_KEY_HEADER: &str = "x-goog-api-key";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    contents: Vec<Content<'a>>,
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content<'a> {
    parts: Vec<Part<'a>>,
}

#[derive(Serialize)]
struct Part<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    temperature: f32,
    top_p: f32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    usage_metadata: Option<UsageMetadata>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: u32,
    #[serde(default)]
    candidates_token_count: u32,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct EmbedContentRequest<'a> {
    model: &'a str,
    content: Content<'a>,
    task_type: &'static str,
}

#[derive(Deserialize)]
struct EmbedContentResponse {
    embedding: EmbeddingValues,
}

#[derive(Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

#[derive(Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    status: String,
}

/// 模型名稱統一加上 `models/` 前綴
pub fn model_path(model: &str) -> String {
    if model.starts_with("models/") {
        model.to_string()
    } else {
        format!("models/{}", model)
    }
}

/// 判斷配額錯誤是否屬於每日配額
fn quota_scope(message: &str) -> QuotaScope {
    let lowered = message.to_lowercase();
    if lowered.contains("perday") || lowered.contains("per day") || lowered.contains("daily") {
        QuotaScope::PerDay
    } else {
        QuotaScope::PerMinute
    }
}

/// 將非 2xx 回應轉為錯誤
fn classify_error(status: StatusCode, body: &str) -> NlpError {
    let (message, api_status) = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => (envelope.error.message, envelope.error.status),
        Err(_) => (body.to_string(), String::new()),
    };

    if status == StatusCode::TOO_MANY_REQUESTS || api_status == "RESOURCE_EXHAUSTED" {
        // 每日配額的資訊可能只出現在 details 裡，所以整個 body 都要檢查
        let scope = match quota_scope(&message) {
            QuotaScope::PerDay => QuotaScope::PerDay,
            QuotaScope::PerMinute => quota_scope(body),
        };
        return NlpError::QuotaExceeded { scope, message };
    }

    NlpError::ApiError {
        status: status.as_u16(),
        message,
    }
}

#[derive(Debug, Clone)]
pub struct GeminiClient {
    client: Client,
    base_url: String,
    api_key: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self::with_base_url(api_key, DEFAULT_BASE_URL)
    }

    pub fn with_base_url(api_key: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
        }
    }

    /// 設定單次請求逾時
    pub fn with_timeout(mut self, timeout: Duration) -> Result<Self> {
        self.client = Client::builder().timeout(timeout).build()?;
        Ok(self)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post<B: Serialize + ?Sized>(&self, url: &str, body: &B) -> Result<String> {
        tracing::debug!("Making API request to: {}", url);
        let response = self
            .client
            .post(url)
            .header(API_KEY_HEADER, &self.api_key)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        tracing::debug!("API response status: {}", status);
        let text = response.text().await?;

        if status.is_success() {
            Ok(text)
        } else {
            Err(classify_error(status, &text))
        }
    }
}

#[async_trait]
impl GenerativeBackend for GeminiClient {
    async fn generate_content(
        &self,
        model: &str,
        prompt: &str,
        hints: &GenerationHints,
    ) -> Result<Completion> {
        let url = format!("{}/v1beta/{}:generateContent", self.base_url, model_path(model));
        let request = GenerateContentRequest {
            contents: vec![Content {
                parts: vec![Part { text: prompt }],
            }],
            generation_config: GenerationConfig {
                temperature: hints.temperature,
                top_p: hints.top_p,
                max_output_tokens: hints.max_tokens,
            },
        };

        let body = self.post(&url, &request).await?;
        let response: GenerateContentResponse = serde_json::from_str(&body)?;

        let text: String = response
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<Vec<_>>()
                    .join("")
            })
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| NlpError::malformed("response has no candidate text"))?;

        let usage = response.usage_metadata.map(|u| UsageInfo {
            input_tokens: u.prompt_token_count,
            output_tokens: u.candidates_token_count,
        });

        Ok(Completion { text, usage })
    }

    async fn embed_content(&self, model: &str, text: &str) -> Result<Vec<f32>> {
        let model = model_path(model);
        let url = format!("{}/v1beta/{}:embedContent", self.base_url, model);
        let request = EmbedContentRequest {
            model: &model,
            content: Content {
                parts: vec![Part { text }],
            },
            task_type: "RETRIEVAL_DOCUMENT",
        };

        let body = self.post(&url, &request).await?;
        let response: EmbedContentResponse = serde_json::from_str(&body)?;

        if response.embedding.values.is_empty() {
            return Err(NlpError::malformed("empty embedding returned"));
        }
        Ok(response.embedding.values)
    }
}
