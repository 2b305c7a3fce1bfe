use crate::core::resilient::{CallOutcome, ResilientCaller};
use crate::core::tokenizer::CharRatioTokenizer;
use crate::domain::model::{
    Completion, GenerationHints, GenerationInfo, SchematicGenerationResult, UsageInfo,
};
use crate::domain::ports::{EstimatingTokenizer, GenerativeBackend, SchematicGenerator};
use crate::domain::schema::{Schema, Schematic};
use crate::utils::error::{NlpError, Result};
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::marker::PhantomData;
use std::sync::{Arc, OnceLock};
use tokio::time::Instant;

/// 依模型世代回傳 context window 大小
pub fn context_window(model: &str) -> u32 {
    if model.contains("2.0") {
        2_097_152
    } else if model.contains("1.5") {
        1_048_576
    } else {
        30_720
    }
}

/// 在使用者 prompt 後附上 JSON Schema 與輸出格式要求
pub fn build_prompt(prompt: &str, schema: &Schema) -> Result<String> {
    let rendered = serde_json::to_string_pretty(&schema.to_json_schema())?;
    Ok(format!(
        "{}\n\nPlease respond with a valid JSON object that matches this schema:\n{}\n\n\
         Important: Return ONLY the JSON object, no additional text or formatting. \
         Include all required fields.\n",
        prompt.trim_end(),
        rendered
    ))
}

/// 去掉 markdown code fence
pub fn strip_code_fences(text: &str) -> &str {
    let mut cleaned = text.trim();
    if let Some(rest) = cleaned.strip_prefix("```json") {
        cleaned = rest;
    } else if let Some(rest) = cleaned.strip_prefix("```") {
        cleaned = rest;
    }
    if let Some(rest) = cleaned.strip_suffix("```") {
        cleaned = rest;
    }
    cleaned.trim()
}

fn json_object_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?s)\{.*\}").expect("static JSON object pattern"))
}

/// 解析模型回應；直接解析失敗時嘗試擷取第一個 `{...}` 區段一次
pub fn parse_json_response(text: &str) -> Result<Value> {
    let cleaned = strip_code_fences(text);
    match serde_json::from_str::<Value>(cleaned) {
        Ok(value) => Ok(value),
        Err(first_err) => {
            tracing::debug!("Direct JSON parse failed ({}), trying extraction", first_err);
            let candidate = json_object_pattern()
                .find(cleaned)
                .ok_or_else(|| NlpError::malformed(format!("no JSON object in response: {}", first_err)))?;
            serde_json::from_str(candidate.as_str())
                .map_err(|e| NlpError::malformed(format!("extracted JSON is invalid: {}", e)))
        }
    }
}

/// 與型別無關的結構化生成器；typed 版本以此為基礎
#[derive(Clone)]
pub struct StructuredGenerator {
    backend: Arc<dyn GenerativeBackend>,
    caller: ResilientCaller,
    model: String,
    tokenizer: CharRatioTokenizer,
}

impl StructuredGenerator {
    pub fn new(
        backend: Arc<dyn GenerativeBackend>,
        caller: ResilientCaller,
        model: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            caller,
            model: model.into(),
            tokenizer: CharRatioTokenizer,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// 產生符合 schema 的 JSON 值。遠端失敗或回應無法解析時回傳 fallback 結果；
    /// 只有 schema 本身無法合成預設值時才回傳錯誤。
    pub async fn generate_value(
        &self,
        prompt: &str,
        schema: &Schema,
        hints: &GenerationHints,
    ) -> Result<SchematicGenerationResult<Value>> {
        let start = Instant::now();
        let enhanced = build_prompt(prompt, schema)?;

        let backend = &self.backend;
        let model = self.model.as_str();
        let request = enhanced.as_str();
        let outcome = self
            .caller
            .call(move || backend.generate_content(model, request, hints))
            .await;

        let completion = match outcome {
            CallOutcome::Success(completion) => completion,
            CallOutcome::Fallback(reason) => {
                tracing::warn!(
                    "⚠️ Generation for '{}' falling back: {}",
                    schema.name,
                    reason
                );
                return self.fallback(schema);
            }
        };

        let content = match parse_json_response(&completion.text).and_then(|v| schema.conform(v)) {
            Ok(content) => content,
            Err(e) => {
                tracing::error!("❌ Failed to parse response for '{}': {}", schema.name, e);
                tracing::debug!("Raw response: {}", completion.text);
                return self.fallback(schema);
            }
        };

        let usage = self.usage_for(&enhanced, &completion).await;
        tracing::debug!(
            "✅ Generated '{}' with {} ({} tokens)",
            schema.name,
            self.model,
            usage.total()
        );

        Ok(SchematicGenerationResult {
            content,
            info: GenerationInfo {
                schema_name: schema.name.clone(),
                model: self.model.clone(),
                duration: start.elapsed(),
                usage,
            },
        })
    }

    fn fallback(&self, schema: &Schema) -> Result<SchematicGenerationResult<Value>> {
        let content = schema.synthesize_fallback()?;
        Ok(SchematicGenerationResult {
            content: Value::Object(content),
            info: GenerationInfo::fallback(&schema.name, &self.model),
        })
    }

    async fn usage_for(&self, prompt: &str, completion: &Completion) -> UsageInfo {
        match completion.usage {
            Some(usage) => usage,
            None => UsageInfo {
                input_tokens: self.tokenizer.estimate_token_count(prompt).await,
                output_tokens: self.tokenizer.estimate_token_count(&completion.text).await,
            },
        }
    }
}

/// 產生型別 `T` 的結構化輸出
pub struct GeminiSchematicGenerator<T: Schematic> {
    inner: StructuredGenerator,
    schema: Schema,
    _marker: PhantomData<fn() -> T>,
}

impl<T: Schematic> GeminiSchematicGenerator<T> {
    pub fn new(inner: StructuredGenerator) -> Self {
        Self {
            inner,
            schema: T::schema(),
            _marker: PhantomData,
        }
    }
}

#[async_trait]
impl<T: Schematic> SchematicGenerator<T> for GeminiSchematicGenerator<T> {
    async fn generate(
        &self,
        prompt: &str,
        hints: &GenerationHints,
    ) -> Result<SchematicGenerationResult<T>> {
        let result = self.inner.generate_value(prompt, &self.schema, hints).await?;

        match serde_json::from_value::<T>(result.content.clone()) {
            Ok(content) => Ok(SchematicGenerationResult {
                content,
                info: result.info,
            }),
            Err(e) if !result.is_fallback() => {
                tracing::error!("❌ Response does not deserialize into '{}': {}", self.schema.name, e);
                let fallback = self.inner.fallback(&self.schema)?;
                let content = serde_json::from_value::<T>(fallback.content)
                    .map_err(|e| NlpError::schema(format!("fallback for '{}' is not valid: {}", self.schema.name, e)))?;
                Ok(SchematicGenerationResult {
                    content,
                    info: fallback.info,
                })
            }
            Err(e) => Err(NlpError::schema(format!(
                "fallback for '{}' is not valid: {}",
                self.schema.name, e
            ))),
        }
    }

    fn id(&self) -> &str {
        self.inner.model()
    }

    fn max_tokens(&self) -> u32 {
        context_window(self.inner.model())
    }

    fn schema(&self) -> &Schema {
        &self.schema
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rate_limiter::{RateLimiter, RateLimits};
    use crate::core::resilient::RetryPolicy;
    use crate::domain::schema::{FieldKind, FieldSpec};
    use crate::utils::error::QuotaScope;
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    struct ScriptedBackend {
        replies: Vec<Result<String>>,
        calls: AtomicU32,
    }

    impl ScriptedBackend {
        fn new(replies: Vec<Result<String>>) -> Self {
            Self {
                replies,
                calls: AtomicU32::new(0),
            }
        }
    }

    fn clone_reply(reply: &Result<String>) -> Result<String> {
        match reply {
            Ok(text) => Ok(text.clone()),
            Err(NlpError::QuotaExceeded { scope, message }) => Err(NlpError::QuotaExceeded {
                scope: *scope,
                message: message.clone(),
            }),
            Err(e) => Err(NlpError::ApiError {
                status: 503,
                message: e.to_string(),
            }),
        }
    }

    #[async_trait]
    impl GenerativeBackend for ScriptedBackend {
        async fn generate_content(
            &self,
            _model: &str,
            _prompt: &str,
            _hints: &GenerationHints,
        ) -> Result<Completion> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst) as usize;
            let reply = &self.replies[n.min(self.replies.len() - 1)];
            clone_reply(reply).map(|text| Completion { text, usage: None })
        }

        async fn embed_content(&self, _model: &str, _text: &str) -> Result<Vec<f32>> {
            Err(NlpError::malformed("not used"))
        }
    }

    fn generator(backend: Arc<ScriptedBackend>) -> StructuredGenerator {
        let caller = ResilientCaller::new(
            Arc::new(RateLimiter::new(RateLimits::default())),
            RetryPolicy {
                max_retries: 2,
                base_delay: Duration::from_millis(10),
            },
        );
        StructuredGenerator::new(backend, caller, "gemini-1.5-flash")
    }

    fn reply_schema() -> Schema {
        Schema::new("Reply")
            .field(FieldSpec::required("message", FieldKind::String))
            .field(FieldSpec::required("confidence", FieldKind::Number))
    }

    #[derive(Debug, Deserialize)]
    struct Reply {
        message: String,
        confidence: f64,
    }

    impl Schematic for Reply {
        fn schema() -> Schema {
            reply_schema()
        }
    }

    #[test]
    fn test_strip_code_fences() {
        assert_eq!(strip_code_fences("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(strip_code_fences("```\n{}\n```"), "{}");
        assert_eq!(strip_code_fences("  {} "), "{}");
    }

    #[test]
    fn test_parse_json_response_repairs_wrapped_output() {
        let text = "Sure! Here it is:\n{\"message\": \"hi\", \"confidence\": 0.8}\nHope that helps.";
        let value = parse_json_response(text).unwrap();
        assert_eq!(value["message"], "hi");

        assert!(parse_json_response("no json at all").is_err());
    }

    #[test]
    fn test_context_window() {
        assert_eq!(context_window("gemini-2.0-flash-exp"), 2_097_152);
        assert_eq!(context_window("gemini-1.5-flash"), 1_048_576);
        assert_eq!(context_window("gemini-pro"), 30_720);
    }

    #[test]
    fn test_prompt_contains_schema() {
        let prompt = build_prompt("Say hi", &reply_schema()).unwrap();
        assert!(prompt.starts_with("Say hi"));
        assert!(prompt.contains("\"confidence\""));
        assert!(prompt.contains("Return ONLY the JSON object"));
    }

    #[tokio::test]
    async fn test_generate_parses_fenced_json() {
        let backend = Arc::new(ScriptedBackend::new(vec![Ok(
            "```json\n{\"message\": \"hello\", \"confidence\": 0.75}\n```".to_string(),
        )]));
        let generator = GeminiSchematicGenerator::<Reply>::new(generator(backend));

        let result = generator.generate("greet", &GenerationHints::default()).await.unwrap();
        assert_eq!(result.content.message, "hello");
        assert_eq!(result.content.confidence, 0.75);
        assert!(!result.is_fallback());
        assert!(result.info.usage.input_tokens > 0);
        assert_eq!(generator.max_tokens(), 1_048_576);
    }

    #[tokio::test]
    async fn test_unparseable_output_falls_back_without_retry() {
        let backend = Arc::new(ScriptedBackend::new(vec![Ok("I cannot do that".to_string())]));
        let generator = generator(backend.clone());

        let result = generator
            .generate_value("x", &reply_schema(), &GenerationHints::default())
            .await
            .unwrap();

        assert!(result.is_fallback());
        assert_eq!(result.content, json!({"message": "unavailable", "confidence": 0.0}));
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_failure_yields_fallback_metadata() {
        let backend = Arc::new(ScriptedBackend::new(vec![Err(NlpError::ApiError {
            status: 503,
            message: "unavailable".to_string(),
        })]));
        let generator = GeminiSchematicGenerator::<Reply>::new(generator(backend.clone()));

        let result = generator.generate("x", &GenerationHints::default()).await.unwrap();
        assert_eq!(result.content.message, "unavailable");
        assert_eq!(result.content.confidence, 0.0);
        assert_eq!(result.info.model, "gemini-1.5-flash-fallback");
        assert_eq!(result.info.usage, UsageInfo::zero());
        assert_eq!(result.info.duration, Duration::ZERO);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_daily_quota_error_short_circuits() {
        let backend = Arc::new(ScriptedBackend::new(vec![Err(NlpError::QuotaExceeded {
            scope: QuotaScope::PerDay,
            message: "GenerateRequestsPerDayPerProjectPerModel".to_string(),
        })]));
        let generator = generator(backend.clone());

        let first = generator
            .generate_value("x", &reply_schema(), &GenerationHints::default())
            .await
            .unwrap();
        let second = generator
            .generate_value("y", &reply_schema(), &GenerationHints::default())
            .await
            .unwrap();

        assert!(first.is_fallback());
        assert!(second.is_fallback());
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_malformed_schema_propagates() {
        let backend = Arc::new(ScriptedBackend::new(vec![Ok("nope".to_string())]));
        let generator = generator(backend);
        let broken = Schema::new("Broken").field(FieldSpec::required("pick", FieldKind::Enum(vec![])));

        let result = generator
            .generate_value("x", &broken, &GenerationHints::default())
            .await;
        assert!(matches!(result, Err(NlpError::SchemaError { .. })));
    }
}
