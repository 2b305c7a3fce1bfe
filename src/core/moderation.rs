use crate::core::generator::parse_json_response;
use crate::core::resilient::{CallOutcome, ResilientCaller};
use crate::domain::model::{GenerationHints, ModerationCheck};
use crate::domain::ports::{GenerativeBackend, ModerationService};
use async_trait::async_trait;
use std::sync::Arc;

pub const DEFAULT_MODERATION_MODEL: &str = "gemini-1.5-flash";

pub const CATEGORIES: [(&str, &str); 7] = [
    ("harassment", "Harassment or bullying content"),
    ("hate", "Hate speech or discrimination"),
    ("illicit", "Illegal activities or substances"),
    ("self-harm", "Self-harm or suicide content"),
    ("sexual", "Sexual or adult content"),
    ("violence", "Violence or graphic content"),
    ("jailbreak", "Prompt injection attempts"),
];

static MODERATION_HINTS: GenerationHints = GenerationHints {
    temperature: 0.1,
    top_p: 0.9,
    max_tokens: 256,
};

pub fn build_moderation_prompt(content: &str) -> String {
    let categories = CATEGORIES
        .iter()
        .map(|(name, desc)| format!("- {}: {}", name, desc))
        .collect::<Vec<_>>()
        .join("\n");
    format!(
        "Analyze the following content for policy violations and respond with JSON:\n\n\
         Content: {:?}\n\n\
         Check for these categories:\n{}\n\n\
         Respond with JSON in this format:\n\
         {{\"flagged\": true/false, \"categories\": [\"list\", \"of\", \"flagged\", \"categories\"]}}\n\n\
         Only include categories that are clearly violated. Be conservative - only flag obviously problematic content.\n",
        content, categories
    )
}

/// 從模型回應取出旗標與已知分類；無法解析時回傳 None
fn interpret(text: &str) -> Option<ModerationCheck> {
    let value = parse_json_response(text).ok()?;
    let flagged = value.get("flagged")?.as_bool()?;
    let tags = value
        .get("categories")
        .and_then(|v| v.as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| item.as_str())
                .map(|tag| tag.trim().to_lowercase())
                .filter(|tag| CATEGORIES.iter().any(|(name, _)| *name == tag.as_str()))
                .collect()
        })
        .unwrap_or_default();
    Some(ModerationCheck { flagged, tags })
}

/// 以生成模型做內容審核；任何失敗都放行（flagged = false）
pub struct GeminiModerationService {
    backend: Arc<dyn GenerativeBackend>,
    caller: ResilientCaller,
    model: String,
}

impl GeminiModerationService {
    pub fn new(
        backend: Arc<dyn GenerativeBackend>,
        caller: ResilientCaller,
        model: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            caller,
            model: model.into(),
        }
    }
}

#[async_trait]
impl ModerationService for GeminiModerationService {
    async fn check(&self, content: &str) -> ModerationCheck {
        let prompt = build_moderation_prompt(content);
        let backend = &self.backend;
        let model = self.model.as_str();
        let request = prompt.as_str();

        let completion = match self
            .caller
            .call(move || backend.generate_content(model, request, &MODERATION_HINTS))
            .await
        {
            CallOutcome::Success(completion) => completion,
            CallOutcome::Fallback(reason) => {
                tracing::error!("❌ Moderation check failed: {}", reason);
                return ModerationCheck::unflagged();
            }
        };

        match interpret(&completion.text) {
            Some(check) => {
                if check.flagged {
                    tracing::info!("🚩 Content flagged: {:?}", check.tags);
                }
                check
            }
            None => {
                tracing::error!("❌ Moderation response could not be parsed");
                ModerationCheck::unflagged()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rate_limiter::{RateLimiter, RateLimits};
    use crate::core::resilient::RetryPolicy;
    use crate::domain::model::Completion;
    use crate::utils::error::{NlpError, Result};
    use std::time::Duration;

    struct FixedBackend(Option<&'static str>);

    #[async_trait]
    impl GenerativeBackend for FixedBackend {
        async fn generate_content(
            &self,
            _model: &str,
            _prompt: &str,
            _hints: &GenerationHints,
        ) -> Result<Completion> {
            match self.0 {
                Some(text) => Ok(Completion {
                    text: text.to_string(),
                    usage: None,
                }),
                None => Err(NlpError::ApiError {
                    status: 500,
                    message: "down".to_string(),
                }),
            }
        }

        async fn embed_content(&self, _model: &str, _text: &str) -> Result<Vec<f32>> {
            Ok(Vec::new())
        }
    }

    fn service(reply: Option<&'static str>) -> GeminiModerationService {
        let caller = ResilientCaller::new(
            Arc::new(RateLimiter::new(RateLimits::default())),
            RetryPolicy {
                max_retries: 1,
                base_delay: Duration::from_millis(5),
            },
        );
        GeminiModerationService::new(Arc::new(FixedBackend(reply)), caller, DEFAULT_MODERATION_MODEL)
    }

    #[tokio::test]
    async fn test_flagged_response_keeps_known_tags() {
        let service = service(Some(
            "```json\n{\"flagged\": true, \"categories\": [\"Violence\", \"made-up\"]}\n```",
        ));
        let check = service.check("something bad").await;
        assert!(check.flagged);
        assert_eq!(check.tags, vec!["violence".to_string()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_failure_fails_open() {
        let check = service(None).check("anything").await;
        assert_eq!(check, ModerationCheck::unflagged());
        assert!(check.tags.is_empty());
    }

    #[tokio::test]
    async fn test_garbage_response_fails_open() {
        let check = service(Some("I'd rather not say")).check("anything").await;
        assert!(!check.flagged);
    }

    #[test]
    fn test_prompt_lists_all_categories() {
        let prompt = build_moderation_prompt("hello");
        for (name, _) in CATEGORIES {
            assert!(prompt.contains(name));
        }
        assert!(prompt.contains("\"hello\""));
    }
}
