use crate::adapters::gemini::GeminiClient;
use crate::config::ServiceConfig;
use crate::core::embedder::GeminiEmbedder;
use crate::core::generator::{GeminiSchematicGenerator, StructuredGenerator};
use crate::core::moderation::GeminiModerationService;
use crate::core::rate_limiter::RateLimiter;
use crate::core::resilient::ResilientCaller;
use crate::domain::ports::{ConfigProvider, GenerativeBackend};
use crate::domain::schema::Schematic;
use crate::utils::error::Result;
use crate::utils::validation::Validate;
use std::sync::Arc;

/// 提供結構化生成、嵌入與審核的 NLP 服務。
///
/// 限流器在此建立一次，所有產出的元件共用同一個 `Arc<RateLimiter>`，
/// 生命週期與服務（通常即宿主程序）相同。
#[derive(Clone)]
pub struct GeminiNlpService {
    backend: Arc<dyn GenerativeBackend>,
    config: ServiceConfig,
    limiter: Arc<RateLimiter>,
}

impl GeminiNlpService {
    pub fn new(backend: Arc<dyn GenerativeBackend>, config: ServiceConfig) -> Self {
        let limiter = Arc::new(RateLimiter::new(config.rate_limits));
        Self::with_limiter(backend, config, limiter)
    }

    pub fn with_limiter(
        backend: Arc<dyn GenerativeBackend>,
        config: ServiceConfig,
        limiter: Arc<RateLimiter>,
    ) -> Self {
        if let Err(e) = limiter.limits().validate() {
            tracing::warn!("⚠️ Rate limits rejected, every remote call will fall back: {}", e);
        }
        Self {
            backend,
            config,
            limiter,
        }
    }

    /// 以設定建立 HTTP 用戶端與服務
    pub fn from_config(config: ServiceConfig) -> Result<Self> {
        config.validate()?;
        let mut client = GeminiClient::with_base_url(config.api_key(), config.base_url());
        if let Some(timeout) = config.request_timeout {
            client = client.with_timeout(timeout)?;
        }
        tracing::info!(
            "🤖 Gemini NLP service ready (model: {}, embeddings: {})",
            config.model_name(),
            config.embedding_model()
        );
        Ok(Self::new(Arc::new(client), config))
    }

    /// 從環境變數（與 `.env`）建立服務
    pub fn load_from_env() -> Result<Self> {
        Self::from_config(ServiceConfig::from_env()?)
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn rate_limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    fn caller(&self) -> ResilientCaller {
        ResilientCaller::new(self.limiter.clone(), self.config.retry)
    }

    pub fn structured_generator(&self) -> StructuredGenerator {
        StructuredGenerator::new(self.backend.clone(), self.caller(), self.config.model.clone())
    }

    pub fn schematic_generator<T: Schematic>(&self) -> GeminiSchematicGenerator<T> {
        GeminiSchematicGenerator::new(self.structured_generator())
    }

    pub fn embedder(&self) -> GeminiEmbedder {
        GeminiEmbedder::new(
            self.backend.clone(),
            self.caller(),
            self.config.embedding_model.clone(),
        )
    }

    pub fn moderation_service(&self) -> GeminiModerationService {
        GeminiModerationService::new(
            self.backend.clone(),
            self.caller(),
            self.config.moderation_model.clone(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rate_limiter::RateLimits;
    use crate::domain::model::{Completion, GenerationHints};
    use crate::domain::ports::{Embedder, SchematicGenerator};
    use crate::domain::schema::{FieldKind, FieldSpec, Schema};
    use async_trait::async_trait;
    use serde::Deserialize;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct CountingBackend {
        calls: AtomicU32,
    }

    #[async_trait]
    impl GenerativeBackend for CountingBackend {
        async fn generate_content(
            &self,
            _model: &str,
            _prompt: &str,
            _hints: &GenerationHints,
        ) -> Result<Completion> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(Completion {
                text: r#"{"answer": "42"}"#.to_string(),
                usage: None,
            })
        }

        async fn embed_content(&self, _model: &str, _text: &str) -> Result<Vec<f32>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![1.0; 768])
        }
    }

    #[derive(Debug, Deserialize)]
    struct Answer {
        answer: String,
    }

    impl Schematic for Answer {
        fn schema() -> Schema {
            Schema::new("Answer").field(FieldSpec::required("answer", FieldKind::String))
        }
    }

    #[tokio::test]
    async fn test_components_share_one_limiter() {
        let backend = Arc::new(CountingBackend {
            calls: AtomicU32::new(0),
        });
        let mut config = ServiceConfig::new("key");
        config.rate_limits = RateLimits {
            requests_per_minute: 10,
            requests_per_day: 2,
        };
        let service = GeminiNlpService::new(backend.clone(), config);

        let generator = service.schematic_generator::<Answer>();
        let first = generator.generate("q", &GenerationHints::default()).await.unwrap();
        assert_eq!(first.content.answer, "42");

        let embedded = service.embedder().embed(&["a".to_string()]).await.unwrap();
        assert_eq!(embedded.vectors[0][0], 1.0);

        // 每日額度已由生成器與嵌入器共同用完
        let third = generator.generate("q", &GenerationHints::default()).await.unwrap();
        assert!(third.is_fallback());
        assert_eq!(backend.calls.load(Ordering::SeqCst), 2);
        assert!(service.rate_limiter().is_exhausted().await);
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_rate_limit_serves_fallback_immediately() {
        let backend = Arc::new(CountingBackend {
            calls: AtomicU32::new(0),
        });
        let mut config = ServiceConfig::new("key");
        config.rate_limits.requests_per_minute = 0;
        assert!(config.validate().is_err());
        assert!(GeminiNlpService::from_config(config.clone()).is_err());

        let service = GeminiNlpService::new(backend.clone(), config);
        let result = tokio::time::timeout(
            std::time::Duration::from_secs(2),
            service
                .schematic_generator::<Answer>()
                .generate("q", &GenerationHints::default()),
        )
        .await
        .expect("generation must not wait on a zero limit")
        .unwrap();

        assert!(result.is_fallback());
        assert_eq!(result.content.answer, "unavailable");
        assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_from_config_rejects_bad_base_url() {
        let mut config = ServiceConfig::new("key");
        config.base_url = "not a url".to_string();
        assert!(GeminiNlpService::from_config(config).is_err());
    }
}
