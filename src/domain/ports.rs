use crate::domain::model::{
    Completion, EmbeddingResult, GenerationHints, ModerationCheck, SchematicGenerationResult,
    ToolResult,
};
use crate::domain::schema::Schema;
use crate::utils::error::Result;
use async_trait::async_trait;

pub trait ConfigProvider: Send + Sync {
    fn api_key(&self) -> &str;
    fn model_name(&self) -> &str;
    fn embedding_model(&self) -> &str;
    fn moderation_model(&self) -> &str;
    fn base_url(&self) -> &str;
}

/// 對遠端生成式 API 的最小介面，測試時可用假的實作取代 HTTP
#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    async fn generate_content(
        &self,
        model: &str,
        prompt: &str,
        hints: &GenerationHints,
    ) -> Result<Completion>;

    async fn embed_content(&self, model: &str, text: &str) -> Result<Vec<f32>>;
}

#[async_trait]
pub trait EstimatingTokenizer: Send + Sync {
    async fn estimate_token_count(&self, prompt: &str) -> u32;
}

#[async_trait]
pub trait SchematicGenerator<T: Send>: Send + Sync {
    async fn generate(
        &self,
        prompt: &str,
        hints: &GenerationHints,
    ) -> Result<SchematicGenerationResult<T>>;

    fn id(&self) -> &str;
    fn max_tokens(&self) -> u32;
    fn schema(&self) -> &Schema;
}

#[async_trait]
pub trait Embedder: Send + Sync {
    async fn embed(&self, texts: &[String]) -> Result<EmbeddingResult>;

    fn id(&self) -> &str;
    fn max_tokens(&self) -> u32;
    fn dimensions(&self) -> usize;
}

#[async_trait]
pub trait ModerationService: Send + Sync {
    async fn check(&self, content: &str) -> ModerationCheck;
}

#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &'static str;
    fn description(&self) -> &'static str;
    /// 參數的 JSON Schema
    fn parameters(&self) -> serde_json::Value;
    async fn call(&self, args: serde_json::Value) -> Result<ToolResult>;
}
