use crate::core::resilient::{CallOutcome, ResilientCaller};
use crate::domain::model::EmbeddingResult;
use crate::domain::ports::{Embedder, GenerativeBackend};
use crate::utils::error::Result;
use async_trait::async_trait;
use std::sync::Arc;

pub const DEFAULT_EMBEDDING_MODEL: &str = "models/text-embedding-004";
pub const EMBEDDING_DIMENSIONS: usize = 768;
/// 單筆嵌入失敗時填入的常數值
pub const FILLER_VALUE: f32 = 0.1;

pub struct GeminiEmbedder {
    backend: Arc<dyn GenerativeBackend>,
    caller: ResilientCaller,
    model: String,
    dimensions: usize,
}

impl GeminiEmbedder {
    pub fn new(
        backend: Arc<dyn GenerativeBackend>,
        caller: ResilientCaller,
        model: impl Into<String>,
    ) -> Self {
        Self {
            backend,
            caller,
            model: model.into(),
            dimensions: EMBEDDING_DIMENSIONS,
        }
    }

    pub fn filler_vector(&self) -> Vec<f32> {
        vec![FILLER_VALUE; self.dimensions]
    }

    async fn embed_one(&self, text: &str) -> Vec<f32> {
        let backend = &self.backend;
        let model = self.model.as_str();
        match self
            .caller
            .call(move || backend.embed_content(model, text))
            .await
        {
            CallOutcome::Success(vector) if vector.len() == self.dimensions => vector,
            CallOutcome::Success(vector) => {
                tracing::warn!(
                    "⚠️ Embedding has {} dimensions, expected {}; using filler",
                    vector.len(),
                    self.dimensions
                );
                self.filler_vector()
            }
            CallOutcome::Fallback(reason) => {
                tracing::warn!("⚠️ Embedding failed ({}), using filler vector", reason);
                self.filler_vector()
            }
        }
    }
}

#[async_trait]
impl Embedder for GeminiEmbedder {
    async fn embed(&self, texts: &[String]) -> Result<EmbeddingResult> {
        let mut vectors = Vec::with_capacity(texts.len());
        for text in texts {
            vectors.push(self.embed_one(text).await);
        }
        tracing::debug!("Embedded {} texts with {}", vectors.len(), self.model);
        Ok(EmbeddingResult { vectors })
    }

    fn id(&self) -> &str {
        self.model.trim_start_matches("models/")
    }

    fn max_tokens(&self) -> u32 {
        2048
    }

    fn dimensions(&self) -> usize {
        self.dimensions
    }
}
