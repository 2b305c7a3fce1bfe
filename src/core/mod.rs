pub mod embedder;
pub mod generator;
pub mod moderation;
pub mod rate_limiter;
pub mod resilient;
pub mod service;
pub mod tokenizer;

pub use crate::domain::model::{
    EmbeddingResult, GenerationHints, GenerationInfo, ModerationCheck, SchematicGenerationResult,
    UsageInfo,
};
pub use crate::domain::ports::{
    ConfigProvider, Embedder, EstimatingTokenizer, GenerativeBackend, ModerationService,
    SchematicGenerator,
};
pub use crate::utils::error::Result;
