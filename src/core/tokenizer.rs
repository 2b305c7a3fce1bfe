use crate::domain::ports::EstimatingTokenizer;
use async_trait::async_trait;

/// 以字元數估算 token：約每 4 個字元一個 token
#[derive(Debug, Clone, Copy, Default)]
pub struct CharRatioTokenizer;

impl CharRatioTokenizer {
    pub fn estimate(text: &str) -> u32 {
        let chars = text.chars().count() as u32;
        chars.div_ceil(4)
    }
}

#[async_trait]
impl EstimatingTokenizer for CharRatioTokenizer {
    async fn estimate_token_count(&self, prompt: &str) -> u32 {
        Self::estimate(prompt)
    }
}
