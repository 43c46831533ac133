use async_trait::async_trait;

use super::error::LlmError;

/// Maps text to fixed-dimension vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// identifier of the embedding model (e.g. "sentence-transformers/all-MiniLM-L6-v2")
    fn model_id(&self) -> &str;

    /// one vector per input, in input order
    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, LlmError>;
}

/// A loaded language model that turns a prompt into text.
#[async_trait]
pub trait InferenceEngine: Send + Sync {
    /// return the engine name (e.g. "llama_cpp")
    fn name(&self) -> &str;

    /// maximum number of tokens the model considers, prompt and answer together
    fn context_window(&self) -> usize;

    /// maximum number of tokens generated per answer
    fn max_output_tokens(&self) -> usize;

    /// whether `generate` may be called concurrently
    fn supports_concurrent_generation(&self) -> bool {
        false
    }

    /// token count of `text` as the model sees it
    async fn count_tokens(&self, text: &str) -> Result<usize, LlmError> {
        Ok(estimate_tokens(text))
    }

    /// completion for `prompt` (non-streaming)
    async fn generate(&self, prompt: &str) -> Result<String, LlmError>;
}

/// Rough estimate of ~4 bytes per token.
pub fn estimate_tokens(text: &str) -> usize {
    (text.len() + 3) / 4
}
