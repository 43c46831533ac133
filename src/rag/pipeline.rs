//! Retrieval-augmented answering.
//!
//! `RagPipeline::answer` embeds the question, retrieves the closest chunks,
//! fits them into the "stuff" prompt and asks the engine for a completion.
//! Per-question failures come back as `RagError::AnswerGeneration`.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Mutex;

use super::error::RagError;
use super::index::VectorIndex;
use super::prompt::{fit_prompt, OverflowPolicy};
use crate::llm::{EmbeddingProvider, InferenceEngine, LlmError};

#[derive(Debug, Clone)]
pub struct PipelineConfig {
    pub top_k: usize,
    pub max_question_chars: usize,
    pub overflow_policy: OverflowPolicy,
    pub generation_timeout: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            top_k: 3,
            max_question_chars: 2000,
            overflow_policy: OverflowPolicy::DropOldest,
            generation_timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Answer {
    /// Generated text, verbatim.
    pub text: String,
    pub chunks_used: usize,
    pub chunks_dropped: usize,
}

pub struct RagPipeline {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<VectorIndex>,
    engine: Arc<dyn InferenceEngine>,
    config: PipelineConfig,
    generation_lock: Mutex<()>,
}

impl RagPipeline {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<VectorIndex>,
        engine: Arc<dyn InferenceEngine>,
        config: PipelineConfig,
    ) -> Self {
        Self {
            embedder,
            index,
            engine,
            config,
            generation_lock: Mutex::new(()),
        }
    }

    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    pub fn engine(&self) -> &dyn InferenceEngine {
        self.engine.as_ref()
    }

    pub async fn answer(&self, question: &str) -> Result<Answer, RagError> {
        let question = self.validate(question)?;
        self.answer_validated(question)
            .await
            .map_err(RagError::answer_generation)
    }

    fn validate<'q>(&self, question: &'q str) -> Result<&'q str, RagError> {
        let question = question.trim();
        if question.is_empty() {
            return Err(RagError::InvalidQuery(
                "question must not be empty".to_string(),
            ));
        }
        let length = question.chars().count();
        if length > self.config.max_question_chars {
            return Err(RagError::InvalidQuery(format!(
                "question is {} characters long, the limit is {}",
                length, self.config.max_question_chars
            )));
        }
        Ok(question)
    }

    async fn answer_validated(&self, question: &str) -> Result<Answer, RagError> {
        let query = self
            .embedder
            .embed(&[question.to_string()])
            .await
            .map_err(RagError::Embedding)?
            .into_iter()
            .next()
            .ok_or_else(|| {
                RagError::Embedding(LlmError::InvalidResponse(
                    "no embedding returned for the question".to_string(),
                ))
            })?;

        let results = self.index.query(&query, self.config.top_k)?;
        tracing::debug!(
            "Retrieved {} chunks: {:?}",
            results.len(),
            results
                .iter()
                .map(|r| (r.chunk.id.as_str(), r.score))
                .collect::<Vec<_>>()
        );

        let chunks: Vec<_> = results.iter().map(|r| &r.chunk).collect();
        let fitted = fit_prompt(
            self.engine.as_ref(),
            &chunks,
            question,
            self.config.overflow_policy,
        )
        .await?;

        let text = self.generate(&fitted.prompt).await?;
        Ok(Answer {
            text,
            chunks_used: fitted.chunks_used,
            chunks_dropped: fitted.chunks_dropped,
        })
    }

    async fn generate(&self, prompt: &str) -> Result<String, RagError> {
        let timeout = self.config.generation_timeout;
        let _guard = if self.engine.supports_concurrent_generation() {
            None
        } else {
            Some(self.generation_lock.lock().await)
        };

        match tokio::time::timeout(timeout, self.engine.generate(prompt)).await {
            Ok(result) => result.map_err(RagError::Generation),
            Err(_) => Err(RagError::Timeout(timeout)),
        }
    }
}
