use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

use crate::llm::LlmError;

/// Errors raised while building the session or answering a question.
///
/// Startup variants (`DocumentLoad`, `EmbeddingModelLoad`, `ModelLoad`) are
/// fatal. Everything that goes wrong while answering one question is wrapped in
/// `AnswerGeneration` so the shell can report it and keep serving.
#[derive(Debug, Error)]
pub enum RagError {
    #[error("failed to load document {}: {source}", path.display())]
    DocumentLoad {
        path: PathBuf,
        #[source]
        source: anyhow::Error,
    },

    #[error("failed to load embedding model '{model}': {source}")]
    EmbeddingModelLoad {
        model: String,
        #[source]
        source: LlmError,
    },

    #[error("failed to load language model {}: {source}", path.display())]
    ModelLoad {
        path: PathBuf,
        #[source]
        source: LlmError,
    },

    #[error("prompt needs {required} tokens but only {available} fit in the context window")]
    ContextOverflow { required: usize, available: usize },

    #[error("failed to generate answer: {0}")]
    AnswerGeneration(#[source] Box<RagError>),

    #[error("retrieval session is unavailable: {0}")]
    SessionUnavailable(String),

    #[error("invalid question: {0}")]
    InvalidQuery(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("embedding request failed: {0}")]
    Embedding(#[source] LlmError),

    #[error("generation failed: {0}")]
    Generation(#[source] LlmError),

    #[error("generation timed out after {}s", .0.as_secs())]
    Timeout(Duration),
}

impl RagError {
    pub fn answer_generation(cause: RagError) -> Self {
        match cause {
            wrapped @ RagError::AnswerGeneration(_) => wrapped,
            other => RagError::AnswerGeneration(Box::new(other)),
        }
    }

    pub fn document_load(path: impl Into<PathBuf>, source: impl Into<anyhow::Error>) -> Self {
        RagError::DocumentLoad {
            path: path.into(),
            source: source.into(),
        }
    }

    /// The innermost cause, looking through `AnswerGeneration`.
    pub fn cause(&self) -> &RagError {
        match self {
            RagError::AnswerGeneration(inner) => inner.cause(),
            other => other,
        }
    }
}
