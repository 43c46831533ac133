//! Prompt assembly and context-window fitting.

use serde::{Deserialize, Serialize};

use super::error::RagError;
use super::splitter::TextChunk;
use crate::llm::InferenceEngine;

const PROMPT_PREAMBLE: &str = "Use the following pieces of context to answer the question at the end. If you don't know the answer, just say that you don't know, don't try to make up an answer.";

/// What to do when the assembled prompt exceeds the context window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    /// Drop the chunk that comes earliest in the document (lowest
    /// `chunk_index`). Prompt order stays by relevance.
    #[default]
    DropOldest,
    /// Drop the least similar chunk, the last one in the prompt.
    DropLeastRelevant,
    /// Refuse the query.
    Fail,
}

impl OverflowPolicy {
    pub const ALLOWED: [&'static str; 3] = ["drop_oldest", "drop_least_relevant", "fail"];
}

/// Fill the "stuff" template with `chunks` in the given order.
pub fn render_prompt<S: AsRef<str>>(chunks: &[S], question: &str) -> String {
    let context = chunks
        .iter()
        .map(|c| c.as_ref())
        .collect::<Vec<_>>()
        .join("\n\n");
    format!("{PROMPT_PREAMBLE}\n\n{context}\n\nQuestion: {question}\nHelpful Answer:")
}

#[derive(Debug, Clone)]
pub struct FittedPrompt {
    pub prompt: String,
    pub tokens: usize,
    pub chunks_used: usize,
    pub chunks_dropped: usize,
}

/// Render the prompt with `chunks` in the given (relevance) order and drop
/// chunks per `policy` until it fits in `context_window - max_output_tokens`
/// tokens.
pub async fn fit_prompt(
    engine: &dyn InferenceEngine,
    chunks: &[&TextChunk],
    question: &str,
    policy: OverflowPolicy,
) -> Result<FittedPrompt, RagError> {
    let budget = engine
        .context_window()
        .saturating_sub(engine.max_output_tokens());
    let mut context: Vec<&TextChunk> = chunks.to_vec();

    loop {
        let texts: Vec<&str> = context.iter().map(|c| c.text.as_str()).collect();
        let prompt = render_prompt(&texts, question);
        let tokens = engine
            .count_tokens(&prompt)
            .await
            .map_err(RagError::Generation)?;

        if tokens <= budget {
            let chunks_dropped = chunks.len() - context.len();
            if chunks_dropped > 0 {
                tracing::warn!(
                    "Dropped {} of {} chunks to fit the context window ({} tokens)",
                    chunks_dropped,
                    chunks.len(),
                    budget
                );
            }
            return Ok(FittedPrompt {
                prompt,
                tokens,
                chunks_used: context.len(),
                chunks_dropped,
            });
        }

        let overflow = RagError::ContextOverflow {
            required: tokens,
            available: budget,
        };
        if context.is_empty() {
            return Err(overflow);
        }

        tracing::debug!(
            "Prompt needs {} tokens, budget is {}; applying {:?}",
            tokens,
            budget,
            policy
        );
        match policy {
            OverflowPolicy::Fail => return Err(overflow),
            OverflowPolicy::DropOldest => {
                let earliest = context
                    .iter()
                    .enumerate()
                    .min_by_key(|(_, c)| c.chunk_index)
                    .map(|(pos, _)| pos)
                    .unwrap_or(0);
                context.remove(earliest);
            }
            OverflowPolicy::DropLeastRelevant => {
                context.pop();
            }
        }
    }
}
