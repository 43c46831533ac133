//! In-memory vector index.
//!
//! Holds one (chunk, embedding) pair per chunk of the loaded document and
//! answers top-k queries by brute-force cosine similarity. Built once and
//! never mutated afterwards.

use serde::Serialize;

use super::error::RagError;
use super::splitter::TextChunk;
use crate::vector_math::rank_descending_by_cosine;

/// Result of a similarity search.
#[derive(Debug, Clone, Serialize)]
pub struct ChunkSearchResult {
    pub chunk: TextChunk,
    /// Cosine similarity (higher = better).
    pub score: f32,
}

#[derive(Debug)]
pub struct VectorIndex {
    chunks: Vec<TextChunk>,
    embeddings: Vec<Vec<f32>>,
    dimension: usize,
}

impl VectorIndex {
    /// Build the index from chunks and their embeddings, paired by position.
    pub fn build(chunks: Vec<TextChunk>, embeddings: Vec<Vec<f32>>) -> Result<Self, RagError> {
        if chunks.len() != embeddings.len() {
            return Err(RagError::Config(format!(
                "got {} embeddings for {} chunks",
                embeddings.len(),
                chunks.len()
            )));
        }
        let Some(first) = embeddings.first() else {
            return Err(RagError::Config(
                "cannot build an index without chunks".to_string(),
            ));
        };

        let dimension = first.len();
        if dimension == 0 {
            return Err(RagError::Config("embeddings must not be empty".to_string()));
        }
        if let Some(bad) = embeddings.iter().find(|e| e.len() != dimension) {
            return Err(RagError::DimensionMismatch {
                expected: dimension,
                actual: bad.len(),
            });
        }

        tracing::info!(
            "Built vector index with {} chunks (dimension {})",
            chunks.len(),
            dimension
        );

        Ok(Self {
            chunks,
            embeddings,
            dimension,
        })
    }

    /// The `k` chunks most similar to `vector`, best first.
    pub fn query(&self, vector: &[f32], k: usize) -> Result<Vec<ChunkSearchResult>, RagError> {
        if vector.len() != self.dimension {
            return Err(RagError::DimensionMismatch {
                expected: self.dimension,
                actual: vector.len(),
            });
        }
        if k == 0 {
            return Ok(Vec::new());
        }

        let ranked = rank_descending_by_cosine(vector, &self.embeddings)?;
        Ok(ranked
            .into_iter()
            .take(k)
            .map(|(idx, score)| ChunkSearchResult {
                chunk: self.chunks[idx].clone(),
                score,
            })
            .collect())
    }

    pub fn len(&self) -> usize {
        self.chunks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chunks.is_empty()
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn chunks(&self) -> &[TextChunk] {
        &self.chunks
    }
}
