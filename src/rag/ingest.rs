use std::path::Path;

use anyhow::anyhow;

use super::error::RagError;
use super::index::VectorIndex;
use super::loader::load_document;
use super::splitter::{TextChunk, TextSplitter};
use crate::llm::EmbeddingProvider;

/// Load `path` and split it into chunks in document order.
pub fn ingest(path: &Path, splitter: &TextSplitter) -> Result<Vec<TextChunk>, RagError> {
    let document = load_document(path)?;
    let chunks = splitter.split_document(&document);
    if chunks.is_empty() {
        return Err(RagError::document_load(path, anyhow!("document produced no chunks")));
    }

    tracing::info!(
        "Split {} into {} chunks (size {}, overlap {})",
        document.source,
        chunks.len(),
        splitter.config().chunk_size,
        splitter.config().chunk_overlap
    );
    Ok(chunks)
}

/// Embed every chunk and build the index over them.
pub async fn build_index(
    embedder: &dyn EmbeddingProvider,
    chunks: Vec<TextChunk>,
) -> Result<VectorIndex, RagError> {
    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let embeddings = embedder.embed(&texts).await.map_err(RagError::Embedding)?;
    VectorIndex::build(chunks, embeddings)
}
