//! Retrieval-augmented generation over a single document.
//!
//! This module provides:
//! - `loader` / `splitter` / `ingest`: document text to ordered chunks
//! - `VectorIndex`: in-memory cosine top-k over chunk embeddings
//! - `RagPipeline`: question to answer via retrieval and the "stuff" prompt

pub mod error;
pub mod index;
pub mod ingest;
pub mod loader;
pub mod pipeline;
pub mod prompt;
pub mod splitter;

pub use error::RagError;
pub use index::{ChunkSearchResult, VectorIndex};
pub use ingest::{build_index, ingest};
pub use loader::{load_document, SourceDocument};
pub use pipeline::{Answer, PipelineConfig, RagPipeline};
pub use prompt::OverflowPolicy;
pub use splitter::{SplitterConfig, TextChunk, TextSplitter};
