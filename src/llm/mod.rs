pub mod download;
pub mod error;
pub mod llama_cpp;
pub mod llama_service;
pub mod provider;

pub use download::{ModelDownloader, RemoteModel};
pub use error::LlmError;
pub use llama_cpp::{LlamaEmbedder, LlamaEngine};
pub use llama_service::{LlamaService, ModelRuntimeConfig};
pub use provider::{EmbeddingProvider, InferenceEngine};
