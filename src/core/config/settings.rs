use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::llm::RemoteModel;
use crate::rag::{OverflowPolicy, PipelineConfig, SplitterConfig};

/// Typed view of the merged, validated configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    pub document: DocumentSettings,
    pub models: ModelSettings,
    pub retrieval: RetrievalSettings,
    pub generation: GenerationSettings,
    pub server: ServerSettings,
    pub llama: LlamaSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentSettings {
    pub path: String,
    pub chunk_size: usize,
    pub chunk_overlap: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelSettings {
    pub llm: LlmSettings,
    pub embedding: EmbeddingSettings,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmSettings {
    pub path: String,
    pub n_ctx: u32,
    pub temperature: f64,
    pub max_tokens: usize,
    pub n_gpu_layers: i32,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmbeddingSettings {
    pub model: String,
    pub batch_size: usize,
    pub n_gpu_layers: i32,
    pub port: u16,
    /// Where to fetch the model when no local file matches. `null` disables it.
    pub download: Option<RemoteModel>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalSettings {
    pub top_k: usize,
    pub max_question_chars: usize,
    pub overflow_policy: OverflowPolicy,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationSettings {
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerSettings {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlamaSettings {
    pub server_path: Option<PathBuf>,
    pub health_timeout_secs: u64,
}

impl Settings {
    pub fn splitter_config(&self) -> SplitterConfig {
        SplitterConfig {
            chunk_size: self.document.chunk_size,
            chunk_overlap: self.document.chunk_overlap,
        }
    }

    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            top_k: self.retrieval.top_k,
            max_question_chars: self.retrieval.max_question_chars,
            overflow_policy: self.retrieval.overflow_policy,
            generation_timeout: Duration::from_secs(self.generation.timeout_secs),
        }
    }

    pub fn health_timeout(&self) -> Duration {
        Duration::from_secs(self.llama.health_timeout_secs)
    }
}
