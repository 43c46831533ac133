#![allow(dead_code)]

use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use pdfchat_backend::core::config::defaults::default_config;
use pdfchat_backend::core::config::{AppPaths, Settings};
use pdfchat_backend::llm::{EmbeddingProvider, InferenceEngine, LlmError};
use pdfchat_backend::rag::{PipelineConfig, RagError, SplitterConfig};
use pdfchat_backend::state::session::{ModelLoader, SessionConfig};
use pdfchat_backend::state::AppState;

pub const HASH_DIMENSION: usize = 256;

/// Bag-of-words embedder: each lowercase word is hashed into one bucket.
pub struct HashingEmbedder;

impl HashingEmbedder {
    pub fn vector(text: &str) -> Vec<f32> {
        let mut v = vec![0.0_f32; HASH_DIMENSION];
        for word in text
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            let mut hasher = DefaultHasher::new();
            word.to_lowercase().hash(&mut hasher);
            v[(hasher.finish() as usize) % HASH_DIMENSION] += 1.0;
        }
        let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm > 0.0 {
            for x in v.iter_mut() {
                *x /= norm;
            }
        }
        v
    }
}

#[async_trait]
impl EmbeddingProvider for HashingEmbedder {
    fn model_id(&self) -> &str {
        "hashing-bow"
    }

    async fn embed(&self, inputs: &[String]) -> Result<Vec<Vec<f32>>, LlmError> {
        Ok(inputs.iter().map(|t| Self::vector(t)).collect())
    }
}

/// Answers with the context section of the prompt. Counts one token per character.
pub struct ExtractiveEngine {
    pub n_ctx: usize,
    pub max_tokens: usize,
    pub delay: Duration,
    pub concurrent: bool,
    pub prompts: Mutex<Vec<String>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl ExtractiveEngine {
    pub fn new(n_ctx: usize, max_tokens: usize) -> Self {
        Self {
            n_ctx,
            max_tokens,
            delay: Duration::ZERO,
            concurrent: false,
            prompts: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    /// Most `generate` calls that were running at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InferenceEngine for ExtractiveEngine {
    fn name(&self) -> &str {
        "extractive"
    }

    fn context_window(&self) -> usize {
        self.n_ctx
    }

    fn max_output_tokens(&self) -> usize {
        self.max_tokens
    }

    fn supports_concurrent_generation(&self) -> bool {
        self.concurrent
    }

    async fn count_tokens(&self, text: &str) -> Result<usize, LlmError> {
        Ok(text.chars().count())
    }

    async fn generate(&self, prompt: &str) -> Result<String, LlmError> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(running, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let context = prompt
            .split_once("\n\n")
            .map(|(_, rest)| rest)
            .and_then(|rest| rest.rsplit_once("\n\nQuestion:"))
            .map(|(context, _)| context.trim().to_string())
            .unwrap_or_default();
        Ok(context)
    }
}

/// Hands out the fakes above and counts how often each model is loaded.
pub struct FakeLoader {
    pub engine: Arc<ExtractiveEngine>,
    pub load_delay: Duration,
    pub fail_engine: bool,
    pub embedder_loads: AtomicUsize,
    pub engine_loads: AtomicUsize,
    pub shutdowns: AtomicUsize,
}

impl FakeLoader {
    pub fn new(engine: ExtractiveEngine) -> Self {
        Self {
            engine: Arc::new(engine),
            load_delay: Duration::ZERO,
            fail_engine: false,
            embedder_loads: AtomicUsize::new(0),
            engine_loads: AtomicUsize::new(0),
            shutdowns: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ModelLoader for FakeLoader {
    async fn load_embedder(&self) -> Result<Arc<dyn EmbeddingProvider>, RagError> {
        self.embedder_loads.fetch_add(1, Ordering::SeqCst);
        if !self.load_delay.is_zero() {
            tokio::time::sleep(self.load_delay).await;
        }
        Ok(Arc::new(HashingEmbedder))
    }

    async fn load_engine(&self) -> Result<Arc<dyn InferenceEngine>, RagError> {
        self.engine_loads.fetch_add(1, Ordering::SeqCst);
        if self.fail_engine {
            let path = PathBuf::from("models/missing.gguf");
            return Err(RagError::ModelLoad {
                path: path.clone(),
                source: LlmError::ModelNotFound(path),
            });
        }
        Ok(self.engine.clone())
    }

    async fn shutdown(&self) {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
    }
}

pub const CAPITALS: &str = "Paris is the capital of France.\n\nBerlin is the capital of Germany.\n\nMadrid is the capital of Spain.";

pub fn write_document(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, text).unwrap();
    path
}

pub fn session_config(document_path: PathBuf, chunk_size: usize, chunk_overlap: usize) -> SessionConfig {
    SessionConfig {
        document_path,
        splitter: SplitterConfig {
            chunk_size,
            chunk_overlap,
        },
        pipeline: PipelineConfig::default(),
    }
}

pub fn default_settings() -> Settings {
    serde_json::from_value(default_config()).expect("defaults deserialize")
}

pub fn app_state(dir: &Path, config: SessionConfig, loader: Arc<dyn ModelLoader>) -> Arc<AppState> {
    let paths = Arc::new(AppPaths::from_dirs(dir.to_path_buf(), dir.join("data")));
    AppState::with_loader(paths, default_settings(), config, loader)
}
