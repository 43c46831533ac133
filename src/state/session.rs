//! Process-wide retrieval session.
//!
//! The session (index, embedder, engine) is built on first use and shared
//! for the rest of the process. Concurrent first callers wait on the same
//! initialization. A failed build is remembered: later callers get
//! `RagError::SessionUnavailable` and nothing is loaded again.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::OnceCell;

use crate::core::config::{ConfigService, Settings};
use crate::llm::{
    EmbeddingProvider, InferenceEngine, LlamaEmbedder, LlamaEngine, LlamaService, LlmError,
    ModelDownloader, ModelRuntimeConfig, RemoteModel,
};
use crate::rag::{
    build_index, ingest, PipelineConfig, RagError, RagPipeline, SplitterConfig, TextSplitter,
};

const EMBEDDING_N_CTX: u32 = 2048;

/// Loads the two models a session needs.
#[async_trait]
pub trait ModelLoader: Send + Sync {
    async fn load_embedder(&self) -> Result<Arc<dyn EmbeddingProvider>, RagError>;

    async fn load_engine(&self) -> Result<Arc<dyn InferenceEngine>, RagError>;

    /// Release whatever the loaded models hold (processes, handles).
    async fn shutdown(&self) {}
}

/// Loads both models through `llama-server` processes.
///
/// A missing embedding model is downloaded first when a remote source is
/// configured.
pub struct LlamaModelLoader {
    llama: LlamaService,
    downloader: ModelDownloader,
    embedding_model: String,
    embedding_remote: Option<RemoteModel>,
    embedding_dir: PathBuf,
    embedding_config: ModelRuntimeConfig,
    batch_size: usize,
    llm_config: ModelRuntimeConfig,
    temperature: f64,
    max_tokens: usize,
}

impl LlamaModelLoader {
    pub fn new(llama: LlamaService, config: &ConfigService, settings: &Settings) -> Self {
        let embedding = &settings.models.embedding;
        let llm = &settings.models.llm;

        let embedding_config = ModelRuntimeConfig {
            model_key: "embedding".to_string(),
            model_path: config.resolve_embedding_model(&embedding.model),
            port: embedding.port,
            n_ctx: EMBEDDING_N_CTX,
            n_gpu_layers: embedding.n_gpu_layers,
            enable_embedding: true,
        };
        let llm_config = ModelRuntimeConfig {
            model_key: "llm".to_string(),
            model_path: config.resolve_path(&llm.path),
            port: llm.port,
            n_ctx: llm.n_ctx,
            n_gpu_layers: llm.n_gpu_layers,
            enable_embedding: false,
        };

        Self {
            llama,
            downloader: ModelDownloader::new(),
            embedding_model: embedding.model.clone(),
            embedding_remote: embedding.download.clone(),
            embedding_dir: config.embedding_model_dir(&embedding.model),
            embedding_config,
            batch_size: embedding.batch_size,
            llm_config,
            temperature: llm.temperature,
            max_tokens: llm.max_tokens,
        }
    }
}

#[async_trait]
impl ModelLoader for LlamaModelLoader {
    async fn load_embedder(&self) -> Result<Arc<dyn EmbeddingProvider>, RagError> {
        let load_error = |source: LlmError| RagError::EmbeddingModelLoad {
            model: self.embedding_model.clone(),
            source,
        };

        let mut config = self.embedding_config.clone();
        if !config.model_path.is_file() {
            if let Some(remote) = &self.embedding_remote {
                config.model_path = self
                    .downloader
                    .fetch(remote, &self.embedding_dir)
                    .await
                    .map_err(load_error)?;
            }
        }

        let embedder = LlamaEmbedder::load(
            self.llama.clone(),
            config,
            self.embedding_model.clone(),
            self.batch_size,
        )
        .await
        .map_err(load_error)?;
        Ok(Arc::new(embedder))
    }

    async fn load_engine(&self) -> Result<Arc<dyn InferenceEngine>, RagError> {
        let engine = LlamaEngine::load(
            self.llama.clone(),
            self.llm_config.clone(),
            self.temperature,
            self.max_tokens,
        )
        .await
        .map_err(|source| RagError::ModelLoad {
            path: self.llm_config.model_path.clone(),
            source,
        })?;
        Ok(Arc::new(engine))
    }

    async fn shutdown(&self) {
        self.llama.shutdown().await;
    }
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub document_path: PathBuf,
    pub splitter: SplitterConfig,
    pub pipeline: PipelineConfig,
}

/// A ready retrieval session.
pub struct Session {
    pub pipeline: RagPipeline,
    pub document_path: PathBuf,
    pub ready_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheState {
    Uninitialized,
    Initializing,
    Ready,
    Failed,
}

/// How many times each expensive step has run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub ingestions: u64,
    pub embedding_model_loads: u64,
    pub inference_model_loads: u64,
}

#[derive(Default)]
struct Counters {
    ingestions: AtomicU64,
    embedding_model_loads: AtomicU64,
    inference_model_loads: AtomicU64,
}

pub struct SessionCache {
    config: SessionConfig,
    loader: Arc<dyn ModelLoader>,
    cell: OnceCell<Arc<Session>>,
    failure: OnceLock<String>,
    initializing: AtomicBool,
    counters: Counters,
}

/// Marks the cache as initializing for as long as the build future is alive.
struct InitializingGuard<'a>(&'a AtomicBool);

impl<'a> InitializingGuard<'a> {
    fn enter(flag: &'a AtomicBool) -> Self {
        flag.store(true, Ordering::SeqCst);
        Self(flag)
    }
}

impl Drop for InitializingGuard<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl SessionCache {
    pub fn new(config: SessionConfig, loader: Arc<dyn ModelLoader>) -> Self {
        Self {
            config,
            loader,
            cell: OnceCell::new(),
            failure: OnceLock::new(),
            initializing: AtomicBool::new(false),
            counters: Counters::default(),
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// The shared session, building it on the first call.
    ///
    /// Only the first build error is returned as is; every later call gets
    /// `SessionUnavailable` carrying its message.
    pub async fn get_or_initialize(&self) -> Result<Arc<Session>, RagError> {
        let session = self
            .cell
            .get_or_try_init(|| async {
                if let Some(message) = self.failure.get() {
                    return Err(RagError::SessionUnavailable(message.clone()));
                }
                let _initializing = InitializingGuard::enter(&self.initializing);
                match self.build().await {
                    Ok(session) => Ok(Arc::new(session)),
                    Err(err) => {
                        let _ = self.failure.set(err.to_string());
                        Err(err)
                    }
                }
            })
            .await?;
        Ok(session.clone())
    }

    /// The session if it has been built.
    pub fn get(&self) -> Option<Arc<Session>> {
        self.cell.get().cloned()
    }

    pub fn state(&self) -> CacheState {
        if self.cell.initialized() {
            CacheState::Ready
        } else if self.failure.get().is_some() {
            CacheState::Failed
        } else if self.initializing.load(Ordering::SeqCst) {
            CacheState::Initializing
        } else {
            CacheState::Uninitialized
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            ingestions: self.counters.ingestions.load(Ordering::SeqCst),
            embedding_model_loads: self.counters.embedding_model_loads.load(Ordering::SeqCst),
            inference_model_loads: self.counters.inference_model_loads.load(Ordering::SeqCst),
        }
    }

    pub async fn shutdown(&self) {
        self.loader.shutdown().await;
    }

    async fn build(&self) -> Result<Session, RagError> {
        let splitter = TextSplitter::new(self.config.splitter)?;

        tracing::info!("Loading embedding model...");
        self.counters
            .embedding_model_loads
            .fetch_add(1, Ordering::SeqCst);
        let embedder = self.loader.load_embedder().await?;

        tracing::info!(
            "Loading vector database from {}...",
            self.config.document_path.display()
        );
        self.counters.ingestions.fetch_add(1, Ordering::SeqCst);
        let path = self.config.document_path.clone();
        let chunks = tokio::task::spawn_blocking(move || ingest(&path, &splitter))
            .await
            .map_err(|err| RagError::document_load(&self.config.document_path, err))??;
        let index = build_index(embedder.as_ref(), chunks).await?;

        tracing::info!("Loading local language model...");
        self.counters
            .inference_model_loads
            .fetch_add(1, Ordering::SeqCst);
        let engine = self.loader.load_engine().await?;

        let pipeline = RagPipeline::new(
            embedder,
            Arc::new(index),
            engine,
            self.config.pipeline.clone(),
        );
        tracing::info!(
            "Session ready: {} chunks indexed, engine '{}'",
            pipeline.index().len(),
            pipeline.engine().name()
        );

        Ok(Session {
            pipeline,
            document_path: self.config.document_path.clone(),
            ready_at: Utc::now(),
        })
    }
}
