use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::core::config::{AppPaths, ConfigService, Settings};
use crate::llm::LlamaService;

pub mod error;
pub mod session;

use error::InitializationError;
use session::{LlamaModelLoader, ModelLoader, SessionCache, SessionConfig};

/// State shared by every route.
///
/// Holds the paths and settings the process started with and the lazily
/// built retrieval session.
#[derive(Clone)]
pub struct AppState {
    pub paths: Arc<AppPaths>,
    pub settings: Arc<Settings>,
    pub session: Arc<SessionCache>,
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Load configuration and wire the llama-backed session cache.
    ///
    /// Nothing heavy happens here; models and the document are loaded by the
    /// first `SessionCache::get_or_initialize` call.
    pub fn initialize(paths: Arc<AppPaths>) -> Result<Arc<Self>, InitializationError> {
        let config = ConfigService::new(paths.clone());
        let settings = config.load_settings()?;

        let llama = LlamaService::new(
            &paths,
            settings.llama.server_path.as_deref(),
            settings.health_timeout(),
        );
        let loader = Arc::new(LlamaModelLoader::new(llama, &config, &settings));
        let session_config = SessionConfig {
            document_path: config.resolve_path(&settings.document.path),
            splitter: settings.splitter_config(),
            pipeline: settings.pipeline_config(),
        };

        Ok(Self::with_loader(paths, settings, session_config, loader))
    }

    /// Build state around an arbitrary model loader.
    pub fn with_loader(
        paths: Arc<AppPaths>,
        settings: Settings,
        session_config: SessionConfig,
        loader: Arc<dyn ModelLoader>,
    ) -> Arc<Self> {
        Arc::new(AppState {
            paths,
            settings: Arc::new(settings),
            session: Arc::new(SessionCache::new(session_config, loader)),
            started_at: Utc::now(),
        })
    }
}
