use std::sync::Arc;

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::state::AppState;

pub async fn health(State(_state): State<Arc<AppState>>) -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

pub async fn get_status(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let cache = &state.session;
    let session = cache.get();
    let settings = &state.settings;

    Json(json!({
        "state": cache.state(),
        "stats": cache.stats(),
        "document": cache.config().document_path.display().to_string(),
        "chunks": session.as_ref().map(|s| s.pipeline.index().len()),
        "embedding_dimension": session.as_ref().map(|s| s.pipeline.index().dimension()),
        "embedding_model": settings.models.embedding.model,
        "llm_model": settings.models.llm.path,
        "engine": session.as_ref().map(|s| s.pipeline.engine().name().to_string()),
        "top_k": settings.retrieval.top_k,
        "started_at": state.started_at.to_rfc3339(),
        "ready_at": session.as_ref().map(|s| s.ready_at.to_rfc3339()),
    }))
}
