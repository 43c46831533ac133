use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::server::handlers::{ask, health, page};
use crate::state::AppState;

/// Creates the application router.
///
/// - `GET /`: question form and rendered answer
/// - `POST /api/ask`: JSON question/answer
/// - `GET /health`, `GET /api/status`: liveness and session state
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(page::index))
        .route("/api/ask", post(ask::ask))
        .route("/health", get(health::health))
        .route("/api/status", get(health::get_status))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
