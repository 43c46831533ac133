use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::core::errors::ApiError;
use crate::rag::Answer;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AskRequest {
    pub question: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AskResponse {
    pub answer: String,
    pub chunks_used: usize,
    pub chunks_dropped: usize,
}

impl From<Answer> for AskResponse {
    fn from(answer: Answer) -> Self {
        Self {
            answer: answer.text,
            chunks_used: answer.chunks_used,
            chunks_dropped: answer.chunks_dropped,
        }
    }
}

pub async fn ask(
    State(state): State<Arc<AppState>>,
    request: Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AskResponse>, ApiError> {
    let Json(request) = request?;
    let session = state.session.get_or_initialize().await?;
    match session.pipeline.answer(&request.question).await {
        Ok(answer) => Ok(Json(answer.into())),
        Err(err) => {
            tracing::warn!("Question failed: {}", err);
            Err(err.into())
        }
    }
}
