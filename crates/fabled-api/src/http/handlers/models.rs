//! GET /api/v1/models - model ids served by the upstream.

use std::time::Instant;

use axum::extract::State;

use fabled_core::llm::upstream::CompletionUpstream;

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

pub async fn list_models(State(state): State<AppState>) -> Result<ApiResponse<Vec<String>>, AppError> {
    let start = Instant::now();
    let models = state.upstream.list_models().await?;
    Ok(ApiResponse::timed(models, start))
}
