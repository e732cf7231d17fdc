//! Persona administration endpoint.
//!
//! POST /api/v1/persona with a tagged action body:
//! - `{ "action_type": "list" }`
//! - `{ "action_type": "upsert", "name": "...", "model": "...", "prompt": "..." }`
//! - `{ "action_type": "select", "session_id": "<uuid>", "persona": "..." }`

use std::time::Instant;

use axum::Json;
use axum::extract::State;

use fabled_types::persona::{PersonaAction, PersonaActionResult};

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// POST /api/v1/persona - run a persona action.
pub async fn persona_action(
    State(state): State<AppState>,
    Json(action): Json<PersonaAction>,
) -> Result<ApiResponse<PersonaActionResult>, AppError> {
    let start = Instant::now();
    let result = state.persona_service.handle(action).await?;
    Ok(ApiResponse::timed(result, start))
}
