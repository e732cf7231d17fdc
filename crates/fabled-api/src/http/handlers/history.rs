//! Conversation history endpoint.
//!
//! GET /api/v1/sessions/{id}/history?persona=NAME
//!
//! Entries come back oldest first. Without `persona`, returns the entries
//! recorded for turns that ran without one.

use std::time::Instant;

use axum::extract::{Path, Query, State};
use serde::Deserialize;
use uuid::Uuid;

use fabled_core::repository::conversation::ConversationRepository;
use fabled_types::conversation::ConversationEntry;
use fabled_types::persona::DEFAULT_PERSONA_NAME;

use crate::http::error::AppError;
use crate::http::response::ApiResponse;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    #[serde(default)]
    pub persona: Option<String>,
}

/// Parse a UUID from a path parameter, returning a 400 error on invalid format.
fn parse_uuid(s: &str) -> Result<Uuid, AppError> {
    s.parse::<Uuid>()
        .map_err(|_| AppError::Validation(format!("Invalid UUID: {s}")))
}

pub async fn get_history(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Query(query): Query<HistoryQuery>,
) -> Result<ApiResponse<Vec<ConversationEntry>>, AppError> {
    let start = Instant::now();
    let session_id = parse_uuid(&id)?;
    let persona = query
        .persona
        .as_deref()
        .filter(|p| !p.is_empty())
        .unwrap_or(DEFAULT_PERSONA_NAME);

    let entries = state.conversations.history(&session_id, persona).await?;
    Ok(ApiResponse::timed(entries, start))
}
