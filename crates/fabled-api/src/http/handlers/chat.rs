//! NDJSON streaming chat endpoint.
//!
//! POST /api/v1/chat
//!
//! Body: `{ "session_id": "<uuid>", "model": "...", "chat_input": "...", "persona": "..."? }`
//!
//! Responds with `application/x-ndjson`, one fragment per line:
//! `{ "role_name": "...", "text_content": "...", "streaming_complete": false }`.
//! The last line has `streaming_complete: true`. Closing the connection early
//! cancels the turn; the partial reply is still recorded.

use axum::Json;
use axum::body::{Body, Bytes};
use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use futures_util::StreamExt;

use fabled_types::chat::{ChatRequestBody, ChatTurnRequest, ClientFragment};

use crate::http::error::AppError;
use crate::state::AppState;

pub const NDJSON_CONTENT_TYPE: &str = "application/x-ndjson";

/// Encode one fragment as a newline-terminated JSON line.
pub fn ndjson_line(fragment: &ClientFragment) -> Result<Bytes, serde_json::Error> {
    let mut line = serde_json::to_vec(fragment)?;
    line.push(b'\n');
    Ok(Bytes::from(line))
}

/// POST /api/v1/chat - relay one chat turn as an NDJSON stream.
pub async fn stream_chat(
    State(state): State<AppState>,
    Json(body): Json<ChatRequestBody>,
) -> Result<Response, AppError> {
    if body.model.trim().is_empty() {
        return Err(AppError::Validation("model is required".to_string()));
    }

    let turn = ChatTurnRequest::from(body);
    tracing::debug!(session_id = %turn.session_id, model = %turn.model, "Chat request accepted");

    // Dropping the body (client disconnect) drops the RelayStream, which
    // cancels the turn.
    let lines = state.relay.start(turn).map(|fragment| ndjson_line(&fragment));

    Ok((
        [(header::CONTENT_TYPE, NDJSON_CONTENT_TYPE)],
        Body::from_stream(lines),
    )
        .into_response())
}
