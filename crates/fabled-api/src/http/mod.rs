//! HTTP layer for Fabled.
//!
//! Axum-based API at `/api/v1/`: the NDJSON chat stream, persona
//! administration, model listing and conversation history.

pub mod error;
pub mod handlers;
pub mod response;
pub mod router;
