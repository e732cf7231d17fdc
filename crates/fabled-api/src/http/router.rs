//! Axum router configuration with middleware.
//!
//! All routes are under `/api/v1/`, plus a bare `/health` probe.
//! Middleware: CORS, tracing.

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::AppState;

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Chat streaming
        .route("/chat", post(handlers::chat::stream_chat))
        // Persona administration
        .route("/persona", post(handlers::persona::persona_action))
        // Upstream models
        .route("/models", get(handlers::models::list_models))
        // Conversation log
        .route("/sessions/{id}/history", get(handlers::history::get_history));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

async fn health() -> &'static str {
    "ok"
}
