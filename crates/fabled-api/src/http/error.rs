//! Application error type mapping to HTTP status codes and envelope format.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use fabled_types::error::{PersonaError, RepositoryError, UpstreamError};

/// Application-level error that maps to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    Persona(PersonaError),
    Upstream(UpstreamError),
    Repository(RepositoryError),
    /// Validation error.
    Validation(String),
}

impl From<PersonaError> for AppError {
    fn from(e: PersonaError) -> Self {
        AppError::Persona(e)
    }
}

impl From<UpstreamError> for AppError {
    fn from(e: UpstreamError) -> Self {
        AppError::Upstream(e)
    }
}

impl From<RepositoryError> for AppError {
    fn from(e: RepositoryError) -> Self {
        AppError::Repository(e)
    }
}

impl AppError {
    fn parts(&self) -> (StatusCode, &'static str, String) {
        match self {
            AppError::Persona(PersonaError::MissingName) => {
                (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", "Persona not provided".to_string())
            }
            AppError::Persona(PersonaError::NotFound(name)) => (
                StatusCode::NOT_FOUND,
                "PERSONA_NOT_FOUND",
                format!("Persona '{name}' does not exist"),
            ),
            AppError::Persona(e) => (StatusCode::INTERNAL_SERVER_ERROR, "PERSONA_ERROR", e.to_string()),
            AppError::Upstream(e @ UpstreamError::Timeout { .. }) => {
                (StatusCode::GATEWAY_TIMEOUT, "UPSTREAM_TIMEOUT", e.client_message())
            }
            AppError::Upstream(e) => (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", e.client_message()),
            AppError::Repository(e) => (StatusCode::INTERNAL_SERVER_ERROR, "STORAGE_ERROR", e.to_string()),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = self.parts();
        if status.is_server_error() {
            tracing::warn!(code, %message, "Request failed");
        }

        let body = json!({
            "data": null,
            "meta": {
                "request_id": "",
                "timestamp": chrono::Utc::now().to_rfc3339(),
                "response_time_ms": 0
            },
            "errors": [{
                "code": code,
                "message": message,
            }]
        });

        (
            status,
            [(axum::http::header::CONTENT_TYPE, "application/json")],
            body.to_string(),
        )
            .into_response()
    }
}
