use thiserror::Error;

/// Errors from repository operations (used by trait definitions in fabled-core).
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("database connection error")]
    Connection,

    #[error("query error: {0}")]
    Query(String),

    #[error("entity not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),
}

/// Errors from talking to the upstream completion service.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum UpstreamError {
    /// Connection refused or reset, or the body could not be read.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("upstream timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// Non-success HTTP status. `body` is the response text, verbatim.
    #[error("HTTP {status}: {body}")]
    Status { status: u16, body: String },

    #[error("deserialization error: {0}")]
    Deserialization(String),
}

impl UpstreamError {
    /// The text shown to the client in the terminal `system` fragment.
    pub fn client_message(&self) -> String {
        match self {
            UpstreamError::Status { status, body } => {
                format!("Failed to send data: {status} - {body}")
            }
            other => format!("An error occurred during the stream: {other}"),
        }
    }
}

/// Errors from persona administration.
#[derive(Debug, Error)]
pub enum PersonaError {
    #[error("persona not provided")]
    MissingName,

    #[error("persona '{0}' does not exist")]
    NotFound(String),

    #[error("storage error: {0}")]
    Repository(#[from] RepositoryError),
}
