//! Client for OpenAI-compatible completion servers (LM Studio, llama.cpp,
//! vLLM, Ollama's `/v1` endpoint).
//!
//! Implements [`CompletionUpstream`] with plain reqwest: the request body is
//! serialized from [`ChatCompletionRequest`] as-is and the streamed response
//! body is handed back raw, for `fabled-core`'s frame parser to decode.
//!
//! The client sets a connect timeout only. The whole-turn deadline belongs
//! to the relay, since a read timeout here would also cut long generations.

use std::error::Error as _;
use std::time::Duration;

use futures_util::StreamExt;
use tracing::debug;

use fabled_core::llm::upstream::{CompletionUpstream, UpstreamByteStream};
use fabled_types::config::UpstreamConfig;
use fabled_types::error::UpstreamError;
use fabled_types::llm::{ChatCompletionRequest, ModelList};

/// HTTP client for one OpenAI-compatible server.
#[derive(Clone)]
pub struct OpenAiCompatUpstream {
    client: reqwest::Client,
    chat_url: String,
    models_url: String,
    connect_timeout_secs: u64,
}

impl OpenAiCompatUpstream {
    pub fn new(config: &UpstreamConfig) -> Result<Self, UpstreamError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_secs))
            .build()
            .map_err(|e| UpstreamError::Transport(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            chat_url: config.chat_completions_url(),
            models_url: config.models_url(),
            connect_timeout_secs: config.connect_timeout_secs,
        })
    }

    pub fn chat_url(&self) -> &str {
        &self.chat_url
    }

    fn request_error(&self, err: reqwest::Error) -> UpstreamError {
        if err.is_timeout() {
            UpstreamError::Timeout {
                seconds: self.connect_timeout_secs,
            }
        } else {
            UpstreamError::Transport(error_chain(&err))
        }
    }
}

/// Error text including its sources; reqwest's own message omits the
/// underlying cause (e.g. "Connection refused").
fn error_chain(err: &reqwest::Error) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

async fn status_error(response: reqwest::Response) -> UpstreamError {
    let status = response.status().as_u16();
    let body = response.text().await.unwrap_or_default();
    UpstreamError::Status { status, body }
}

impl CompletionUpstream for OpenAiCompatUpstream {
    async fn open_stream(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<UpstreamByteStream, UpstreamError> {
        debug!(url = %self.chat_url, model = %request.model, "Opening completion stream");

        let response = self
            .client
            .post(&self.chat_url)
            .json(request)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let body = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| UpstreamError::Transport(error_chain(&e))));
        Ok(Box::pin(body))
    }

    async fn list_models(&self) -> Result<Vec<String>, UpstreamError> {
        let response = self
            .client
            .get(&self.models_url)
            .send()
            .await
            .map_err(|e| self.request_error(e))?;

        if !response.status().is_success() {
            return Err(status_error(response).await);
        }

        let list: ModelList = response
            .json()
            .await
            .map_err(|e| UpstreamError::Deserialization(format!("failed to parse model list: {e}")))?;
        Ok(list.data.into_iter().map(|m| m.id).collect())
    }
}
