//! CompletionUpstream trait definition.
//!
//! The relay talks to the completion service only through this trait. The
//! production implementation (`OpenAiCompatUpstream`) lives in fabled-infra;
//! tests script the byte stream directly.

use std::pin::Pin;

use bytes::Bytes;
use futures_util::Stream;

use fabled_types::error::UpstreamError;
use fabled_types::llm::ChatCompletionRequest;

/// Raw response body of a streaming completion, in transport-sized chunks.
///
/// Chunk boundaries carry no meaning; the frame parser reassembles lines.
pub type UpstreamByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, UpstreamError>> + Send + 'static>>;

/// Trait for OpenAI-compatible completion backends.
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
pub trait CompletionUpstream: Send + Sync {
    /// Issue one streaming completion request.
    ///
    /// Resolves once response headers arrive. A non-success status is
    /// reported as [`UpstreamError::Status`] with the body read in full;
    /// a success returns the body as a byte stream.
    fn open_stream(
        &self,
        request: &ChatCompletionRequest,
    ) -> impl std::future::Future<Output = Result<UpstreamByteStream, UpstreamError>> + Send;

    /// Ids of the models the upstream currently serves.
    fn list_models(&self) -> impl std::future::Future<Output = Result<Vec<String>, UpstreamError>> + Send;
}
