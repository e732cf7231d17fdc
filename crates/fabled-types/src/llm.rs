//! Wire types for the OpenAI-compatible upstream completion service.
//!
//! The request side mirrors `POST {base}/chat/completions` with
//! `stream: true`; the response side models one decoded `data:` frame.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// `max_tokens` value telling the upstream not to cap the reply.
pub const UNBOUNDED_MAX_TOKENS: i64 = -1;

/// Sampling temperature sent with every turn unless configured otherwise.
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

/// Role of a message in an upstream conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

impl FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "system" => Ok(MessageRole::System),
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            other => Err(format!("invalid message role: '{other}'")),
        }
    }
}

/// A single message in an upstream conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

/// Body of a streaming chat-completions request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<Message>,
    pub temperature: f64,
    pub max_tokens: i64,
    pub stream: bool,
}

impl ChatCompletionRequest {
    /// Build the request for a single turn: one system message, one user message.
    pub fn for_turn(
        model: impl Into<String>,
        system_prompt: impl Into<String>,
        user_text: impl Into<String>,
        temperature: f64,
    ) -> Self {
        Self {
            model: model.into(),
            messages: vec![
                Message {
                    role: MessageRole::System,
                    content: system_prompt.into(),
                },
                Message {
                    role: MessageRole::User,
                    content: user_text.into(),
                },
            ],
            temperature,
            max_tokens: UNBOUNDED_MAX_TOKENS,
            stream: true,
        }
    }

    /// The system prompt carried by this request, if any.
    pub fn system_prompt(&self) -> Option<&str> {
        self.messages
            .iter()
            .find(|m| m.role == MessageRole::System)
            .map(|m| m.content.as_str())
    }
}

/// One decoded `data:` payload of the upstream stream.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

/// A choice within a streamed chunk.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: ChunkDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

/// The incremental part of a streamed choice.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkDelta {
    #[serde(default)]
    pub role: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
}

/// A decoded upstream event: the first choice of one frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpstreamEvent {
    pub role: Option<String>,
    pub content: Option<String>,
    /// Completion marker (`finish_reason`). Present only on the last event.
    pub finish_reason: Option<String>,
}

impl UpstreamEvent {
    /// Take the first choice of a chunk. Chunks without choices carry no event.
    pub fn from_chunk(chunk: ChatCompletionChunk) -> Option<Self> {
        let choice = chunk.choices.into_iter().next()?;
        Some(Self {
            role: choice.delta.role,
            content: choice.delta.content,
            finish_reason: choice.finish_reason,
        })
    }

    /// True when the delta carries neither a role nor any text.
    pub fn delta_is_empty(&self) -> bool {
        self.role.is_none() && self.content.as_deref().is_none_or(str::is_empty)
    }

    pub fn is_final(&self) -> bool {
        self.finish_reason.is_some()
    }
}

/// One item produced by the frame parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamFrame {
    /// A decoded `data: {...}` line.
    Event(UpstreamEvent),
    /// The `data: [DONE]` sentinel.
    Done,
}

/// Response of `GET {base}/models`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelList {
    #[serde(default)]
    pub data: Vec<ModelEntry>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelEntry {
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn turn_request_body_shape() {
        let request = ChatCompletionRequest::for_turn("m1", "be brief", "Hello", DEFAULT_TEMPERATURE);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["model"], "m1");
        assert_eq!(json["messages"][0]["role"], "system");
        assert_eq!(json["messages"][0]["content"], "be brief");
        assert_eq!(json["messages"][1]["role"], "user");
        assert_eq!(json["messages"][1]["content"], "Hello");
        assert_eq!(json["temperature"], 0.7);
        assert_eq!(json["max_tokens"], -1);
        assert_eq!(json["stream"], true);
        assert_eq!(request.system_prompt(), Some("be brief"));
    }

    #[test]
    fn chunk_with_role_and_content() {
        let chunk: ChatCompletionChunk = serde_json::from_str(
            r#"{"id":"x","choices":[{"index":0,"delta":{"role":"assistant","content":"Hi"},"finish_reason":null}]}"#,
        )
        .unwrap();
        let event = UpstreamEvent::from_chunk(chunk).unwrap();
        assert_eq!(event.role.as_deref(), Some("assistant"));
        assert_eq!(event.content.as_deref(), Some("Hi"));
        assert!(!event.is_final());
        assert!(!event.delta_is_empty());
    }

    #[test]
    fn chunk_with_empty_delta_and_stop() {
        let chunk: ChatCompletionChunk =
            serde_json::from_str(r#"{"choices":[{"delta":{},"finish_reason":"stop"}]}"#).unwrap();
        let event = UpstreamEvent::from_chunk(chunk).unwrap();
        assert!(event.delta_is_empty());
        assert!(event.is_final());
    }

    #[test]
    fn chunk_without_choices_has_no_event() {
        let chunk: ChatCompletionChunk =
            serde_json::from_str(r#"{"choices":[],"usage":{"prompt_tokens":3}}"#).unwrap();
        assert!(UpstreamEvent::from_chunk(chunk).is_none());
    }

    #[test]
    fn model_list_ids() {
        let list: ModelList =
            serde_json::from_str(r#"{"object":"list","data":[{"id":"a"},{"id":"b"}]}"#).unwrap();
        let ids: Vec<&str> = list.data.iter().map(|m| m.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
    }
}
