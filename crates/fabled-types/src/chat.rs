//! Chat turn request and the client-facing fragment schema.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Inbound chat request as it arrives on the wire.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequestBody {
    pub session_id: Uuid,
    pub model: String,
    pub chat_input: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub persona: Option<String>,
}

/// One chat turn: the relay's unit of work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatTurnRequest {
    pub session_id: Uuid,
    /// Requested persona. Empty strings are treated as absent.
    pub persona_name: Option<String>,
    pub model: String,
    pub user_text: String,
}

impl ChatTurnRequest {
    /// The requested persona, ignoring empty names.
    pub fn requested_persona(&self) -> Option<&str> {
        self.persona_name.as_deref().filter(|name| !name.is_empty())
    }
}

impl From<ChatRequestBody> for ChatTurnRequest {
    fn from(body: ChatRequestBody) -> Self {
        Self {
            session_id: body.session_id,
            persona_name: body.persona,
            model: body.model,
            user_text: body.chat_input,
        }
    }
}

/// Role name carried by fragments that report a relay failure.
pub const SYSTEM_ROLE_NAME: &str = "system";

/// One streamed unit sent to the client.
///
/// Each reply ends with exactly one fragment whose `streaming_complete` is
/// true; nothing follows it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientFragment {
    pub role_name: String,
    pub text_content: String,
    pub streaming_complete: bool,
}

impl ClientFragment {
    /// The bare end-of-reply marker.
    pub fn end_of_reply() -> Self {
        Self {
            role_name: String::new(),
            text_content: String::new(),
            streaming_complete: true,
        }
    }

    /// A terminal fragment reporting a failure to the client.
    pub fn system_error(message: impl Into<String>) -> Self {
        Self {
            role_name: SYSTEM_ROLE_NAME.to_string(),
            text_content: message.into(),
            streaming_complete: true,
        }
    }
}
