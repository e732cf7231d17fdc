//! Conversation log types.
//!
//! A conversation entry is one side of one turn. Entries are keyed by the
//! composite `(session_id, persona_name, message_time, sender)`; writing the
//! same key twice replaces `content`.

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Who produced a conversation entry.
///
/// Stored as lowercase text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Sender {
    User,
    Assistant,
    System,
}

impl fmt::Display for Sender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sender::User => write!(f, "user"),
            Sender::Assistant => write!(f, "assistant"),
            Sender::System => write!(f, "system"),
        }
    }
}

impl FromStr for Sender {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "user" => Ok(Sender::User),
            "assistant" => Ok(Sender::Assistant),
            "system" => Ok(Sender::System),
            other => Err(format!("invalid sender: '{other}'")),
        }
    }
}

/// One stored side of a chat turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationEntry {
    pub session_id: Uuid,
    pub persona_name: String,
    pub message_time: DateTime<Utc>,
    pub sender: Sender,
    pub content: String,
}

/// The composite primary key of a [`ConversationEntry`].
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConversationKey {
    pub session_id: Uuid,
    pub persona_name: String,
    pub message_time: DateTime<Utc>,
    pub sender: Sender,
}

impl ConversationEntry {
    pub fn key(&self) -> ConversationKey {
        ConversationKey {
            session_id: self.session_id,
            persona_name: self.persona_name.clone(),
            message_time: self.message_time,
            sender: self.sender,
        }
    }
}

/// Current time truncated to microseconds.
///
/// Storage keeps microsecond precision, so entries are created at that
/// precision and a retried write lands on the same key.
pub fn message_time_now() -> DateTime<Utc> {
    truncate_to_micros(Utc::now())
}

/// A message time strictly after `previous`.
///
/// Used for the assistant entry of a turn so it never shares the user
/// entry's timestamp, even when the clock has not advanced.
pub fn message_time_after(previous: DateTime<Utc>) -> DateTime<Utc> {
    let now = message_time_now();
    if now > previous {
        now
    } else {
        previous + TimeDelta::microseconds(1)
    }
}

fn truncate_to_micros(time: DateTime<Utc>) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(time.timestamp_micros()).unwrap_or(time)
}
