//! SQLite conversation log implementation.
//!
//! `message_time` is stored as fixed-width RFC 3339 text with microsecond
//! precision and a `Z` suffix, so ordering by the text column orders by time.

use chrono::{DateTime, SecondsFormat, Utc};
use fabled_core::repository::conversation::ConversationRepository;
use fabled_types::conversation::{ConversationEntry, Sender};
use fabled_types::error::RepositoryError;
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `ConversationRepository`.
pub struct SqliteConversationRepository {
    pool: DatabasePool,
}

impl SqliteConversationRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

struct ConversationRow {
    session_id: String,
    persona_name: String,
    message_time: String,
    sender: String,
    content: String,
}

impl ConversationRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            session_id: row.try_get("session_id")?,
            persona_name: row.try_get("persona_name")?,
            message_time: row.try_get("message_time")?,
            sender: row.try_get("sender")?,
            content: row.try_get("content")?,
        })
    }

    fn into_entry(self) -> Result<ConversationEntry, RepositoryError> {
        let session_id = Uuid::parse_str(&self.session_id)
            .map_err(|e| RepositoryError::Query(format!("invalid session_id: {e}")))?;
        let message_time = parse_datetime(&self.message_time)?;
        let sender: Sender = self
            .sender
            .parse()
            .map_err(RepositoryError::Query)?;

        Ok(ConversationEntry {
            session_id,
            persona_name: self.persona_name,
            message_time,
            sender,
            content: self.content,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn format_message_time(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

// ---------------------------------------------------------------------------
// ConversationRepository implementation
// ---------------------------------------------------------------------------

impl ConversationRepository for SqliteConversationRepository {
    async fn upsert(&self, entry: &ConversationEntry) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO conversations (session_id, persona_name, message_time, sender, content)
               VALUES (?, ?, ?, ?, ?)
               ON CONFLICT (session_id, persona_name, message_time, sender)
               DO UPDATE SET content = excluded.content"#,
        )
        .bind(entry.session_id.to_string())
        .bind(&entry.persona_name)
        .bind(format_message_time(&entry.message_time))
        .bind(entry.sender.to_string())
        .bind(&entry.content)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn history(
        &self,
        session_id: &Uuid,
        persona_name: &str,
    ) -> Result<Vec<ConversationEntry>, RepositoryError> {
        let rows = sqlx::query(
            r#"SELECT session_id, persona_name, message_time, sender, content
               FROM conversations
               WHERE session_id = ? AND persona_name = ?
               ORDER BY message_time ASC, sender ASC"#,
        )
        .bind(session_id.to_string())
        .bind(persona_name)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            let conversation_row =
                ConversationRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            entries.push(conversation_row.into_entry()?);
        }

        Ok(entries)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::test_pool;
    use chrono::TimeDelta;
    use fabled_types::conversation::message_time_now;

    fn entry(session_id: Uuid, persona: &str, time: DateTime<Utc>, sender: Sender, content: &str) -> ConversationEntry {
        ConversationEntry {
            session_id,
            persona_name: persona.to_string(),
            message_time: time,
            sender,
            content: content.to_string(),
        }
    }

    #[tokio::test]
    async fn test_roundtrip_preserves_microseconds() {
        let (pool, _dir) = test_pool().await;
        let repo = SqliteConversationRepository::new(pool);
        let session_id = Uuid::new_v4();
        let written = entry(session_id, "default", message_time_now(), Sender::User, "Hello");

        repo.upsert(&written).await.unwrap();

        let history = repo.history(&session_id, "default").await.unwrap();
        assert_eq!(history, vec![written]);
    }

    #[tokio::test]
    async fn test_duplicate_key_overwrites_content() {
        let (pool, _dir) = test_pool().await;
        let repo = SqliteConversationRepository::new(pool);
        let session_id = Uuid::new_v4();
        let time = message_time_now();

        repo.upsert(&entry(session_id, "default", time, Sender::Assistant, "Hi"))
            .await
            .unwrap();
        repo.upsert(&entry(session_id, "default", time, Sender::Assistant, "Hi there"))
            .await
            .unwrap();

        let history = repo.history(&session_id, "default").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, "Hi there");
    }

    #[tokio::test]
    async fn test_same_time_different_sender_are_distinct() {
        let (pool, _dir) = test_pool().await;
        let repo = SqliteConversationRepository::new(pool);
        let session_id = Uuid::new_v4();
        let time = message_time_now();

        repo.upsert(&entry(session_id, "default", time, Sender::User, "a"))
            .await
            .unwrap();
        repo.upsert(&entry(session_id, "default", time, Sender::Assistant, "b"))
            .await
            .unwrap();

        assert_eq!(repo.history(&session_id, "default").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_history_is_ascending_regardless_of_insert_order() {
        let (pool, _dir) = test_pool().await;
        let repo = SqliteConversationRepository::new(pool);
        let session_id = Uuid::new_v4();
        let base = message_time_now();

        for (offset, content) in [(30, "third"), (0, "first"), (1, "second")] {
            let time = base + TimeDelta::microseconds(offset);
            repo.upsert(&entry(session_id, "Bard", time, Sender::User, content))
                .await
                .unwrap();
        }

        let contents: Vec<String> = repo
            .history(&session_id, "Bard")
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.content)
            .collect();
        assert_eq!(contents, vec!["first", "second", "third"]);
    }

    #[tokio::test]
    async fn test_history_is_scoped_to_session_and_persona() {
        let (pool, _dir) = test_pool().await;
        let repo = SqliteConversationRepository::new(pool);
        let session_id = Uuid::new_v4();
        let time = message_time_now();

        repo.upsert(&entry(session_id, "Bard", time, Sender::User, "mine"))
            .await
            .unwrap();
        repo.upsert(&entry(session_id, "Helper", time, Sender::User, "other persona"))
            .await
            .unwrap();
        repo.upsert(&entry(Uuid::new_v4(), "Bard", time, Sender::User, "other session"))
            .await
            .unwrap();

        let history = repo.history(&session_id, "Bard").await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].content, "mine");
    }

    #[test]
    fn test_message_time_text_is_fixed_width() {
        let whole = DateTime::parse_from_rfc3339("2026-10-16T09:30:00Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(format_message_time(&whole), "2026-10-16T09:30:00.000000Z");
        assert_eq!(
            format_message_time(&(whole + TimeDelta::microseconds(7))),
            "2026-10-16T09:30:00.000007Z"
        );
    }
}
