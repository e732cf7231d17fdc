//! ConversationRepository trait definition.

use fabled_types::conversation::ConversationEntry;
use fabled_types::error::RepositoryError;
use uuid::Uuid;

/// Repository trait for the conversation log.
///
/// Implementations serialize concurrent writes to the same composite key;
/// the relay itself performs no locking.
pub trait ConversationRepository: Send + Sync {
    /// Insert or replace an entry by its composite key.
    ///
    /// A duplicate key overwrites `content` and is not an error. Storage
    /// failures are reported.
    fn upsert(
        &self,
        entry: &ConversationEntry,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// All entries for a session and persona, ascending by `message_time`.
    fn history(
        &self,
        session_id: &Uuid,
        persona_name: &str,
    ) -> impl std::future::Future<Output = Result<Vec<ConversationEntry>, RepositoryError>> + Send;
}
