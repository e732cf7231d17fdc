//! SessionSettingsRepository trait definition.

use fabled_types::error::RepositoryError;
use fabled_types::persona::SessionSettings;
use uuid::Uuid;

/// Repository trait for per-session settings (the selected persona).
pub trait SessionSettingsRepository: Send + Sync {
    fn get(
        &self,
        session_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<SessionSettings>, RepositoryError>> + Send;

    /// Insert or replace the settings row for a session.
    fn upsert(
        &self,
        settings: &SessionSettings,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}
