//! SQLite session settings implementation.

use fabled_core::repository::session::SessionSettingsRepository;
use fabled_types::error::RepositoryError;
use fabled_types::persona::SessionSettings;
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `SessionSettingsRepository`.
pub struct SqliteSessionSettingsRepository {
    pool: DatabasePool,
}

impl SqliteSessionSettingsRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

impl SessionSettingsRepository for SqliteSessionSettingsRepository {
    async fn get(&self, session_id: &Uuid) -> Result<Option<SessionSettings>, RepositoryError> {
        let row = sqlx::query("SELECT selected_persona_name FROM session_settings WHERE session_id = ?")
            .bind(session_id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let selected_persona_name: Option<String> = row
                    .try_get("selected_persona_name")
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(SessionSettings {
                    session_id: *session_id,
                    selected_persona_name,
                }))
            }
            None => Ok(None),
        }
    }

    async fn upsert(&self, settings: &SessionSettings) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO session_settings (session_id, selected_persona_name)
               VALUES (?, ?)
               ON CONFLICT (session_id) DO UPDATE SET selected_persona_name = excluded.selected_persona_name"#,
        )
        .bind(settings.session_id.to_string())
        .bind(settings.selected_persona_name.as_deref())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }
}
