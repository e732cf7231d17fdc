//! SQLite persona repository implementation.

use fabled_core::repository::persona::PersonaRepository;
use fabled_types::error::RepositoryError;
use fabled_types::persona::Persona;
use sqlx::Row;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `PersonaRepository`.
pub struct SqlitePersonaRepository {
    pool: DatabasePool,
}

impl SqlitePersonaRepository {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

struct PersonaRow {
    name: String,
    default_model: String,
    system_prompt: String,
}

impl PersonaRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            name: row.try_get("name")?,
            default_model: row.try_get("default_model")?,
            system_prompt: row.try_get("system_prompt")?,
        })
    }

    fn into_persona(self) -> Persona {
        Persona {
            name: self.name,
            default_model: self.default_model,
            system_prompt: self.system_prompt,
        }
    }
}

impl PersonaRepository for SqlitePersonaRepository {
    async fn get(&self, name: &str) -> Result<Option<Persona>, RepositoryError> {
        let row = sqlx::query("SELECT name, default_model, system_prompt FROM personas WHERE name = ?")
            .bind(name)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let persona_row =
                    PersonaRow::from_row(&row).map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(persona_row.into_persona()))
            }
            None => Ok(None),
        }
    }

    async fn upsert(&self, persona: &Persona) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO personas (name, default_model, system_prompt)
               VALUES (?, ?, ?)
               ON CONFLICT (name) DO UPDATE SET
                   default_model = excluded.default_model,
                   system_prompt = excluded.system_prompt"#,
        )
        .bind(&persona.name)
        .bind(&persona.default_model)
        .bind(&persona.system_prompt)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    async fn list(&self) -> Result<Vec<Persona>, RepositoryError> {
        let rows = sqlx::query("SELECT name, default_model, system_prompt FROM personas ORDER BY name")
            .fetch_all(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        rows.iter()
            .map(|row| {
                PersonaRow::from_row(row)
                    .map(PersonaRow::into_persona)
                    .map_err(|e| RepositoryError::Query(e.to_string()))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sqlite::test_pool;

    #[tokio::test]
    async fn test_get_missing_is_none() {
        let (pool, _dir) = test_pool().await;
        let repo = SqlitePersonaRepository::new(pool);
        assert_eq!(repo.get("Ghost").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent() {
        let (pool, _dir) = test_pool().await;
        let repo = SqlitePersonaRepository::new(pool);
        let persona = Persona::new("FeyCreature", "llama", "Rhyme.");

        repo.upsert(&persona).await.unwrap();
        repo.upsert(&persona).await.unwrap();

        let all = repo.list().await.unwrap();
        assert_eq!(all, vec![persona.clone()]);
        assert_eq!(repo.get("FeyCreature").await.unwrap(), Some(persona));
    }

    #[tokio::test]
    async fn test_upsert_replaces_fields() {
        let (pool, _dir) = test_pool().await;
        let repo = SqlitePersonaRepository::new(pool);
        repo.upsert(&Persona::new("Bard", "m1", "Sing.")).await.unwrap();
        repo.upsert(&Persona::new("Bard", "m2", "Sing louder.")).await.unwrap();

        let bard = repo.get("Bard").await.unwrap().unwrap();
        assert_eq!(bard.default_model, "m2");
        assert_eq!(bard.system_prompt, "Sing louder.");
    }

    #[tokio::test]
    async fn test_lookup_is_exact() {
        let (pool, _dir) = test_pool().await;
        let repo = SqlitePersonaRepository::new(pool);
        repo.upsert(&Persona::new("Bard", "m1", "Sing.")).await.unwrap();
        assert_eq!(repo.get("bard").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_list_is_sorted() {
        let (pool, _dir) = test_pool().await;
        let repo = SqlitePersonaRepository::new(pool);
        repo.upsert(&Persona::new("Zed", "m", "z")).await.unwrap();
        repo.upsert(&Persona::new("Alpha", "m", "a")).await.unwrap();

        let names: Vec<String> = repo.list().await.unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Alpha", "Zed"]);
    }
}
