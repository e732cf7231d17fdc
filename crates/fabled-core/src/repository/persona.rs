//! PersonaRepository trait definition.

use fabled_types::error::RepositoryError;
use fabled_types::persona::Persona;

/// Repository trait for persona persistence.
pub trait PersonaRepository: Send + Sync {
    /// Get a persona by exact name. A miss is `Ok(None)`, not an error.
    fn get(
        &self,
        name: &str,
    ) -> impl std::future::Future<Output = Result<Option<Persona>, RepositoryError>> + Send;

    /// Insert or replace a persona by name.
    ///
    /// Upserting identical input twice leaves exactly one row.
    fn upsert(
        &self,
        persona: &Persona,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;

    /// List all stored personas, ordered by name.
    fn list(&self) -> impl std::future::Future<Output = Result<Vec<Persona>, RepositoryError>> + Send;
}
