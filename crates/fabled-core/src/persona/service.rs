//! Persona administration: list, upsert, per-session selection, seeding.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::info;
use uuid::Uuid;

use fabled_types::error::PersonaError;
use fabled_types::persona::{
    Persona, PersonaAction, PersonaActionResult, PersonaDetails, SessionSettings, builtin_persona,
    builtin_personas,
};

use crate::repository::persona::PersonaRepository;
use crate::repository::session::SessionSettingsRepository;

/// Handles [`PersonaAction`]s against the persona and session stores.
///
/// Generic over the repositories so fabled-core never depends on
/// fabled-infra.
pub struct PersonaService<P: PersonaRepository, S: SessionSettingsRepository> {
    personas: Arc<P>,
    sessions: Arc<S>,
}

impl<P: PersonaRepository, S: SessionSettingsRepository> PersonaService<P, S> {
    pub fn new(personas: Arc<P>, sessions: Arc<S>) -> Self {
        Self { personas, sessions }
    }

    /// Dispatch one action.
    pub async fn handle(&self, action: PersonaAction) -> Result<PersonaActionResult, PersonaError> {
        match action {
            PersonaAction::List => Ok(PersonaActionResult::Listed(self.list().await?)),
            PersonaAction::Upsert {
                name,
                model,
                prompt,
            } => {
                let persona = Persona::new(name, model, prompt);
                self.upsert(&persona).await?;
                Ok(PersonaActionResult::Upserted(persona))
            }
            PersonaAction::Select {
                session_id,
                persona,
            } => {
                let details = self.select(session_id, &persona).await?;
                Ok(PersonaActionResult::Selected {
                    message: format!("Persona {persona} selected"),
                    details,
                })
            }
        }
    }

    /// Stored personas merged with the built-ins, keyed by name.
    ///
    /// A stored persona sharing a built-in's name is hidden by the built-in,
    /// matching what the resolver would use.
    pub async fn list(&self) -> Result<BTreeMap<String, PersonaDetails>, PersonaError> {
        let mut listed: BTreeMap<String, PersonaDetails> = self
            .personas
            .list()
            .await?
            .iter()
            .map(|p| (p.name.clone(), PersonaDetails::from(p)))
            .collect();
        for builtin in builtin_personas() {
            listed.insert(builtin.name.clone(), PersonaDetails::from(&builtin));
        }
        Ok(listed)
    }

    pub async fn upsert(&self, persona: &Persona) -> Result<(), PersonaError> {
        if persona.name.trim().is_empty() {
            return Err(PersonaError::MissingName);
        }
        self.personas.upsert(persona).await?;
        info!(persona = %persona.name, model = %persona.default_model, "Persona upserted");
        Ok(())
    }

    /// Record `name` as the session's persona. The persona must exist.
    pub async fn select(&self, session_id: Uuid, name: &str) -> Result<PersonaDetails, PersonaError> {
        let persona = self.find(name).await?;
        self.sessions
            .upsert(&SessionSettings {
                session_id,
                selected_persona_name: Some(persona.name.clone()),
            })
            .await?;
        info!(session_id = %session_id, persona = %persona.name, "Persona selected");
        Ok(PersonaDetails::from(&persona))
    }

    /// The persona a session has selected, if any.
    pub async fn selected(&self, session_id: &Uuid) -> Result<Option<String>, PersonaError> {
        Ok(self
            .sessions
            .get(session_id)
            .await?
            .and_then(|s| s.selected_persona_name))
    }

    /// Built-in or stored persona by exact name.
    pub async fn find(&self, name: &str) -> Result<Persona, PersonaError> {
        if name.is_empty() {
            return Err(PersonaError::MissingName);
        }
        if let Some(builtin) = builtin_persona(name) {
            return Ok(builtin);
        }
        self.personas
            .get(name)
            .await?
            .ok_or_else(|| PersonaError::NotFound(name.to_string()))
    }

    /// Upsert the configured seed personas. Returns how many were written.
    pub async fn seed(&self, seeds: &[Persona]) -> Result<usize, PersonaError> {
        for persona in seeds {
            self.upsert(persona).await?;
        }
        Ok(seeds.len())
    }
}
