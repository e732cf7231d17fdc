//! System prompt resolution.
//!
//! Order: built-in personas, then the persona store, then the configured
//! default prompt. Resolution never fails; a store error is logged and
//! treated as a miss.

use std::sync::Arc;

use tracing::{debug, warn};

use fabled_types::persona::builtin_persona;

use crate::repository::persona::PersonaRepository;

/// Maps a requested persona name to the system prompt for a turn.
pub struct PersonaResolver<P: PersonaRepository> {
    personas: Arc<P>,
    default_prompt: String,
}

impl<P: PersonaRepository> PersonaResolver<P> {
    pub fn new(personas: Arc<P>, default_prompt: impl Into<String>) -> Self {
        Self {
            personas,
            default_prompt: default_prompt.into(),
        }
    }

    pub fn default_prompt(&self) -> &str {
        &self.default_prompt
    }

    /// Effective system prompt for `persona`. Absent or empty names get the
    /// default prompt.
    pub async fn resolve(&self, persona: Option<&str>) -> String {
        let Some(name) = persona.filter(|n| !n.is_empty()) else {
            return self.default_prompt.clone();
        };

        if let Some(builtin) = builtin_persona(name) {
            return builtin.system_prompt;
        }

        match self.personas.get(name).await {
            Ok(Some(stored)) => stored.system_prompt,
            Ok(None) => {
                debug!(persona = name, "Unknown persona, using default prompt");
                self.default_prompt.clone()
            }
            Err(e) => {
                warn!(persona = name, error = %e, "Persona lookup failed, using default prompt");
                self.default_prompt.clone()
            }
        }
    }
}

impl<P: PersonaRepository> Clone for PersonaResolver<P> {
    fn clone(&self) -> Self {
        Self {
            personas: Arc::clone(&self.personas),
            default_prompt: self.default_prompt.clone(),
        }
    }
}
