//! Persona types.
//!
//! A persona pairs a system prompt with the model it is meant to run on.
//! Two personas are built in and never stored; everything else lives in the
//! persona store and is changed only through upsert.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Name of the built-in debug persona.
pub const SYSTEM_PERSONA_NAME: &str = "System";

/// Name of the built-in generic assistant persona.
pub const HELPER_PERSONA_NAME: &str = "Helper";

/// Persona name used to key conversation entries when a turn has no persona.
pub const DEFAULT_PERSONA_NAME: &str = "default";

/// Prompt used when no persona (or an unknown one) is requested.
pub const DEFAULT_SYSTEM_PROMPT: &str = "Default persona system prompt.";

/// A named system prompt and default model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub name: String,
    pub default_model: String,
    pub system_prompt: String,
}

impl Persona {
    pub fn new(
        name: impl Into<String>,
        default_model: impl Into<String>,
        system_prompt: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            default_model: default_model.into(),
            system_prompt: system_prompt.into(),
        }
    }
}

/// Returns the built-in personas, in name order.
pub fn builtin_personas() -> Vec<Persona> {
    vec![
        Persona::new(
            HELPER_PERSONA_NAME,
            "helper_model",
            "You are a helpful assistant who specializes in Dungeons & Dragons information.",
        ),
        Persona::new(
            SYSTEM_PERSONA_NAME,
            "system_model",
            "You are in system debug mode.",
        ),
    ]
}

/// Look up a built-in persona by exact name.
pub fn builtin_persona(name: &str) -> Option<Persona> {
    builtin_personas().into_iter().find(|p| p.name == name)
}

/// Per-session settings.
///
/// Replaces a process-wide "current persona": each session carries its own
/// selection, and the relay reads it when a request names no persona.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionSettings {
    pub session_id: Uuid,
    pub selected_persona_name: Option<String>,
}

/// Persona administration actions.
///
/// The set is closed: an unknown `action_type` fails to deserialize instead
/// of reaching a dispatch table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action_type", rename_all = "snake_case")]
pub enum PersonaAction {
    List,
    Upsert {
        name: String,
        model: String,
        prompt: String,
    },
    Select {
        session_id: Uuid,
        persona: String,
    },
}

/// Model and prompt of a persona, as reported to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaDetails {
    pub model: String,
    pub prompt: String,
}

impl From<&Persona> for PersonaDetails {
    fn from(persona: &Persona) -> Self {
        Self {
            model: persona.default_model.clone(),
            prompt: persona.system_prompt.clone(),
        }
    }
}

/// Result of a [`PersonaAction`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PersonaActionResult {
    /// Every persona keyed by name.
    Listed(BTreeMap<String, PersonaDetails>),
    Upserted(Persona),
    Selected {
        message: String,
        details: PersonaDetails,
    },
}
