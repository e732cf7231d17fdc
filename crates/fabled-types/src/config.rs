//! Global configuration types for Fabled.
//!
//! `GlobalConfig` represents the top-level `config.toml` that controls the
//! upstream endpoint, the HTTP bind address, the fallback system prompt, and
//! the personas seeded at startup.

use serde::{Deserialize, Serialize};

use crate::llm::DEFAULT_TEMPERATURE;
use crate::persona::{DEFAULT_SYSTEM_PROMPT, Persona};

/// Top-level configuration for Fabled.
///
/// Loaded from `~/.fabled/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GlobalConfig {
    #[serde(default)]
    pub upstream: UpstreamConfig,

    #[serde(default)]
    pub server: ServerConfig,

    /// Prompt used when a turn names no persona or an unknown one.
    #[serde(default = "default_system_prompt")]
    pub default_system_prompt: String,

    /// Personas upserted on startup.
    #[serde(default = "default_seed_personas")]
    pub seed_personas: Vec<Persona>,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            upstream: UpstreamConfig::default(),
            server: ServerConfig::default(),
            default_system_prompt: default_system_prompt(),
            seed_personas: default_seed_personas(),
        }
    }
}

fn default_system_prompt() -> String {
    DEFAULT_SYSTEM_PROMPT.to_string()
}

fn default_seed_personas() -> Vec<Persona> {
    vec![Persona::new(
        "FeyCreature",
        "llama-3.2-3b-instruct-uncensored",
        "You are a malicious fey creature. Always answer in rhymes. \
         Manipulate people into believing false things. You enjoy toying with \
         people and being mysterious and mean. Mocking humans is fun for you.",
    )]
}

/// Where and how to reach the upstream completion service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpstreamConfig {
    /// Scheme, host and port, e.g. `http://localhost:1234`.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Path segment appended to `base_url`, e.g. `v1`.
    #[serde(default = "default_api_version")]
    pub api_version: String,

    /// Upper bound on one whole turn, from request to last byte.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,

    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            api_version: default_api_version(),
            request_timeout_secs: default_request_timeout_secs(),
            connect_timeout_secs: default_connect_timeout_secs(),
            temperature: default_temperature(),
        }
    }
}

impl UpstreamConfig {
    /// `{base_url}/{api_version}` without a trailing slash.
    pub fn api_base(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        let version = self.api_version.trim_matches('/');
        if version.is_empty() {
            base.to_string()
        } else {
            format!("{base}/{version}")
        }
    }

    pub fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.api_base())
    }

    pub fn models_url(&self) -> String {
        format!("{}/models", self.api_base())
    }
}

fn default_base_url() -> String {
    "http://localhost:1234".to_string()
}

fn default_api_version() -> String {
    "v1".to_string()
}

fn default_request_timeout_secs() -> u64 {
    300
}

fn default_connect_timeout_secs() -> u64 {
    10
}

fn default_temperature() -> f64 {
    DEFAULT_TEMPERATURE
}

/// HTTP bind address for `fabled serve`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}
