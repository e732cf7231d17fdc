//! CLI command definitions and dispatch for the `fabled` binary.
//!
//! Uses clap derive macros for argument parsing. Upstream location flags can
//! also come from the `LLM_HOST`, `LLM_PORT` and `LLM_VERSION` environment
//! variables.

pub mod chat;
pub mod history;
pub mod models;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use uuid::Uuid;

use fabled_types::config::GlobalConfig;

/// Host assumed when only `--llm-port` is given.
const FALLBACK_LLM_HOST: &str = "localhost";

/// Port assumed when only `--llm-host` is given.
const FALLBACK_LLM_PORT: u16 = 1234;

/// Relay chat turns to an OpenAI-compatible model server, in character.
#[derive(Parser)]
#[command(name = "fabled", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export spans to stdout through OpenTelemetry.
    #[arg(long, global = true)]
    pub otel: bool,

    /// Emit log lines as JSON.
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Data directory (defaults to $FABLED_DATA_DIR or ~/.fabled).
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Upstream model server host.
    #[arg(long, env = "LLM_HOST", global = true)]
    pub llm_host: Option<String>,

    /// Upstream model server port.
    #[arg(long, env = "LLM_PORT", global = true)]
    pub llm_port: Option<u16>,

    /// Upstream API version path segment (e.g. `v1`).
    #[arg(long, env = "LLM_VERSION", global = true)]
    pub llm_version: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Start the HTTP relay server.
    Serve {
        /// Port to listen on (defaults to the configured port).
        #[arg(short, long)]
        port: Option<u16>,

        /// Host to bind to (defaults to the configured host).
        #[arg(long)]
        host: Option<String>,
    },

    /// List the models the upstream serves.
    Models,

    /// Show the conversation recorded for a session.
    History {
        /// Session id.
        session_id: Uuid,

        /// Persona the conversation was held with.
        #[arg(long)]
        persona: Option<String>,
    },

    /// Send one message and stream the reply.
    Chat {
        /// Session id to continue (a new one is generated when omitted).
        #[arg(long)]
        session: Option<Uuid>,

        /// Model to run the turn on.
        #[arg(short, long)]
        model: String,

        /// Persona to answer as.
        #[arg(long)]
        persona: Option<String>,

        /// The message to send.
        message: String,
    },
}

impl Cli {
    /// Apply upstream location flags on top of the loaded configuration.
    pub fn apply_overrides(&self, config: &mut GlobalConfig) {
        if self.llm_host.is_some() || self.llm_port.is_some() {
            let host = self.llm_host.as_deref().unwrap_or(FALLBACK_LLM_HOST);
            let port = self.llm_port.unwrap_or(FALLBACK_LLM_PORT);
            config.upstream.base_url = format!("http://{host}:{port}");
        }
        if let Some(version) = &self.llm_version {
            config.upstream.api_version = version.clone();
        }
    }
}
