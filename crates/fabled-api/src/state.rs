//! Application state wiring all services together.
//!
//! AppState holds the concrete service instances used by both CLI and HTTP.
//! The relay and persona service are generic over repository/upstream
//! traits; AppState pins them to the concrete infra implementations.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use fabled_core::chat::relay::{ChatRelay, RelaySettings};
use fabled_core::persona::resolver::PersonaResolver;
use fabled_core::persona::service::PersonaService;
use fabled_infra::llm::openai_compat::OpenAiCompatUpstream;
use fabled_infra::sqlite::conversation::SqliteConversationRepository;
use fabled_infra::sqlite::persona::SqlitePersonaRepository;
use fabled_infra::sqlite::pool::{DatabasePool, database_url};
use fabled_infra::sqlite::session::SqliteSessionSettingsRepository;
use fabled_types::config::GlobalConfig;

/// Concrete type aliases for the generics pinned to infra implementations.
pub type ConcreteRelay = ChatRelay<
    SqlitePersonaRepository,
    SqliteConversationRepository,
    SqliteSessionSettingsRepository,
    OpenAiCompatUpstream,
>;

pub type ConcretePersonaService = PersonaService<SqlitePersonaRepository, SqliteSessionSettingsRepository>;

/// Shared application state holding all services.
#[derive(Clone)]
pub struct AppState {
    pub relay: ConcreteRelay,
    pub persona_service: Arc<ConcretePersonaService>,
    pub conversations: Arc<SqliteConversationRepository>,
    pub upstream: Arc<OpenAiCompatUpstream>,
    pub config: Arc<GlobalConfig>,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Initialize the application state: connect to DB, wire services.
    pub async fn init(data_dir: PathBuf, config: GlobalConfig) -> anyhow::Result<Self> {
        // Ensure data directory exists
        tokio::fs::create_dir_all(&data_dir).await?;

        let db_url = format!("{}?mode=rwc", database_url(&data_dir));
        let db_pool = DatabasePool::new(&db_url).await?;

        let personas = Arc::new(SqlitePersonaRepository::new(db_pool.clone()));
        let conversations = Arc::new(SqliteConversationRepository::new(db_pool.clone()));
        let sessions = Arc::new(SqliteSessionSettingsRepository::new(db_pool));
        let upstream = Arc::new(OpenAiCompatUpstream::new(&config.upstream)?);

        let resolver = PersonaResolver::new(Arc::clone(&personas), config.default_system_prompt.clone());
        let relay = ChatRelay::new(
            resolver,
            Arc::clone(&conversations),
            Arc::clone(&sessions),
            Arc::clone(&upstream),
            RelaySettings {
                temperature: config.upstream.temperature,
                request_timeout: Duration::from_secs(config.upstream.request_timeout_secs),
            },
        );
        let persona_service = PersonaService::new(personas, sessions);

        tracing::debug!(
            data_dir = %data_dir.display(),
            upstream = %upstream.chat_url(),
            "Application state initialized"
        );

        Ok(Self {
            relay,
            persona_service: Arc::new(persona_service),
            conversations,
            upstream,
            config: Arc::new(config),
            data_dir,
        })
    }

    /// Upsert the personas listed in the configuration.
    pub async fn seed_personas(&self) -> anyhow::Result<usize> {
        let seeded = self.persona_service.seed(&self.config.seed_personas).await?;
        tracing::info!(count = seeded, "Seed personas upserted");
        Ok(seeded)
    }
}
