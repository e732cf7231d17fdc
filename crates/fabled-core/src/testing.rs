//! In-memory repositories and a scripted upstream for unit tests.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use bytes::Bytes;
use uuid::Uuid;

use fabled_types::conversation::{ConversationEntry, ConversationKey};
use fabled_types::error::{RepositoryError, UpstreamError};
use fabled_types::llm::ChatCompletionRequest;
use fabled_types::persona::{Persona, SessionSettings};

use crate::llm::upstream::{CompletionUpstream, UpstreamByteStream};
use crate::repository::conversation::ConversationRepository;
use crate::repository::persona::PersonaRepository;
use crate::repository::session::SessionSettingsRepository;

#[derive(Default)]
pub struct InMemoryPersonaRepository {
    personas: Mutex<BTreeMap<String, Persona>>,
    fail_reads: AtomicBool,
    get_calls: AtomicUsize,
}

impl InMemoryPersonaRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn get_calls(&self) -> usize {
        self.get_calls.load(Ordering::SeqCst)
    }
}

impl PersonaRepository for InMemoryPersonaRepository {
    async fn get(&self, name: &str) -> Result<Option<Persona>, RepositoryError> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(RepositoryError::Connection);
        }
        Ok(self.personas.lock().unwrap().get(name).cloned())
    }

    async fn upsert(&self, persona: &Persona) -> Result<(), RepositoryError> {
        self.personas
            .lock()
            .unwrap()
            .insert(persona.name.clone(), persona.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<Persona>, RepositoryError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(RepositoryError::Connection);
        }
        Ok(self.personas.lock().unwrap().values().cloned().collect())
    }
}

#[derive(Default)]
pub struct InMemoryConversationRepository {
    entries: Mutex<BTreeMap<ConversationKey, ConversationEntry>>,
    fail_writes: AtomicBool,
}

impl InMemoryConversationRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn all(&self) -> Vec<ConversationEntry> {
        self.entries.lock().unwrap().values().cloned().collect()
    }
}

impl ConversationRepository for InMemoryConversationRepository {
    async fn upsert(&self, entry: &ConversationEntry) -> Result<(), RepositoryError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(RepositoryError::Query("disk I/O error".to_string()));
        }
        self.entries.lock().unwrap().insert(entry.key(), entry.clone());
        Ok(())
    }

    async fn history(
        &self,
        session_id: &Uuid,
        persona_name: &str,
    ) -> Result<Vec<ConversationEntry>, RepositoryError> {
        let mut history: Vec<ConversationEntry> = self
            .entries
            .lock()
            .unwrap()
            .values()
            .filter(|e| e.session_id == *session_id && e.persona_name == persona_name)
            .cloned()
            .collect();
        history.sort_by_key(|e| e.message_time);
        Ok(history)
    }
}

#[derive(Default)]
pub struct InMemorySessionSettingsRepository {
    settings: Mutex<BTreeMap<Uuid, SessionSettings>>,
}

impl InMemorySessionSettingsRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SessionSettingsRepository for InMemorySessionSettingsRepository {
    async fn get(&self, session_id: &Uuid) -> Result<Option<SessionSettings>, RepositoryError> {
        Ok(self.settings.lock().unwrap().get(session_id).cloned())
    }

    async fn upsert(&self, settings: &SessionSettings) -> Result<(), RepositoryError> {
        self.settings
            .lock()
            .unwrap()
            .insert(settings.session_id, settings.clone());
        Ok(())
    }
}

/// What the scripted upstream answers to `open_stream`.
#[derive(Clone)]
pub enum Script {
    /// Serve these body chunks, then end the body.
    Body(Vec<Result<Bytes, UpstreamError>>),
    /// Serve these body chunks, then never produce another byte.
    Stall(Vec<Bytes>),
    /// Fail before any body is produced.
    Fail(UpstreamError),
    /// Never answer.
    Hang,
}

impl Script {
    pub fn body(chunks: &[&str]) -> Self {
        Script::Body(
            chunks
                .iter()
                .map(|c| Ok(Bytes::copy_from_slice(c.as_bytes())))
                .collect(),
        )
    }
}

struct DropFlag(Arc<AtomicBool>);

impl Drop for DropFlag {
    fn drop(&mut self) {
        self.0.store(true, Ordering::SeqCst);
    }
}

pub struct ScriptedUpstream {
    script: Script,
    models: Vec<String>,
    requests: Mutex<Vec<ChatCompletionRequest>>,
    body_dropped: Arc<AtomicBool>,
}

impl ScriptedUpstream {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            models: vec!["m1".to_string(), "m2".to_string()],
            requests: Mutex::new(Vec::new()),
            body_dropped: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn requests(&self) -> Vec<ChatCompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    /// True once a served body stream has been dropped.
    pub fn body_dropped(&self) -> bool {
        self.body_dropped.load(Ordering::SeqCst)
    }
}

impl CompletionUpstream for ScriptedUpstream {
    async fn open_stream(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<UpstreamByteStream, UpstreamError> {
        self.requests.lock().unwrap().push(request.clone());

        let (chunks, stall) = match self.script.clone() {
            Script::Body(chunks) => (chunks, false),
            Script::Stall(chunks) => (chunks.into_iter().map(Ok).collect(), true),
            Script::Fail(err) => return Err(err),
            Script::Hang => {
                futures_util::future::pending::<()>().await;
                unreachable!()
            }
        };

        let guard = DropFlag(Arc::clone(&self.body_dropped));
        let body: UpstreamByteStream = Box::pin(async_stream::stream! {
            let _guard = guard;
            for chunk in chunks {
                yield chunk;
            }
            if stall {
                futures_util::future::pending::<()>().await;
            }
        });
        Ok(body)
    }

    async fn list_models(&self) -> Result<Vec<String>, UpstreamError> {
        Ok(self.models.clone())
    }
}
