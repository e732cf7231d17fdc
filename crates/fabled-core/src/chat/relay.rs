//! One chat turn, end to end.
//!
//! [`ChatRelay::start`] spawns a driver task for the turn and hands back a
//! [`RelayStream`], a pull-based handle over the client fragments. The
//! driver walks the turn through its states:
//!
//! ```text
//! Idle -> PersistingUserTurn -> AwaitingUpstream -> Streaming
//!      -> PersistingAssistantTurn -> Complete
//! ```
//!
//! with `Failed` reachable from any stage. Exactly one fragment with
//! `streaming_complete = true` is sent per turn, except when the client
//! goes away first; nothing is sent after it.
//!
//! Dropping or cancelling the handle before the terminal fragment aborts
//! the upstream read and persists the text received so far with
//! [`TRUNCATION_MARKER`] appended.
//! The request timeout also bounds waiting on a client that stopped
//! reading, so the upstream body is never held open past the deadline.

use std::fmt;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{Instant, timeout_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use fabled_types::chat::{ChatTurnRequest, ClientFragment};
use fabled_types::conversation::{ConversationEntry, Sender, message_time_after, message_time_now};
use fabled_types::error::UpstreamError;
use fabled_types::llm::{ChatCompletionRequest, DEFAULT_TEMPERATURE, StreamFrame};
use fabled_types::persona::DEFAULT_PERSONA_NAME;

use crate::chat::normalizer::EventNormalizer;
use crate::llm::frame::parse_frames;
use crate::llm::upstream::CompletionUpstream;
use crate::persona::resolver::PersonaResolver;
use crate::repository::conversation::ConversationRepository;
use crate::repository::persona::PersonaRepository;
use crate::repository::session::SessionSettingsRepository;

/// Appended to an assistant reply that did not finish.
pub const TRUNCATION_MARKER: &str = " [truncated]";

/// Per-turn upstream parameters.
#[derive(Debug, Clone)]
pub struct RelaySettings {
    pub temperature: f64,
    /// Bound on one whole turn, from opening the upstream call to its last byte.
    pub request_timeout: Duration,
}

impl Default for RelaySettings {
    fn default() -> Self {
        Self {
            temperature: DEFAULT_TEMPERATURE,
            request_timeout: Duration::from_secs(300),
        }
    }
}

/// Lifecycle of one turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    PersistingUserTurn,
    AwaitingUpstream,
    Streaming,
    PersistingAssistantTurn,
    Complete,
    Failed,
}

impl fmt::Display for TurnState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TurnState::Idle => write!(f, "idle"),
            TurnState::PersistingUserTurn => write!(f, "persisting_user_turn"),
            TurnState::AwaitingUpstream => write!(f, "awaiting_upstream"),
            TurnState::Streaming => write!(f, "streaming"),
            TurnState::PersistingAssistantTurn => write!(f, "persisting_assistant_turn"),
            TurnState::Complete => write!(f, "complete"),
            TurnState::Failed => write!(f, "failed"),
        }
    }
}

/// How a finished turn ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnOutcome {
    /// `Complete` or `Failed`.
    pub state: TurnState,
    /// Persona name the turn's entries are keyed by.
    pub persona_name: String,
    /// Assistant content handed to the store, if any.
    pub assistant_content: Option<String>,
}

/// Orchestrates chat turns.
///
/// Generic over the repositories and the upstream so fabled-core never
/// depends on fabled-infra. Cloning is cheap; every collaborator is shared.
pub struct ChatRelay<P, C, S, U>
where
    P: PersonaRepository,
    C: ConversationRepository,
    S: SessionSettingsRepository,
    U: CompletionUpstream,
{
    resolver: PersonaResolver<P>,
    conversations: Arc<C>,
    sessions: Arc<S>,
    upstream: Arc<U>,
    settings: RelaySettings,
}

impl<P, C, S, U> Clone for ChatRelay<P, C, S, U>
where
    P: PersonaRepository,
    C: ConversationRepository,
    S: SessionSettingsRepository,
    U: CompletionUpstream,
{
    fn clone(&self) -> Self {
        Self {
            resolver: self.resolver.clone(),
            conversations: Arc::clone(&self.conversations),
            sessions: Arc::clone(&self.sessions),
            upstream: Arc::clone(&self.upstream),
            settings: self.settings.clone(),
        }
    }
}

impl<P, C, S, U> ChatRelay<P, C, S, U>
where
    P: PersonaRepository + 'static,
    C: ConversationRepository + 'static,
    S: SessionSettingsRepository + 'static,
    U: CompletionUpstream + 'static,
{
    pub fn new(
        resolver: PersonaResolver<P>,
        conversations: Arc<C>,
        sessions: Arc<S>,
        upstream: Arc<U>,
        settings: RelaySettings,
    ) -> Self {
        Self {
            resolver,
            conversations,
            sessions,
            upstream,
            settings,
        }
    }

    /// Start a turn on a background task.
    ///
    /// Must be called within a Tokio runtime.
    pub fn start(&self, request: ChatTurnRequest) -> RelayStream {
        let (tx, rx) = mpsc::channel(1);
        let cancel = CancellationToken::new();
        let driver = TurnDriver {
            relay: self.clone(),
            request,
            tx,
            cancel: cancel.clone(),
            state: TurnState::Idle,
        };
        RelayStream {
            rx,
            cancel,
            driver: Some(tokio::spawn(driver.run())),
        }
    }

    /// The persona a turn runs as: the request's, else the session's
    /// selection, else none.
    async fn effective_persona(&self, request: &ChatTurnRequest) -> Option<String> {
        if let Some(name) = request.requested_persona() {
            return Some(name.to_string());
        }
        match self.sessions.get(&request.session_id).await {
            Ok(settings) => settings
                .and_then(|s| s.selected_persona_name)
                .filter(|name| !name.is_empty()),
            Err(e) => {
                warn!(session_id = %request.session_id, error = %e, "Failed to read session settings");
                None
            }
        }
    }
}

/// Pull-based handle over one turn's client fragments.
///
/// Implements [`Stream`]; [`next_fragment`](Self::next_fragment) is the
/// same thing as an inherent method. Dropping the handle cancels the turn.
pub struct RelayStream {
    rx: mpsc::Receiver<ClientFragment>,
    cancel: CancellationToken,
    driver: Option<JoinHandle<TurnOutcome>>,
}

impl RelayStream {
    /// The next fragment, or `None` once the turn has ended.
    pub async fn next_fragment(&mut self) -> Option<ClientFragment> {
        self.rx.recv().await
    }

    /// Abort the turn as if the client had disconnected.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the turn to finish, discarding unread fragments.
    ///
    /// Returns `None` if the driver task panicked.
    pub async fn join(mut self) -> Option<TurnOutcome> {
        while self.rx.recv().await.is_some() {}
        let driver = self.driver.take()?;
        driver.await.ok()
    }
}

impl Stream for RelayStream {
    type Item = ClientFragment;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for RelayStream {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Why the streaming stage stopped.
enum StreamEnd {
    /// A fragment with `streaming_complete = true` was delivered.
    Terminal,
    /// `[DONE]` arrived before any terminal fragment.
    Done,
    /// The body ended with neither a finish marker nor `[DONE]`.
    Eof,
    Failed(UpstreamError),
    /// The client went away or cancelled.
    Cancelled,
}

/// Result of handing a fragment to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Delivery {
    Sent,
    /// The client cancelled or dropped its handle.
    Gone,
    /// The client stopped reading until the request deadline passed.
    Stalled,
}

struct TurnDriver<P, C, S, U>
where
    P: PersonaRepository,
    C: ConversationRepository,
    S: SessionSettingsRepository,
    U: CompletionUpstream,
{
    relay: ChatRelay<P, C, S, U>,
    request: ChatTurnRequest,
    tx: mpsc::Sender<ClientFragment>,
    cancel: CancellationToken,
    state: TurnState,
}

impl<P, C, S, U> TurnDriver<P, C, S, U>
where
    P: PersonaRepository + 'static,
    C: ConversationRepository + 'static,
    S: SessionSettingsRepository + 'static,
    U: CompletionUpstream + 'static,
{
    async fn run(mut self) -> TurnOutcome {
        let persona = self.relay.effective_persona(&self.request).await;
        let persona_name = persona
            .clone()
            .unwrap_or_else(|| DEFAULT_PERSONA_NAME.to_string());
        info!(
            session_id = %self.request.session_id,
            persona = %persona_name,
            model = %self.request.model,
            "Chat turn started"
        );

        self.transition(TurnState::PersistingUserTurn);
        let user_time = message_time_now();
        self.persist(ConversationEntry {
            session_id: self.request.session_id,
            persona_name: persona_name.clone(),
            message_time: user_time,
            sender: Sender::User,
            content: self.request.user_text.clone(),
        })
        .await;

        self.transition(TurnState::AwaitingUpstream);
        let system_prompt = self.relay.resolver.resolve(persona.as_deref()).await;
        let body = ChatCompletionRequest::for_turn(
            self.request.model.clone(),
            system_prompt,
            self.request.user_text.clone(),
            self.relay.settings.temperature,
        );

        let deadline = Instant::now() + self.relay.settings.request_timeout;
        let opened = tokio::select! {
            biased;
            _ = self.cancel.cancelled() => None,
            result = timeout_at(deadline, self.relay.upstream.open_stream(&body)) => Some(result),
        };

        let bytes = match opened {
            None => {
                info!(session_id = %self.request.session_id, "Turn cancelled before upstream answered");
                let content = TRUNCATION_MARKER.to_string();
                self.persist(ConversationEntry {
                    session_id: self.request.session_id,
                    persona_name: persona_name.clone(),
                    message_time: message_time_after(user_time),
                    sender: Sender::Assistant,
                    content: content.clone(),
                })
                .await;
                return self.finish(TurnState::Failed, persona_name, Some(content));
            }
            Some(Err(_elapsed)) => {
                let err = self.timeout_error();
                return self.fail_before_stream(err, persona_name, deadline).await;
            }
            Some(Ok(Err(err))) => return self.fail_before_stream(err, persona_name, deadline).await,
            Some(Ok(Ok(bytes))) => bytes,
        };

        self.transition(TurnState::Streaming);
        let mut frames = parse_frames(bytes);
        let mut normalizer = EventNormalizer::new();
        let mut accumulated = String::new();

        let end = loop {
            let next = tokio::select! {
                biased;
                _ = self.cancel.cancelled() => break StreamEnd::Cancelled,
                next = timeout_at(deadline, frames.next()) => next,
            };
            match next {
                Err(_elapsed) => break StreamEnd::Failed(self.timeout_error()),
                Ok(None) => break StreamEnd::Eof,
                Ok(Some(Err(err))) => break StreamEnd::Failed(err),
                Ok(Some(Ok(StreamFrame::Done))) => break StreamEnd::Done,
                Ok(Some(Ok(StreamFrame::Event(event)))) => {
                    let fragment = normalizer.normalize(&event);
                    let terminal = fragment.streaming_complete;
                    accumulated.push_str(&fragment.text_content);
                    match self.send(fragment, deadline).await {
                        Delivery::Sent => {}
                        Delivery::Gone => break StreamEnd::Cancelled,
                        Delivery::Stalled => break StreamEnd::Failed(self.timeout_error()),
                    }
                    if terminal {
                        break StreamEnd::Terminal;
                    }
                }
            }
        };
        // Closes the upstream connection.
        drop(frames);

        let (state, content) = match end {
            StreamEnd::Terminal => (TurnState::Complete, accumulated),
            StreamEnd::Done => {
                debug!(session_id = %self.request.session_id, "Upstream sent [DONE] without a finish marker");
                if self.send(ClientFragment::end_of_reply(), deadline).await == Delivery::Sent {
                    (TurnState::Complete, accumulated)
                } else {
                    (TurnState::Failed, accumulated + TRUNCATION_MARKER)
                }
            }
            StreamEnd::Eof => {
                let err = UpstreamError::Transport("stream ended before completion".to_string());
                warn!(session_id = %self.request.session_id, error = %err, "Upstream stream ended early");
                self.send(ClientFragment::system_error(err.client_message()), deadline).await;
                (TurnState::Failed, accumulated + TRUNCATION_MARKER)
            }
            StreamEnd::Failed(err) => {
                warn!(session_id = %self.request.session_id, error = %err, "Upstream stream failed");
                self.send(ClientFragment::system_error(err.client_message()), deadline).await;
                (TurnState::Failed, accumulated + TRUNCATION_MARKER)
            }
            StreamEnd::Cancelled => {
                info!(session_id = %self.request.session_id, "Client went away mid-stream");
                (TurnState::Failed, accumulated + TRUNCATION_MARKER)
            }
        };

        if state == TurnState::Complete {
            self.transition(TurnState::PersistingAssistantTurn);
        }
        self.persist(ConversationEntry {
            session_id: self.request.session_id,
            persona_name: persona_name.clone(),
            message_time: message_time_after(user_time),
            sender: Sender::Assistant,
            content: content.clone(),
        })
        .await;

        self.finish(state, persona_name, Some(content))
    }

    /// Report a failure that happened before any body arrived. No assistant
    /// entry is written.
    async fn fail_before_stream(
        &mut self,
        err: UpstreamError,
        persona_name: String,
        deadline: Instant,
    ) -> TurnOutcome {
        warn!(session_id = %self.request.session_id, error = %err, "Upstream request failed");
        self.send(ClientFragment::system_error(err.client_message()), deadline).await;
        self.finish(TurnState::Failed, persona_name, None)
    }

    /// Deliver a fragment, waiting for the client no later than `deadline`.
    async fn send(&self, fragment: ClientFragment, deadline: Instant) -> Delivery {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Delivery::Gone,
            sent = timeout_at(deadline, self.tx.send(fragment)) => match sent {
                Ok(Ok(())) => Delivery::Sent,
                Ok(Err(_closed)) => Delivery::Gone,
                Err(_elapsed) => Delivery::Stalled,
            },
        }
    }

    /// Write an entry. Failures are logged and never end the turn.
    async fn persist(&self, entry: ConversationEntry) {
        if let Err(e) = self.relay.conversations.upsert(&entry).await {
            warn!(
                session_id = %entry.session_id,
                sender = %entry.sender,
                error = %e,
                "Failed to persist conversation entry"
            );
        }
    }

    fn timeout_error(&self) -> UpstreamError {
        UpstreamError::Timeout {
            seconds: self.relay.settings.request_timeout.as_secs(),
        }
    }

    fn transition(&mut self, next: TurnState) {
        debug!(
            session_id = %self.request.session_id,
            from = %self.state,
            to = %next,
            "Turn state changed"
        );
        self.state = next;
    }

    fn finish(&mut self, state: TurnState, persona_name: String, assistant_content: Option<String>) -> TurnOutcome {
        self.transition(state);
        info!(session_id = %self.request.session_id, state = %state, "Chat turn finished");
        TurnOutcome {
            state,
            persona_name,
            assistant_content,
        }
    }
}
