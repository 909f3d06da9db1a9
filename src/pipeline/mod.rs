//! Command pipeline - the listening/processing state machine
//!
//! Voice input arrives as [`PipelineEvent`]s; the host shell calls
//! [`CommandPipeline::submit_utterance`] and [`CommandPipeline::status`]
//! directly. At most one utterance is processed at a time: input that arrives
//! while a command is in flight is logged and dropped, never queued.

pub mod host;
pub mod state;

use crate::command::dispatcher::ActionDispatcher;
use crate::command::resolver::IntentResolver;
use crate::command::result::ActionResult;
use crate::command::session::{PendingConfirmation, SessionContext, SessionStore};
use crate::core::config::{AssistantConfig, ConfirmationMode, PipelineConfig};
use crate::core::error::{Result, VoxError};
use crate::core::types::{ConversationTurn, SessionId, Utterance};
use crate::llm::parser::Intent;
use crate::llm::{LanguageBackend, LlmClient};
use crate::platform::{select_executor, PlatformExecutor};
use crate::speech::{speak_or_log, speaker_for, TextToSpeech};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};

pub use host::{AssistantStatus, CommandRecord, HostResponse};
pub use state::{PipelineState, ProcessingGuard, StateCell};

/// Spoken when a cancel phrase is heard
pub const CANCEL_ACKNOWLEDGMENT: &str = "Okay, standing by.";

/// Spoken when a parked intent is declined or expires
pub const NOT_CONFIRMED: &str = "Okay, I won't proceed.";

/// Words that turn an otherwise affirmative reply into a refusal
const NEGATIONS: &[&str] = &[
    "no", "not", "nope", "don", "dont", "never", "cancel", "stop", "wait",
];

/// Input from the speech collaborator and internal timers
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    Wake,
    Transcript(Utterance),
    TranscriptionError(String),
    /// Backoff after a transcription error elapsed
    RestartListening,
    /// Confirmation timer with the given request id fired
    ConfirmationExpired(u64),
    Shutdown,
}

/// What happened to one transcript event
#[derive(Debug, Clone, PartialEq)]
pub enum TranscriptOutcome {
    /// Not listening; the transcript was dropped
    NotListening,
    /// Another utterance is in flight; dropped
    Busy,
    /// Interim or blank transcript; still listening
    Pending,
    /// Cancel phrase; back to standby without resolving
    Cancelled,
    Handled(HostResponse),
}

/// Result of running one command, before the state is settled
struct CommandOutcome {
    response: HostResponse,
    awaiting_confirmation: bool,
}

pub struct CommandPipeline {
    config: PipelineConfig,
    resolver: IntentResolver,
    dispatcher: ActionDispatcher,
    speaker: Arc<dyn TextToSpeech>,
    sessions: Mutex<SessionStore>,
    state: StateCell,
    /// Session fed by voice input and plain `submit_utterance`
    default_session: SessionId,
    events: mpsc::UnboundedSender<PipelineEvent>,
    confirmation_ids: AtomicU64,
    /// Set while a `RestartListening` from a transcription error is owed
    restart_scheduled: AtomicBool,
}

impl CommandPipeline {
    pub fn new(
        config: PipelineConfig,
        resolver: IntentResolver,
        dispatcher: ActionDispatcher,
        speaker: Arc<dyn TextToSpeech>,
    ) -> (Self, mpsc::UnboundedReceiver<PipelineEvent>) {
        let (events, receiver) = mpsc::unbounded_channel();
        let initial = if config.continuous {
            PipelineState::ListeningForCommand
        } else {
            PipelineState::Idle
        };
        let default_session = SessionId::new();
        let sessions = SessionStore::new(config.history_window)
            .with_limit(config.max_sessions, default_session);
        let pipeline = Self {
            sessions: Mutex::new(sessions),
            config,
            resolver,
            dispatcher,
            speaker,
            state: StateCell::new(initial),
            default_session,
            events,
            confirmation_ids: AtomicU64::new(0),
            restart_scheduled: AtomicBool::new(false),
        };
        (pipeline, receiver)
    }

    /// Wire collaborators from configuration. Any failure here is fatal and
    /// is returned to the host for display.
    pub fn from_config(
        config: &AssistantConfig,
    ) -> Result<(Arc<Self>, mpsc::UnboundedReceiver<PipelineEvent>)> {
        config.validate().map_err(VoxError::Config)?;

        let resolver = match LlmClient::from_config(&config.llm)? {
            Some(client) => {
                tracing::info!(
                    "Language backend ready ({:?}, {})",
                    client.api_format(),
                    client.model()
                );
                let backend: Arc<dyn LanguageBackend> = Arc::new(client);
                IntentResolver::new(
                    backend,
                    config.backend_timeout(),
                    config.pipeline.history_window,
                )
            }
            None => {
                tracing::warn!("No LLM_API_KEY configured, running on keyword fallback only");
                IntentResolver::without_backend(config.pipeline.history_window)
            }
        };

        let executor: Arc<dyn PlatformExecutor> = select_executor(&config.paths);
        let dispatcher = ActionDispatcher::new(executor, config);
        let speaker = speaker_for(&config.speech);

        let (pipeline, receiver) = Self::new(config.pipeline.clone(), resolver, dispatcher, speaker);
        tracing::info!("Command pipeline initialized in {:?}", pipeline.state());
        Ok((Arc::new(pipeline), receiver))
    }

    pub fn state(&self) -> PipelineState {
        self.state.get()
    }

    pub fn default_session(&self) -> SessionId {
        self.default_session
    }

    /// Sender for feeding voice events into [`CommandPipeline::run`]
    pub fn event_sender(&self) -> mpsc::UnboundedSender<PipelineEvent> {
        self.events.clone()
    }

    /// Snapshot of a session, for inspection
    pub async fn session(&self, id: SessionId) -> Option<SessionContext> {
        self.sessions.lock().await.get(&id).cloned()
    }

    /// Forget a session's history, draft and pending confirmation. Ending the
    /// default session also leaves `AwaitingConfirmation`.
    pub async fn end_session(&self, id: SessionId) -> bool {
        let mut sessions = self.sessions.lock().await;
        let removed = sessions.remove(&id).is_some();
        if id == self.default_session {
            self.state
                .transition(PipelineState::AwaitingConfirmation, self.resting_state());
        }
        if removed {
            tracing::info!("Session {} ended", id);
        }
        removed
    }

    pub fn status(&self) -> AssistantStatus {
        let state = self.state();
        AssistantStatus {
            initialized: true,
            listening: state.accepts_transcripts(),
            state,
            platform: self.dispatcher.executor().platform(),
            ai_ready: self.resolver.has_backend(),
        }
    }

    /// Handle a typed command in the default session
    pub async fn submit_utterance(&self, text: &str) -> HostResponse {
        self.submit_utterance_in(self.default_session, text).await
    }

    /// Handle a typed command in `session_id`. Typed input skips the wake
    /// signal but still respects the single-flight guard.
    pub async fn submit_utterance_in(&self, session_id: SessionId, text: &str) -> HostResponse {
        let text = text.trim();
        if text.is_empty() {
            return HostResponse::rejected("Empty command");
        }

        let Some(mut guard) = self.state.begin_processing(self.resting_state()) else {
            tracing::warn!("Already processing a command, ignoring \"{}\"", text);
            return HostResponse::rejected("Already processing a command");
        };
        // typed input in another session leaves voice listening as it was
        match guard.previous() {
            PipelineState::ListeningForCommand => {
                guard.release_to(PipelineState::ListeningForCommand)
            }
            PipelineState::AwaitingConfirmation if session_id != self.default_session => {
                guard.release_to(PipelineState::AwaitingConfirmation)
            }
            _ => {}
        }

        if self.is_cancel_phrase(text) {
            self.cancel_session(session_id).await;
            return HostResponse::acknowledged(CANCEL_ACKNOWLEDGMENT);
        }

        let outcome = self.run_command(session_id, text).await;
        if outcome.awaiting_confirmation && session_id == self.default_session {
            guard.release_to(PipelineState::AwaitingConfirmation);
        }
        outcome.response
    }

    /// Wake signal: arm listening and acknowledge
    pub async fn on_wake(&self) -> bool {
        if !self
            .state
            .transition(PipelineState::Idle, PipelineState::ListeningForCommand)
        {
            match self.state() {
                PipelineState::ProcessingCommand => {
                    tracing::warn!("Already processing a command, ignoring wake signal")
                }
                other => tracing::debug!("Wake signal while {:?}, already listening", other),
            }
            return false;
        }
        self.restart_scheduled.store(false, Ordering::SeqCst);
        tracing::info!("Wake signal, listening for command");
        speak_or_log(self.speaker.as_ref(), &self.config.wake_acknowledgment).await;
        true
    }

    /// A transcript from the speech collaborator
    pub async fn on_transcript(&self, utterance: Utterance) -> TranscriptOutcome {
        let state = self.state();
        if state == PipelineState::ProcessingCommand {
            tracing::warn!("Already processing a command, ignoring \"{}\"", utterance.text);
            return TranscriptOutcome::Busy;
        }
        if !state.accepts_transcripts() {
            tracing::debug!("Not listening, dropping transcript \"{}\"", utterance.text);
            return TranscriptOutcome::NotListening;
        }

        let text = utterance.text.trim();
        if !utterance.is_final || text.is_empty() {
            tracing::trace!("Interim transcript: {}", text);
            return TranscriptOutcome::Pending;
        }

        // re-check under the guard; another event may have claimed the slot
        let Some(mut guard) = self.state.begin_processing(self.resting_state()) else {
            tracing::warn!("Already processing a command, ignoring \"{}\"", text);
            return TranscriptOutcome::Busy;
        };

        if self.is_cancel_phrase(text) {
            tracing::info!("Cancel phrase heard, standing by");
            self.cancel_session(self.default_session).await;
            return TranscriptOutcome::Cancelled;
        }

        let outcome = self.run_command(self.default_session, text).await;
        if outcome.awaiting_confirmation {
            guard.release_to(PipelineState::AwaitingConfirmation);
        }
        TranscriptOutcome::Handled(outcome.response)
    }

    /// The speech collaborator failed mid-stream. Only a listening pipeline
    /// recovers; errors while idle or processing are logged and ignored.
    pub async fn on_transcription_error(&self, error: &str) {
        let err = VoxError::Transcription(error.to_string());
        match self.state() {
            PipelineState::ProcessingCommand => {
                tracing::warn!("{} while processing, ignoring", err);
            }
            PipelineState::Idle => {
                tracing::debug!("{} while idle, ignoring", err);
            }
            PipelineState::ListeningForCommand => {
                self.recover_listening(PipelineState::ListeningForCommand, &err);
            }
            PipelineState::AwaitingConfirmation => {
                // hold the sessions lock so no transcript can answer the
                // request between the state change and the drop
                let mut sessions = self.sessions.lock().await;
                if !self.recover_listening(PipelineState::AwaitingConfirmation, &err) {
                    return;
                }
                if let Some(pending) = sessions.get_or_create(self.default_session).pending.take() {
                    tracing::info!("Confirmation {} dropped after transcription error", pending.id);
                }
                drop(sessions);
                speak_or_log(self.speaker.as_ref(), NOT_CONFIRMED).await;
            }
        }
    }

    /// Leave `from` after a transcription error: keep listening in continuous
    /// mode, otherwise go idle and schedule a restart
    fn recover_listening(&self, from: PipelineState, err: &VoxError) -> bool {
        if self.config.continuous {
            let recovered = self
                .state
                .transition(from, PipelineState::ListeningForCommand);
            if recovered {
                tracing::error!("{}, continuing to listen", err);
            }
            return recovered;
        }
        if !self.state.transition(from, PipelineState::Idle) {
            return false;
        }
        tracing::error!("{}, restarting in {:?}", err, self.config.restart_backoff());
        self.restart_scheduled.store(true, Ordering::SeqCst);
        self.schedule(PipelineEvent::RestartListening, self.config.restart_backoff());
        true
    }

    /// Re-arm listening after the transcription backoff. Does nothing unless
    /// a transcription error scheduled it and no wake signal arrived since.
    pub fn on_restart_listening(&self) -> bool {
        if !self.restart_scheduled.swap(false, Ordering::SeqCst) {
            tracing::debug!("No restart owed, ignoring");
            return false;
        }
        let restarted = self
            .state
            .transition(PipelineState::Idle, PipelineState::ListeningForCommand);
        if restarted {
            tracing::info!("Listening restarted");
        }
        restarted
    }

    /// A confirmation timer fired; drop the request if it is still pending
    pub async fn on_confirmation_expired(&self, id: u64) -> bool {
        if self.state() != PipelineState::AwaitingConfirmation {
            return false;
        }
        let expired = {
            let mut sessions = self.sessions.lock().await;
            let session = sessions.get_or_create(self.default_session);
            match &session.pending {
                Some(pending) if pending.id == id => {
                    session.pending = None;
                    true
                }
                _ => false,
            }
        };
        if !expired {
            return false;
        }
        if !self
            .state
            .transition(PipelineState::AwaitingConfirmation, self.resting_state())
        {
            return false;
        }
        tracing::info!("Confirmation {} timed out", id);
        speak_or_log(self.speaker.as_ref(), NOT_CONFIRMED).await;
        true
    }

    /// Event loop for voice input. Transcripts are processed on their own
    /// task so the loop keeps draining (and dropping) input meanwhile.
    pub async fn run(self: Arc<Self>, mut events: mpsc::UnboundedReceiver<PipelineEvent>) {
        tracing::info!("Command pipeline running");
        while let Some(event) = events.recv().await {
            match event {
                PipelineEvent::Wake => {
                    self.on_wake().await;
                }
                PipelineEvent::Transcript(utterance) => {
                    if self.state() == PipelineState::ProcessingCommand {
                        tracing::warn!(
                            "Already processing a command, ignoring \"{}\"",
                            utterance.text
                        );
                        continue;
                    }
                    let pipeline = Arc::clone(&self);
                    tokio::spawn(async move {
                        pipeline.on_transcript(utterance).await;
                    });
                }
                PipelineEvent::TranscriptionError(error) => {
                    self.on_transcription_error(&error).await
                }
                PipelineEvent::RestartListening => {
                    self.on_restart_listening();
                }
                PipelineEvent::ConfirmationExpired(id) => {
                    self.on_confirmation_expired(id).await;
                }
                PipelineEvent::Shutdown => break,
            }
        }
        tracing::info!("Command pipeline stopped");
    }

    /// State entered once a command completes
    fn resting_state(&self) -> PipelineState {
        if self.config.continuous {
            PipelineState::ListeningForCommand
        } else {
            PipelineState::Idle
        }
    }

    fn is_cancel_phrase(&self, text: &str) -> bool {
        let lower = text.to_lowercase();
        self.config
            .cancel_phrases
            .iter()
            .map(|p| p.trim().to_lowercase())
            .any(|p| !p.is_empty() && lower.contains(&p))
    }


    async fn cancel_session(&self, session_id: SessionId) {
        self.sessions.lock().await.get_or_create(session_id).cancel();
        speak_or_log(self.speaker.as_ref(), CANCEL_ACKNOWLEDGMENT).await;
    }

    fn schedule(&self, event: PipelineEvent, delay: std::time::Duration) {
        let events = self.events.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            // receiver gone means the pipeline shut down
            let _ = events.send(event);
        });
    }

    /// Resolve, speak, confirm and dispatch one utterance. Caller holds the
    /// processing guard.
    async fn run_command(&self, session_id: SessionId, text: &str) -> CommandOutcome {
        tracing::info!("Processing command: {}", text);
        let mut sessions = self.sessions.lock().await;
        let session = sessions.get_or_create(session_id);

        if let Some(pending) = session.pending.take() {
            if pending.is_expired(self.config.confirmation_timeout()) {
                tracing::info!("Confirmation {} expired, treating input as new", pending.id);
            } else {
                return self.answer_confirmation(session, pending, text).await;
            }
        }

        let resolution = self.resolver.resolve(text, session).await;
        let intent = resolution.intent;
        tracing::info!(
            "Resolved \"{}\" to {} via {:?}",
            text,
            intent.action,
            resolution.source
        );

        session.history.push(ConversationTurn::user(text));
        session.history.push(ConversationTurn::assistant(intent.response.clone()));
        if !intent.response.trim().is_empty() {
            speak_or_log(self.speaker.as_ref(), &intent.response).await;
        }

        let mut record = CommandRecord::new(text, intent.action, intent.parameters.clone());
        if !intent.has_action() {
            return CommandOutcome {
                response: HostResponse::handled(intent.response, record),
                awaiting_confirmation: false,
            };
        }

        if intent.requires_confirmation {
            let prompt = format!("I'm about to {}. Should I proceed?", intent.describe());
            speak_or_log(self.speaker.as_ref(), &prompt).await;

            match self.config.confirmation {
                ConfirmationMode::Explicit => {
                    let id = self.confirmation_ids.fetch_add(1, Ordering::Relaxed) + 1;
                    tracing::info!("Awaiting confirmation {} for {}", id, intent.action);
                    session.pending = Some(PendingConfirmation {
                        id,
                        intent: intent.clone(),
                        requested_at: std::time::Instant::now(),
                    });
                    if session_id == self.default_session {
                        self.schedule(
                            PipelineEvent::ConfirmationExpired(id),
                            self.config.confirmation_timeout(),
                        );
                    }
                    record.awaiting_confirmation = true;
                    return CommandOutcome {
                        response: HostResponse::handled(prompt, record),
                        awaiting_confirmation: true,
                    };
                }
                ConfirmationMode::Auto => {
                    tokio::time::sleep(self.config.confirmation_delay()).await;
                }
            }
        }

        let result = self.dispatch(session, &intent).await;
        record.execution_result = Some(result);
        CommandOutcome {
            response: HostResponse::handled(intent.response, record),
            awaiting_confirmation: false,
        }
    }

    async fn answer_confirmation(
        &self,
        session: &mut SessionContext,
        pending: PendingConfirmation,
        text: &str,
    ) -> CommandOutcome {
        session.history.push(ConversationTurn::user(text));
        let intent = pending.intent;
        let mut record = CommandRecord::new(text, intent.action, intent.parameters.clone());

        if !is_affirmative(&self.config.affirmative_phrases, text) {
            tracing::info!("Confirmation {} declined", pending.id);
            session.history.push(ConversationTurn::assistant(NOT_CONFIRMED));
            speak_or_log(self.speaker.as_ref(), NOT_CONFIRMED).await;
            return CommandOutcome {
                response: HostResponse::handled(NOT_CONFIRMED, record),
                awaiting_confirmation: false,
            };
        }

        tracing::info!("Confirmation {} accepted", pending.id);
        let result = self.dispatch(session, &intent).await;
        session.history.push(ConversationTurn::assistant(result.message.clone()));
        let message = result.message.clone();
        record.execution_result = Some(result);
        CommandOutcome {
            response: HostResponse::handled(message, record),
            awaiting_confirmation: false,
        }
    }

    async fn dispatch(&self, session: &mut SessionContext, intent: &Intent) -> ActionResult {
        let result = self
            .dispatcher
            .execute(session, intent.action, &intent.parameters)
            .await;
        tracing::info!("Action completed: {} success={}", intent.action, result.success);
        speak_or_log(self.speaker.as_ref(), &result.spoken()).await;
        result
    }
}

/// Lowercase, punctuation to spaces, single-spaced
fn normalize(text: &str) -> String {
    text.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect::<String>()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// A reply that starts with an affirmative phrase and contains no negation
fn is_affirmative(phrases: &[String], text: &str) -> bool {
    let normalized = normalize(text);
    if normalized.split(' ').any(|word| NEGATIONS.contains(&word)) {
        return false;
    }
    phrases.iter().any(|phrase| {
        let phrase = normalize(phrase);
        !phrase.is_empty()
            && (normalized == phrase || normalized.starts_with(&format!("{} ", phrase)))
    })
}
