//! Server-side generation session: one prompt in, one ordered stream of wire
//! events out.
//!
//! A session emits a `fragment` event for every non-empty provider fragment
//! as soon as it arrives, then exactly one terminal event: `complete` with
//! the normalized text, or `error`. When the receiving side goes away the
//! session raises the provider's cancel flag, drops the fragment stream and
//! emits nothing further.

use std::sync::Arc;

use futures_util::StreamExt;
use generation_provider::{
    cancel_signal, is_cancelled, raise, CancelSignal, GenerationProvider, GenerationRequest,
    ProviderError,
};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::Instrument;
use uuid::Uuid;

use crate::config::{GenerationParams, SYSTEM_INSTRUCTION};
use crate::error::SessionError;
use crate::normalize::normalize_strict;
use crate::prompt::Prompt;
use crate::wire::WireEvent;

/// Capacity of the outbound event channel. A slow transport suspends the
/// session once this many events are queued.
pub const EVENT_BUFFER: usize = 32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionStatus {
    Pending,
    Streaming,
    Completed,
    Failed,
    Cancelled,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Streaming => "streaming",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

/// Final state of a session after [`GenerationSession::run`] returns.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionOutcome {
    pub id: Uuid,
    pub status: SessionStatus,
    pub accumulated: String,
    /// Set only when `status` is `Completed`.
    pub final_text: Option<String>,
    pub error: Option<SessionError>,
}

#[derive(Debug)]
pub struct GenerationSession {
    id: Uuid,
    prompt: Prompt,
    status: SessionStatus,
    accumulated: String,
    final_text: Option<String>,
    error: Option<SessionError>,
}

impl GenerationSession {
    pub fn new(prompt: Prompt) -> Self {
        Self {
            id: Uuid::new_v4(),
            prompt,
            status: SessionStatus::Pending,
            accumulated: String::new(),
            final_text: None,
            error: None,
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    /// The provider request for this session's prompt. Instructions and
    /// sampling parameters are fixed policy, not per-request inputs.
    pub fn request(&self) -> GenerationRequest {
        GenerationRequest {
            system_instruction: SYSTEM_INSTRUCTION.to_string(),
            user_instruction: self.prompt.user_instruction(),
            params: GenerationParams::DEFAULT.sampling,
        }
    }

    /// Drives the session to a terminal state, writing events into `sink`.
    pub async fn run(
        self,
        provider: &dyn GenerationProvider,
        sink: mpsc::Sender<WireEvent>,
    ) -> SessionOutcome {
        let span = tracing::info_span!("generation_session", session_id = %self.id);
        self.drive(provider, sink).instrument(span).await
    }

    async fn drive(
        mut self,
        provider: &dyn GenerationProvider,
        sink: mpsc::Sender<WireEvent>,
    ) -> SessionOutcome {
        if sink.is_closed() {
            self.status = SessionStatus::Cancelled;
            tracing::info!("caller went away before generation started");
            return self.into_outcome();
        }

        let cancel = cancel_signal();
        let _raise_on_exit = RaiseOnDrop(Arc::clone(&cancel));
        let profile = provider.profile();
        tracing::info!(
            provider = %profile.provider_id,
            model = %profile.model_id,
            prompt_chars = self.prompt.as_str().chars().count(),
            "generation started"
        );

        self.status = SessionStatus::Streaming;
        let mut fragments = provider.generate(self.request(), Arc::clone(&cancel));

        loop {
            let next = tokio::select! {
                biased;
                _ = sink.closed() => {
                    self.cancel(&cancel);
                    break;
                }
                next = fragments.next() => next,
            };

            match next {
                Some(Ok(fragment)) => {
                    if fragment.is_empty() {
                        continue;
                    }
                    if sink.send(WireEvent::fragment(fragment.as_str())).await.is_err() {
                        self.cancel(&cancel);
                        break;
                    }
                    self.accumulated.push_str(&fragment);
                }
                Some(Err(ProviderError::Cancelled)) if is_cancelled(&cancel) => {
                    self.cancel(&cancel);
                    break;
                }
                Some(Err(error)) => {
                    drop(fragments);
                    tracing::error!(%error, received = self.accumulated.len(), "generation failed upstream");
                    self.fail(SessionError::Upstream(error.to_string()), &sink).await;
                    return self.into_outcome();
                }
                None => {
                    drop(fragments);
                    self.finish(&sink).await;
                    return self.into_outcome();
                }
            }
        }

        drop(fragments);
        self.into_outcome()
    }

    async fn finish(&mut self, sink: &mpsc::Sender<WireEvent>) {
        match normalize_strict(&self.accumulated) {
            Ok(normalized) => {
                if sink.send(WireEvent::complete(normalized.as_str())).await.is_err() {
                    self.status = SessionStatus::Cancelled;
                    tracing::info!("caller went away before completion was delivered");
                    return;
                }
                tracing::info!(
                    received = self.accumulated.len(),
                    normalized = normalized.len(),
                    "generation completed"
                );
                self.final_text = Some(normalized);
                self.status = SessionStatus::Completed;
            }
            Err(error) => {
                tracing::warn!(received = self.accumulated.len(), "generation produced no usable code");
                self.fail(error.into(), sink).await;
            }
        }
    }

    async fn fail(&mut self, error: SessionError, sink: &mpsc::Sender<WireEvent>) {
        if sink.send(WireEvent::error(error.to_string())).await.is_err() {
            self.status = SessionStatus::Cancelled;
            return;
        }
        self.status = SessionStatus::Failed;
        self.error = Some(error);
    }

    fn cancel(&mut self, cancel: &CancelSignal) {
        raise(cancel);
        self.status = SessionStatus::Cancelled;
        tracing::info!(received = self.accumulated.len(), "generation cancelled by caller");
    }

    fn into_outcome(self) -> SessionOutcome {
        SessionOutcome {
            id: self.id,
            status: self.status,
            accumulated: self.accumulated,
            final_text: self.final_text,
            error: self.error,
        }
    }
}

struct RaiseOnDrop(CancelSignal);

impl Drop for RaiseOnDrop {
    fn drop(&mut self) {
        raise(&self.0);
    }
}

/// A session running on its own task.
#[derive(Debug)]
pub struct SessionStream {
    pub id: Uuid,
    /// Wire events in order; closes after the terminal event. Dropping it
    /// cancels the session.
    pub events: mpsc::Receiver<WireEvent>,
    pub outcome: JoinHandle<SessionOutcome>,
}

/// Starts a session for `prompt` on a new task.
pub fn stream(provider: Arc<dyn GenerationProvider>, prompt: Prompt) -> SessionStream {
    let session = GenerationSession::new(prompt);
    let id = session.id();
    let (sender, events) = mpsc::channel(EVENT_BUFFER);
    let outcome = tokio::spawn(async move { session.run(provider.as_ref(), sender).await });

    SessionStream {
        id,
        events,
        outcome,
    }
}
