//! Client-side reconstruction of a generation from its wire events.

use generation_provider::{cancel_signal, raise, CancelSignal};

use crate::session::SessionStatus;
use crate::wire::WireEvent;

/// What stays on screen after an in-stream error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ErrorDisplay {
    /// Keep the partial text that arrived before the error.
    #[default]
    KeepPartial,
    /// Clear the displayed text.
    Discard,
}

/// Single-writer state machine for the displayed text of one generation at a
/// time.
///
/// `consume` is a no-op once the current generation is terminal, so frames
/// that arrive after `complete`, `error` or `cancel()` never change state.
#[derive(Debug)]
pub struct StreamReassembler {
    generation: u64,
    status: SessionStatus,
    accumulated: String,
    final_text: Option<String>,
    error: Option<String>,
    error_display: ErrorDisplay,
    cancel: Option<CancelSignal>,
}

impl Default for StreamReassembler {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamReassembler {
    pub fn new() -> Self {
        Self {
            generation: 0,
            status: SessionStatus::Pending,
            accumulated: String::new(),
            final_text: None,
            error: None,
            error_display: ErrorDisplay::default(),
            cancel: None,
        }
    }

    pub fn with_error_display(mut self, policy: ErrorDisplay) -> Self {
        self.error_display = policy;
        self
    }

    /// Starts a new generation, cancelling the one in flight if any, and
    /// returns the token its transport must watch.
    pub fn begin(&mut self) -> CancelSignal {
        self.cancel();

        let token = cancel_signal();
        self.generation += 1;
        self.status = SessionStatus::Streaming;
        self.accumulated.clear();
        self.final_text = None;
        self.error = None;
        self.cancel = Some(token.clone());
        token
    }

    /// Applies one wire event. Returns true when state changed.
    pub fn consume(&mut self, event: WireEvent) -> bool {
        if self.status != SessionStatus::Streaming {
            tracing::debug!(status = self.status.as_str(), "ignoring event for inactive generation");
            return false;
        }

        match event {
            WireEvent::Fragment { content } => {
                self.accumulated.push_str(&content);
            }
            WireEvent::Complete { full_code } => {
                self.final_text = full_code;
                self.status = SessionStatus::Completed;
                self.cancel = None;
            }
            WireEvent::Error { error } => {
                self.error = Some(error);
                self.status = SessionStatus::Failed;
                self.cancel = None;
            }
        }
        true
    }

    /// Marks the generation failed without a server-sent error event, e.g.
    /// when the transport broke.
    pub fn fail(&mut self, message: impl Into<String>) -> bool {
        self.consume(WireEvent::error(message))
    }

    /// Aborts the in-flight generation. A no-op when nothing is in flight.
    pub fn cancel(&mut self) {
        if self.status.is_terminal() || self.status == SessionStatus::Pending {
            return;
        }
        if let Some(token) = self.cancel.take() {
            raise(&token);
        }
        self.status = SessionStatus::Cancelled;
        tracing::debug!(generation = self.generation, "generation cancelled");
    }

    /// Text to show right now.
    pub fn displayed(&self) -> &str {
        match self.status {
            SessionStatus::Completed => self.final_text.as_deref().unwrap_or(&self.accumulated),
            SessionStatus::Failed if self.error_display == ErrorDisplay::Discard => "",
            _ => &self.accumulated,
        }
    }

    pub fn accumulated(&self) -> &str {
        &self.accumulated
    }

    pub fn status(&self) -> SessionStatus {
        self.status
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Counts calls to [`begin`](Self::begin).
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Streaming
    }
}
