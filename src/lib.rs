//! Streaming generation of React components from natural-language prompts.
//!
//! Invariant: a generation session emits zero or more `fragment` events
//! followed by exactly one terminal event (`complete` or `error`), and
//! nothing after it.
//!
//! # Public API Overview
//! - Validate input with [`Prompt`].
//! - Run a [`GenerationSession`] against any [`GenerationProvider`], or spawn one with
//!   [`session::stream`].
//! - Frame and decode [`WireEvent`]s on the event stream.
//! - Rebuild the displayed text on the client with [`StreamReassembler`].
//! - Turn raw model output into a loadable module with [`normalize()`] and project it into a
//!   sandbox file set with [`preview::project`] / [`PreviewAdapter`].

pub mod config;
pub mod error;
pub mod logging;
pub mod normalize;
pub mod preview;
pub mod prompt;
pub mod reassembler;
pub mod session;
pub mod wire;

/// Validation and session errors.
pub use crate::error::{EmptyOutputError, SessionError, ValidationError};

/// Output normalization.
pub use crate::normalize::{normalize, normalize_for_display, normalize_strict};

/// Preview projection.
pub use crate::preview::{PreviewAdapter, PreviewMode, RenderPayload, VirtualFileSet};

pub use crate::prompt::Prompt;
pub use crate::reassembler::{ErrorDisplay, StreamReassembler};
pub use crate::session::{GenerationSession, SessionOutcome, SessionStatus, SessionStream};
pub use crate::wire::{WireEvent, WireFrameDecoder};

/// Provider contract, re-exported so front-ends need a single dependency.
pub use generation_provider::{
    cancel_signal, is_cancelled, raise, CancelSignal, GenerationProvider, ProviderError,
};
