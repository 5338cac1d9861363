use thiserror::Error;

use crate::config::MAX_PROMPT_CHARS;

/// Request rejected before any generation work starts.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Prompt is required")]
    MissingPrompt,
    #[error("Prompt must be a string")]
    PromptNotText,
    #[error("Please enter a description")]
    EmptyPrompt,
    #[error("Prompt too long (max {max})")]
    PromptTooLong { len: usize, max: usize },
    #[error("{0}")]
    MissingCredential(String),
    #[error("Invalid request body: {0}")]
    InvalidBody(String),
}

impl ValidationError {
    pub fn too_long(len: usize) -> Self {
        Self::PromptTooLong {
            len,
            max: MAX_PROMPT_CHARS,
        }
    }

    /// Server-side configuration faults, as opposed to caller mistakes.
    pub fn is_server_fault(&self) -> bool {
        matches!(self, Self::MissingCredential(_))
    }
}

/// Normalization left nothing that looks like component code.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("No valid React component code was generated")]
pub struct EmptyOutputError;

/// Failure during the streaming phase of a session; always delivered to the
/// caller as a single terminal error event.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    #[error("{0}")]
    Upstream(String),
    #[error(transparent)]
    EmptyOutput(#[from] EmptyOutputError),
}
