//! Minimal provider-agnostic contract for the text-generation capability.
//!
//! A provider turns one system instruction and one user instruction into an
//! ordered stream of text fragments. This crate excludes transport details,
//! wire framing, normalization and session orchestration.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::stream::BoxStream;

/// Shared cancellation flag for one generation.
pub type CancelSignal = Arc<AtomicBool>;

/// Ordered fragments produced by a provider. The stream ends after the last
/// fragment or right after the first `Err` item.
pub type FragmentStream = BoxStream<'static, Result<String, ProviderError>>;

/// Creates a fresh, unset cancellation flag.
#[must_use]
pub fn cancel_signal() -> CancelSignal {
    Arc::new(AtomicBool::new(false))
}

/// Returns true once `cancel` has been raised.
#[must_use]
pub fn is_cancelled(cancel: &CancelSignal) -> bool {
    cancel.load(Ordering::Acquire)
}

/// Raises `cancel`. Raising an already raised flag is a no-op.
pub fn raise(cancel: &CancelSignal) {
    cancel.store(true, Ordering::Release);
}

/// Error returned while constructing/configuring a provider before any generation starts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderInitError {
    message: String,
}

impl ProviderInitError {
    /// Creates a new provider initialization error.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    /// Returns the underlying error message.
    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl fmt::Display for ProviderInitError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

impl std::error::Error for ProviderInitError {}

impl From<String> for ProviderInitError {
    fn from(message: String) -> Self {
        Self::new(message)
    }
}

impl From<&str> for ProviderInitError {
    fn from(message: &str) -> Self {
        Self::new(message)
    }
}

/// Failure reported from inside a fragment stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProviderError {
    /// Network, protocol or provider-reported failure.
    Upstream(String),
    /// The stream stopped because its cancellation flag was raised.
    Cancelled,
}

impl ProviderError {
    #[must_use]
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream(message.into())
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled)
    }
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Upstream(message) => f.write_str(message),
            Self::Cancelled => f.write_str("generation was cancelled"),
        }
    }
}

impl std::error::Error for ProviderError {}

/// Sampling parameters forwarded verbatim to the provider.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SamplingParams {
    pub temperature: f64,
    pub top_p: f64,
    pub max_output_tokens: u32,
}

/// Input required to start one generation.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub system_instruction: String,
    pub user_instruction: String,
    pub params: SamplingParams,
}

/// Immutable metadata describing a provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderProfile {
    pub provider_id: String,
    pub model_id: String,
}

/// Provider interface for executing one generation request.
pub trait GenerationProvider: Send + Sync + 'static {
    /// Returns provider/model identity metadata.
    fn profile(&self) -> ProviderProfile;

    /// Checks configuration that must hold before any generation is attempted,
    /// such as the presence of an upstream credential.
    fn preflight(&self) -> Result<(), ProviderInitError> {
        Ok(())
    }

    /// Starts a generation and returns its fragments in provider order.
    ///
    /// Implementations must stop producing fragments promptly once `cancel`
    /// is raised or the returned stream is dropped.
    fn generate(&self, request: GenerationRequest, cancel: CancelSignal) -> FragmentStream;
}
