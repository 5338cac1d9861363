//! Transport-only client for OpenAI-compatible streaming chat completions.
//!
//! This crate owns request building, response streaming and SSE parsing for
//! the `/v1/chat/completions` endpoint family (Cerebras Cloud by default). It
//! contains no session, normalization or wire-framing logic.
//!
//! In-band error payloads are surfaced as [`CompletionStreamEvent::Error`] and
//! turned into [`CompletionApiError::StreamFailed`] by the client.

pub mod client;
pub mod config;
pub mod error;
pub mod events;
pub mod headers;
pub mod payload;
pub mod retry;
pub mod sse;
pub mod url;

pub use client::CancellationSignal;
pub use client::CompletionApiClient;
pub use config::CompletionApiConfig;
pub use error::CompletionApiError;
pub use events::{CompletionStreamEvent, FinishReason};
pub use payload::{ChatCompletionRequest, ChatMessage, ChatRole};
pub use sse::SseStreamParser;
pub use url::normalize_completions_url;
