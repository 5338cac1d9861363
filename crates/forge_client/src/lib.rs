//! Client driver for the generation endpoint.
//!
//! [`GenerationClient::generate`] posts one prompt, decodes the event stream
//! and feeds every wire event into a [`StreamReassembler`]. One generation is
//! in flight per client; [`GenerationClient::cancel`] aborts it from any task.

pub mod echo;
pub mod export;

use std::future::Future;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use component_forge::{
    is_cancelled, raise, CancelSignal, Prompt, SessionStatus, StreamReassembler,
    ValidationError, WireFrameDecoder,
};
use futures_util::StreamExt;
use reqwest::{Client, StatusCode};
use thiserror::Error;

pub const DEFAULT_SERVER_URL: &str = "http://127.0.0.1:3000";
pub const GENERATE_PATH: &str = "/api/generate";

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);
const INCOMPLETE_STREAM_MESSAGE: &str = "Generation stream ended unexpectedly";

#[derive(Debug, Error)]
pub enum ClientError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    /// The server refused the request before streaming.
    #[error("{message}")]
    Rejected { status: StatusCode, message: String },
    #[error("Connection failed: {0}")]
    Transport(#[from] reqwest::Error),
}

#[derive(Debug)]
pub struct GenerationClient {
    http: Client,
    endpoint: String,
    in_flight: Mutex<Option<CancelSignal>>,
}

impl GenerationClient {
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        Ok(Self {
            http: Client::builder().build()?,
            endpoint: format!("{}{GENERATE_PATH}", base_url.trim().trim_end_matches('/')),
            in_flight: Mutex::new(None),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Cancels the generation in flight. Returns false when there is none.
    pub fn cancel(&self) -> bool {
        match lock_unpoisoned(&self.in_flight).take() {
            Some(token) => {
                raise(&token);
                true
            }
            None => false,
        }
    }

    /// Runs one generation to a terminal state.
    ///
    /// `on_update` sees the reassembler after every applied event. An
    /// in-stream error is `Ok(SessionStatus::Failed)`; only failures before
    /// the stream opened are `Err`, and they also mark the reassembler
    /// failed.
    pub async fn generate<F>(
        &self,
        prompt: &str,
        reassembler: &mut StreamReassembler,
        mut on_update: F,
    ) -> Result<SessionStatus, ClientError>
    where
        F: FnMut(&StreamReassembler),
    {
        let prompt = Prompt::new(prompt)?;
        let cancel = reassembler.begin();
        if let Some(previous) = lock_unpoisoned(&self.in_flight).replace(Arc::clone(&cancel)) {
            raise(&previous);
        }

        let result = self
            .drive(&prompt, &cancel, reassembler, &mut on_update)
            .await;

        let mut in_flight = lock_unpoisoned(&self.in_flight);
        if in_flight
            .as_ref()
            .is_some_and(|current| Arc::ptr_eq(current, &cancel))
        {
            *in_flight = None;
        }
        result
    }

    async fn drive<F>(
        &self,
        prompt: &Prompt,
        cancel: &CancelSignal,
        reassembler: &mut StreamReassembler,
        on_update: &mut F,
    ) -> Result<SessionStatus, ClientError>
    where
        F: FnMut(&StreamReassembler),
    {
        let request = self
            .http
            .post(&self.endpoint)
            .json(&serde_json::json!({ "prompt": prompt.as_str() }))
            .send();
        let response = match await_or_cancel(request, cancel).await {
            None => return Ok(cancelled(reassembler, on_update)),
            Some(Ok(response)) => response,
            Some(Err(error)) => {
                reassembler.fail(format!("Connection failed: {error}"));
                on_update(reassembler);
                return Err(error.into());
            }
        };

        let status = response.status();
        if !status.is_success() {
            let message = rejection_message(response).await;
            tracing::warn!(%status, %message, "generation request rejected");
            reassembler.fail(message.clone());
            on_update(reassembler);
            return Err(ClientError::Rejected { status, message });
        }

        let mut body = response.bytes_stream();
        let mut decoder = WireFrameDecoder::new();

        while reassembler.is_active() {
            let chunk = match await_or_cancel(body.next(), cancel).await {
                None => return Ok(cancelled(reassembler, on_update)),
                Some(None) => break,
                Some(Some(Ok(chunk))) => chunk,
                Some(Some(Err(error))) => {
                    tracing::warn!(%error, "generation stream broke");
                    reassembler.fail(format!("Connection lost: {error}"));
                    on_update(reassembler);
                    return Ok(reassembler.status());
                }
            };

            for event in decoder.feed(&chunk) {
                if reassembler.consume(event) {
                    on_update(reassembler);
                }
            }
        }

        for event in decoder.finish() {
            if reassembler.consume(event) {
                on_update(reassembler);
            }
        }

        if reassembler.is_active() {
            tracing::warn!(
                received = reassembler.accumulated().len(),
                "stream closed without a terminal event"
            );
            reassembler.fail(INCOMPLETE_STREAM_MESSAGE);
            on_update(reassembler);
        }
        Ok(reassembler.status())
    }
}

fn cancelled<F>(reassembler: &mut StreamReassembler, on_update: &mut F) -> SessionStatus
where
    F: FnMut(&StreamReassembler),
{
    reassembler.cancel();
    on_update(reassembler);
    tracing::info!("generation cancelled");
    reassembler.status()
}

/// The server's `{"error": ...}` message, or the status text.
async fn rejection_message(response: reqwest::Response) -> String {
    let status = response.status();
    response
        .json::<serde_json::Value>()
        .await
        .ok()
        .and_then(|body| body.get("error")?.as_str().map(str::to_string))
        .unwrap_or_else(|| {
            format!(
                "Request failed: {}",
                status.canonical_reason().unwrap_or(status.as_str())
            )
        })
}

/// Resolves to `None` once `cancel` is raised.
async fn await_or_cancel<F>(future: F, cancel: &CancelSignal) -> Option<F::Output>
where
    F: Future,
{
    let mut future = Box::pin(future);

    loop {
        if is_cancelled(cancel) {
            return None;
        }
        if let Ok(output) = tokio::time::timeout(CANCEL_POLL_INTERVAL, &mut future).await {
            if is_cancelled(cancel) {
                return None;
            }
            return Some(output);
        }
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
