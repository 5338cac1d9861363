use std::future::Future;
use std::sync::{atomic::AtomicBool, atomic::Ordering, Arc};
use std::time::Duration;

use futures_util::StreamExt;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, Response};

use crate::config::CompletionApiConfig;
use crate::error::{parse_error_message, CompletionApiError};
use crate::events::{CompletionStreamEvent, FinishReason};
use crate::headers::build_headers;
use crate::payload::ChatCompletionRequest;
use crate::retry::{is_permanent_status, is_retryable_http_error, retry_delay, MAX_RETRIES};
use crate::sse::SseStreamParser;
use crate::url::normalize_completions_url;

/// Optional cancellation signal shared across request and stream loops.
pub type CancellationSignal = Arc<AtomicBool>;

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(25);

#[derive(Debug)]
pub struct CompletionApiClient {
    http: Client,
    config: CompletionApiConfig,
}

/// Why a single request attempt produced no stream.
enum Rejection {
    /// Worth another attempt; the error is surfaced once retries run out.
    Transient(CompletionApiError),
    Permanent(CompletionApiError),
}

impl CompletionApiClient {
    pub fn new(config: CompletionApiConfig) -> Result<Self, CompletionApiError> {
        let mut builder = Client::builder();
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(CompletionApiError::from)?;
        Ok(Self { http, config })
    }

    pub fn config(&self) -> &CompletionApiConfig {
        &self.config
    }

    pub fn normalized_endpoint(&self) -> String {
        normalize_completions_url(&self.config.base_url)
    }

    /// Builds the POST for `request`. The payload always asks for a stream.
    pub fn build_request(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<reqwest::RequestBuilder, CompletionApiError> {
        let mut headers = HeaderMap::new();
        for (name, value) in build_headers(&self.config)? {
            let value = HeaderValue::from_str(&value)
                .map_err(|_| CompletionApiError::InvalidHeader(format!("invalid value for {name}")))?;
            headers.insert(HeaderName::from_static(name), value);
        }

        let mut payload = request.clone();
        payload.stream = true;
        Ok(self
            .http
            .post(self.normalized_endpoint())
            .headers(headers)
            .json(&payload))
    }

    /// Sends the request, retrying transient failures with exponential backoff.
    ///
    /// Retries happen only before any response body is consumed, so no
    /// fragment is ever delivered twice.
    pub async fn send_with_retry(
        &self,
        request: &ChatCompletionRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<Response, CompletionApiError> {
        let mut attempt = 0;
        loop {
            if is_cancelled(cancellation) {
                return Err(CompletionApiError::Cancelled);
            }

            let error = match self.try_send(request, cancellation).await {
                Ok(response) => return Ok(response),
                Err(Rejection::Permanent(error)) => return Err(error),
                Err(Rejection::Transient(error)) => error,
            };
            if attempt == MAX_RETRIES {
                return Err(match error {
                    CompletionApiError::Request(error) => CompletionApiError::RetryExhausted {
                        status: error.status(),
                        last_error: Some(error.to_string()),
                    },
                    other => other,
                });
            }

            tracing::warn!(attempt, %error, "retrying chat completion request");
            await_or_cancel(tokio::time::sleep(retry_delay(attempt)), cancellation).await?;
            attempt += 1;
        }
    }

    /// One POST. Success statuses hand back the unread response; error
    /// statuses are read to classify them.
    async fn try_send(
        &self,
        request: &ChatCompletionRequest,
        cancellation: Option<&CancellationSignal>,
    ) -> Result<Response, Rejection> {
        let send = self.build_request(request).map_err(Rejection::Permanent)?.send();
        let response = match await_or_cancel(send, cancellation).await {
            Err(cancelled) => return Err(Rejection::Permanent(cancelled)),
            Ok(Err(error)) => return Err(Rejection::Transient(CompletionApiError::from(error))),
            Ok(Ok(response)) => response,
        };

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = match await_or_cancel(response.text(), cancellation).await {
            Err(cancelled) => return Err(Rejection::Permanent(cancelled)),
            Ok(body) => body.unwrap_or_default(),
        };
        let error = CompletionApiError::Status(status, parse_error_message(status, &body));
        if is_permanent_status(status.as_u16()) || !is_retryable_http_error(status.as_u16(), &body)
        {
            Err(Rejection::Permanent(error))
        } else {
            Err(Rejection::Transient(error))
        }
    }

    /// Streams events to `on_event` as they arrive and returns the finish
    /// reason. `None` means the body ended with neither a finish reason nor
    /// `[DONE]`.
    pub async fn stream_with_handler<F>(
        &self,
        request: &ChatCompletionRequest,
        cancellation: Option<&CancellationSignal>,
        mut on_event: F,
    ) -> Result<Option<FinishReason>, CompletionApiError>
    where
        F: FnMut(CompletionStreamEvent),
    {
        let response = self.send_with_retry(request, cancellation).await?;
        let mut body = response.bytes_stream();
        let mut parser = SseStreamParser::default();
        let mut finish = None;

        'body: while let Some(chunk) = await_or_cancel(body.next(), cancellation).await? {
            let chunk = chunk.map_err(CompletionApiError::from)?;
            for event in parser.feed(&chunk) {
                let done = observe(&event, &mut finish)?;
                on_event(event);
                if done {
                    break 'body;
                }
            }
        }

        if is_cancelled(cancellation) {
            return Err(CompletionApiError::Cancelled);
        }
        Ok(finish)
    }
}

/// Folds one parsed event into the finish reason seen so far and reports
/// whether `[DONE]` closed the stream.
///
/// `[DONE]` with no prior finish reason counts as a clean stop and never
/// replaces a reason already recorded. In-band errors and finish reasons this
/// crate does not recognize fail the stream.
fn observe(
    event: &CompletionStreamEvent,
    finish: &mut Option<FinishReason>,
) -> Result<bool, CompletionApiError> {
    match event {
        CompletionStreamEvent::ContentDelta { .. } => Ok(false),
        CompletionStreamEvent::Finished {
            reason: Some(reason),
        } => {
            *finish = Some(*reason);
            Ok(false)
        }
        CompletionStreamEvent::Finished { reason: None } => Err(CompletionApiError::StreamFailed {
            code: None,
            message: "upstream reported an unrecognized finish reason".to_owned(),
        }),
        CompletionStreamEvent::Done => {
            finish.get_or_insert(FinishReason::Stop);
            Ok(true)
        }
        CompletionStreamEvent::Error { code, message } => {
            Err(stream_failure(code.clone(), message.clone()))
        }
    }
}

fn stream_failure(code: Option<String>, message: Option<String>) -> CompletionApiError {
    CompletionApiError::StreamFailed {
        message: message
            .or_else(|| code.clone())
            .unwrap_or_else(|| "upstream reported an error".to_owned()),
        code,
    }
}

fn is_cancelled(cancel: Option<&CancellationSignal>) -> bool {
    cancel.is_some_and(|token| token.load(Ordering::Acquire))
}

async fn await_or_cancel<F>(
    future: F,
    cancellation: Option<&CancellationSignal>,
) -> Result<F::Output, CompletionApiError>
where
    F: Future,
{
    if cancellation.is_none() {
        return Ok(future.await);
    }

    let mut future = Box::pin(future);

    loop {
        if is_cancelled(cancellation) {
            return Err(CompletionApiError::Cancelled);
        }

        if let Ok(output) = tokio::time::timeout(CANCEL_POLL_INTERVAL, &mut future).await {
            if is_cancelled(cancellation) {
                return Err(CompletionApiError::Cancelled);
            }
            return Ok(output);
        }
    }
}
