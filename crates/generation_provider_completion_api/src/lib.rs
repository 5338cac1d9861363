//! Chat-completions-backed implementation of the `generation_provider` contract.
//!
//! This adapter translates `completion_api` stream events into the ordered
//! fragment stream expected by generation sessions. Fragments are forwarded
//! as soon as each upstream delta is parsed.

use std::sync::Arc;
use std::time::Duration;

use completion_api::{
    ChatCompletionRequest, ChatMessage, CompletionApiClient, CompletionApiConfig,
    CompletionApiError, CompletionStreamEvent, FinishReason,
};
use futures_util::future::BoxFuture;
use futures_util::stream::{self, StreamExt};
use generation_provider::{
    is_cancelled, raise, CancelSignal, FragmentStream, GenerationProvider, GenerationRequest,
    ProviderError, ProviderInitError, ProviderProfile,
};
use tokio::sync::mpsc;

/// Stable provider identifier used for provider selection and `/healthz`.
pub const COMPLETION_API_PROVIDER_ID: &str = "completion-api";

/// Model used when the configured model id is blank.
pub const DEFAULT_MODEL_ID: &str = "llama-3.1-8b";

/// Runtime configuration for the chat-completions provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompletionApiProviderConfig {
    pub api_key: String,
    pub model_id: String,
    pub base_url: Option<String>,
    pub timeout: Option<Duration>,
}

impl CompletionApiProviderConfig {
    #[must_use]
    pub fn new(api_key: impl Into<String>, model_id: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model_id: model_id.into(),
            base_url: None,
            timeout: None,
        }
    }

    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    fn into_completion_api_config(self) -> CompletionApiConfig {
        let mut config = CompletionApiConfig::new(self.api_key);

        if let Some(base_url) = self.base_url {
            config = config.with_base_url(base_url);
        }

        if let Some(timeout) = self.timeout {
            config = config.with_timeout(timeout);
        }

        config
    }
}

/// Delta sink handed to a [`StreamClient`].
type DeltaSink<'a> = &'a mut (dyn FnMut(String) + Send);

/// Streaming transport seam; replaced by a fake in tests.
trait StreamClient: Send + Sync + 'static {
    fn stream<'a>(
        &'a self,
        request: &'a ChatCompletionRequest,
        cancel: &'a CancelSignal,
        on_delta: DeltaSink<'a>,
    ) -> BoxFuture<'a, Result<Option<FinishReason>, CompletionApiError>>;
}

#[derive(Debug)]
struct DefaultStreamClient {
    client: CompletionApiClient,
}

impl StreamClient for DefaultStreamClient {
    fn stream<'a>(
        &'a self,
        request: &'a ChatCompletionRequest,
        cancel: &'a CancelSignal,
        on_delta: DeltaSink<'a>,
    ) -> BoxFuture<'a, Result<Option<FinishReason>, CompletionApiError>> {
        Box::pin(
            self.client
                .stream_with_handler(request, Some(cancel), move |event| {
                    if let CompletionStreamEvent::ContentDelta { delta } = event {
                        on_delta(delta);
                    }
                }),
        )
    }
}

/// `GenerationProvider` adapter backed by `completion_api` transport primitives.
pub struct CompletionApiProvider {
    model_id: String,
    has_api_key: bool,
    stream_client: Arc<dyn StreamClient>,
}

impl CompletionApiProvider {
    /// Creates a provider using the real chat-completions transport.
    ///
    /// A blank API key is accepted here and reported by
    /// [`GenerationProvider::preflight`], so a server can start and answer
    /// each request with a configuration error.
    pub fn new(config: CompletionApiProviderConfig) -> Result<Self, ProviderInitError> {
        let model_id = sanitize_model_id(&config.model_id);
        let has_api_key = !config.api_key.trim().is_empty();
        let stream_client = Arc::new(DefaultStreamClient {
            client: CompletionApiClient::new(config.into_completion_api_config())
                .map_err(map_init_error)?,
        });

        Ok(Self {
            model_id,
            has_api_key,
            stream_client,
        })
    }

    fn build_payload(&self, request: GenerationRequest) -> ChatCompletionRequest {
        ChatCompletionRequest::new(
            self.model_id.clone(),
            vec![
                ChatMessage::system(request.system_instruction),
                ChatMessage::user(request.user_instruction),
            ],
        )
        .with_temperature(request.params.temperature)
        .with_top_p(request.params.top_p)
        .with_max_completion_tokens(request.params.max_output_tokens)
    }

    #[cfg(test)]
    fn with_stream_client_for_tests(model_id: &str, stream_client: Arc<dyn StreamClient>) -> Self {
        Self {
            model_id: sanitize_model_id(model_id),
            has_api_key: true,
            stream_client,
        }
    }
}

impl GenerationProvider for CompletionApiProvider {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            provider_id: COMPLETION_API_PROVIDER_ID.to_string(),
            model_id: self.model_id.clone(),
        }
    }

    fn preflight(&self) -> Result<(), ProviderInitError> {
        if self.has_api_key {
            Ok(())
        } else {
            Err(ProviderInitError::new(
                "The generation service API key is not configured",
            ))
        }
    }

    /// Must be called from within a tokio runtime; the upstream request runs
    /// on a spawned task that feeds the returned stream.
    fn generate(&self, request: GenerationRequest, cancel: CancelSignal) -> FragmentStream {
        let (sender, receiver) = mpsc::unbounded_channel();
        let payload = self.build_payload(request);
        let stream_client = Arc::clone(&self.stream_client);
        let task_cancel = Arc::clone(&cancel);

        tokio::spawn(async move {
            if is_cancelled(&task_cancel) {
                return;
            }

            let outcome = {
                let delta_sender = sender.clone();
                let delta_cancel = Arc::clone(&task_cancel);
                let mut on_delta = move |delta: String| {
                    if delta.is_empty() {
                        return;
                    }
                    if delta_sender.send(Ok(delta)).is_err() {
                        raise(&delta_cancel);
                    }
                };
                stream_client
                    .stream(&payload, &task_cancel, &mut on_delta)
                    .await
            };

            if let Some(error) = terminal_error(outcome) {
                if !error.is_cancelled() {
                    tracing::error!(model = %payload.model, %error, "chat completion stream failed");
                }
                let _ = sender.send(Err(error));
            }
        });

        let guard = RaiseOnDrop(cancel);
        stream::unfold((receiver, guard), |(mut receiver, guard)| async move {
            receiver
                .recv()
                .await
                .map(|item| (item, (receiver, guard)))
        })
        .boxed()
    }
}

/// Maps the transport outcome to the error that must close the fragment
/// stream, if any.
fn terminal_error(
    outcome: Result<Option<FinishReason>, CompletionApiError>,
) -> Option<ProviderError> {
    match outcome {
        Ok(Some(FinishReason::Stop)) => None,
        Ok(Some(FinishReason::Length)) => {
            tracing::warn!("chat completion stopped at the output token limit");
            None
        }
        Ok(Some(FinishReason::ContentFilter)) => Some(ProviderError::upstream(
            "Generation was stopped by the provider's content filter",
        )),
        Ok(Some(reason)) => Some(ProviderError::upstream(format!(
            "Generation ended with unexpected finish reason '{}'",
            reason.as_str()
        ))),
        Ok(None) => Some(ProviderError::upstream(
            "Generation stream ended without a finish marker",
        )),
        Err(CompletionApiError::Cancelled) => Some(ProviderError::Cancelled),
        Err(error) => Some(ProviderError::upstream(format!("Generation failed: {error}"))),
    }
}

/// Raises the cancel flag when the consumer drops the fragment stream.
struct RaiseOnDrop(CancelSignal);

impl Drop for RaiseOnDrop {
    fn drop(&mut self) {
        raise(&self.0);
    }
}

fn sanitize_model_id(model_id: &str) -> String {
    let trimmed = model_id.trim();
    if trimmed.is_empty() {
        DEFAULT_MODEL_ID.to_string()
    } else {
        trimmed.to_string()
    }
}

fn map_init_error(error: CompletionApiError) -> ProviderInitError {
    ProviderInitError::new(format!(
        "Failed to initialize completion-api provider: {error}"
    ))
}
