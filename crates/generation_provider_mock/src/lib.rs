//! Deterministic mock implementation of the shared `generation_provider` contract.
//!
//! This crate contains no transport/protocol logic and is intended for local
//! development and contract-level integration testing.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use futures_util::stream::{self, StreamExt};
use generation_provider::{
    is_cancelled, CancelSignal, FragmentStream, GenerationProvider, GenerationRequest,
    ProviderError, ProviderProfile,
};

/// Stable provider identifier used for explicit startup selection.
pub const MOCK_PROVIDER_ID: &str = "mock";

const CANCEL_POLL_INTERVAL: Duration = Duration::from_millis(5);

/// One scripted action of a mock generation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MockStep {
    /// Yield a text fragment.
    Fragment(String),
    /// Fail the stream with an upstream fault; nothing follows.
    Fault(String),
    /// Pause before the next step.
    Delay(Duration),
    /// Block until the generation is cancelled.
    WaitForCancel,
}

/// Deterministic mock provider used by tests and local runs.
#[derive(Debug)]
pub struct MockProvider {
    steps: Vec<MockStep>,
    fragment_delay: Duration,
    requests: Mutex<Vec<GenerationRequest>>,
    released_streams: Arc<AtomicUsize>,
}

impl MockProvider {
    /// Creates a mock provider that yields `fragments` and then ends cleanly.
    #[must_use]
    pub fn new(fragments: Vec<String>) -> Self {
        Self::scripted(fragments.into_iter().map(MockStep::Fragment).collect())
    }

    /// Creates a mock provider that replays an explicit script.
    #[must_use]
    pub fn scripted(steps: Vec<MockStep>) -> Self {
        Self {
            steps,
            fragment_delay: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
            released_streams: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Sleeps for `delay` before every fragment, imitating token latency.
    #[must_use]
    pub fn with_fragment_delay(mut self, delay: Duration) -> Self {
        self.fragment_delay = delay;
        self
    }

    /// Requests received so far, in call order.
    pub fn observed_requests(&self) -> Vec<GenerationRequest> {
        lock_unpoisoned(&self.requests).clone()
    }

    /// Number of fragment streams that have been dropped, whether finished or not.
    pub fn released_streams(&self) -> usize {
        self.released_streams.load(Ordering::Acquire)
    }

    const TOKEN_DELAY_MS: u64 = 30;
}

impl Default for MockProvider {
    fn default() -> Self {
        let source = concat!(
            "Here is your component:\n",
            "```tsx\n",
            "import React, { useState } from 'react';\n",
            "\n",
            "interface CounterProps {\n",
            "  initial?: number;\n",
            "}\n",
            "\n",
            "function Counter({ initial = 0 }: CounterProps) {\n",
            "  const [count, setCount] = useState(initial);\n",
            "\n",
            "  return (\n",
            "    <div className=\"flex flex-col items-center gap-4 p-8\">\n",
            "      <span className=\"text-4xl font-bold\">{count}</span>\n",
            "      <div className=\"flex gap-2\">\n",
            "        <button className=\"rounded bg-orange-500 px-4 py-2 text-white\" onClick={() => setCount(count - 1)}>-</button>\n",
            "        <button className=\"rounded bg-orange-500 px-4 py-2 text-white\" onClick={() => setCount(count + 1)}>+</button>\n",
            "      </div>\n",
            "    </div>\n",
            "  );\n",
            "}\n",
            "```\n",
        );

        Self::new(tokenize(source)).with_fragment_delay(Duration::from_millis(Self::TOKEN_DELAY_MS))
    }
}

impl GenerationProvider for MockProvider {
    fn profile(&self) -> ProviderProfile {
        ProviderProfile {
            provider_id: MOCK_PROVIDER_ID.to_string(),
            model_id: "mock".to_string(),
        }
    }

    fn generate(&self, request: GenerationRequest, cancel: CancelSignal) -> FragmentStream {
        lock_unpoisoned(&self.requests).push(request);

        let state = ScriptState {
            steps: self.steps.iter().cloned().collect(),
            fragment_delay: self.fragment_delay,
            cancel,
            finished: false,
            _release: ReleaseProbe(Arc::clone(&self.released_streams)),
        };

        stream::unfold(state, |mut state| async move {
            loop {
                if state.finished {
                    return None;
                }

                let step = state.steps.pop_front()?;
                if let MockStep::Fragment(_) = step {
                    if !state.fragment_delay.is_zero() {
                        tokio::time::sleep(state.fragment_delay).await;
                    }
                }

                if is_cancelled(&state.cancel) {
                    state.finished = true;
                    return Some((Err(ProviderError::Cancelled), state));
                }

                match step {
                    MockStep::Fragment(text) => return Some((Ok(text), state)),
                    MockStep::Fault(message) => {
                        state.finished = true;
                        return Some((Err(ProviderError::Upstream(message)), state));
                    }
                    MockStep::Delay(delay) => tokio::time::sleep(delay).await,
                    MockStep::WaitForCancel => {
                        while !is_cancelled(&state.cancel) {
                            tokio::time::sleep(CANCEL_POLL_INTERVAL).await;
                        }
                        state.finished = true;
                        return Some((Err(ProviderError::Cancelled), state));
                    }
                }
            }
        })
        .boxed()
    }
}

struct ScriptState {
    steps: VecDeque<MockStep>,
    fragment_delay: Duration,
    cancel: CancelSignal,
    finished: bool,
    _release: ReleaseProbe,
}

struct ReleaseProbe(Arc<AtomicUsize>);

impl Drop for ReleaseProbe {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::AcqRel);
    }
}

/// Splits `source` into word-sized fragments, keeping whitespace attached.
#[must_use]
pub fn tokenize(source: &str) -> Vec<String> {
    let mut fragments = Vec::new();
    let mut pending = String::new();

    for ch in source.chars() {
        pending.push(ch);
        if matches!(ch, ' ' | '\n') {
            fragments.push(std::mem::take(&mut pending));
        }
    }

    if !pending.is_empty() {
        fragments.push(pending);
    }

    fragments
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

#[cfg(test)]
mod tests {
    use generation_provider::{cancel_signal, raise, SamplingParams};

    use super::*;

    fn request() -> GenerationRequest {
        GenerationRequest {
            system_instruction: "system".to_string(),
            user_instruction: "Create a React component: counter".to_string(),
            params: SamplingParams {
                temperature: 0.7,
                top_p: 0.9,
                max_output_tokens: 1024,
            },
        }
    }

    async fn collect(provider: &MockProvider, cancel: CancelSignal) -> Vec<Result<String, ProviderError>> {
        provider.generate(request(), cancel).collect().await
    }

    #[test]
    fn profile_exposes_explicit_mock_provider_identity() {
        let profile = MockProvider::new(Vec::new()).profile();

        assert_eq!(profile.provider_id, MOCK_PROVIDER_ID);
        assert_eq!(profile.model_id, "mock");
    }

    #[test]
    fn tokenize_keeps_whitespace_attached_and_loses_nothing() {
        let fragments = tokenize("import React\nfrom 'react';");

        assert_eq!(fragments, vec!["import ", "React\n", "from ", "'react';"]);
        assert_eq!(fragments.concat(), "import React\nfrom 'react';");
    }

    #[tokio::test]
    async fn generate_yields_fragments_in_order_and_records_request() {
        let provider = MockProvider::new(vec!["a".to_string(), "b".to_string()]);

        let items = collect(&provider, cancel_signal()).await;

        assert_eq!(items, vec![Ok("a".to_string()), Ok("b".to_string())]);
        assert_eq!(provider.observed_requests(), vec![request()]);
        assert_eq!(provider.released_streams(), 1);
    }

    #[tokio::test]
    async fn fault_ends_the_stream_after_prior_fragments() {
        let provider = MockProvider::scripted(vec![
            MockStep::Fragment("one".to_string()),
            MockStep::Fault("upstream reset".to_string()),
            MockStep::Fragment("never".to_string()),
        ]);

        let items = collect(&provider, cancel_signal()).await;

        assert_eq!(
            items,
            vec![
                Ok("one".to_string()),
                Err(ProviderError::Upstream("upstream reset".to_string())),
            ]
        );
    }

    #[tokio::test]
    async fn raised_cancel_stops_the_stream() {
        let provider = MockProvider::new(vec!["ignored".to_string()]);
        let cancel = cancel_signal();
        raise(&cancel);

        let items = collect(&provider, cancel).await;

        assert_eq!(items, vec![Err(ProviderError::Cancelled)]);
    }

    #[tokio::test]
    async fn wait_for_cancel_blocks_until_cancelled() {
        let provider = MockProvider::scripted(vec![
            MockStep::Fragment("working".to_string()),
            MockStep::WaitForCancel,
        ]);
        let cancel = cancel_signal();
        let mut stream = provider.generate(request(), Arc::clone(&cancel));

        assert_eq!(stream.next().await, Some(Ok("working".to_string())));

        let waiter = tokio::spawn(async move { stream.next().await });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!waiter.is_finished());

        raise(&cancel);
        let item = waiter.await.expect("waiter task should join");
        assert_eq!(item, Some(Err(ProviderError::Cancelled)));
    }

    #[tokio::test]
    async fn dropping_an_unfinished_stream_releases_it() {
        let provider = MockProvider::scripted(vec![MockStep::WaitForCancel]);
        let stream = provider.generate(request(), cancel_signal());
        assert_eq!(provider.released_streams(), 0);

        drop(stream);

        assert_eq!(provider.released_streams(), 1);
    }

    #[tokio::test]
    async fn default_script_reassembles_to_a_fenced_component() {
        let provider = MockProvider::default().with_fragment_delay(Duration::ZERO);

        let text: String = collect(&provider, cancel_signal())
            .await
            .into_iter()
            .map(|item| item.expect("default script has no faults"))
            .collect();

        assert!(text.starts_with("Here is your component:\n```tsx\n"));
        assert!(text.contains("function Counter("));
        assert!(text.ends_with("```\n"));
    }
}
