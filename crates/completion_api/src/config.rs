use std::time::Duration;

use crate::url::DEFAULT_BASE_URL;

/// Transport configuration for chat-completions requests.
#[derive(Debug, Clone)]
pub struct CompletionApiConfig {
    /// Bearer credential passed to `Authorization`.
    pub api_key: String,
    /// Base URL; normalized to the chat-completions endpoint per request.
    pub base_url: String,
    /// Optional request timeout covering connect and the whole streamed body.
    pub timeout: Option<Duration>,
}

impl Default for CompletionApiConfig {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            base_url: DEFAULT_BASE_URL.to_string(),
            timeout: None,
        }
    }
}

impl CompletionApiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            ..Self::default()
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}
