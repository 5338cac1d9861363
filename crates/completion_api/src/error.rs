use std::fmt;

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::Error as JsonError;

#[derive(Debug)]
pub enum CompletionApiError {
    MissingApiKey,
    InvalidHeader(String),
    Request(reqwest::Error),
    Status(StatusCode, String),
    Serde(JsonError),
    RetryExhausted {
        status: Option<StatusCode>,
        last_error: Option<String>,
    },
    StreamFailed {
        code: Option<String>,
        message: String,
    },
    Cancelled,
    Unknown(String),
}

/// Error body shapes accepted from chat-completions providers: the nested
/// `{"error": {...}}` form and the flat `{"message": ..., "type": ...}` form.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorPayload {
    #[serde(rename = "error")]
    pub nested: Option<ErrorPayloadFields>,
    #[serde(flatten)]
    pub flat: ErrorPayloadFields,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct ErrorPayloadFields {
    pub message: Option<String>,
    pub code: Option<serde_json::Value>,
    #[serde(rename = "type")]
    pub type_: Option<String>,
}

impl ErrorPayloadFields {
    pub fn code_text(&self) -> Option<String> {
        match self.code.as_ref()? {
            serde_json::Value::String(value) => non_empty_string(value).map(str::to_owned),
            serde_json::Value::Number(value) => Some(value.to_string()),
            _ => None,
        }
    }

    pub fn rate_limit_message(&self, status: StatusCode) -> Option<String> {
        let code = self
            .code_text()
            .or_else(|| self.type_.as_deref().and_then(non_empty_string).map(str::to_owned))
            .unwrap_or_default();
        if !matches_rate_limit(&code, status) {
            return None;
        }

        let detail = self
            .message_or_fallback()
            .map(|message| format!(" ({message})"))
            .unwrap_or_default();
        Some(format!("The generation service is rate limited{detail}. Try again shortly."))
    }

    pub fn message_or_fallback(&self) -> Option<String> {
        let explicit = self.message.as_deref().and_then(non_empty_string)?;
        Some(explicit.to_owned())
    }
}

impl ErrorPayload {
    fn fields(&self) -> &ErrorPayloadFields {
        self.nested.as_ref().unwrap_or(&self.flat)
    }
}

impl fmt::Display for CompletionApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingApiKey => write!(f, "API key is required"),
            Self::InvalidHeader(message) => write!(f, "invalid header: {message}"),
            Self::Request(error) => write!(f, "request error: {error}"),
            Self::Status(status, message) => write!(f, "HTTP {status} {message}"),
            Self::Serde(error) => write!(f, "serialization error: {error}"),
            Self::RetryExhausted { status, last_error } => {
                let status = status
                    .map(|status| status.as_u16().to_string())
                    .unwrap_or_else(|| "n/a".to_owned());
                let last_error = last_error.as_deref().unwrap_or("none");
                write!(
                    f,
                    "retry exhausted after max attempts (status: {status}, last error: {last_error})"
                )
            }
            Self::StreamFailed { code, message } => match code {
                Some(code) if !code.trim().is_empty() => {
                    write!(f, "stream failed ({code}): {message}")
                }
                _ => write!(f, "stream failed: {message}"),
            },
            Self::Cancelled => write!(f, "request was cancelled"),
            Self::Unknown(message) => write!(f, "{message}"),
        }
    }
}

impl std::error::Error for CompletionApiError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Request(error) => Some(error),
            Self::Serde(error) => Some(error),
            _ => None,
        }
    }
}

impl From<reqwest::Error> for CompletionApiError {
    fn from(error: reqwest::Error) -> Self {
        Self::Request(error)
    }
}

impl From<JsonError> for CompletionApiError {
    fn from(error: JsonError) -> Self {
        Self::Serde(error)
    }
}

/// Extracts a human-readable message from an error response body.
pub fn parse_error_message(status: StatusCode, body: &str) -> String {
    let fallback = || {
        if body.trim().is_empty() {
            status
                .canonical_reason()
                .unwrap_or("request failed")
                .to_string()
        } else {
            body.trim().to_string()
        }
    };

    let Ok(parsed) = serde_json::from_str::<ErrorPayload>(body) else {
        return fallback();
    };

    let fields = parsed.fields();
    if let Some(message) = fields.rate_limit_message(status) {
        return message;
    }
    fields.message_or_fallback().unwrap_or_else(fallback)
}

fn matches_rate_limit(code: &str, status: StatusCode) -> bool {
    matches!(status, StatusCode::TOO_MANY_REQUESTS)
        || code.eq_ignore_ascii_case("rate_limit_exceeded")
        || code.eq_ignore_ascii_case("too_many_requests")
        || code.eq_ignore_ascii_case("too_many_tokens_error")
}

fn non_empty_string(value: &str) -> Option<&str> {
    if value.trim().is_empty() {
        None
    } else {
        Some(value)
    }
}
