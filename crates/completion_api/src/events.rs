use serde::{Deserialize, Serialize};

/// Why the model stopped producing output, as reported on the final choice chunk.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    ToolCalls,
}

impl FinishReason {
    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "stop" | "eos" | "end_turn" => Self::Stop,
            "length" | "max_tokens" => Self::Length,
            "content_filter" => Self::ContentFilter,
            "tool_calls" | "function_call" => Self::ToolCalls,
            _ => return None,
        })
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Length => "length",
            Self::ContentFilter => "content_filter",
            Self::ToolCalls => "tool_calls",
        }
    }
}

/// Stream event emitted by the parser after normalization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CompletionStreamEvent {
    /// Incremental assistant text from `choices[0].delta.content`.
    ContentDelta { delta: String },
    /// `choices[0].finish_reason` became non-null. `reason` is `None` for
    /// values this crate does not recognize.
    Finished { reason: Option<FinishReason> },
    /// The `data: [DONE]` sentinel.
    Done,
    /// In-band error payload.
    Error {
        code: Option<String>,
        message: Option<String>,
    },
}
