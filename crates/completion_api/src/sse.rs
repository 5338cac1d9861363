use event_frames::FrameBuffer;
use serde_json::Value;

use crate::events::{CompletionStreamEvent, FinishReason};

/// Incremental parser for SSE byte streams.
///
/// Bytes are buffered until a blank line closes a frame, so frames and UTF-8
/// sequences split across network reads decode correctly.
#[derive(Debug, Default)]
pub struct SseStreamParser {
    frames: FrameBuffer,
}

impl SseStreamParser {
    /// Feed arbitrary bytes into the parser and drain complete events.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<CompletionStreamEvent> {
        self.frames.extend(bytes);
        let mut events = Vec::new();

        while let Some(frame) = self.frames.next_frame() {
            let frame = String::from_utf8_lossy(&frame);

            let Some(payload) = extract_data_payload(&frame) else {
                continue;
            };
            if payload == "[DONE]" {
                events.push(CompletionStreamEvent::Done);
                continue;
            }

            match serde_json::from_str::<Value>(&payload) {
                Ok(value) => map_chunk(&value, &mut events),
                Err(error) => {
                    tracing::warn!(%error, "skipping malformed completion chunk");
                }
            }
        }

        events
    }

    /// Parse a complete SSE payload string in one shot.
    pub fn parse_frames(input: &str) -> Vec<CompletionStreamEvent> {
        let mut parser = Self::default();
        parser.feed(input.as_bytes())
    }

    pub fn is_empty_buffer(&self) -> bool {
        self.frames.is_blank()
    }
}

fn extract_data_payload(frame: &str) -> Option<String> {
    let data_lines: Vec<&str> = frame
        .lines()
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|value| value.trim())
        .filter(|value| !value.is_empty())
        .collect();

    if data_lines.is_empty() {
        None
    } else {
        Some(data_lines.join("\n"))
    }
}

fn map_chunk(value: &Value, events: &mut Vec<CompletionStreamEvent>) {
    if let Some(error) = value.get("error").filter(|error| !error.is_null()) {
        let code = error.get("code").and_then(|code| match code {
            Value::String(code) => Some(code.clone()),
            Value::Number(code) => Some(code.to_string()),
            _ => None,
        });
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(ToString::to_string)
            .or_else(|| error.as_str().map(ToString::to_string));
        events.push(CompletionStreamEvent::Error { code, message });
        return;
    }

    let Some(choice) = value
        .get("choices")
        .and_then(Value::as_array)
        .and_then(|choices| choices.first())
    else {
        return;
    };

    let delta = choice
        .get("delta")
        .and_then(|delta| delta.get("content"))
        .and_then(Value::as_str)
        .unwrap_or("");
    if !delta.is_empty() {
        events.push(CompletionStreamEvent::ContentDelta {
            delta: delta.to_owned(),
        });
    }

    if let Some(reason) = choice.get("finish_reason").and_then(Value::as_str) {
        events.push(CompletionStreamEvent::Finished {
            reason: FinishReason::parse(reason),
        });
    }
}
