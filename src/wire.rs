//! Wire events and their `data: <JSON>\n\n` framing.

use event_frames::FrameBuffer;
use serde::{Deserialize, Serialize};

/// One event on the generation stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "stage", rename_all = "lowercase")]
pub enum WireEvent {
    /// A fragment of model output, verbatim.
    #[serde(rename = "code")]
    Fragment { content: String },
    /// Successful end of the session, carrying the normalized final text.
    Complete {
        #[serde(rename = "fullCode", default, skip_serializing_if = "Option::is_none")]
        full_code: Option<String>,
    },
    /// Failed end of the session.
    Error { error: String },
}

impl WireEvent {
    pub fn fragment(content: impl Into<String>) -> Self {
        Self::Fragment {
            content: content.into(),
        }
    }

    pub fn complete(full_code: impl Into<String>) -> Self {
        Self::Complete {
            full_code: Some(full_code.into()),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self::Error {
            error: message.into(),
        }
    }

    /// `complete` and `error` end a session; nothing may follow them.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::Fragment { .. })
    }

    /// Encodes the event as one event-stream frame.
    pub fn encode_frame(&self) -> Result<String, serde_json::Error> {
        Ok(format!("data: {}\n\n", serde_json::to_string(self)?))
    }
}

/// Incremental decoder for a chunked event-stream body.
///
/// Bytes are buffered until a blank line closes a frame, so several frames
/// in one read, frames split across reads, and multi-byte characters split
/// across reads all decode correctly.
#[derive(Debug, Default)]
pub struct WireFrameDecoder {
    frames: FrameBuffer,
    skipped_frames: usize,
}

impl WireFrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feeds raw bytes and drains every complete event.
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<WireEvent> {
        self.frames.extend(bytes);
        let mut events = Vec::new();

        while let Some(frame) = self.frames.next_frame() {
            if let Some(event) = self.decode_frame(&frame) {
                events.push(event);
            }
        }

        events
    }

    /// Decodes whatever is left once the body has ended, for servers that
    /// omit the final blank line.
    pub fn finish(&mut self) -> Vec<WireEvent> {
        let frame = self.frames.take_rest();
        self.decode_frame(&frame).into_iter().collect()
    }

    /// Frames that carried data but failed to decode.
    pub fn skipped_frames(&self) -> usize {
        self.skipped_frames
    }

    fn decode_frame(&mut self, frame: &[u8]) -> Option<WireEvent> {
        let frame = String::from_utf8_lossy(frame);
        let payload = extract_data(&frame)?;

        match serde_json::from_str::<WireEvent>(&payload) {
            Ok(event) => Some(event),
            Err(error) => {
                self.skipped_frames += 1;
                tracing::warn!(%error, frame_len = payload.len(), "skipping malformed wire frame");
                None
            }
        }
    }
}

/// Joins the frame's `data:` lines; comments and other fields are ignored.
fn extract_data(frame: &str) -> Option<String> {
    let data: Vec<&str> = frame
        .split('\n')
        .map(|line| line.strip_suffix('\r').unwrap_or(line))
        .filter_map(|line| line.strip_prefix("data:"))
        .map(|value| value.strip_prefix(' ').unwrap_or(value))
        .collect();

    if data.is_empty() || data.iter().all(|line| line.trim().is_empty()) {
        None
    } else {
        Some(data.join("\n"))
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::{WireEvent, WireFrameDecoder};

    #[test]
    fn wire_shapes_are_stable() {
        assert_eq!(
            serde_json::to_value(WireEvent::fragment("a")).expect("json"),
            json!({"stage": "code", "content": "a"})
        );
        assert_eq!(
            serde_json::to_value(WireEvent::complete("x")).expect("json"),
            json!({"stage": "complete", "fullCode": "x"})
        );
        assert_eq!(
            serde_json::to_value(WireEvent::Complete { full_code: None }).expect("json"),
            json!({"stage": "complete"})
        );
        assert_eq!(
            serde_json::to_value(WireEvent::error("boom")).expect("json"),
            json!({"stage": "error", "error": "boom"})
        );
    }

    #[test]
    fn encoded_frames_never_contain_raw_newlines_in_payload() {
        let frame = WireEvent::fragment("line one\n\nline two")
            .encode_frame()
            .expect("encode");
        assert!(frame.starts_with("data: {"));
        assert!(frame.ends_with("}\n\n"));
        assert_eq!(frame.matches('\n').count(), 2);
    }

    #[test]
    fn decoder_handles_several_frames_in_one_read() {
        let mut decoder = WireFrameDecoder::new();
        let mut bytes = String::new();
        for event in [WireEvent::fragment("a"), WireEvent::fragment("b"), WireEvent::complete("ab")] {
            bytes.push_str(&event.encode_frame().expect("encode"));
        }

        assert_eq!(
            decoder.feed(bytes.as_bytes()),
            vec![
                WireEvent::fragment("a"),
                WireEvent::fragment("b"),
                WireEvent::complete("ab")
            ]
        );
    }

    #[test]
    fn decoder_skips_malformed_frames_and_comments() {
        let mut decoder = WireFrameDecoder::new();
        let events = decoder.feed(
            b": ping\n\ndata: {not json}\n\ndata: {\"stage\":\"mystery\"}\n\ndata: {\"stage\":\"code\",\"content\":\"ok\"}\n\n",
        );
        assert_eq!(events, vec![WireEvent::fragment("ok")]);
        assert_eq!(decoder.skipped_frames(), 2);
    }

    #[test]
    fn finish_decodes_unterminated_trailing_frame() {
        let mut decoder = WireFrameDecoder::new();
        assert!(decoder
            .feed(b"data: {\"stage\":\"complete\",\"fullCode\":\"x\"}")
            .is_empty());
        assert_eq!(decoder.finish(), vec![WireEvent::complete("x")]);
        assert!(decoder.finish().is_empty());
    }
}
