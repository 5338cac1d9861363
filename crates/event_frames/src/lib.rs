//! Blank-line framing for `text/event-stream` bodies.
//!
//! Both the upstream chat-completions parser and the generation wire decoder
//! receive bodies in arbitrary chunks. [`FrameBuffer`] holds raw bytes until a
//! blank line closes a frame, so frames and multi-byte characters split
//! across reads come out whole.

/// Byte buffer that yields complete event-stream frames.
#[derive(Debug, Default)]
pub struct FrameBuffer {
    buffer: Vec<u8>,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Removes and returns the next complete frame without its separator.
    pub fn next_frame(&mut self) -> Option<Vec<u8>> {
        let (end, separator_len) = find_frame_end(&self.buffer)?;
        Some(self.buffer.drain(..end + separator_len).take(end).collect())
    }

    /// Takes whatever is buffered, for bodies that omit the final blank line.
    pub fn take_rest(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.buffer)
    }

    /// True when nothing but whitespace is waiting for a separator.
    pub fn is_blank(&self) -> bool {
        self.buffer.iter().all(u8::is_ascii_whitespace)
    }
}

/// Locates the first blank line (`\n\n` or `\r\n\r\n`), returning the frame
/// length and the separator length.
pub fn find_frame_end(buffer: &[u8]) -> Option<(usize, usize)> {
    let newline = buffer.iter().enumerate().filter(|(_, byte)| **byte == b'\n');
    for (index, _) in newline {
        match &buffer[index + 1..] {
            [b'\n', ..] => return Some((index, 2)),
            [b'\r', b'\n', ..] => {
                let frame_end = if index > 0 && buffer[index - 1] == b'\r' {
                    index - 1
                } else {
                    index
                };
                return Some((frame_end, index + 3 - frame_end));
            }
            _ => {}
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::{find_frame_end, FrameBuffer};

    #[test]
    fn frame_end_accepts_lf_and_crlf_separators() {
        assert_eq!(find_frame_end(b"data: x\n\nrest"), Some((7, 2)));
        assert_eq!(find_frame_end(b"data: x\r\n\r\nrest"), Some((7, 4)));
        assert_eq!(find_frame_end(b"data: x\n"), None);
        assert_eq!(find_frame_end(b""), None);
    }

    #[test]
    fn frames_split_across_reads_come_out_whole() {
        let mut frames = FrameBuffer::new();
        frames.extend(b"data: caf\xc3");
        assert_eq!(frames.next_frame(), None);

        frames.extend(b"\xa9\n\ndata: two\r\n\r\ndata: th");
        assert_eq!(frames.next_frame(), Some("data: café".as_bytes().to_vec()));
        assert_eq!(frames.next_frame(), Some(b"data: two".to_vec()));
        assert_eq!(frames.next_frame(), None);
        assert!(!frames.is_blank());
        assert_eq!(frames.take_rest(), b"data: th".to_vec());
        assert!(frames.is_blank());
    }
}
