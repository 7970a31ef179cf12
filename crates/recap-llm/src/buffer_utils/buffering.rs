use crate::error::{LlmError, Result};
use std::collections::VecDeque;

/// Circular buffer for line-based parsing of a chunked byte stream
///
/// Holds back a trailing partial line (including a UTF-8 sequence cut in
/// half) until the rest of it arrives.
pub struct CircularLineBuffer {
    buffer: VecDeque<u8>,
}

impl CircularLineBuffer {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            buffer: VecDeque::with_capacity(capacity),
        }
    }

    /// Append one received chunk
    pub fn extend(&mut self, bytes: &[u8]) {
        self.buffer.extend(bytes);
    }

    /// Pop the next complete line, without its terminator and surrounding
    /// whitespace. `None` until a `\n` has arrived.
    pub fn next_line(&mut self) -> Option<Result<String>> {
        let newline_pos = self.buffer.iter().position(|&b| b == b'\n')?;
        let line_bytes: Vec<u8> = self.buffer.drain(..=newline_pos).collect();
        Some(decode_line(line_bytes))
    }

    /// Take whatever is left as a final line (stream ended without a newline)
    pub fn take_remaining(&mut self) -> Option<Result<String>> {
        if self.buffer.is_empty() {
            return None;
        }
        let line_bytes: Vec<u8> = self.buffer.drain(..).collect();
        Some(decode_line(line_bytes))
    }

    pub fn clear(&mut self) {
        self.buffer.clear();
    }

    /// Bytes still waiting for a line terminator
    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }
}

fn decode_line(line_bytes: Vec<u8>) -> Result<String> {
    match String::from_utf8(line_bytes) {
        Ok(line) => Ok(line.trim().to_string()),
        Err(e) => Err(LlmError::Stream(format!("Invalid UTF-8: {}", e))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_circular_buffer_basic() {
        let mut buffer = CircularLineBuffer::with_capacity(64);

        buffer.extend(b"line1\nline2\n");

        assert_eq!(buffer.next_line().unwrap().unwrap(), "line1");
        assert_eq!(buffer.next_line().unwrap().unwrap(), "line2");
        assert!(buffer.next_line().is_none());
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_partial_line() {
        let mut buffer = CircularLineBuffer::with_capacity(64);

        buffer.extend(b"partial");
        assert!(buffer.next_line().is_none());
        assert_eq!(buffer.len(), 7);

        buffer.extend(b" line\r\n");
        assert_eq!(buffer.next_line().unwrap().unwrap(), "partial line");
    }

    #[test]
    fn test_split_utf8_sequence() {
        let bytes = "café\n".as_bytes();
        let mut buffer = CircularLineBuffer::with_capacity(64);

        // 'é' is two bytes; cut between them
        buffer.extend(&bytes[..4]);
        assert!(buffer.next_line().is_none());
        buffer.extend(&bytes[4..]);

        assert_eq!(buffer.next_line().unwrap().unwrap(), "café");
    }

    #[test]
    fn test_take_remaining() {
        let mut buffer = CircularLineBuffer::with_capacity(64);
        buffer.extend(b"done\ntail");

        assert_eq!(buffer.next_line().unwrap().unwrap(), "done");
        assert_eq!(buffer.take_remaining().unwrap().unwrap(), "tail");
        assert!(buffer.take_remaining().is_none());
    }

    #[test]
    fn test_invalid_utf8_line_is_an_error() {
        let mut buffer = CircularLineBuffer::with_capacity(64);
        buffer.extend(&[0xff, 0xfe, b'\n', b'o', b'k', b'\n']);

        assert!(buffer.next_line().unwrap().is_err());
        assert_eq!(buffer.next_line().unwrap().unwrap(), "ok");
    }
}
