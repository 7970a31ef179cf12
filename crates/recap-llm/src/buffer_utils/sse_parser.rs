use futures::{Stream, StreamExt};

use super::buffering::CircularLineBuffer;
use crate::error::Result;
use crate::traits::FrameStream;

const DATA_PREFIX: &str = "data: ";
const DONE_MARKER: &str = "[DONE]";

/// One decoded server-sent event line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// Body of a `data: ` line, prefix stripped
    Data(String),
    /// The `[DONE]` sentinel
    Done,
}

/// Incremental SSE decoder
///
/// Feed it chunks as they arrive; it yields every complete `data:` payload in
/// order. Once the sentinel is seen it yields nothing else.
pub struct FrameDecoder {
    buffer: CircularLineBuffer,
    done: bool,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self {
            buffer: CircularLineBuffer::with_capacity(4096),
            done: false,
        }
    }

    /// Append a chunk and return the frames it completed
    pub fn push(&mut self, bytes: &[u8]) -> Vec<Frame> {
        if self.done {
            return Vec::new();
        }

        self.buffer.extend(bytes);

        let mut frames = Vec::new();
        while let Some(line_result) = self.buffer.next_line() {
            if let Some(frame) = self.decode_line(line_result) {
                frames.push(frame);
                if self.done {
                    break;
                }
            }
        }
        frames
    }

    /// Flush a trailing line the transport ended without terminating
    pub fn finish(&mut self) -> Vec<Frame> {
        if self.done {
            return Vec::new();
        }

        let frames = match self.buffer.take_remaining() {
            Some(line_result) => self.decode_line(line_result).into_iter().collect(),
            None => Vec::new(),
        };
        self.done = true;
        frames
    }

    /// True once the sentinel was decoded (or `finish` was called)
    pub fn is_done(&self) -> bool {
        self.done
    }

    fn decode_line(&mut self, line_result: Result<String>) -> Option<Frame> {
        let line = match line_result {
            Ok(line) => line,
            Err(e) => {
                tracing::debug!(error = %e, "dropping undecodable SSE line");
                return None;
            }
        };

        if line.is_empty() {
            return None;
        }

        // Comments, keep-alives and other SSE fields are ignored
        let data = line.strip_prefix(DATA_PREFIX)?;

        if data == DONE_MARKER {
            self.done = true;
            self.buffer.clear();
            return Some(Frame::Done);
        }

        Some(Frame::Data(data.to_string()))
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Decode a byte stream into SSE frames
///
/// Reading stops at the sentinel; the rest of the transport is dropped. A
/// transport error is yielded once and ends the stream.
pub fn decode_stream<S, B>(bytes: S) -> FrameStream
where
    S: Stream<Item = Result<B>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut byte_chunks = Box::pin(bytes);
        let mut decoder = FrameDecoder::new();

        while let Some(chunk_result) = byte_chunks.next().await {
            match chunk_result {
                Ok(chunk) => {
                    for frame in decoder.push(chunk.as_ref()) {
                        yield Ok(frame);
                    }
                    if decoder.is_done() {
                        break;
                    }
                }
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }

        for frame in decoder.finish() {
            yield Ok(frame);
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const WIRE: &str = concat!(
        ": keep-alive\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"He\"}}]}\n\n",
        "event: ping\n",
        "data: {\"choices\":[{\"delta\":{\"content\":\"llo\"}}]}\r\n\r\n",
        "data: [DONE]\n\n",
    );

    fn decode_all(chunks: &[&[u8]]) -> Vec<Frame> {
        let mut decoder = FrameDecoder::new();
        let mut frames = Vec::new();
        for chunk in chunks {
            frames.extend(decoder.push(chunk));
        }
        frames.extend(decoder.finish());
        frames
    }

    #[test]
    fn test_decodes_data_lines_and_sentinel() {
        let frames = decode_all(&[WIRE.as_bytes()]);

        assert_eq!(
            frames,
            vec![
                Frame::Data(r#"{"choices":[{"delta":{"content":"He"}}]}"#.to_string()),
                Frame::Data(r#"{"choices":[{"delta":{"content":"llo"}}]}"#.to_string()),
                Frame::Done,
            ]
        );
    }

    #[test]
    fn test_every_split_point_yields_same_frames() {
        let bytes = WIRE.as_bytes();
        let expected = decode_all(&[bytes]);

        for split in 0..=bytes.len() {
            let (head, tail) = bytes.split_at(split);
            assert_eq!(decode_all(&[head, tail]), expected, "split at {}", split);
        }

        let single_bytes: Vec<&[u8]> = bytes.chunks(1).collect();
        assert_eq!(decode_all(&single_bytes), expected);
    }

    #[test]
    fn test_nothing_after_sentinel() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.push(b"data: a\ndata: [DONE]\ndata: b\n");

        assert_eq!(frames, vec![Frame::Data("a".to_string()), Frame::Done]);
        assert!(decoder.is_done());
        assert!(decoder.push(b"data: c\n").is_empty());
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn test_missing_prefix_space_is_ignored() {
        let mut decoder = FrameDecoder::new();
        let frames = decoder.push(b"data:no-space\nretry: 10\ndata: yes\n");

        assert_eq!(frames, vec![Frame::Data("yes".to_string())]);
    }

    #[test]
    fn test_unterminated_last_line_flushed_on_finish() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(b"data: tail").is_empty());

        assert_eq!(decoder.finish(), vec![Frame::Data("tail".to_string())]);
        assert!(decoder.is_done());
    }

    #[tokio::test]
    async fn test_decode_stream_stops_at_sentinel() {
        let chunks: Vec<Result<Vec<u8>>> = vec![
            Ok(b"data: one\n".to_vec()),
            Ok(b"data: [DONE]\n".to_vec()),
            Ok(b"data: never\n".to_vec()),
        ];

        let frames: Vec<Frame> = decode_stream(futures::stream::iter(chunks))
            .map(|frame| frame.unwrap())
            .collect()
            .await;

        assert_eq!(frames, vec![Frame::Data("one".to_string()), Frame::Done]);
    }
}
