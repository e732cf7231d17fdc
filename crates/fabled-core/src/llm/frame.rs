//! Line-oriented `data:` frame parser for streamed completions.
//!
//! Transport chunks arrive with no alignment to lines, so the parser keeps a
//! byte buffer across pushes and only decodes lines once their terminating
//! `\n` has arrived. Decoding per line (not per chunk) also keeps multi-byte
//! UTF-8 sequences split across chunks intact.
//!
//! Recognized lines:
//! - `data: {json}` yields [`StreamFrame::Event`] from the first choice
//! - `data: [DONE]` yields [`StreamFrame::Done`] and ends the sequence
//!
//! Blank lines and `:` comments are ignored. Anything else, including JSON
//! that does not decode, is logged and skipped. A line longer than
//! [`MAX_LINE_BYTES`] is dropped up to its terminating `\n`.

use std::pin::Pin;

use futures_util::{Stream, StreamExt};
use tracing::{debug, warn};

use fabled_types::error::UpstreamError;
use fabled_types::llm::{ChatCompletionChunk, StreamFrame, UpstreamEvent};

use super::upstream::UpstreamByteStream;

const DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";

/// Longest line the parser buffers before giving up on it.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

/// Decoded frames of one upstream response.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<StreamFrame, UpstreamError>> + Send + 'static>>;

/// Incremental frame parser with a cross-chunk line buffer.
#[derive(Debug, Default)]
pub struct FrameParser {
    buffer: Vec<u8>,
    done: bool,
    /// Skipping the rest of an oversized line.
    discarding: bool,
}

impl FrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a transport chunk. Ignored once `[DONE]` has been seen.
    pub fn push(&mut self, chunk: &[u8]) {
        if self.done {
            return;
        }

        let mut chunk = chunk;
        if self.discarding {
            let Some(newline) = chunk.iter().position(|&b| b == b'\n') else {
                return;
            };
            self.discarding = false;
            chunk = &chunk[newline + 1..];
        }
        self.buffer.extend_from_slice(chunk);

        let line_start = self
            .buffer
            .iter()
            .rposition(|&b| b == b'\n')
            .map_or(0, |i| i + 1);
        let pending = self.buffer.len() - line_start;
        if pending > MAX_LINE_BYTES {
            warn!(bytes = pending, "Dropping oversized frame line");
            self.buffer.truncate(line_start);
            self.discarding = true;
        }
    }

    /// Decode the next complete frame, or `None` if the buffer holds no
    /// complete line that decodes to one.
    pub fn next_frame(&mut self) -> Option<StreamFrame> {
        while !self.done {
            let newline = self.buffer.iter().position(|&b| b == b'\n')?;
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            if let Some(frame) = self.accept(decode_line(&line[..newline])) {
                return Some(frame);
            }
        }
        None
    }

    /// Flush at end of input: decode a final line that lacks its `\n`.
    pub fn finish(&mut self) -> Option<StreamFrame> {
        if self.done || self.buffer.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.buffer);
        self.accept(decode_line(&line))
    }

    /// True once `[DONE]` has been decoded.
    pub fn is_done(&self) -> bool {
        self.done
    }

    fn accept(&mut self, frame: Option<StreamFrame>) -> Option<StreamFrame> {
        if frame == Some(StreamFrame::Done) {
            self.done = true;
            self.buffer.clear();
        }
        frame
    }
}

fn decode_line(raw: &[u8]) -> Option<StreamFrame> {
    let raw = raw.strip_suffix(b"\r").unwrap_or(raw);
    let line = match std::str::from_utf8(raw) {
        Ok(line) => line.trim(),
        Err(e) => {
            warn!(error = %e, "Skipping frame line with invalid UTF-8");
            return None;
        }
    };

    if line.is_empty() || line.starts_with(':') {
        return None;
    }

    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        debug!(line, "Skipping non-data line");
        return None;
    };
    let payload = payload.trim();

    if payload == DONE_SENTINEL {
        return Some(StreamFrame::Done);
    }

    match serde_json::from_str::<ChatCompletionChunk>(payload) {
        Ok(chunk) => match UpstreamEvent::from_chunk(chunk) {
            Some(event) => Some(StreamFrame::Event(event)),
            None => {
                debug!("Skipping chunk without choices");
                None
            }
        },
        Err(e) => {
            warn!(error = %e, payload, "Skipping undecodable frame");
            None
        }
    }
}

/// Adapt a raw upstream body into a lazy stream of frames.
///
/// The returned stream ends after [`StreamFrame::Done`] or at end of input,
/// whichever comes first. Transport errors from the body pass through and
/// end the stream.
pub fn parse_frames(bytes: UpstreamByteStream) -> FrameStream {
    Box::pin(async_stream::try_stream! {
        let mut bytes = bytes;
        let mut parser = FrameParser::new();

        while !parser.is_done() {
            match bytes.next().await {
                Some(chunk) => {
                    let chunk = chunk?;
                    parser.push(&chunk);
                    while let Some(frame) = parser.next_frame() {
                        yield frame;
                    }
                }
                None => {
                    if let Some(frame) = parser.finish() {
                        yield frame;
                    }
                    break;
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use futures_util::stream;

    fn content_of(frame: &StreamFrame) -> Option<&str> {
        match frame {
            StreamFrame::Event(event) => event.content.as_deref(),
            StreamFrame::Done => None,
        }
    }

    fn byte_stream(chunks: Vec<&'static str>) -> UpstreamByteStream {
        Box::pin(stream::iter(
            chunks.into_iter().map(|c| Ok(Bytes::from_static(c.as_bytes()))),
        ))
    }

    #[test]
    fn test_single_complete_line() {
        let mut parser = FrameParser::new();
        parser.push(b"data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n");
        let frame = parser.next_frame().unwrap();
        assert_eq!(content_of(&frame), Some("Hi"));
        assert!(parser.next_frame().is_none());
    }

    #[test]
    fn test_oversized_line_is_dropped() {
        let mut parser = FrameParser::new();
        parser.push(b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n");
        parser.push(b"data: ");
        let filler = vec![b'x'; MAX_LINE_BYTES / 2];
        parser.push(&filler);
        parser.push(&filler);
        parser.push(&filler);
        assert!(parser.buffer.len() < MAX_LINE_BYTES);

        assert_eq!(content_of(&parser.next_frame().unwrap()), Some("a"));
        assert!(parser.next_frame().is_none());

        parser.push(&filler);
        parser.push(b"xx\ndata: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\n");
        assert_eq!(content_of(&parser.next_frame().unwrap()), Some("b"));
        assert!(parser.buffer.is_empty());
    }

    #[test]
    fn test_event_split_across_chunks() {
        let mut parser = FrameParser::new();
        parser.push(b"data: {\"choices\":[{\"delta\":{\"con");
        assert!(parser.next_frame().is_none());
        parser.push(b"tent\":\"Hi\"}}]}\n");
        let frame = parser.next_frame().unwrap();
        assert_eq!(content_of(&frame), Some("Hi"));
    }

    #[test]
    fn test_multiple_events_in_one_chunk() {
        let mut parser = FrameParser::new();
        parser.push(
            b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n\n\
              data: {\"choices\":[{\"delta\":{\"content\":\"b\"}}]}\n\n",
        );
        assert_eq!(content_of(&parser.next_frame().unwrap()), Some("a"));
        assert_eq!(content_of(&parser.next_frame().unwrap()), Some("b"));
        assert!(parser.next_frame().is_none());
    }

    #[test]
    fn test_crlf_line_endings() {
        let mut parser = FrameParser::new();
        parser.push(b"data: {\"choices\":[{\"delta\":{\"content\":\"x\"}}]}\r\n\r\ndata: [DONE]\r\n");
        assert_eq!(content_of(&parser.next_frame().unwrap()), Some("x"));
        assert_eq!(parser.next_frame(), Some(StreamFrame::Done));
    }

    #[test]
    fn test_multibyte_utf8_split_across_chunks() {
        let line = "data: {\"choices\":[{\"delta\":{\"content\":\"caf\u{e9}\"}}]}\n".as_bytes();
        let split = line.iter().position(|&b| b == 0xC3).unwrap() + 1;
        let mut parser = FrameParser::new();
        parser.push(&line[..split]);
        assert!(parser.next_frame().is_none());
        parser.push(&line[split..]);
        assert_eq!(content_of(&parser.next_frame().unwrap()), Some("caf\u{e9}"));
    }

    #[test]
    fn test_garbage_and_bad_json_are_skipped() {
        let mut parser = FrameParser::new();
        parser.push(b": keep-alive\nevent: ping\ndata: {not json\ndata: 42\n");
        parser.push(b"data: {\"choices\":[{\"delta\":{\"content\":\"ok\"}}]}\n");
        assert_eq!(content_of(&parser.next_frame().unwrap()), Some("ok"));
        assert!(parser.next_frame().is_none());
    }

    #[test]
    fn test_chunk_without_choices_is_skipped() {
        let mut parser = FrameParser::new();
        parser.push(b"data: {\"choices\":[],\"usage\":{\"prompt_tokens\":3}}\ndata: [DONE]\n");
        assert_eq!(parser.next_frame(), Some(StreamFrame::Done));
    }

    #[test]
    fn test_done_ends_parsing() {
        let mut parser = FrameParser::new();
        parser.push(b"data: [DONE]\ndata: {\"choices\":[{\"delta\":{\"content\":\"late\"}}]}\n");
        assert_eq!(parser.next_frame(), Some(StreamFrame::Done));
        assert!(parser.is_done());
        assert!(parser.next_frame().is_none());
        parser.push(b"data: {\"choices\":[{\"delta\":{\"content\":\"later\"}}]}\n");
        assert!(parser.next_frame().is_none());
        assert!(parser.finish().is_none());
    }

    #[test]
    fn test_finish_decodes_unterminated_line() {
        let mut parser = FrameParser::new();
        parser.push(b"data: {\"choices\":[{\"delta\":{\"content\":\"tail\"}}]}");
        assert!(parser.next_frame().is_none());
        assert_eq!(content_of(&parser.finish().unwrap()), Some("tail"));
        assert!(parser.finish().is_none());
    }

    #[tokio::test]
    async fn test_parse_frames_stream() {
        let frames: Vec<StreamFrame> = parse_frames(byte_stream(vec![
            "data: {\"choices\":[{\"delta\":{\"role\":\"assistant\",\"content\":\"Hi\"}}]}\n\nda",
            "ta: {\"choices\":[{\"delta\":{\"content\":\" there\"}}]}\n\n",
            "data: [DONE]\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\"ignored\"}}]}\n",
        ]))
        .map(|r| r.unwrap())
        .collect()
        .await;

        assert_eq!(frames.len(), 3);
        assert_eq!(content_of(&frames[0]), Some("Hi"));
        assert_eq!(content_of(&frames[1]), Some(" there"));
        assert_eq!(frames[2], StreamFrame::Done);
    }

    #[tokio::test]
    async fn test_parse_frames_passes_transport_error() {
        let bytes: UpstreamByteStream = Box::pin(stream::iter(vec![
            Ok(Bytes::from_static(b"data: {\"choices\":[{\"delta\":{\"content\":\"a\"}}]}\n")),
            Err(UpstreamError::Transport("connection reset".to_string())),
        ]));
        let mut frames = parse_frames(bytes);
        assert_eq!(content_of(&frames.next().await.unwrap().unwrap()), Some("a"));
        assert!(matches!(
            frames.next().await,
            Some(Err(UpstreamError::Transport(_)))
        ));
        assert!(frames.next().await.is_none());
    }
}
