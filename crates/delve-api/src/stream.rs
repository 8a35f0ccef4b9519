//! Streaming event types and the frame consumer
//!
//! The chat endpoint answers a streaming request with newline-delimited
//! frames of the form `data: <json>`, terminated by `data: [DONE]`. Reads
//! from the socket do not line up with frame boundaries, so bytes are
//! buffered in a [`FrameDecoder`] until a full line is available. Decoded
//! events are folded into a [`StreamAccumulator`], which produces the
//! [`StreamUpdate`]s handed to the caller.

use crate::error::Error;
use crate::types::{ChatReply, Message};
use async_stream::stream;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::pin::Pin;
use tokio_stream::Stream;

/// Prefix of every relevant frame
pub const DATA_MARKER: &str = "data:";

/// Literal payload marking the end of the stream
pub const DONE_SENTINEL: &str = "[DONE]";

/// Events carried in the JSON payload of a data frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    /// Server accepted the request; carries the session the exchange belongs to
    Start { session_id: String },
    /// Text delta
    Content { content: String },
    /// Final conversation state; does not end the stream by itself
    Complete {
        #[serde(default)]
        session_id: Option<String>,
        #[serde(default)]
        messages: Option<Vec<Message>>,
    },
    /// Application error; ends the stream
    Error { error: String },
}

/// One decoded line of the wire format
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    Event(StreamEvent),
    Done,
}

/// Updates delivered to the consumer of a chat stream
#[derive(Debug)]
pub enum StreamUpdate {
    /// The server assigned a session id
    SessionStarted { session_id: String },
    /// Full accumulated text so far (not just the delta)
    Content { text: String },
    /// Stream completed successfully
    Done(ChatReply),
    /// Stream failed; no further updates follow
    Failed(Error),
}

impl StreamUpdate {
    /// Check if this is a terminal update (Done or Failed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamUpdate::Done(_) | StreamUpdate::Failed(_))
    }
}

/// A stream of chat updates
pub type ChatEventStream = Pin<Box<dyn Stream<Item = StreamUpdate> + Send>>;

/// Parse a single line of the wire format.
///
/// Returns `None` for lines that carry no frame: blank lines, lines without
/// the data marker and payloads that are not valid event JSON.
pub fn parse_line(line: &str) -> Option<Frame> {
    let line = line.strip_suffix('\r').unwrap_or(line);
    let payload = line.strip_prefix(DATA_MARKER)?;
    let payload = payload.strip_prefix(' ').unwrap_or(payload);

    if payload == DONE_SENTINEL {
        return Some(Frame::Done);
    }

    match serde_json::from_str::<StreamEvent>(payload) {
        Ok(event) => Some(Frame::Event(event)),
        Err(e) => {
            tracing::warn!("Skipping malformed stream frame: {} ({})", payload, e);
            None
        }
    }
}

/// Incremental line splitter for the chat stream.
///
/// Bytes are kept until a newline arrives, so a frame split across reads (or
/// a multi-byte character split across reads) decodes the same as one
/// delivered whole.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
}

impl FrameDecoder {
    /// Create an empty decoder
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk of bytes and return every frame completed by it
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        let mut frames = Vec::new();
        let mut scanned = self.buffer.len();
        self.buffer.extend_from_slice(chunk);

        while let Some(offset) = self.buffer[scanned..].iter().position(|b| *b == b'\n') {
            let end = scanned + offset;
            let line: Vec<u8> = self.buffer.drain(..=end).collect();
            let text = String::from_utf8_lossy(&line[..line.len() - 1]);
            if let Some(frame) = parse_line(&text) {
                frames.push(frame);
            }
            scanned = 0;
        }

        frames
    }

    /// Flush a trailing line that was never newline-terminated
    pub fn finish(&mut self) -> Option<Frame> {
        if self.buffer.is_empty() {
            return None;
        }
        let rest = std::mem::take(&mut self.buffer);
        parse_line(&String::from_utf8_lossy(&rest))
    }

    /// Whether bytes of an incomplete line are buffered
    pub fn has_pending(&self) -> bool {
        !self.buffer.is_empty()
    }
}

/// Transient state of one in-flight streaming request
#[derive(Debug, Default)]
pub struct StreamAccumulator {
    text: String,
    session_id: Option<String>,
    messages: Option<Vec<Message>>,
}

impl StreamAccumulator {
    /// Create an empty accumulator
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold an event into the accumulated state.
    ///
    /// Returns the update to forward to the caller, if any. An `error` event
    /// produces a terminal [`StreamUpdate::Failed`].
    pub fn apply(&mut self, event: StreamEvent) -> Option<StreamUpdate> {
        match event {
            StreamEvent::Start { session_id } => {
                self.session_id = Some(session_id.clone());
                Some(StreamUpdate::SessionStarted { session_id })
            }
            StreamEvent::Content { content } => {
                self.text.push_str(&content);
                Some(StreamUpdate::Content {
                    text: self.text.clone(),
                })
            }
            StreamEvent::Complete {
                session_id,
                messages,
            } => {
                if session_id.is_some() {
                    self.session_id = session_id;
                }
                if messages.is_some() {
                    self.messages = messages;
                }
                None
            }
            StreamEvent::Error { error } => Some(StreamUpdate::Failed(Error::api(error))),
        }
    }

    /// Text accumulated so far
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Latest observed session id
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Build the final reply
    pub fn into_reply(self) -> ChatReply {
        ChatReply {
            text: self.text,
            session_id: self.session_id,
            messages: self.messages,
        }
    }
}

/// Handle one frame; returns the update to emit and whether the stream ends.
fn step(frame: Frame, acc: &mut StreamAccumulator) -> (Option<StreamUpdate>, bool) {
    match frame {
        Frame::Done => {
            tracing::debug!("Stream finished with sentinel");
            let reply = std::mem::take(acc).into_reply();
            (Some(StreamUpdate::Done(reply)), true)
        }
        Frame::Event(event) => {
            tracing::debug!(?event, "Stream event");
            let update = acc.apply(event);
            let terminal = update.as_ref().is_some_and(StreamUpdate::is_terminal);
            (update, terminal)
        }
    }
}

/// Turn a raw byte stream into a stream of chat updates.
///
/// The returned stream always ends with exactly one terminal update. If the
/// byte stream ends without the `[DONE]` sentinel, any unterminated last line
/// is processed and the stream completes with what was accumulated.
pub fn consume<S, B, E>(bytes: S) -> ChatEventStream
where
    S: Stream<Item = std::result::Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    Box::pin(stream! {
        let mut bytes = Box::pin(bytes);
        let mut decoder = FrameDecoder::new();
        let mut acc = StreamAccumulator::new();

        while let Some(chunk) = bytes.next().await {
            let chunk = match chunk {
                Ok(chunk) => chunk,
                Err(e) => {
                    yield StreamUpdate::Failed(Error::Stream(e.to_string()));
                    return;
                }
            };

            for frame in decoder.push(chunk.as_ref()) {
                let (update, stop) = step(frame, &mut acc);
                if let Some(update) = update {
                    yield update;
                }
                if stop {
                    return;
                }
            }
        }

        if let Some(frame) = decoder.finish() {
            let (update, stop) = step(frame, &mut acc);
            if let Some(update) = update {
                yield update;
            }
            if stop {
                return;
            }
        }

        tracing::debug!("Stream ended without sentinel, completing with accumulated text");
        yield StreamUpdate::Done(acc.into_reply());
    })
}

/// Drive a chat stream to its terminal update, discarding progress updates
pub async fn collect_reply(mut stream: ChatEventStream) -> crate::Result<ChatReply> {
    while let Some(update) = stream.next().await {
        match update {
            StreamUpdate::Done(reply) => return Ok(reply),
            StreamUpdate::Failed(e) => return Err(e),
            _ => {}
        }
    }
    Err(Error::Stream("stream ended without a result".to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Role;

    const EXAMPLE: &str = concat!(
        "data: {\"type\":\"start\",\"session_id\":\"s1\"}\n",
        "data: {\"type\":\"content\",\"content\":\"Hel\"}\n",
        "data: {\"type\":\"content\",\"content\":\"lo\"}\n",
        "data: {\"type\":\"complete\",\"session_id\":\"s1\",\"messages\":[",
        "{\"role\":\"user\",\"content\":\"hi\"},{\"role\":\"assistant\",\"content\":\"Hello\"}]}\n",
        "data: [DONE]\n",
    );

    fn chunked(chunks: Vec<Vec<u8>>) -> ChatEventStream {
        consume(futures::stream::iter(
            chunks.into_iter().map(Ok::<_, std::io::Error>),
        ))
    }

    async fn run(chunks: Vec<Vec<u8>>) -> Vec<StreamUpdate> {
        chunked(chunks).collect().await
    }

    fn describe(updates: &[StreamUpdate]) -> Vec<String> {
        updates.iter().map(|u| format!("{:?}", u)).collect()
    }

    #[tokio::test]
    async fn test_example_stream_single_read() {
        let updates = run(vec![EXAMPLE.as_bytes().to_vec()]).await;
        assert_eq!(updates.len(), 4);
        assert!(matches!(
            &updates[0],
            StreamUpdate::SessionStarted { session_id } if session_id == "s1"
        ));
        assert!(matches!(&updates[1], StreamUpdate::Content { text } if text == "Hel"));
        assert!(matches!(&updates[2], StreamUpdate::Content { text } if text == "Hello"));
        match &updates[3] {
            StreamUpdate::Done(reply) => {
                assert_eq!(reply.text, "Hello");
                assert_eq!(reply.session_id.as_deref(), Some("s1"));
                let messages = reply.messages.as_ref().unwrap();
                assert_eq!(messages.len(), 2);
                assert_eq!(messages[1].role, Role::Assistant);
            }
            other => panic!("expected Done, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_split_at_every_offset_matches_single_read() {
        let whole = describe(&run(vec![EXAMPLE.as_bytes().to_vec()]).await);
        let bytes = EXAMPLE.as_bytes();
        for split in 1..bytes.len() {
            let parts = vec![bytes[..split].to_vec(), bytes[split..].to_vec()];
            let updates = describe(&run(parts).await);
            assert_eq!(updates, whole, "split at byte {}", split);
        }
    }

    #[tokio::test]
    async fn test_byte_by_byte_delivery() {
        let parts = EXAMPLE.bytes().map(|b| vec![b]).collect();
        let updates = describe(&run(parts).await);
        assert_eq!(updates, describe(&run(vec![EXAMPLE.as_bytes().to_vec()]).await));
    }

    #[tokio::test]
    async fn test_multibyte_character_split_across_reads() {
        let frame = "data: {\"type\":\"content\",\"content\":\"caf\u{e9} \u{1f600}\"}\ndata: [DONE]\n";
        let bytes = frame.as_bytes();
        let cut = frame.find('\u{e9}').unwrap() + 1;
        let reply = collect_reply(chunked(vec![bytes[..cut].to_vec(), bytes[cut..].to_vec()]))
            .await
            .unwrap();
        assert_eq!(reply.text, "caf\u{e9} \u{1f600}");
    }

    #[tokio::test]
    async fn test_error_frame_halts_stream() {
        let input = concat!(
            "data: {\"type\":\"start\",\"session_id\":\"s1\"}\n",
            "data: {\"type\":\"content\",\"content\":\"partial\"}\n",
            "data: {\"type\":\"error\",\"error\":\"Upstream model failed\"}\n",
            "data: {\"type\":\"content\",\"content\":\"ignored\"}\n",
            "data: [DONE]\n",
        );
        let updates = run(vec![input.as_bytes().to_vec()]).await;
        assert_eq!(updates.len(), 3);
        let terminals = updates.iter().filter(|u| u.is_terminal()).count();
        assert_eq!(terminals, 1);
        match updates.last().unwrap() {
            StreamUpdate::Failed(e) => {
                assert!(e.is_application());
                assert_eq!(e.to_string(), "Upstream model failed");
            }
            other => panic!("expected Failed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_malformed_frame_is_skipped() {
        let input = concat!(
            "data: {\"type\":\"content\",\"content\":\"a\"}\n",
            "data: {not json at all\n",
            "data: {\"type\":\"mystery\",\"x\":1}\n",
            "data: {\"type\":\"content\",\"content\":\"b\"}\n",
            "data: [DONE]\n",
        );
        let reply = collect_reply(chunked(vec![input.as_bytes().to_vec()]))
            .await
            .unwrap();
        assert_eq!(reply.text, "ab");
    }

    #[tokio::test]
    async fn test_missing_sentinel_flushes_trailing_frame() {
        let input = concat!(
            "data: {\"type\":\"start\",\"session_id\":\"s9\"}\n",
            "data: {\"type\":\"content\",\"content\":\"one \"}\n",
            "data: {\"type\":\"content\",\"content\":\"two\"}",
        );
        let updates = run(vec![input.as_bytes().to_vec()]).await;
        match updates.last().unwrap() {
            StreamUpdate::Done(reply) => {
                assert_eq!(reply.text, "one two");
                assert_eq!(reply.session_id.as_deref(), Some("s9"));
                assert!(reply.messages.is_none());
            }
            other => panic!("expected Done, got {:?}", other),
        }
        assert_eq!(updates.iter().filter(|u| u.is_terminal()).count(), 1);
    }

    #[tokio::test]
    async fn test_sentinel_stops_reading_buffered_bytes() {
        let input = concat!(
            "data: {\"type\":\"content\",\"content\":\"kept\"}\n",
            "data: [DONE]\n",
            "data: {\"type\":\"content\",\"content\":\"dropped\"}\n",
        );
        let updates = run(vec![input.as_bytes().to_vec()]).await;
        assert_eq!(updates.len(), 2);
        match &updates[1] {
            StreamUpdate::Done(reply) => assert_eq!(reply.text, "kept"),
            other => panic!("expected Done, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_session_id_from_complete_when_start_absent() {
        let input = concat!(
            "data: {\"type\":\"content\",\"content\":\"x\"}\n",
            "data: {\"type\":\"complete\",\"session_id\":\"late\",\"messages\":[]}\n",
            "data: [DONE]\n",
        );
        let reply = collect_reply(chunked(vec![input.as_bytes().to_vec()]))
            .await
            .unwrap();
        assert_eq!(reply.session_id.as_deref(), Some("late"));
        assert_eq!(reply.messages, Some(vec![]));
    }

    #[tokio::test]
    async fn test_read_error_is_transport_failure() {
        let chunks: Vec<std::result::Result<Vec<u8>, std::io::Error>> = vec![
            Ok(b"data: {\"type\":\"content\",\"content\":\"a\"}\n".to_vec()),
            Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset")),
        ];
        let result = collect_reply(consume(futures::stream::iter(chunks))).await;
        let err = result.unwrap_err();
        assert!(err.is_transport());
    }

    #[test]
    fn test_parse_line_variants() {
        assert_eq!(parse_line("data: [DONE]"), Some(Frame::Done));
        assert_eq!(parse_line("data:[DONE]\r"), Some(Frame::Done));
        assert_eq!(parse_line(""), None);
        assert_eq!(parse_line(": keep-alive"), None);
        assert_eq!(parse_line("event: message"), None);
        assert_eq!(
            parse_line("data: {\"type\":\"content\",\"content\":\"hi\"}\r"),
            Some(Frame::Event(StreamEvent::Content {
                content: "hi".into()
            }))
        );
    }

    #[test]
    fn test_decoder_keeps_partial_line() {
        let mut decoder = FrameDecoder::new();
        assert!(decoder.push(b"data: {\"type\":\"content\",").is_empty());
        assert!(decoder.has_pending());
        let frames = decoder.push(b"\"content\":\"z\"}\ndata: [DO");
        assert_eq!(frames.len(), 1);
        assert_eq!(decoder.push(b"NE]\n"), vec![Frame::Done]);
        assert!(!decoder.has_pending());
        assert!(decoder.finish().is_none());
    }

    #[test]
    fn test_accumulator_reports_full_text() {
        let mut acc = StreamAccumulator::new();
        acc.apply(StreamEvent::Content {
            content: "ab".into(),
        });
        match acc.apply(StreamEvent::Content {
            content: "cd".into(),
        }) {
            Some(StreamUpdate::Content { text }) => assert_eq!(text, "abcd"),
            other => panic!("unexpected {:?}", other),
        }
        assert!(acc
            .apply(StreamEvent::Complete {
                session_id: None,
                messages: None
            })
            .is_none());
        assert_eq!(acc.text(), "abcd");
        assert!(acc.session_id().is_none());
    }
}
