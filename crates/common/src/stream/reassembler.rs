//! Reassembles streamed chat-completion content from `data:` lines

use bytes::Bytes;
use futures::{Stream, StreamExt};
use serde::Deserialize;

use super::decoder::Utf8Decoder;
use crate::errors::Result;

/// Payload marking the end of the stream.
pub const DONE_SENTINEL: &str = "[DONE]";

const DATA_PREFIX: &str = "data:";

/// A logical unit parsed from the event stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// Text from `choices[0].delta.content`
    ContentDelta(String),
    /// The `[DONE]` sentinel
    Done,
    /// A `data:` line whose payload is not valid JSON
    Unparseable(String),
}

#[derive(Deserialize)]
struct ChunkPayload {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
}

#[derive(Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<ChunkDelta>,
}

#[derive(Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

/// Classify one complete line.
///
/// Returns `None` for lines that carry no event: comments, `event:` fields,
/// blank keep-alives and JSON chunks without a content delta.
pub fn classify_line(line: &str) -> Option<StreamEvent> {
    let payload = line.strip_prefix(DATA_PREFIX)?.trim();

    if payload == DONE_SENTINEL {
        return Some(StreamEvent::Done);
    }
    if payload.is_empty() {
        return None;
    }

    match serde_json::from_str::<ChunkPayload>(payload) {
        Ok(chunk) => chunk
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.delta)
            .and_then(|delta| delta.content)
            .filter(|content| !content.is_empty())
            .map(StreamEvent::ContentDelta),
        Err(_) => Some(StreamEvent::Unparseable(line.to_string())),
    }
}

/// Splits decoded text on `\n`, keeping the trailing partial line for the
/// next push.
#[derive(Debug, Default)]
pub struct LineBuffer {
    buf: String,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append text and return every line it completed, without terminators.
    pub fn push(&mut self, text: &str) -> Vec<String> {
        self.buf.push_str(text);

        let mut lines = Vec::new();
        while let Some(pos) = self.buf.find('\n') {
            let mut line: String = self.buf.drain(..=pos).collect();
            line.pop();
            if line.ends_with('\r') {
                line.pop();
            }
            lines.push(line);
        }
        lines
    }

    /// Take the unterminated remainder, if any.
    pub fn take_remainder(&mut self) -> Option<String> {
        if self.buf.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.buf))
        }
    }
}

/// Counters collected while reassembling one response.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReassemblyStats {
    pub chunks: usize,
    pub bytes: usize,
    pub deltas: usize,
    pub unparseable: usize,
}

/// Final output of a reassembly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reassembled {
    /// Concatenated content deltas, in arrival order
    pub text: String,
    /// Whether the stream ended with `[DONE]` rather than by closing
    pub saw_done: bool,
    pub stats: ReassemblyStats,
}

/// Per-request reassembly state.
///
/// Feed chunks in arrival order. After `[DONE]` every further chunk is
/// ignored and the accumulated text is frozen.
#[derive(Debug, Default)]
pub struct Reassembler {
    decoder: Utf8Decoder,
    lines: LineBuffer,
    text: String,
    done: bool,
    stats: ReassemblyStats,
}

impl Reassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Process one chunk and return the events it completed.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        if self.done {
            return Vec::new();
        }

        self.stats.chunks += 1;
        self.stats.bytes += chunk.len();

        let decoded = self.decoder.decode(chunk);
        let lines = self.lines.push(&decoded);
        self.process_lines(lines)
    }

    fn process_lines(&mut self, lines: Vec<String>) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        for line in lines {
            let Some(event) = classify_line(&line) else {
                continue;
            };
            match &event {
                StreamEvent::ContentDelta(content) => {
                    self.stats.deltas += 1;
                    self.text.push_str(content);
                }
                StreamEvent::Unparseable(raw) => {
                    self.stats.unparseable += 1;
                    tracing::debug!(line = %raw, "Skipping unparseable stream line");
                }
                StreamEvent::Done => self.done = true,
            }
            events.push(event);
            if self.done {
                break;
            }
        }
        events
    }

    /// Whether the `[DONE]` sentinel has been seen.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Text accumulated so far.
    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn stats(&self) -> ReassemblyStats {
        self.stats
    }

    /// End reassembly. If the peer closed without `[DONE]`, an unterminated
    /// final line is still classified.
    pub fn finish(mut self) -> Reassembled {
        if !self.done {
            let tail = self.decoder.finish();
            let mut lines = self.lines.push(&tail);
            lines.extend(self.lines.take_remainder());
            self.process_lines(lines);
        }

        Reassembled {
            text: self.text,
            saw_done: self.done,
            stats: self.stats,
        }
    }
}

/// Drive a [`Reassembler`] over a response body until `[DONE]` or end of
/// stream.
///
/// The body is dropped as soon as `[DONE]` is seen, which releases the
/// upstream connection without reading the rest. A transport error
/// mid-stream aborts with that error.
pub async fn reassemble<S>(mut body: S) -> Result<Reassembled>
where
    S: Stream<Item = Result<Bytes>> + Unpin,
{
    let mut reassembler = Reassembler::new();

    while let Some(chunk) = body.next().await {
        let chunk = chunk?;
        reassembler.feed(&chunk);
        if reassembler.is_done() {
            break;
        }
    }
    drop(body);

    let reassembled = reassembler.finish();
    if !reassembled.saw_done {
        tracing::debug!(
            chars = reassembled.text.len(),
            "Upstream closed the stream without a [DONE] sentinel"
        );
    }
    Ok(reassembled)
}
