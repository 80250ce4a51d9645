//! Incremental decoder for the agent answer stream
//!
//! The body is newline-delimited frames, each optionally prefixed with
//! `data: `. `[DONE]` ends the stream. Network reads do not line up with
//! frame boundaries, so partial lines are buffered until their newline
//! arrives (or until `finish`).

use serde_json::Value;
use tracing::trace;

/// A decoded frame
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A text delta from `choices[0].delta.content`
    Content(String),
    /// End-of-stream marker
    Done,
}

#[derive(Debug, Default)]
pub struct FrameDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// True once `[DONE]` was seen; later input is ignored
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed a chunk of bytes and return every complete frame it finished
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        if self.done {
            return Vec::new();
        }
        self.buffer.extend_from_slice(chunk);

        let mut frames = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(frame) = self.decode_line(&line) {
                frames.push(frame);
                if self.done {
                    self.buffer.clear();
                    break;
                }
            }
        }
        frames
    }

    /// Flush a trailing line that never got its newline
    pub fn finish(&mut self) -> Option<Frame> {
        if self.done || self.buffer.is_empty() {
            return None;
        }
        let line = std::mem::take(&mut self.buffer);
        self.decode_line(&line)
    }

    fn decode_line(&mut self, raw: &[u8]) -> Option<Frame> {
        let text = String::from_utf8_lossy(raw);
        let line = text.trim();
        if line.is_empty() {
            return None;
        }

        let payload = line.strip_prefix("data:").map(str::trim_start).unwrap_or(line);
        if payload == "[DONE]" {
            self.done = true;
            return Some(Frame::Done);
        }

        match serde_json::from_str::<Value>(payload) {
            Ok(json) => json
                .pointer("/choices/0/delta/content")
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .map(|s| Frame::Content(s.to_string())),
            Err(e) => {
                trace!("Skipping malformed frame ({}): {}", e, payload);
                None
            }
        }
    }
}

/// Collects streamed deltas into a single answer
#[derive(Debug, Default)]
pub struct AnswerAccumulator {
    decoder: FrameDecoder,
    text: String,
}

impl AnswerAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed a chunk; returns the newly appended text, if any
    pub fn push(&mut self, chunk: &[u8]) -> Option<String> {
        let mut appended = String::new();
        for frame in self.decoder.push(chunk) {
            if let Frame::Content(delta) = frame {
                appended.push_str(&delta);
            }
        }
        self.text.push_str(&appended);
        (!appended.is_empty()).then_some(appended)
    }

    pub fn is_done(&self) -> bool {
        self.decoder.is_done()
    }

    /// Untrimmed text accumulated so far
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Flush any trailing frame and return the untrimmed text
    pub fn finish(mut self) -> String {
        if let Some(Frame::Content(delta)) = self.decoder.finish() {
            self.text.push_str(&delta);
        }
        self.text
    }
}
