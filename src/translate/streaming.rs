//! State machine turning raw upstream text chunks into OpenAI stream chunks.
//!
//! The upstream streams plain text, not SSE. [`ChunkRelay`] decodes each byte
//! chunk incrementally and produces the `data:` payloads of an OpenAI
//! `chat.completion.chunk` stream. Driving it from an actual byte stream is
//! [`crate::relay`]'s job; everything here is synchronous.

use super::openai_types::{ChatCompletionChunk, ChunkChoice, ChunkDelta};
use super::response::{completion_id, unix_now};

/// Sentinel payload that ends a successful stream.
pub const DONE: &str = "[DONE]";

/// Incremental UTF-8 decoder.
///
/// A multi-byte sequence split across chunks is held back until its
/// remaining bytes arrive. Invalid bytes decode to U+FFFD.
#[derive(Debug, Default)]
pub struct Utf8Decoder {
    pending: Vec<u8>,
}

impl Utf8Decoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn decode(&mut self, chunk: &[u8]) -> String {
        self.pending.extend_from_slice(chunk);
        let mut out = String::with_capacity(self.pending.len());
        let mut start = 0;

        loop {
            match std::str::from_utf8(&self.pending[start..]) {
                Ok(valid) => {
                    out.push_str(valid);
                    start = self.pending.len();
                    break;
                }
                Err(e) => {
                    let valid_end = start + e.valid_up_to();
                    out.push_str(&String::from_utf8_lossy(&self.pending[start..valid_end]));
                    match e.error_len() {
                        Some(bad) => {
                            out.push(char::REPLACEMENT_CHARACTER);
                            start = valid_end + bad;
                        }
                        // Incomplete trailing sequence: keep it for the next chunk.
                        None => {
                            start = valid_end;
                            break;
                        }
                    }
                }
            }
        }

        self.pending.drain(..start);
        out
    }

    /// Flush at end of input; a dangling partial sequence becomes U+FFFD.
    pub fn finish(&mut self) -> String {
        let rest = String::from_utf8_lossy(&self.pending).into_owned();
        self.pending.clear();
        rest
    }

    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayState {
    /// Nothing received yet.
    Open,
    Receiving,
    /// Upstream ended; terminal chunk being emitted.
    Closing,
    Done,
    /// Read failure, idle timeout or cancellation. No terminal chunk follows.
    Errored,
}

/// Per-stream relay state. One id is generated up front and reused for every
/// chunk, including the terminal one.
#[derive(Debug)]
pub struct ChunkRelay {
    id: String,
    created: i64,
    model: String,
    state: RelayState,
    role_sent: bool,
    decoder: Utf8Decoder,
}

impl ChunkRelay {
    pub fn new(model: &str) -> Self {
        Self {
            id: completion_id(),
            created: unix_now(),
            model: model.to_string(),
            state: RelayState::Open,
            role_sent: false,
            decoder: Utf8Decoder::new(),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn state(&self) -> RelayState {
        self.state
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self.state, RelayState::Done | RelayState::Errored)
    }

    /// Feed one upstream byte chunk, returning its `data:` payload if it
    /// decoded to any text.
    pub fn push(&mut self, bytes: &[u8]) -> Option<String> {
        if !matches!(self.state, RelayState::Open | RelayState::Receiving) {
            return None;
        }
        self.state = RelayState::Receiving;

        let text = self.decoder.decode(bytes);
        if text.is_empty() {
            return None;
        }
        Some(self.delta_payload(text))
    }

    /// Upstream ended cleanly: flush the decoder, then the terminal chunk and
    /// the `[DONE]` sentinel.
    pub fn finish(&mut self) -> Vec<String> {
        if !matches!(self.state, RelayState::Open | RelayState::Receiving) {
            return Vec::new();
        }
        self.state = RelayState::Closing;

        let mut payloads = Vec::with_capacity(3);
        let tail = self.decoder.finish();
        if !tail.is_empty() {
            payloads.push(self.delta_payload(tail));
        }
        payloads.push(self.chunk_json(ChunkDelta::default(), Some("stop")));
        payloads.push(DONE.to_string());

        self.state = RelayState::Done;
        payloads
    }

    /// Abandon the stream. Nothing more is emitted.
    pub fn fail(&mut self) {
        if self.state != RelayState::Done {
            self.state = RelayState::Errored;
        }
    }

    /// The first content delta also carries the assistant role.
    fn delta_payload(&mut self, text: String) -> String {
        let delta = ChunkDelta {
            role: (!self.role_sent).then(|| "assistant".to_string()),
            content: Some(text),
        };
        self.role_sent = true;
        self.chunk_json(delta, None)
    }

    fn chunk_json(&self, delta: ChunkDelta, finish_reason: Option<&str>) -> String {
        let chunk = ChatCompletionChunk {
            id: self.id.clone(),
            object: "chat.completion.chunk".to_string(),
            created: self.created,
            model: self.model.clone(),
            choices: vec![ChunkChoice {
                index: 0,
                delta,
                finish_reason: finish_reason.map(String::from),
            }],
        };
        serde_json::to_string(&chunk).unwrap_or_default()
    }
}
