//! Incremental byte-to-event decoding.

use tracing::debug;

use super::codec::decode_line;
use super::sequencer::EventSequencer;
use super::Framing;
use crate::error::ToolStreamError;
use crate::types::StreamEvent;

/// Turns raw response chunks into validated [`StreamEvent`]s.
///
/// Chunks may split a line, or a multi-byte character, anywhere. Bytes are
/// held until a full line is available so a frame is decoded only once it
/// is complete.
#[derive(Debug)]
pub struct EventDecoder {
    framing: Framing,
    buffer: Vec<u8>,
    sequencer: EventSequencer,
}

impl EventDecoder {
    pub fn new(framing: Framing) -> Self {
        Self {
            framing,
            buffer: Vec::new(),
            sequencer: EventSequencer::new().with_implicit_start(framing.allows_implicit_start()),
        }
    }

    pub fn framing(&self) -> Framing {
        self.framing
    }

    /// Whether a terminal event has been decoded.
    pub fn is_finished(&self) -> bool {
        self.sequencer.is_finished()
    }

    /// Feed one chunk, appending every event it completes to `out`.
    ///
    /// On failure `out` still holds the events decoded from lines before the
    /// offending one.
    pub fn push(&mut self, chunk: &[u8], out: &mut Vec<StreamEvent>) -> Result<(), ToolStreamError> {
        self.buffer.extend_from_slice(chunk);
        while let Some(pos) = self.buffer.iter().position(|byte| *byte == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            self.decode(&line[..pos], out)?;
        }
        Ok(())
    }

    /// Flush a trailing unterminated line at end of input.
    ///
    /// Fails if the body ended before `done` or `error`.
    pub fn finish(&mut self, out: &mut Vec<StreamEvent>) -> Result<(), ToolStreamError> {
        if !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            self.decode(&line, out)?;
        }
        if !self.sequencer.is_finished() {
            return Err(ToolStreamError::Transport(
                "response body ended before a done or error event".into(),
            ));
        }
        Ok(())
    }

    fn decode(&mut self, line: &[u8], out: &mut Vec<StreamEvent>) -> Result<(), ToolStreamError> {
        let line = std::str::from_utf8(line)
            .map_err(|err| ToolStreamError::protocol(format!("response line is not UTF-8: {err}")))?;
        if let Some(event) = decode_line(self.framing, line)? {
            debug!(kind = event.kind(), "decoded stream event");
            out.extend(self.sequencer.observe(event)?);
        }
        Ok(())
    }
}
