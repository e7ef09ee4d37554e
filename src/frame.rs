//! Line framing for chunked event streams.
//!
//! The network hands us arbitrary byte chunks. A chunk may end in the middle
//! of a line, and it may also end in the middle of a multi-byte UTF-8
//! sequence. [`FrameParser`] decodes incrementally and only yields a line once
//! its terminating `\n` has arrived; everything after the last separator
//! stays buffered for the next chunk.

use bytes::{Buf, BytesMut};

const REPLACEMENT: char = '\u{FFFD}';

/// A single complete line taken from the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Line content without the trailing `\n` (and `\r`, if any).
    pub line: String,

    /// Whether this line was pushed back once already with
    /// [`FrameParser::push_front`].
    pub retried: bool,
}

/// Stateful splitter turning byte chunks into newline-delimited lines.
#[derive(Debug, Default)]
pub struct FrameParser {
    /// Bytes of an incomplete UTF-8 sequence at the end of the last chunk.
    undecoded: BytesMut,
    /// Decoded text not yet consumed as a line.
    buffer: String,
    /// Set while the front of `buffer` is a pushed-back line.
    front_retried: bool,
}

impl FrameParser {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a raw chunk.
    pub fn feed(&mut self, chunk: &[u8]) {
        self.undecoded.extend_from_slice(chunk);
        decode_utf8_prefix(&mut self.undecoded, &mut self.buffer);
    }

    /// Take the next complete line, if the buffer holds one.
    pub fn next_frame(&mut self) -> Option<Frame> {
        let pos = self.buffer.find('\n')?;
        let mut line: String = self.buffer.drain(..=pos).collect();
        line.pop();
        if line.ends_with('\r') {
            line.pop();
        }

        let retried = std::mem::take(&mut self.front_retried);
        Some(Frame { line, retried })
    }

    /// Put a line back in front of everything still buffered, so it is
    /// extracted again before any remainder.
    pub fn push_front(&mut self, line: &str) {
        let mut restored = String::with_capacity(line.len() + 1 + self.buffer.len());
        restored.push_str(line);
        restored.push('\n');
        restored.push_str(&self.buffer);
        self.buffer = restored;
        self.front_retried = true;
    }

    /// Number of decoded bytes waiting for a line separator.
    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// End of stream: flush the decoder and return every remaining
    /// non-empty line, including an unterminated last one.
    pub fn finish(&mut self) -> Vec<String> {
        if !self.undecoded.is_empty() {
            // Whatever is left can never complete.
            self.undecoded.clear();
            self.buffer.push(REPLACEMENT);
        }
        self.front_retried = false;

        let rest = std::mem::take(&mut self.buffer);
        rest.split('\n')
            .filter(|raw| !raw.is_empty())
            .map(|raw| raw.strip_suffix('\r').unwrap_or(raw).to_string())
            .collect()
    }
}

/// Move the longest decodable prefix of `bytes` into `out`.
///
/// Invalid sequences become U+FFFD; a sequence truncated by the end of
/// the input is left in `bytes` for the next call.
fn decode_utf8_prefix(bytes: &mut BytesMut, out: &mut String) {
    loop {
        match std::str::from_utf8(bytes) {
            Ok(text) => {
                out.push_str(text);
                bytes.clear();
                return;
            }
            Err(e) => {
                let valid = e.valid_up_to();
                // Safe: `valid_up_to` marks the end of a valid prefix.
                out.push_str(std::str::from_utf8(&bytes[..valid]).unwrap_or_default());
                match e.error_len() {
                    Some(invalid) => {
                        out.push(REPLACEMENT);
                        bytes.advance(valid + invalid);
                    }
                    None => {
                        bytes.advance(valid);
                        return;
                    }
                }
            }
        }
    }
}
