//! Classification of single stream lines.
//!
//! Wire format:
//! ```text
//! : keep-alive
//!
//! data: {"choices":[{"delta":{"content":"He"}}]}
//!
//! data: [DONE]
//! ```

use serde_json::Value;
use thiserror::Error;

/// Prefix of a data field line.
pub const DATA_PREFIX: &str = "data: ";

/// Payload marking the end of the stream.
pub const DONE_MARKER: &str = "[DONE]";

/// What a single line means to the stream consumer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodedEvent {
    /// Blank or whitespace-only line.
    Empty,
    /// `:` comment, used as keep-alive.
    Comment,
    /// Field other than `data: `.
    Unrecognized,
    /// The terminal sentinel.
    Terminal,
    /// Valid payload that carries no text fragment.
    NoContent,
    /// Incremental text fragment.
    Delta(String),
}

/// A data line whose payload is not valid JSON.
#[derive(Error, Debug)]
#[error("malformed data frame ({len} bytes): {source}")]
pub struct DecodeError {
    pub len: usize,
    #[source]
    pub source: serde_json::Error,
}

/// Decode one line (without its line terminator).
///
/// # Example
/// ```
/// use heatline::event::{decode_line, DecodedEvent};
///
/// let line = r#"data: {"choices":[{"delta":{"content":"Hi"}}]}"#;
/// assert_eq!(decode_line(line).unwrap(), DecodedEvent::Delta("Hi".to_string()));
/// assert_eq!(decode_line(": ping").unwrap(), DecodedEvent::Comment);
/// assert_eq!(decode_line("data: [DONE]").unwrap(), DecodedEvent::Terminal);
/// assert!(decode_line("data: {\"choi").is_err());
/// ```
pub fn decode_line(line: &str) -> Result<DecodedEvent, DecodeError> {
    if line.trim().is_empty() {
        return Ok(DecodedEvent::Empty);
    }
    if line.starts_with(':') {
        return Ok(DecodedEvent::Comment);
    }
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return Ok(DecodedEvent::Unrecognized);
    };

    let payload = payload.trim();
    if payload == DONE_MARKER {
        return Ok(DecodedEvent::Terminal);
    }

    let value: Value = serde_json::from_str(payload).map_err(|source| DecodeError {
        len: payload.len(),
        source,
    })?;

    Ok(match delta_content(&value) {
        Some(text) if !text.is_empty() => DecodedEvent::Delta(text.to_string()),
        _ => DecodedEvent::NoContent,
    })
}

/// Extract `choices[0].delta.content` from a chunk object.
pub fn delta_content(value: &Value) -> Option<&str> {
    value.pointer("/choices/0/delta/content").and_then(Value::as_str)
}
