//! Server-Sent Events (SSE) stream processing.
//!
//! Combines the [`FrameParser`](crate::frame::FrameParser) and
//! [`decode_line`](crate::event::decode_line) into a decoder that turns raw
//! response bytes into text deltas.
//!
//! SSE format:
//! ```text
//! : keep-alive
//! data: {"choices":[{"delta":{"content":"He"}}]}
//!
//! data: {"choices":[{"delta":{"content":"llo"}}]}
//!
//! data: [DONE]
//! ```
//!
//! A data line that fails to parse is pushed back in front of the buffer and
//! tried once more after the next chunk arrives. If it still fails it is
//! dropped. Lines left over at end of stream are decoded one last time and
//! dropped on failure.

use std::collections::VecDeque;

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};
use tracing::debug;

use crate::client::ClientError;
use crate::event::{decode_line, DecodedEvent};
use crate::frame::FrameParser;

/// Output of the decoder for a chunk of input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseSignal {
    Delta(String),
    /// The terminal sentinel was seen; nothing after it is decoded.
    Done,
}

/// Incremental decoder from response bytes to [`SseSignal`]s.
#[derive(Debug, Default)]
pub struct SseDecoder {
    frames: FrameParser,
    done: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether the terminal sentinel has been decoded.
    pub fn is_done(&self) -> bool {
        self.done
    }

    /// Feed one chunk and decode every line it completes.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<SseSignal> {
        let mut signals = Vec::new();
        if self.done {
            return signals;
        }

        self.frames.feed(chunk);
        while let Some(frame) = self.frames.next_frame() {
            match decode_line(&frame.line) {
                Ok(DecodedEvent::Delta(text)) => signals.push(SseSignal::Delta(text)),
                Ok(DecodedEvent::Terminal) => {
                    self.done = true;
                    signals.push(SseSignal::Done);
                    break;
                }
                Ok(_) => {}
                Err(e) if !frame.retried => {
                    debug!(error = %e, "Deferring data frame until more bytes arrive");
                    self.frames.push_front(&frame.line);
                    break;
                }
                Err(e) => {
                    debug!(error = %e, "Dropping data frame after retry");
                }
            }
        }

        signals
    }

    /// End of input: decode whatever is still buffered.
    pub fn finish(&mut self) -> Vec<SseSignal> {
        let mut signals = Vec::new();
        if self.done {
            return signals;
        }

        for line in self.frames.finish() {
            match decode_line(&line) {
                Ok(DecodedEvent::Delta(text)) => signals.push(SseSignal::Delta(text)),
                Ok(DecodedEvent::Terminal) => {
                    self.done = true;
                    signals.push(SseSignal::Done);
                    break;
                }
                Ok(_) => {}
                Err(e) => {
                    debug!(error = %e, "Dropping unterminated data frame at end of stream");
                }
            }
        }

        signals
    }

    /// Decode a complete capture in one go and return its deltas in order.
    ///
    /// # Example
    /// ```
    /// use heatline::sse::SseDecoder;
    ///
    /// let capture = b"data: {\"choices\":[{\"delta\":{\"content\":\"He\"}}]}\n\
    ///                 data: {\"choices\":[{\"delta\":{\"content\":\"llo\"}}]}\n\
    ///                 data: [DONE]\n";
    /// assert_eq!(SseDecoder::decode_all([&capture[..]]), vec!["He", "llo"]);
    /// ```
    pub fn decode_all<'a>(chunks: impl IntoIterator<Item = &'a [u8]>) -> Vec<String> {
        let mut decoder = Self::new();
        let mut signals = Vec::new();
        for chunk in chunks {
            signals.extend(decoder.push(chunk));
        }
        signals.extend(decoder.finish());

        signals
            .into_iter()
            .filter_map(|signal| match signal {
                SseSignal::Delta(text) => Some(text),
                SseSignal::Done => None,
            })
            .collect()
    }
}

/// Turn a byte stream into a stream of text deltas.
///
/// The stream ends after the terminal sentinel or when the input ends. A read
/// error is yielded once and ends the stream.
pub fn sse_deltas<S, E>(bytes: S) -> impl Stream<Item = Result<String, ClientError>> + Send
where
    S: Stream<Item = Result<Bytes, E>> + Send + 'static,
    E: Into<ClientError> + Send + 'static,
{
    stream::unfold(
        (Box::pin(bytes), SseDecoder::new(), VecDeque::new(), false),
        |(mut bytes, mut decoder, mut pending, mut ended)| async move {
            loop {
                if let Some(text) = pending.pop_front() {
                    return Some((Ok(text), (bytes, decoder, pending, ended)));
                }
                if ended {
                    return None;
                }

                let signals = match bytes.next().await {
                    Some(Ok(chunk)) => decoder.push(&chunk),
                    Some(Err(e)) => {
                        ended = true;
                        return Some((Err(e.into()), (bytes, decoder, pending, ended)));
                    }
                    None => {
                        ended = true;
                        decoder.finish()
                    }
                };

                for signal in signals {
                    match signal {
                        SseSignal::Delta(text) => pending.push_back(text),
                        SseSignal::Done => ended = true,
                    }
                }
            }
        },
    )
}

/// Extension trait for `reqwest::Response` to read a chat delta stream.
pub trait SSEResponseExt {
    /// Convert the response body into a stream of text deltas.
    fn sse_deltas(self) -> impl Stream<Item = Result<String, ClientError>> + Send;
}

impl SSEResponseExt for reqwest::Response {
    fn sse_deltas(self) -> impl Stream<Item = Result<String, ClientError>> + Send {
        sse_deltas(self.bytes_stream())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn data(text: &str) -> String {
        format!(
            "data: {}\n",
            serde_json::json!({"choices": [{"delta": {"content": text}}]})
        )
    }

    fn capture() -> String {
        [
            ": keep-alive\n".to_string(),
            data("Drink "),
            "\n".to_string(),
            data("water, "),
            ": ping\r\n".to_string(),
            "\r\n".to_string(),
            data("stay in shade 🌳."),
            "data: [DONE]\n".to_string(),
        ]
        .concat()
    }

    #[test]
    fn test_hello_example() {
        let mut decoder = SseDecoder::new();
        let mut signals = decoder.push(data("He").as_bytes());
        signals.extend(decoder.push(data("llo").as_bytes()));
        signals.extend(decoder.push(b"data: [DONE]\n"));

        assert_eq!(
            signals,
            vec![
                SseSignal::Delta("He".to_string()),
                SseSignal::Delta("llo".to_string()),
                SseSignal::Done,
            ]
        );
        assert!(decoder.is_done());
        assert!(decoder.push(data("late").as_bytes()).is_empty());
        assert!(decoder.finish().is_empty());
    }

    #[test]
    fn test_comments_and_blank_lines_do_not_interfere() {
        let deltas = SseDecoder::decode_all([capture().as_bytes()]);
        assert_eq!(deltas, vec!["Drink ", "water, ", "stay in shade 🌳."]);
    }

    #[test]
    fn test_chunk_boundary_invariance() {
        let capture = capture();
        let bytes = capture.as_bytes();
        let expected = SseDecoder::decode_all([bytes]);

        for size in 1..=bytes.len() {
            let deltas = SseDecoder::decode_all(bytes.chunks(size));
            assert_eq!(deltas, expected, "chunk size {size}");
        }
        for cut in 0..=bytes.len() {
            let deltas = SseDecoder::decode_all([&bytes[..cut], &bytes[cut..]]);
            assert_eq!(deltas, expected, "cut at {cut}");
        }
    }

    #[test]
    fn test_frame_split_mid_json() {
        let line = data("partial frame");
        let (head, tail) = line.split_at(line.len() / 2);

        let mut decoder = SseDecoder::new();
        assert!(decoder.push(head.as_bytes()).is_empty());
        assert_eq!(
            decoder.push(tail.as_bytes()),
            vec![SseSignal::Delta("partial frame".to_string())]
        );
    }

    #[test]
    fn test_malformed_line_gets_one_retry_then_is_dropped() {
        let mut decoder = SseDecoder::new();
        let first = format!("{}data: not-json\n{}", data("a"), data("b"));

        // Parsing stops at the bad line; "b" waits behind it.
        assert_eq!(decoder.push(first.as_bytes()), vec![SseSignal::Delta("a".to_string())]);

        // Next chunk: the bad line fails again and is dropped, order is kept.
        assert_eq!(
            decoder.push(data("c").as_bytes()),
            vec![
                SseSignal::Delta("b".to_string()),
                SseSignal::Delta("c".to_string()),
            ]
        );
    }

    #[test]
    fn test_malformed_line_before_end_of_stream() {
        let capture = format!("{}data: not-json\n", data("kept"));
        assert_eq!(SseDecoder::decode_all([capture.as_bytes()]), vec!["kept"]);

        let unterminated = format!("{}data: not-json", data("kept"));
        assert_eq!(SseDecoder::decode_all([unterminated.as_bytes()]), vec!["kept"]);
    }

    #[test]
    fn test_flush_decodes_unterminated_last_frame() {
        let line = data("tail");
        let capture = line.trim_end();
        assert_eq!(SseDecoder::decode_all([capture.as_bytes()]), vec!["tail"]);
    }

    #[test]
    fn test_nothing_after_done_is_decoded() {
        let capture = format!("{}data: [DONE]\n{}", data("x"), data("y"));
        assert_eq!(SseDecoder::decode_all([capture.as_bytes()]), vec!["x"]);

        let flushed = format!("{}data: [DONE]\n{}", data("x"), data("y").trim_end());
        assert_eq!(SseDecoder::decode_all([flushed.as_bytes()]), vec!["x"]);
    }

    #[test]
    fn test_decoding_is_repeatable() {
        let capture = capture();
        let first = SseDecoder::decode_all(capture.as_bytes().chunks(7)).concat();
        let second = SseDecoder::decode_all(capture.as_bytes().chunks(7)).concat();
        assert_eq!(first, second);
        assert_eq!(first, "Drink water, stay in shade 🌳.");
    }

    #[tokio::test]
    async fn test_sse_deltas_stream() {
        let capture = capture();
        let chunks: Vec<Result<Bytes, ClientError>> = capture
            .as_bytes()
            .chunks(5)
            .map(|c| Ok(Bytes::copy_from_slice(c)))
            .collect();

        let deltas: Vec<String> = sse_deltas(stream::iter(chunks))
            .map(|r| r.unwrap())
            .collect()
            .await;

        assert_eq!(deltas, vec!["Drink ", "water, ", "stay in shade 🌳."]);
    }

    #[tokio::test]
    async fn test_sse_deltas_stops_at_read_error() {
        let chunks: Vec<Result<Bytes, ClientError>> = vec![
            Ok(Bytes::from(data("before"))),
            Err(ClientError::MissingBody),
            Ok(Bytes::from(data("after"))),
        ];

        let items: Vec<Result<String, ClientError>> =
            sse_deltas(stream::iter(chunks)).collect().await;

        assert_eq!(items.len(), 2);
        assert_eq!(items[0].as_ref().unwrap(), "before");
        assert!(items[1].is_err());
    }
}
