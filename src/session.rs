//! Stream session: one chat turn from request to completion.
//!
//! ```text
//! Idle -> Connecting -> Streaming -> Completed
//!             |             |
//!             +-> Failed <--+
//! ```
//!
//! Any state before a terminal one can also move to `Cancelled` once the
//! session's [`CancelToken`] fires. `done` is reported exactly once for
//! `Completed` and `Failed`; nothing at all is reported after cancellation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use futures::{Stream, StreamExt};
use tokio::sync::Notify;
use tracing::{debug, warn};

use crate::client::{ClientError, StreamingClient};
use crate::model::ChatRequest;
use crate::sse::sse_deltas;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Streaming,
    Completed,
    Failed,
    Cancelled,
}

impl SessionState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Failed | SessionState::Cancelled
        )
    }
}

/// Receiver of a session's callbacks.
///
/// Calls are made sequentially from the session's read loop, in arrival
/// order. `on_done` follows every `on_error`.
pub trait StreamConsumer {
    fn on_delta(&mut self, text: &str);

    fn on_done(&mut self);

    fn on_error(&mut self, error: &ClientError);
}

#[derive(Debug, Default)]
struct CancelInner {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Shared flag that stops a session from dispatching further callbacks.
///
/// Clones share state. Cancelling is permanent.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelInner>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolves once [`cancel`](Self::cancel) has been called.
    pub async fn cancelled(&self) {
        let notified = self.inner.notify.notified();
        tokio::pin!(notified);
        // Register before checking the flag so a concurrent cancel is not missed.
        notified.as_mut().enable();
        if self.is_cancelled() {
            return;
        }
        notified.await;
    }
}

/// Drives a single chat turn and reports to a [`StreamConsumer`].
///
/// A session is single use; [`run`](Self::run) and [`drive`](Self::drive)
/// consume it and return the terminal state.
///
/// # Example
/// ```rust,ignore
/// let session = StreamSession::new();
/// let cancel = session.cancel_token();
/// let state = session.run(&client, &request, &mut assembler).await;
/// ```
#[derive(Debug)]
pub struct StreamSession {
    state: SessionState,
    cancel: CancelToken,
}

impl Default for StreamSession {
    fn default() -> Self {
        Self::new()
    }
}

impl StreamSession {
    pub fn new() -> Self {
        Self::with_cancel(CancelToken::new())
    }

    /// Session controlled by an existing token.
    pub fn with_cancel(cancel: CancelToken) -> Self {
        Self {
            state: SessionState::Idle,
            cancel,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    fn transition(&mut self, next: SessionState) {
        debug!(from = ?self.state, to = ?next, "Stream session transition");
        self.state = next;
    }

    fn cancelled(mut self) -> SessionState {
        self.transition(SessionState::Cancelled);
        SessionState::Cancelled
    }

    fn fail<K>(mut self, consumer: &mut K, error: ClientError) -> SessionState
    where
        K: StreamConsumer + ?Sized,
    {
        warn!(error = %error, from = ?self.state, "Stream session failed");
        self.transition(SessionState::Failed);
        consumer.on_error(&error);
        consumer.on_done();
        SessionState::Failed
    }

    /// Send `request` through `client` and stream the reply into `consumer`.
    pub async fn run<C, K>(
        mut self,
        client: &C,
        request: &ChatRequest,
        consumer: &mut K,
    ) -> SessionState
    where
        C: StreamingClient + ?Sized,
        K: StreamConsumer + ?Sized,
    {
        let cancel = self.cancel.clone();
        if cancel.is_cancelled() {
            return self.cancelled();
        }

        self.transition(SessionState::Connecting);
        debug!(turns = request.messages.len(), zone = request.zone_context.is_some(), "Opening chat stream");

        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => None,
            opened = client.open_chat_stream(request) => Some(opened),
        };

        match opened {
            None => self.cancelled(),
            Some(_) if cancel.is_cancelled() => self.cancelled(),
            Some(Err(e)) => self.fail(consumer, e),
            Some(Ok(bytes)) => self.drive(bytes, consumer).await,
        }
    }

    /// Read an already opened response body to completion.
    pub async fn drive<S, E, K>(mut self, bytes: S, consumer: &mut K) -> SessionState
    where
        S: Stream<Item = Result<Bytes, E>> + Send + 'static,
        E: Into<ClientError> + Send + 'static,
        K: StreamConsumer + ?Sized,
    {
        let cancel = self.cancel.clone();
        let deltas = sse_deltas(bytes);
        tokio::pin!(deltas);

        self.transition(SessionState::Streaming);
        let mut delivered = 0usize;

        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => None,
                item = deltas.next() => Some(item),
            };

            // Checked again here since the read may have won the race.
            let Some(item) = next.filter(|_| !cancel.is_cancelled()) else {
                debug!(delivered, "Stream cancelled");
                return self.cancelled();
            };

            match item {
                Some(Ok(text)) => {
                    delivered += 1;
                    consumer.on_delta(&text);
                }
                Some(Err(e)) => return self.fail(consumer, e),
                None => {
                    debug!(delivered, "Stream completed");
                    self.transition(SessionState::Completed);
                    consumer.on_done();
                    return SessionState::Completed;
                }
            }
        }
    }
}
