//! Core client traits and error types.

use std::pin::Pin;

use async_trait::async_trait;
use bytes::Bytes;
use futures::Stream;
use thiserror::Error;

use crate::model::{AdvisoryQuery, ChatRequest, HeatAdvisory};

/// Raw body of a chat stream response.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes, ClientError>> + Send>>;

/// Errors that can occur during client operations.
#[derive(Error, Debug)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Non-success response other than rate limit or quota.
    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("{0}")]
    RateLimited(String),

    #[error("{0}")]
    QuotaExhausted(String),

    #[error("No response body")]
    MissingBody,

    #[error("A reply is still streaming")]
    TurnInFlight,

    #[error("Message is empty")]
    EmptyMessage,

    #[error("Configuration error: {0}")]
    Config(String),
}

impl ClientError {
    /// Network failure, bad status or missing body.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ClientError::Http(_)
                | ClientError::Status { .. }
                | ClientError::RateLimited(_)
                | ClientError::QuotaExhausted(_)
                | ClientError::MissingBody
        )
    }

    /// Whether the upstream provider refused the call for capacity reasons.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ClientError::RateLimited(_) | ClientError::QuotaExhausted(_))
    }

    /// HTTP status attached to the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClientError::Status { status, .. } => Some(*status),
            ClientError::RateLimited(_) => Some(429),
            ClientError::QuotaExhausted(_) => Some(402),
            ClientError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}

/// Main client trait for heat-safety backends.
///
/// Implement this trait to add support for a new backend. Each backend
/// answers advisory queries; streaming chat lives in [`StreamingClient`].
///
/// # Example
/// ```rust,ignore
/// pub struct MyClient {
///     http_client: reqwest::Client,
/// }
///
/// #[async_trait]
/// impl Client for MyClient {
///     async fn request_advisory(&self, query: &AdvisoryQuery) -> Result<HeatAdvisory, ClientError> {
///         // Implementation
///     }
/// }
/// ```
#[async_trait]
pub trait Client: Send + Sync {
    /// Ask the backend for a heat advisory.
    ///
    /// Malformed responses are replaced by a fallback advisory rather than
    /// returned as errors; rate-limit and quota statuses are errors.
    async fn request_advisory(&self, query: &AdvisoryQuery) -> Result<HeatAdvisory, ClientError>;

    /// Convenience wrapper building the query from a location alone.
    async fn advisory_for(
        &self,
        location: &str,
        location_type: crate::model::LocationType,
    ) -> Result<HeatAdvisory, ClientError> {
        self.request_advisory(&AdvisoryQuery::new(location, location_type))
            .await
    }
}

/// Extension trait for streaming chat support.
///
/// Implementations open the connection and check the response status; the
/// body bytes are decoded by [`crate::sse`] and driven by
/// [`crate::session::StreamSession`].
#[async_trait]
pub trait StreamingClient: Client {
    /// Send the conversation and return the raw event stream body.
    async fn open_chat_stream(&self, request: &ChatRequest) -> Result<ByteStream, ClientError>;
}
