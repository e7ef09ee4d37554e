//! # heatline - Heat safety chat and advisory client
//!
//! Streaming chat transport and advisory client for an urban heat-island
//! dashboard.
//!
//! ## Features
//! - Async-first, tokio compatible
//! - Incremental server-sent event decoding that tolerates frames split at any
//!   byte, including inside multi-byte characters
//! - Stream sessions with exactly-once completion and explicit cancellation
//! - Conversation state with replace-last updates on a watch channel
//! - Defensive advisory parsing with guideline-based fallbacks
//!
//! ## Architecture
//!
//! Bytes flow through four layers:
//!
//! 1. [`frame::FrameParser`] splits chunks into lines
//! 2. [`event::decode_line`] classifies a line and extracts the delta text
//! 3. [`session::StreamSession`] drives the read loop and reports to a consumer
//! 4. [`assembler::MessageAssembler`] grows the assistant message
//!
//! Backends implement [`Client`] and [`StreamingClient`]. Two are provided:
//! [`providers::FunctionsClient`] for the hosted functions and
//! [`providers::GatewayClient`] for calling a chat completions gateway
//! directly.
//!
//! ## Example
//! ```no_run
//! use heatline::assembler::Conversation;
//! use heatline::options::{HttpTransport, TransportOptions};
//! use heatline::providers::FunctionsClient;
//! use heatline::session::StreamSession;
//! use heatline::zones::zone_by_id;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let client = FunctionsClient::new(TransportOptions::new(
//!         HttpTransport::new("publishable-key")
//!             .with_base_url("https://project.supabase.co/functions/v1".to_string()),
//!     ))?;
//!
//!     let mut conversation = Conversation::new();
//!     if let Some(zone) = zone_by_id("zone-1") {
//!         conversation.select_zone(zone);
//!     }
//!
//!     conversation
//!         .send(&client, "Is it safe to jog this afternoon?", StreamSession::new())
//!         .await?;
//!
//!     if let Some(reply) = conversation.messages().last() {
//!         println!("{}", reply.content);
//!     }
//!     Ok(())
//! }
//! ```

pub mod advisory;
pub mod assembler;
pub mod client;
pub mod event;
pub mod frame;
pub mod http;
pub mod model;
pub mod options;
pub mod providers;
pub mod session;
pub mod sse;
pub mod zones;

// Re-exports for convenience
pub use assembler::{Conversation, MessageAssembler};
pub use client::{Client, ClientError, StreamingClient};
pub use model::{ChatMessage, ChatRequest, HeatAdvisory, RiskLevel, ZoneContext};
pub use session::{CancelToken, SessionState, StreamConsumer, StreamSession};
