//! Conversation state and the message assembler.
//!
//! [`Conversation`] owns the message list shown to the user. Each turn is
//! streamed into it through a [`MessageAssembler`], which grows a single
//! assistant message in place and republishes the list on a
//! [`tokio::sync::watch`] channel after every change.

use nonempty::NonEmpty;
use tokio::sync::watch;
use tracing::{debug, warn};

use crate::client::{ClientError, StreamingClient};
use crate::model::{ChatMessage, ChatRequest, ZoneContext};
use crate::session::{SessionState, StreamConsumer, StreamSession};
use crate::zones::HeatZone;

pub const GREETING: &str = "I'm your Heat Advisory AI assistant. I can help you understand heat risks, provide safety recommendations, and answer questions about urban heat islands. What would you like to know?";

/// Message shown when the user picks a zone on the map.
pub fn zone_notice(zone: &HeatZone) -> String {
    format!(
        "📍 You've selected **{}**.\n\nCurrent conditions:\n- Heat Index: {}°C ({} risk)\n- Temperature: {}°C\n- Humidity: {}%\n- Expected peak: {}°C at {}\n\nHow can I help you stay safe in this area?",
        zone.name,
        zone.heat_index,
        zone.risk_level,
        zone.temperature,
        zone.humidity,
        zone.predicted_peak,
        zone.peak_time,
    )
}

/// Chat history plus the loading guard for the turn in flight.
#[derive(Debug)]
pub struct Conversation {
    messages: Vec<ChatMessage>,
    zone: Option<ZoneContext>,
    zone_id: Option<&'static str>,
    in_flight: bool,
    last_error: Option<String>,
    updates: watch::Sender<Vec<ChatMessage>>,
}

impl Default for Conversation {
    fn default() -> Self {
        Self::new()
    }
}

impl Conversation {
    /// A conversation opened by the assistant greeting.
    pub fn new() -> Self {
        let messages = vec![ChatMessage::assistant(GREETING)];
        let (updates, _) = watch::channel(messages.clone());
        Self {
            messages,
            zone: None,
            zone_id: None,
            in_flight: false,
            last_error: None,
            updates,
        }
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn zone(&self) -> Option<&ZoneContext> {
        self.zone.as_ref()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Error reported by the most recent turn, cleared when a new one starts.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Observe the message list. The receiver always holds the latest snapshot.
    pub fn subscribe(&self) -> watch::Receiver<Vec<ChatMessage>> {
        self.updates.subscribe()
    }

    fn publish(&self) {
        self.updates.send_replace(self.messages.clone());
    }

    /// Attach a zone to following turns and post a notice about it.
    ///
    /// Selecting the zone that is already attached does nothing.
    pub fn select_zone(&mut self, zone: &HeatZone) {
        if self.zone_id == Some(zone.id) {
            return;
        }
        self.messages.push(ChatMessage::assistant(zone_notice(zone)));
        self.zone = Some(ZoneContext::from(zone));
        self.zone_id = Some(zone.id);
        self.publish();
    }

    pub fn clear_zone(&mut self) {
        self.zone = None;
        self.zone_id = None;
    }

    /// Append the user's message and build the request for this turn.
    ///
    /// Fails with [`ClientError::TurnInFlight`] while a previous reply is
    /// still streaming.
    pub fn begin_turn(&mut self, text: &str) -> Result<ChatRequest, ClientError> {
        if self.in_flight {
            return Err(ClientError::TurnInFlight);
        }
        if text.trim().is_empty() {
            return Err(ClientError::EmptyMessage);
        }

        self.messages.push(ChatMessage::user(text));
        self.in_flight = true;
        self.last_error = None;
        self.publish();

        // Replies that failed before any delta leave nothing to replay.
        let turns = self
            .messages
            .iter()
            .filter(|m| !m.content.is_empty())
            .map(ChatMessage::to_turn)
            .collect();
        let messages = NonEmpty::from_vec(turns).ok_or(ClientError::EmptyMessage)?;

        Ok(ChatRequest {
            messages,
            zone_context: self.zone.clone(),
        })
    }

    /// Consumer that streams the current turn's reply into this conversation.
    pub fn assembler(&mut self) -> MessageAssembler<'_> {
        MessageAssembler {
            conversation: self,
            reply: None,
        }
    }

    /// Release the loading guard for a turn whose session was cancelled.
    ///
    /// Partial reply content is kept.
    pub fn abandon_turn(&mut self) {
        if !self.in_flight {
            return;
        }
        if let Some(last) = self.messages.last_mut().filter(|m| m.streaming) {
            last.finalize();
        }
        self.in_flight = false;
        self.publish();
    }

    /// Run one full turn: append `text`, stream the reply, release the guard.
    ///
    /// Transport failures are not returned; they end the session in
    /// [`SessionState::Failed`] and are available from [`last_error`](Self::last_error).
    pub async fn send<C>(
        &mut self,
        client: &C,
        text: &str,
        session: StreamSession,
    ) -> Result<SessionState, ClientError>
    where
        C: StreamingClient + ?Sized,
    {
        let request = self.begin_turn(text)?;
        let state = {
            let mut assembler = self.assembler();
            session.run(client, &request, &mut assembler).await
        };
        if state == SessionState::Cancelled {
            self.abandon_turn();
        }
        Ok(state)
    }
}

/// Bridges session callbacks to one growing assistant message.
#[derive(Debug)]
pub struct MessageAssembler<'a> {
    conversation: &'a mut Conversation,
    /// Index of the reply in the message list, once the first delta arrived.
    reply: Option<usize>,
}

impl MessageAssembler<'_> {
    /// Text assembled so far for this turn.
    pub fn content(&self) -> Option<&str> {
        self.reply
            .map(|i| self.conversation.messages[i].content.as_str())
    }
}

impl StreamConsumer for MessageAssembler<'_> {
    fn on_delta(&mut self, text: &str) {
        let messages = &mut self.conversation.messages;
        let index = *self.reply.get_or_insert_with(|| {
            messages.push(ChatMessage::pending_assistant());
            messages.len() - 1
        });
        messages[index].content.push_str(text);
        self.conversation.publish();
    }

    fn on_done(&mut self) {
        if let Some(index) = self.reply {
            let message = &mut self.conversation.messages[index];
            message.finalize();
            debug!(id = %message.id, len = message.content.len(), "Reply assembled");
        }
        self.conversation.in_flight = false;
        self.conversation.publish();
    }

    fn on_error(&mut self, error: &ClientError) {
        warn!(error = %error, partial = self.reply.is_some(), "Reply failed");
        self.conversation.last_error = Some(error.to_string());
    }
}
