use crate::core::message::{HistoryEntry, Message};
use crate::gateway::GatewayStatus;

const GREETING: &str = "# Hello! I'm Jenny\n\
I can stream answers, render tables and highlight code. \
Ask me for a chart and I'll draw it right here.";

/// Conversation log plus transient view state for one session.
///
/// Owned by the event loop and passed by reference; nothing else mutates it.
#[derive(Debug, Default)]
pub struct ConversationStore {
    messages: Vec<Message>,
    is_loading: bool,
    streaming_buffer: String,
    is_listening: bool,
    gateway_status: Option<GatewayStatus>,
}

impl ConversationStore {
    /// A store seeded with the assistant's greeting.
    pub fn new() -> Self {
        let mut store = Self::empty();
        store.append_message(Message::new_assistant(GREETING));
        store
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn append_message(&mut self, message: Message) {
        self.messages.push(message);
    }

    pub fn set_loading(&mut self, loading: bool) {
        self.is_loading = loading;
    }

    pub fn set_streaming_buffer(&mut self, text: impl Into<String>) {
        self.streaming_buffer = text.into();
    }

    pub fn set_listening(&mut self, listening: bool) {
        self.is_listening = listening;
    }

    pub fn set_gateway_status(&mut self, status: GatewayStatus) {
        self.gateway_status = Some(status);
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    pub fn streaming_buffer(&self) -> &str {
        &self.streaming_buffer
    }

    pub fn is_listening(&self) -> bool {
        self.is_listening
    }

    pub fn gateway_status(&self) -> Option<&GatewayStatus> {
        self.gateway_status.as_ref()
    }

    /// The full log in arrival order, as sent to the gateway.
    pub fn history(&self) -> Vec<HistoryEntry> {
        self.messages.iter().map(Message::to_history).collect()
    }
}
