use chrono::Utc;
use tracing::warn;

use crate::api::ApiClient;
use crate::models::{ChatMessage, EventRecord, Sender};

pub const GREETING: &str =
    "Hi! I'm your event discovery assistant. How can I help you find the perfect event today?";
pub const CHAT_FAILURE: &str = "Sorry, I encountered an error. Please try again.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AssistantTab {
    #[default]
    Chat,
    Communities,
    Friends,
}

/// State behind the floating assistant panel.
pub struct Assistant {
    client: ApiClient,
    messages: Vec<ChatMessage>,
    next_id: u64,
    open: bool,
    maximized: bool,
    tab: AssistantTab,
}

impl Assistant {
    pub fn new(client: ApiClient) -> Self {
        let mut assistant = Self {
            client,
            messages: Vec::new(),
            next_id: 1,
            open: false,
            maximized: false,
            tab: AssistantTab::default(),
        };
        assistant.push(Sender::Bot, GREETING.to_string(), Vec::new());
        assistant
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn is_open(&self) -> bool {
        self.open
    }

    pub fn is_maximized(&self) -> bool {
        self.maximized
    }

    pub fn active_tab(&self) -> AssistantTab {
        self.tab
    }

    pub fn toggle_open(&mut self) -> bool {
        self.open = !self.open;
        self.open
    }

    pub fn toggle_maximized(&mut self) -> bool {
        self.maximized = !self.maximized;
        self.maximized
    }

    pub fn select_tab(&mut self, tab: AssistantTab) {
        self.tab = tab;
    }

    /// Sends a chat query and appends both sides of the exchange. Blank
    /// input is ignored and returns `None`; otherwise returns the bot reply.
    pub async fn send(&mut self, content: &str) -> Option<&ChatMessage> {
        let content = content.trim();
        if content.is_empty() {
            return None;
        }
        self.push(Sender::User, content.to_string(), Vec::new());

        match self.client.chat_query(content).await {
            Ok(reply) => self.push(Sender::Bot, reply.response, reply.events),
            Err(err) => {
                warn!(error = %err, "assistant chat request failed");
                self.push(Sender::Bot, CHAT_FAILURE.to_string(), Vec::new());
            }
        }
        self.messages.last()
    }

    fn push(&mut self, sender: Sender, content: String, events: Vec<EventRecord>) {
        self.messages.push(ChatMessage {
            id: self.next_id,
            content,
            sender,
            timestamp: Utc::now(),
            events,
        });
        self.next_id += 1;
    }
}
