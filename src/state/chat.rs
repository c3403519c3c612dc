use serde::Serialize;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::models::conversation::ConversationWithPeer;
use crate::models::message::MessageWithSender;
use crate::models::profile::Profile;

pub type SharedState = Arc<RwLock<ChatState>>;

/// In-memory projection of what the chat view shows.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChatState {
    pub users: Vec<Profile>,
    pub conversations: Vec<ConversationWithPeer>,
    pub messages: Vec<MessageWithSender>,
    pub active_conversation: Option<String>,
    pub loading: bool,
}

impl ChatState {
    pub fn shared() -> SharedState {
        Arc::new(RwLock::new(Self::default()))
    }

    pub fn is_active(&self, conversation_id: &str) -> bool {
        self.active_conversation.as_deref() == Some(conversation_id)
    }

    pub fn active_conversation_data(&self) -> Option<&ConversationWithPeer> {
        let active = self.active_conversation.as_deref()?;
        self.conversations.iter().find(|c| c.id() == active)
    }

    /// Switches the active conversation. The message list is cleared when the
    /// id actually changes so a previous conversation's history is never
    /// shown under the new one.
    pub fn set_active(&mut self, conversation_id: Option<String>) -> bool {
        if self.active_conversation == conversation_id {
            return false;
        }
        self.active_conversation = conversation_id;
        self.messages.clear();
        true
    }

    /// Appends a live message unless it belongs to another conversation or
    /// is already listed.
    pub fn append_message(&mut self, message: MessageWithSender) -> bool {
        if !self.is_active(&message.message.conversation_id) {
            return false;
        }
        if self.messages.iter().any(|m| m.id() == message.id()) {
            return false;
        }
        self.messages.push(message);
        true
    }
}
