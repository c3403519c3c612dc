use serde::{Deserialize, Serialize};

use crate::models::message::MessageWithSender;

/// Notifications a chat session publishes after its state changed.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChatEvent {
    UsersLoaded {
        count: usize,
    },
    ConversationsLoaded {
        count: usize,
    },
    ConversationCreated {
        conversation_id: String,
        other_user_id: String,
    },
    ActiveConversationChanged {
        conversation_id: Option<String>,
    },
    MessagesLoaded {
        conversation_id: String,
        count: usize,
    },
    MessageSent {
        message_id: String,
        conversation_id: String,
    },
    NewMessage {
        message: MessageWithSender,
    },
}
