use serde::{Deserialize, Serialize};

use super::profile::Profile;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conversation {
    pub id: String,
    pub user1_id: String,
    pub user2_id: String,
    pub pair_key: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewConversation {
    pub user1_id: String,
    pub user2_id: String,
    pub pair_key: String,
}

impl NewConversation {
    pub fn new(initiator: &str, other: &str) -> Self {
        Self {
            user1_id: initiator.to_string(),
            user2_id: other.to_string(),
            pair_key: Conversation::pair_key(initiator, other),
        }
    }
}

impl Conversation {
    /// Order-independent key for a pair of participants.
    pub fn pair_key(a: &str, b: &str) -> String {
        let (mut first, mut second) = (a, b);
        if first > second {
            std::mem::swap(&mut first, &mut second);
        }
        format!("{}:{}", first, second)
    }

    pub fn involves(&self, user_id: &str) -> bool {
        self.user1_id == user_id || self.user2_id == user_id
    }

    /// The participant that is not `user_id`.
    pub fn other_participant(&self, user_id: &str) -> &str {
        if self.user1_id == user_id {
            &self.user2_id
        } else {
            &self.user1_id
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationWithPeer {
    #[serde(flatten)]
    pub conversation: Conversation,
    pub other_user: Option<Profile>,
}

impl ConversationWithPeer {
    pub fn id(&self) -> &str {
        &self.conversation.id
    }

    pub fn title(&self) -> &str {
        self.other_user
            .as_ref()
            .map(Profile::label)
            .unwrap_or("Unknown user")
    }
}
