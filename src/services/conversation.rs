use serde_json::Value;

use crate::backend::{Backend, Collection, Filter, Order, Query, Row, decode, decode_all, encode};
use crate::models::conversation::{Conversation, ConversationWithPeer, NewConversation};
use crate::services::profile::{fetch_profiles, get_profile};
use crate::utils::error::{BackendError, ChatError, ChatResult};

#[derive(Debug, Clone)]
pub struct OpenedConversation {
    pub conversation: Conversation,
    pub created: bool,
}

/// Conversations the user takes part in, most recently active first, each
/// with the other participant's profile attached.
pub async fn list_conversations<B: Backend>(
    backend: &B,
    user_id: &str,
) -> ChatResult<Vec<ConversationWithPeer>> {
    let rows = backend
        .query(
            Query::table(Collection::Conversations)
                .filter(Filter::or([
                    Filter::eq("user1_id", user_id),
                    Filter::eq("user2_id", user_id),
                ]))
                .order(Order::desc("updated_at")),
        )
        .await?;
    let conversations: Vec<Conversation> = decode_all(rows)?;

    let peers = fetch_profiles(
        backend,
        conversations.iter().map(|c| c.other_participant(user_id)),
    )
    .await?;

    Ok(conversations
        .into_iter()
        .map(|conversation| {
            let other_user = peers
                .get(conversation.other_participant(user_id))
                .cloned();
            ConversationWithPeer {
                conversation,
                other_user,
            }
        })
        .collect())
}

pub async fn get_conversation<B: Backend>(
    backend: &B,
    conversation_id: &str,
) -> ChatResult<Option<Conversation>> {
    let row = backend
        .query(
            Query::table(Collection::Conversations)
                .filter(Filter::eq("id", conversation_id))
                .limit(1),
        )
        .await?
        .into_iter()
        .next();

    Ok(row.map(decode).transpose()?)
}

/// Looks up the conversation between two users regardless of which one
/// started it.
pub async fn find_conversation<B: Backend>(
    backend: &B,
    a: &str,
    b: &str,
) -> ChatResult<Option<Conversation>> {
    let row = backend
        .query(
            Query::table(Collection::Conversations)
                .filter(Filter::or([
                    Filter::and([Filter::eq("user1_id", a), Filter::eq("user2_id", b)]),
                    Filter::and([Filter::eq("user1_id", b), Filter::eq("user2_id", a)]),
                ]))
                .limit(1),
        )
        .await?
        .into_iter()
        .next();

    Ok(row.map(decode).transpose()?)
}

/// Returns the conversation between `current_user_id` and `other_user_id`,
/// creating it if needed. The backend rejects a second row for the same
/// pair, so a concurrent creator losing the race re-reads the winner's row.
pub async fn get_or_create_conversation<B: Backend>(
    backend: &B,
    current_user_id: &str,
    other_user_id: &str,
) -> ChatResult<OpenedConversation> {
    if current_user_id == other_user_id {
        return Err(ChatError::Validation(
            "Cannot start a conversation with yourself".to_string(),
        ));
    }

    if get_profile(backend, other_user_id).await?.is_none() {
        return Err(ChatError::NotFound("User not found".to_string()));
    }

    if let Some(conversation) = find_conversation(backend, current_user_id, other_user_id).await? {
        return Ok(OpenedConversation {
            conversation,
            created: false,
        });
    }

    let new = NewConversation::new(current_user_id, other_user_id);
    match backend.insert(Collection::Conversations, encode(&new)?).await {
        Ok(row) => {
            let conversation: Conversation = decode(row)?;
            tracing::info!(
                "Conversation {} created between {} and {}",
                conversation.id,
                current_user_id,
                other_user_id
            );
            Ok(OpenedConversation {
                conversation,
                created: true,
            })
        }
        Err(BackendError::Conflict(_)) => {
            tracing::debug!(
                "Conversation between {} and {} created concurrently, reusing it",
                current_user_id,
                other_user_id
            );
            let conversation = find_conversation(backend, current_user_id, other_user_id)
                .await?
                .ok_or_else(|| {
                    ChatError::Internal("Conversation vanished after conflict".to_string())
                })?;
            Ok(OpenedConversation {
                conversation,
                created: false,
            })
        }
        Err(e) => Err(e.into()),
    }
}

/// Bumps the last-activity timestamp that orders conversation lists.
pub async fn touch_conversation<B: Backend>(
    backend: &B,
    conversation_id: &str,
    at: &str,
) -> ChatResult<()> {
    let mut patch = Row::new();
    patch.insert("updated_at".to_string(), Value::String(at.to_string()));
    backend
        .update(Collection::Conversations, conversation_id, patch)
        .await?;
    Ok(())
}
