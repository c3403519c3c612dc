use crate::backend::{Backend, Collection, Filter, Order, Query, decode, decode_all, encode};
use crate::models::message::{Message, MessageWithSender, NewMessage};
use crate::services::conversation::{get_conversation, touch_conversation};
use crate::services::profile::{fetch_profiles, get_profile};
use crate::utils::error::{ChatError, ChatResult};
use crate::utils::helpers::now_timestamp;
use crate::utils::validation::normalize_message_content;

/// Full history of a conversation, oldest first, with sender profiles.
pub async fn list_messages<B: Backend>(
    backend: &B,
    conversation_id: &str,
) -> ChatResult<Vec<MessageWithSender>> {
    let rows = backend
        .query(
            Query::table(Collection::Messages)
                .filter(Filter::eq("conversation_id", conversation_id))
                .order(Order::asc("created_at")),
        )
        .await?;
    let messages: Vec<Message> = decode_all(rows)?;

    let senders = fetch_profiles(backend, messages.iter().map(|m| m.sender_id.as_str())).await?;

    Ok(messages
        .into_iter()
        .map(|message| {
            let sender = senders.get(&message.sender_id).cloned();
            MessageWithSender { message, sender }
        })
        .collect())
}

/// Persists a message and bumps the conversation's activity timestamp.
///
/// Returns `Ok(None)` without touching the backend when there is no sender
/// or the content is blank after trimming.
pub async fn send_message<B: Backend>(
    backend: &B,
    sender_id: Option<&str>,
    conversation_id: &str,
    content: &str,
) -> ChatResult<Option<Message>> {
    let Some(sender_id) = sender_id else {
        return Ok(None);
    };
    let Some(content) = normalize_message_content(content)? else {
        return Ok(None);
    };

    let conversation = get_conversation(backend, conversation_id)
        .await?
        .ok_or_else(|| ChatError::NotFound("Conversation not found".to_string()))?;

    if !conversation.involves(sender_id) {
        return Err(ChatError::Forbidden(
            "You are not part of this conversation".to_string(),
        ));
    }

    let new = NewMessage {
        conversation_id: conversation_id.to_string(),
        sender_id: sender_id.to_string(),
        content,
    };
    let message: Message = decode(backend.insert(Collection::Messages, encode(&new)?).await?)?;

    touch_conversation(backend, conversation_id, &now_timestamp()).await?;

    tracing::debug!(
        "Message {} sent to conversation {}",
        message.id,
        conversation_id
    );

    Ok(Some(message))
}

/// Attaches the sender profile to a single message with a one-row lookup.
pub async fn attach_sender<B: Backend>(
    backend: &B,
    message: Message,
) -> ChatResult<MessageWithSender> {
    let sender = get_profile(backend, &message.sender_id).await?;
    Ok(MessageWithSender { message, sender })
}
