use std::sync::Arc;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use super::events::ChatEvent;
use crate::backend::{Backend, Collection, Filter, SubscriptionGuard, decode};
use crate::models::message::{Message, MessageWithSender};
use crate::services::messaging::attach_sender;
use crate::state::chat::SharedState;
use crate::utils::error::ChatResult;

/// The single live subscription of the active conversation. Dropping it
/// stops delivery and releases the backend subscription.
pub struct LiveConversation {
    conversation_id: String,
    task: JoinHandle<()>,
    _subscription: SubscriptionGuard,
}

impl LiveConversation {
    pub async fn start<B: Backend>(
        backend: Arc<B>,
        conversation_id: String,
        state: SharedState,
        events: broadcast::Sender<ChatEvent>,
    ) -> ChatResult<Self> {
        let subscription = backend
            .subscribe(
                Collection::Messages,
                Filter::eq("conversation_id", conversation_id.as_str()),
            )
            .await?;
        let (mut feed, guard) = subscription.split();

        let task_conversation = conversation_id.clone();
        let task = tokio::spawn(async move {
            while let Some(row) = feed.recv().await {
                let message: Message = match decode(row) {
                    Ok(message) => message,
                    Err(e) => {
                        tracing::warn!("Dropping undecodable message event: {}", e);
                        continue;
                    }
                };

                let message = match attach_sender(backend.as_ref(), message.clone()).await {
                    Ok(enriched) => enriched,
                    Err(e) => {
                        tracing::warn!(
                            "Sender lookup failed for message {}: {}",
                            message.id,
                            e
                        );
                        MessageWithSender {
                            message,
                            sender: None,
                        }
                    }
                };

                let appended = {
                    let mut state = state.write().await;
                    state.is_active(&task_conversation) && state.append_message(message.clone())
                };

                if appended {
                    let _ = events.send(ChatEvent::NewMessage { message });
                }
            }
        });

        tracing::info!("Live updates started for conversation {}", conversation_id);

        Ok(Self {
            conversation_id,
            task,
            _subscription: guard,
        })
    }

    pub fn conversation_id(&self) -> &str {
        &self.conversation_id
    }
}

impl Drop for LiveConversation {
    fn drop(&mut self) {
        self.task.abort();
        tracing::info!(
            "Live updates stopped for conversation {}",
            self.conversation_id
        );
    }
}
