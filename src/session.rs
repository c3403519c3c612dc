use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::backend::Backend;
use crate::config::DEFAULT_EVENT_BUFFER;
use crate::models::message::Message;
use crate::models::profile::Profile;
use crate::realtime::{ChatEvent, LiveConversation};
use crate::services::{conversation, messaging, profile};
use crate::state::{ChatState, SharedState};
use crate::utils::error::ChatResult;

/// Controller behind the chat view: owns the view state, the signed-in
/// profile and the live subscription of the active conversation.
///
/// Every operation returns its failure to the caller and leaves the last
/// good state in place.
pub struct ChatSession<B: Backend> {
    backend: Arc<B>,
    current_user: Option<Profile>,
    state: SharedState,
    events: broadcast::Sender<ChatEvent>,
    live: Option<LiveConversation>,
}

impl<B: Backend> ChatSession<B> {
    pub fn new(backend: Arc<B>, current_user: Option<Profile>) -> Self {
        Self::with_event_buffer(backend, current_user, DEFAULT_EVENT_BUFFER)
    }

    pub fn with_event_buffer(
        backend: Arc<B>,
        current_user: Option<Profile>,
        event_buffer: usize,
    ) -> Self {
        let (events, _) = broadcast::channel(event_buffer.max(1));
        Self {
            backend,
            current_user,
            state: ChatState::shared(),
            events,
            live: None,
        }
    }

    pub fn backend(&self) -> &Arc<B> {
        &self.backend
    }

    pub fn current_user(&self) -> Option<&Profile> {
        self.current_user.as_ref()
    }

    fn user_id(&self) -> Option<&str> {
        self.current_user.as_ref().map(|p| p.user_id.as_str())
    }

    /// Receiver for every state change made from now on.
    pub fn updates(&self) -> broadcast::Receiver<ChatEvent> {
        self.events.subscribe()
    }

    pub async fn snapshot(&self) -> ChatState {
        self.state.read().await.clone()
    }

    /// Conversation currently subscribed to live updates, if any.
    pub fn live_conversation(&self) -> Option<&str> {
        self.live.as_ref().map(LiveConversation::conversation_id)
    }

    fn publish(&self, event: ChatEvent) {
        // Nobody listening is fine.
        let _ = self.events.send(event);
    }

    /// Initial load once a user is known.
    pub async fn start(&self) -> ChatResult<()> {
        self.fetch_users().await?;
        self.fetch_conversations().await
    }

    pub async fn fetch_users(&self) -> ChatResult<()> {
        let users = profile::list_other_users(self.backend.as_ref(), self.user_id()).await?;
        let count = users.len();
        self.state.write().await.users = users;
        self.publish(ChatEvent::UsersLoaded { count });
        Ok(())
    }

    pub async fn fetch_conversations(&self) -> ChatResult<()> {
        let Some(user_id) = self.user_id() else {
            return Ok(());
        };

        let conversations = conversation::list_conversations(self.backend.as_ref(), user_id).await?;
        let count = conversations.len();
        self.state.write().await.conversations = conversations;
        self.publish(ChatEvent::ConversationsLoaded { count });
        Ok(())
    }

    /// Loads a conversation's history. The result is dropped if another
    /// conversation became active while the request was in flight; live
    /// messages delivered meanwhile are kept.
    pub async fn fetch_messages(&self, conversation_id: &str) -> ChatResult<()> {
        self.state.write().await.loading = true;
        let result = messaging::list_messages(self.backend.as_ref(), conversation_id).await;

        let mut state = self.state.write().await;
        state.loading = false;
        let mut messages = result?;

        let current = state.active_conversation.as_deref();
        if current.is_some_and(|active| active != conversation_id) {
            tracing::debug!(
                "Discarding history of {}: no longer the active conversation",
                conversation_id
            );
            return Ok(());
        }

        // Live rows may have landed after the query ran.
        let loaded: HashSet<String> = messages.iter().map(|m| m.id().to_string()).collect();
        let arrived = std::mem::take(&mut state.messages)
            .into_iter()
            .filter(|m| m.message.conversation_id == conversation_id && !loaded.contains(m.id()));
        messages.extend(arrived);
        messages.sort_by(|a, b| a.message.created_at.cmp(&b.message.created_at));

        let count = messages.len();
        state.messages = messages;
        drop(state);

        self.publish(ChatEvent::MessagesLoaded {
            conversation_id: conversation_id.to_string(),
            count,
        });
        Ok(())
    }

    /// Id of the conversation with `other_user_id`, created on first contact.
    /// `Ok(None)` when nobody is signed in.
    pub async fn get_or_create_conversation(
        &self,
        other_user_id: &str,
    ) -> ChatResult<Option<String>> {
        let Some(user_id) = self.user_id() else {
            return Ok(None);
        };

        let opened =
            conversation::get_or_create_conversation(self.backend.as_ref(), user_id, other_user_id)
                .await?;
        let conversation_id = opened.conversation.id;

        if opened.created {
            self.publish(ChatEvent::ConversationCreated {
                conversation_id: conversation_id.clone(),
                other_user_id: other_user_id.to_string(),
            });
            if let Err(e) = self.fetch_conversations().await {
                tracing::warn!("Conversation list refresh failed: {}", e);
            }
        }

        Ok(Some(conversation_id))
    }

    /// Sends `content` to a conversation. `Ok(None)` for blank content or
    /// when nobody is signed in; nothing is written in either case.
    pub async fn send_message(
        &self,
        conversation_id: &str,
        content: &str,
    ) -> ChatResult<Option<Message>> {
        let sent =
            messaging::send_message(self.backend.as_ref(), self.user_id(), conversation_id, content)
                .await?;

        if let Some(message) = &sent {
            self.publish(ChatEvent::MessageSent {
                message_id: message.id.clone(),
                conversation_id: conversation_id.to_string(),
            });
            self.fetch_conversations().await?;
        }

        Ok(sent)
    }

    /// Makes `conversation_id` the active conversation. The previous live
    /// subscription is released before anything that can fail.
    pub async fn set_active_conversation(
        &mut self,
        conversation_id: Option<String>,
    ) -> ChatResult<()> {
        if conversation_id.is_some() && self.live_conversation() == conversation_id.as_deref() {
            return Ok(());
        }

        self.live = None;
        let changed = self.state.write().await.set_active(conversation_id.clone());
        if changed {
            self.publish(ChatEvent::ActiveConversationChanged {
                conversation_id: conversation_id.clone(),
            });
        }

        if let Some(conversation_id) = conversation_id {
            let live = LiveConversation::start(
                self.backend.clone(),
                conversation_id,
                self.state.clone(),
                self.events.clone(),
            )
            .await?;
            self.live = Some(live);
        }

        Ok(())
    }

    /// Activates an existing conversation and loads its history.
    pub async fn select_conversation(&mut self, conversation_id: &str) -> ChatResult<()> {
        self.set_active_conversation(Some(conversation_id.to_string()))
            .await?;
        self.fetch_messages(conversation_id).await
    }

    /// Opens (or creates) the conversation with `user_id`, activates it and
    /// loads its history.
    pub async fn start_chat_with_user(&mut self, user_id: &str) -> ChatResult<Option<String>> {
        let Some(conversation_id) = self.get_or_create_conversation(user_id).await? else {
            return Ok(None);
        };
        self.select_conversation(&conversation_id).await?;
        Ok(Some(conversation_id))
    }

    /// Releases the live subscription. Also happens when the session is
    /// dropped.
    pub fn shutdown(&mut self) {
        if self.live.take().is_some() {
            tracing::debug!("Chat session shut down");
        }
    }
}
