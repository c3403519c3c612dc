#![allow(dead_code)]

pub mod scripted;

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

use dmchat::models::message::MessageWithSender;
use dmchat::models::profile::{CreateProfileRequest, Profile};
use dmchat::realtime::ChatEvent;
use dmchat::services::profile::create_profile;
use dmchat::{ChatSession, SqliteBackend};

use scripted::ScriptedBackend;

pub async fn backend() -> Arc<SqliteBackend> {
    Arc::new(SqliteBackend::in_memory().await.expect("in-memory backend"))
}

pub async fn scripted_backend() -> Arc<ScriptedBackend> {
    let inner = SqliteBackend::in_memory().await.expect("in-memory backend");
    Arc::new(ScriptedBackend::new(inner))
}

pub async fn profile(backend: &SqliteBackend, user_id: &str, username: &str) -> Profile {
    create_profile(
        backend,
        CreateProfileRequest {
            user_id: user_id.to_string(),
            username: username.to_string(),
            display_name: None,
        },
    )
    .await
    .expect("profile created")
}

pub fn session(backend: &Arc<SqliteBackend>, user: &Profile) -> ChatSession<SqliteBackend> {
    ChatSession::new(backend.clone(), Some(user.clone()))
}

pub async fn next_new_message(updates: &mut broadcast::Receiver<ChatEvent>) -> MessageWithSender {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match updates.recv().await {
                Ok(ChatEvent::NewMessage { message }) => return message,
                Ok(_) => continue,
                Err(e) => panic!("update channel failed: {e}"),
            }
        }
    })
    .await
    .expect("timed out waiting for a live message")
}

/// Keeps successive writes on distinct microsecond timestamps.
pub async fn tick() {
    tokio::time::sleep(Duration::from_millis(2)).await;
}
