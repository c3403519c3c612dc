use chrono::{DateTime, Utc};
use std::fmt::Write as _;

use crate::backend::Backend;
use crate::services::profile::find_profile_by_username;
use crate::session::ChatSession;
use crate::state::ChatState;
use crate::utils::error::{ChatError, ChatResult};
use crate::utils::helpers::relative_time;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChatCommand {
    Users,
    Chats,
    Open(usize),
    With(String),
    Refresh,
    Help,
    Logout,
    Quit,
    Send(String),
}

impl ChatCommand {
    pub fn parse(line: &str) -> Result<Option<Self>, String> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(None);
        }
        if !trimmed.starts_with('/') {
            return Ok(Some(ChatCommand::Send(line.to_string())));
        }

        let (head, rest) = match trimmed.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (trimmed, ""),
        };

        let command = match head {
            "/users" => ChatCommand::Users,
            "/chats" => ChatCommand::Chats,
            "/refresh" => ChatCommand::Refresh,
            "/help" => ChatCommand::Help,
            "/logout" => ChatCommand::Logout,
            "/quit" => ChatCommand::Quit,
            "/open" => {
                let index = rest
                    .parse::<usize>()
                    .ok()
                    .filter(|n| *n > 0)
                    .ok_or_else(|| "Usage: /open <number>".to_string())?;
                ChatCommand::Open(index)
            }
            "/with" if !rest.is_empty() => ChatCommand::With(rest.to_string()),
            "/with" => return Err("Usage: /with <username>".to_string()),
            _ => return Err(format!("Unknown command '{}', try /help", head)),
        };

        Ok(Some(command))
    }
}

pub const CHAT_HELP: &str = "\
  /users            list people to start a conversation with
  /chats            list your conversations
  /open <n>         open entry n of the list shown
  /with <username>  open the conversation with someone
  /refresh          reload users and conversations
  /logout           sign out
  /quit             exit
Anything else is sent to the open conversation.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ViewOutcome {
    Continue,
    Logout,
    Quit,
}

/// Chat screen: turns commands into session calls and the session state into
/// text.
pub struct ChatView<B: Backend> {
    session: ChatSession<B>,
    show_user_list: bool,
    status: Option<String>,
}

impl<B: Backend> ChatView<B> {
    pub fn new(session: ChatSession<B>) -> Self {
        Self {
            session,
            show_user_list: false,
            status: None,
        }
    }

    pub fn session(&self) -> &ChatSession<B> {
        &self.session
    }

    pub fn status(&self) -> Option<&str> {
        self.status.as_deref()
    }

    pub fn showing_users(&self) -> bool {
        self.show_user_list
    }

    fn surface(&mut self, result: ChatResult<()>) {
        self.status = result.err().map(|e| e.report());
    }

    pub async fn mount(&mut self) {
        let result = self.session.start().await;
        self.surface(result);
    }

    pub fn unmount(&mut self) {
        self.session.shutdown();
    }

    pub async fn handle(&mut self, command: ChatCommand) -> ViewOutcome {
        self.status = None;
        match command {
            ChatCommand::Quit => return ViewOutcome::Quit,
            ChatCommand::Logout => {
                self.unmount();
                return ViewOutcome::Logout;
            }
            ChatCommand::Help => self.status = Some(CHAT_HELP.to_string()),
            ChatCommand::Users => {
                self.show_user_list = true;
                let result = self.session.fetch_users().await;
                self.surface(result);
            }
            ChatCommand::Chats => {
                self.show_user_list = false;
                let result = self.session.fetch_conversations().await;
                self.surface(result);
            }
            ChatCommand::Refresh => {
                let result = self.session.start().await;
                self.surface(result);
            }
            ChatCommand::Open(index) => {
                let result = self.open(index).await;
                self.surface(result);
            }
            ChatCommand::With(username) => {
                let result = self.open_with(&username).await;
                self.surface(result);
            }
            ChatCommand::Send(content) => {
                let result = self.send(&content).await;
                self.surface(result);
            }
        }
        ViewOutcome::Continue
    }

    async fn open(&mut self, index: usize) -> ChatResult<()> {
        let state = self.session.snapshot().await;

        if self.show_user_list {
            let user = index
                .checked_sub(1)
                .and_then(|i| state.users.get(i))
                .ok_or_else(|| ChatError::NotFound(format!("No user #{}", index)))?;
            self.session.start_chat_with_user(&user.user_id).await?;
            self.show_user_list = false;
        } else {
            let conversation = index
                .checked_sub(1)
                .and_then(|i| state.conversations.get(i))
                .ok_or_else(|| ChatError::NotFound(format!("No conversation #{}", index)))?;
            self.session.select_conversation(conversation.id()).await?;
        }
        Ok(())
    }

    async fn open_with(&mut self, username: &str) -> ChatResult<()> {
        let listed = self
            .session
            .snapshot()
            .await
            .users
            .into_iter()
            .find(|u| u.username == username);

        let profile = match listed {
            Some(profile) => profile,
            None => find_profile_by_username(self.session.backend().as_ref(), username)
                .await?
                .ok_or_else(|| ChatError::NotFound(format!("No user named '{}'", username)))?,
        };

        self.session.start_chat_with_user(&profile.user_id).await?;
        self.show_user_list = false;
        Ok(())
    }

    async fn send(&mut self, content: &str) -> ChatResult<()> {
        let active = self.session.snapshot().await.active_conversation;
        let Some(conversation_id) = active else {
            return Err(ChatError::Validation(
                "Select a conversation or start a new one first".to_string(),
            ));
        };
        self.session.send_message(&conversation_id, content).await?;
        Ok(())
    }

    pub async fn render_now(&self) -> String {
        let state = self.session.snapshot().await;
        self.render(&state, Utc::now())
    }

    pub fn render(&self, state: &ChatState, now: DateTime<Utc>) -> String {
        let mut out = String::new();
        let me = self.session.current_user();

        if let Some(me) = me {
            let _ = writeln!(out, "[{}] {} {}", me.avatar(), me.label(), me.handle());
        }
        let _ = writeln!(out, "{}", "-".repeat(40));

        if self.show_user_list {
            let _ = writeln!(out, "Start a conversation");
            if state.users.is_empty() {
                let _ = writeln!(out, "  (nobody else here yet)");
            }
            for (i, user) in state.users.iter().enumerate() {
                let _ = writeln!(
                    out,
                    "  {}. [{}] {} {}",
                    i + 1,
                    user.avatar(),
                    user.label(),
                    user.handle()
                );
            }
        } else {
            let _ = writeln!(out, "Conversations");
            if state.conversations.is_empty() {
                let _ = writeln!(out, "  (none yet, /users to find someone)");
            }
            for (i, conversation) in state.conversations.iter().enumerate() {
                let marker = if state.is_active(conversation.id()) { '*' } else { ' ' };
                let handle = conversation
                    .other_user
                    .as_ref()
                    .map(|p| p.handle())
                    .unwrap_or_default();
                let _ = writeln!(out, "{} {}. {} {}", marker, i + 1, conversation.title(), handle);
            }
        }
        let _ = writeln!(out, "{}", "-".repeat(40));

        match &state.active_conversation {
            Some(_) => {
                if let Some(active) = state.active_conversation_data() {
                    let handle = active
                        .other_user
                        .as_ref()
                        .map(|p| p.handle())
                        .unwrap_or_default();
                    let _ = writeln!(out, "Chat with {} {}", active.title(), handle);
                }

                if state.loading {
                    let _ = writeln!(out, "  Loading messages...");
                } else if state.messages.is_empty() {
                    let _ = writeln!(out, "  No messages yet. Say hi!");
                }

                for message in &state.messages {
                    let when = message
                        .message
                        .sent_at()
                        .map(|at| relative_time(at, now))
                        .unwrap_or_default();
                    let own = me.is_some_and(|me| message.is_from(&me.user_id));
                    if own {
                        let _ = writeln!(out, "{:>40} ({})", message.message.content, when);
                    } else {
                        let sender = message.sender.as_ref().map(|p| p.label()).unwrap_or("?");
                        let _ = writeln!(out, "{}: {} ({})", sender, message.message.content, when);
                    }
                }
            }
            None => {
                let _ = writeln!(out, "Welcome to Chat");
                let _ = writeln!(
                    out,
                    "Select a conversation or start a new one to begin messaging."
                );
            }
        }

        if let Some(status) = &self.status {
            let _ = writeln!(out, "{}", "-".repeat(40));
            let _ = writeln!(out, "{}", status);
        }

        out
    }
}
