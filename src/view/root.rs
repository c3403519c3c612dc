use std::sync::Arc;
use uuid::Uuid;

use crate::backend::Backend;
use crate::models::profile::{CreateProfileRequest, Profile};
use crate::services::profile::{create_profile, find_profile_by_username};
use crate::utils::error::{ChatError, ChatResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Screen {
    Loading,
    Auth,
    Chat,
}

pub fn select_screen(loading: bool, user: Option<&Profile>) -> Screen {
    match (loading, user) {
        (true, _) => Screen::Loading,
        (false, Some(_)) => Screen::Chat,
        (false, None) => Screen::Auth,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthCommand {
    SignIn(String),
    SignUp {
        username: String,
        display_name: Option<String>,
    },
    Help,
    Quit,
}

impl AuthCommand {
    pub fn parse(line: &str) -> Result<Self, String> {
        let line = line.trim();
        let (head, rest) = match line.split_once(char::is_whitespace) {
            Some((head, rest)) => (head, rest.trim()),
            None => (line, ""),
        };

        match head {
            "" => Err("Enter a username".to_string()),
            "/quit" => Ok(AuthCommand::Quit),
            "/help" => Ok(AuthCommand::Help),
            "/signin" if !rest.is_empty() => Ok(AuthCommand::SignIn(rest.to_string())),
            "/signup" if !rest.is_empty() => {
                let (username, display_name) = match rest.split_once(char::is_whitespace) {
                    Some((username, name)) => (username, Some(name.trim().to_string())),
                    None => (rest, None),
                };
                Ok(AuthCommand::SignUp {
                    username: username.to_string(),
                    display_name,
                })
            }
            "/signin" | "/signup" => Err(format!("Usage: {} <username>", head)),
            name if !name.starts_with('/') && rest.is_empty() => {
                Ok(AuthCommand::SignIn(name.to_string()))
            }
            _ => Err(format!("Unknown command '{}'", head)),
        }
    }
}

pub const AUTH_HELP: &str = "\
Sign in to start chatting.
  <username>                        sign in
  /signin <username>                sign in
  /signup <username> [display name] create a profile and sign in
  /quit                             exit";

/// Sign-in screen. Credentials are the hosted service's concern; here a
/// profile is picked by username.
pub struct AuthView<B: Backend> {
    backend: Arc<B>,
}

impl<B: Backend> AuthView<B> {
    pub fn new(backend: Arc<B>) -> Self {
        Self { backend }
    }

    pub async fn sign_in(&self, username: &str) -> ChatResult<Profile> {
        let profile = find_profile_by_username(self.backend.as_ref(), username.trim())
            .await?
            .ok_or_else(|| ChatError::NotFound(format!("No user named '{}'", username.trim())))?;
        tracing::info!("Signed in as {}", profile.username);
        Ok(profile)
    }

    pub async fn sign_up(
        &self,
        username: &str,
        display_name: Option<String>,
    ) -> ChatResult<Profile> {
        create_profile(
            self.backend.as_ref(),
            CreateProfileRequest {
                user_id: Uuid::new_v4().to_string(),
                username: username.trim().to_string(),
                display_name,
            },
        )
        .await
    }
}
