use crate::utils::error::{ChatError, ChatResult};

pub const DEFAULT_DATABASE_URL: &str = "sqlite://dmchat.db?mode=rwc";

/// Capacity of the change feed and of each session's update channel.
pub const DEFAULT_EVENT_BUFFER: usize = 1000;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    /// Username to sign in as without prompting.
    pub user: Option<String>,
    pub event_buffer: usize,
}

impl Config {
    /// Reads `DATABASE_URL`, `DMCHAT_USER` and `DMCHAT_EVENT_BUFFER`, after
    /// loading a `.env` file if one exists.
    pub fn from_env() -> ChatResult<Self> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> ChatResult<Self> {
        let database_url =
            lookup("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        let user = lookup("DMCHAT_USER")
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());

        let event_buffer = match lookup("DMCHAT_EVENT_BUFFER") {
            Some(raw) => raw.trim().parse::<usize>().map_err(|_| {
                ChatError::Validation(format!(
                    "DMCHAT_EVENT_BUFFER must be a number, got '{}'",
                    raw
                ))
            })?,
            None => DEFAULT_EVENT_BUFFER,
        };

        Ok(Self {
            database_url,
            user,
            event_buffer,
        })
    }
}
