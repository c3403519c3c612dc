use crate::utils::error::{ChatError, ChatResult};

pub const MAX_MESSAGE_CHARS: usize = 4000;
pub const MAX_USERNAME_CHARS: usize = 64;

fn is_printable_ascii(s: &str) -> bool {
    s.chars().all(|c| c.is_ascii() && !c.is_ascii_control())
}

pub fn validate_username(username: &str) -> ChatResult<()> {
    if username.is_empty() {
        return Err(ChatError::Validation("Username cannot be empty".to_string()));
    }

    if username.len() > MAX_USERNAME_CHARS {
        return Err(ChatError::Validation(format!(
            "Username must be at most {} characters long",
            MAX_USERNAME_CHARS
        )));
    }

    if !is_printable_ascii(username) || username.contains(char::is_whitespace) {
        return Err(ChatError::Validation(
            "Username must contain only printable ASCII characters and no spaces".to_string(),
        ));
    }

    Ok(())
}

/// Trims message content. `Ok(None)` means there is nothing to send.
pub fn normalize_message_content(content: &str) -> ChatResult<Option<String>> {
    let trimmed = content.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }

    if trimmed.chars().count() > MAX_MESSAGE_CHARS {
        return Err(ChatError::Validation(format!(
            "Message content must be at most {} characters long",
            MAX_MESSAGE_CHARS
        )));
    }

    Ok(Some(trimmed.to_string()))
}
