use serde::{Deserialize, Serialize};

use crate::utils::helpers::initial;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    pub id: String,
    pub user_id: String,
    pub username: String,
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateProfileRequest {
    pub user_id: String,
    pub username: String,
    pub display_name: Option<String>,
}

impl Profile {
    /// Display name when set and non-blank, otherwise the username.
    pub fn label(&self) -> &str {
        match self.display_name.as_deref() {
            Some(name) if !name.trim().is_empty() => name,
            _ => &self.username,
        }
    }

    pub fn handle(&self) -> String {
        format!("@{}", self.username)
    }

    pub fn avatar(&self) -> String {
        initial(&self.username)
    }
}
