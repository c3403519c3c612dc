use thiserror::Error;

use crate::backend::Collection;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Migration error: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Row decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Unknown column '{column}' on {collection}")]
    UnknownColumn {
        collection: Collection,
        column: String,
    },

    #[error("Conflict on {0}: row violates a uniqueness constraint")]
    Conflict(Collection),

    #[error("No row with id {id} in {collection}")]
    NotFound { collection: Collection, id: String },

    #[error("Subscription closed")]
    SubscriptionClosed,
}

pub type BackendResult<T> = Result<T, BackendError>;

#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl ChatError {
    /// Logs the error at a level matching its kind and returns the text the
    /// presentation layer should show for it.
    pub fn report(&self) -> String {
        match self {
            ChatError::Backend(e) => {
                tracing::error!("Backend error: {}", e);
                "Request failed, showing the last known state".to_string()
            }
            ChatError::NotFound(msg) => {
                tracing::debug!("Not found: {}", msg);
                msg.clone()
            }
            ChatError::Validation(msg) => msg.clone(),
            ChatError::Forbidden(msg) => {
                tracing::debug!("Forbidden: {}", msg);
                msg.clone()
            }
            ChatError::Internal(msg) => {
                tracing::error!("Internal error: {}", msg);
                msg.clone()
            }
        }
    }
}

pub type ChatResult<T> = Result<T, ChatError>;
