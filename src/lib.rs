//! Direct-messaging chat client.
//!
//! Lists people, opens or reuses a one-to-one conversation, shows its
//! history in order and follows new messages live. All persistence and
//! change delivery is delegated to a [`backend::Backend`].

pub mod backend;
pub mod config;
pub mod database;
pub mod models;
pub mod realtime;
pub mod services;
pub mod session;
pub mod state;
pub mod utils;
pub mod view;

pub use backend::Backend;
pub use database::SqliteBackend;
pub use session::ChatSession;
pub use utils::error::{BackendError, ChatError, ChatResult};
