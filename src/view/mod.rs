pub mod chat;
pub mod root;

pub use chat::{ChatCommand, ChatView, ViewOutcome};
pub use root::{AuthCommand, AuthView, Screen, select_screen};
