pub mod chat;

pub use chat::{ChatState, SharedState};
