pub mod conversation;
pub mod messaging;
pub mod profile;
