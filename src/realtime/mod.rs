pub mod events;
pub mod live;

pub use events::ChatEvent;
pub use live::LiveConversation;
