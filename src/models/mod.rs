pub mod message;

pub use message::{ConversationView, Message, MessageStatus};
