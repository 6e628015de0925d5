pub mod chat;

pub use chat::{ChatTurnResult, ContextSnippet, ConversationTurn, Role};
