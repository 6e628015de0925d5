//! Conversation orchestration.
//!
//! - `engine`: one stateless chat turn (retrieve, prompt, generate, summarize)
//! - `session`: optional server-side memory for the HTTP host (DashMap)

pub mod engine;
pub mod session;

pub use engine::{ConversationEngine, EngineConfig};
pub use session::{trim_window, SessionRegistry, SessionState};
