pub mod settings;

pub use settings::{
    ConversationConfig, EmbeddingConfig, LlmConfig, PromptsConfig, ServerConfig, SessionConfig,
    Settings, VectorStoreConfig,
};
