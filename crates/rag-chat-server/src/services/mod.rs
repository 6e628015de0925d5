pub mod conversation;
pub mod embedding_service;
pub mod indexer;
pub mod llm_service;
pub mod prompt;
pub mod providers;
pub mod retriever;
pub mod summarizer;
pub mod vector_store;

pub use conversation::{ConversationEngine, EngineConfig, SessionRegistry};
pub use embedding_service::EmbeddingService;
pub use indexer::IndexRebuilder;
pub use llm_service::LlmService;
pub use prompt::PromptBuilder;
pub use providers::{EmbeddingProvider, LlmProvider, VectorSearchProvider};
pub use retriever::Retriever;
pub use summarizer::Summarizer;
pub use vector_store::VectorStoreService;
