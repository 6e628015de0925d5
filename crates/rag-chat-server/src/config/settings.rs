use anyhow::{Context, Result};
use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;

pub const DEFAULT_CONFIG_PATH: &str = "config/settings.toml";

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Settings {
    pub server: ServerConfig,
    pub embedding: EmbeddingConfig,
    pub vector_store: VectorStoreConfig,
    pub llm: LlmConfig,
    pub conversation: ConversationConfig,
    pub session: SessionConfig,
    #[serde(default)]
    pub prompts: PromptsConfig,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Empty list means permissive CORS.
    #[serde(default)]
    pub allowed_origins: Vec<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub model: String,
    pub dimension: usize,
    pub timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct VectorStoreConfig {
    /// Index host, e.g. `https://starbot-xxxx.svc.pinecone.io`
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    pub namespace: String,
    pub top_k: usize,
    pub timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct LlmConfig {
    pub base_url: String,
    #[serde(default)]
    pub api_key: String,
    pub primary_model: String,
    pub fallback_model: String,
    pub summarizer_model: String,
    /// Generation temperature for answers. Summaries always run at 0.0.
    pub temperature: f32,
    pub max_tokens: usize,
    pub timeout_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ConversationConfig {
    pub enable_summary: bool,
    /// Minimum number of caller-supplied recent messages before a summary refresh.
    pub summary_threshold: usize,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct SessionConfig {
    pub max_messages: usize,
    pub ttl_seconds: u64,
    pub sweep_interval_seconds: u64,
}

#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct PromptsConfig {
    pub system_prompt: Option<String>,
    pub fallback_message: Option<String>,
    pub greeting: Option<String>,
}

impl Settings {
    pub fn load() -> Result<Self> {
        Self::load_from(DEFAULT_CONFIG_PATH)
    }

    pub fn load_from(path: impl AsRef<Path>) -> Result<Self> {
        dotenvy::dotenv().ok();

        let path = path.as_ref();
        let config = Self::builder()?
            .add_source(File::from(path.to_path_buf()).required(true))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()
            .with_context(|| format!("Failed to read configuration from {}", path.display()))?;

        let settings: Settings = config.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Built-in defaults, layered under the settings file and environment.
    fn builder() -> Result<config::ConfigBuilder<config::builder::DefaultState>> {
        let builder = Config::builder()
            .set_default("server.host", "0.0.0.0")?
            .set_default("server.port", 8000)?
            .set_default("embedding.model", "sentence-transformers/all-MiniLM-L6-v2")?
            .set_default("embedding.dimension", 384)?
            .set_default("embedding.timeout_seconds", 30)?
            .set_default("vector_store.namespace", "starbot")?
            .set_default("vector_store.top_k", 3)?
            .set_default("vector_store.timeout_seconds", 15)?
            .set_default("llm.base_url", "https://api.groq.com/openai/v1")?
            .set_default("llm.temperature", 0.4)?
            .set_default("llm.max_tokens", 512)?
            .set_default("llm.timeout_seconds", 60)?
            .set_default("conversation.enable_summary", true)?
            .set_default("conversation.summary_threshold", 6)?
            .set_default("session.max_messages", 12)?
            .set_default("session.ttl_seconds", 3600)?
            .set_default("session.sweep_interval_seconds", 300)?;
        Ok(builder)
    }

    pub fn validate(&self) -> Result<()> {
        if self.embedding.dimension == 0 {
            anyhow::bail!("embedding.dimension must be greater than 0");
        }
        if self.vector_store.top_k == 0 {
            anyhow::bail!("vector_store.top_k must be greater than 0");
        }
        if !(self.llm.temperature > 0.0 && self.llm.temperature <= 2.0) {
            anyhow::bail!(
                "llm.temperature must be within (0.0, 2.0], got {}",
                self.llm.temperature
            );
        }
        if self.conversation.summary_threshold == 0 {
            anyhow::bail!("conversation.summary_threshold must be greater than 0");
        }
        if self.session.max_messages == 0 {
            anyhow::bail!("session.max_messages must be greater than 0");
        }
        Ok(())
    }
}
