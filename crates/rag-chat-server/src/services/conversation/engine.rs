use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use tracing::{debug, error, info, warn};

use crate::config::Settings;
use crate::models::{ChatTurnResult, ConversationTurn};
use crate::services::embedding_service::EmbeddingService;
use crate::services::llm_service::LlmService;
use crate::services::prompt::{PromptBuilder, FALLBACK_MESSAGE};
use crate::services::providers::LlmProvider;
use crate::services::retriever::Retriever;
use crate::services::summarizer::Summarizer;
use crate::services::vector_store::VectorStoreService;
use crate::utils::error::{ChatError, ModelError};

/// Tunables for a chat turn.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    pub enable_summary: bool,
    pub summary_threshold: usize,
    /// Answer temperature: low but non-zero.
    pub temperature: f32,
    pub fallback_message: String,
}

impl EngineConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            enable_summary: settings.conversation.enable_summary,
            summary_threshold: settings.conversation.summary_threshold,
            temperature: settings.llm.temperature,
            fallback_message: settings
                .prompts
                .fallback_message
                .clone()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| FALLBACK_MESSAGE.to_string()),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            enable_summary: true,
            summary_threshold: 6,
            temperature: 0.4,
            fallback_message: FALLBACK_MESSAGE.to_string(),
        }
    }
}

/// Runs one stateless chat turn: retrieve, build prompt, generate (with a
/// single fallback on rate limiting), then maybe refresh the summary.
///
/// Holds no per-conversation state, so one instance is shared by every
/// concurrent turn.
pub struct ConversationEngine {
    retriever: Retriever,
    prompt_builder: PromptBuilder,
    summarizer: Summarizer,
    primary: Arc<dyn LlmProvider>,
    fallback: Arc<dyn LlmProvider>,
    config: EngineConfig,
}

impl ConversationEngine {
    pub fn new(
        retriever: Retriever,
        prompt_builder: PromptBuilder,
        summarizer: Summarizer,
        primary: Arc<dyn LlmProvider>,
        fallback: Arc<dyn LlmProvider>,
        config: EngineConfig,
    ) -> Self {
        Self {
            retriever,
            prompt_builder,
            summarizer,
            primary,
            fallback,
            config,
        }
    }

    /// Wire the HTTP-backed providers described by `settings`.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let embedder = Arc::new(EmbeddingService::new(&settings.embedding)?);
        let index = Arc::new(VectorStoreService::new(&settings.vector_store)?);
        let retriever = Retriever::from_config(embedder, index, &settings.vector_store);

        let client = LlmService::build_client(&settings.llm)?;
        let primary = Arc::new(LlmService::new(
            client.clone(),
            &settings.llm,
            settings.llm.primary_model.clone(),
        ));
        let fallback = Arc::new(LlmService::new(
            client.clone(),
            &settings.llm,
            settings.llm.fallback_model.clone(),
        ));
        let summarizer_llm = Arc::new(LlmService::new(
            client,
            &settings.llm,
            settings.llm.summarizer_model.clone(),
        ));

        info!(
            "Models: primary={}, fallback={}, summarizer={}",
            primary.model(),
            fallback.model(),
            summarizer_llm.model()
        );

        Ok(Self::new(
            retriever,
            PromptBuilder::with_override(settings.prompts.system_prompt.as_deref()),
            Summarizer::new(summarizer_llm),
            primary,
            fallback,
            EngineConfig::from_settings(settings),
        ))
    }

    pub fn fallback_message(&self) -> &str {
        &self.config.fallback_message
    }

    pub async fn chat(
        &self,
        question: &str,
        recent_messages: &[ConversationTurn],
        summary: Option<String>,
    ) -> Result<ChatTurnResult, ChatError> {
        let start_time = Instant::now();

        let contexts = self.retriever.retrieve(question).await;

        if contexts.is_empty() {
            info!("No grounding context found, returning fallback message");
            return Ok(ChatTurnResult {
                answer: self.config.fallback_message.clone(),
                updated_summary: summary,
            });
        }

        let context_blocks: Vec<&str> = contexts.iter().map(|c| c.text.as_str()).collect();
        let prompt = self
            .prompt_builder
            .build(&context_blocks, summary.as_deref(), question);
        debug!(
            "Prompt built: {} chars, {} context blocks",
            prompt.len(),
            context_blocks.len()
        );

        let answer = self.generate(&prompt).await?.trim().to_string();

        let updated_summary = if self.should_summarize(recent_messages.len()) {
            match self
                .summarizer
                .summarize(summary.as_deref(), recent_messages)
                .await
            {
                Ok(fresh) => {
                    debug!("Summary refreshed from {} messages", recent_messages.len());
                    Some(fresh)
                }
                Err(e) => {
                    warn!("Summarization failed, keeping previous summary: {}", e);
                    summary
                }
            }
        } else {
            summary
        };

        info!(
            "Chat turn completed in {}ms ({} context snippets)",
            start_time.elapsed().as_millis(),
            contexts.len()
        );

        Ok(ChatTurnResult {
            answer,
            updated_summary,
        })
    }

    /// Primary model first; exactly one fallback attempt on a rate-limit-class error.
    async fn generate(&self, prompt: &str) -> Result<String, ModelError> {
        match self.primary.invoke(prompt, self.config.temperature).await {
            Ok(answer) => Ok(answer),
            Err(e) if e.is_rate_limit_class() => {
                warn!("Primary model unavailable ({}), using fallback model", e);
                self.fallback
                    .invoke(prompt, self.config.temperature)
                    .await
                    .map_err(|e| {
                        error!("Fallback model failed: {}", e);
                        e
                    })
            }
            Err(e) => {
                error!("Primary model failed: {}", e);
                Err(e)
            }
        }
    }

    fn should_summarize(&self, recent_count: usize) -> bool {
        self.config.enable_summary && recent_count >= self.config.summary_threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::providers::{
        MatchMetadata, MockEmbeddingProvider, MockLlmProvider, MockVectorSearchProvider,
        VectorMatch,
    };
    use std::sync::Mutex;

    fn retriever_with(texts: Vec<&'static str>) -> Retriever {
        let mut embedder = MockEmbeddingProvider::new();
        embedder.expect_encode().returning(|_| Ok(vec![0.1; 4]));

        let mut index = MockVectorSearchProvider::new();
        index.expect_query().returning(move |_, _, _, _| {
            Ok(texts
                .iter()
                .enumerate()
                .map(|(i, text)| VectorMatch {
                    id: format!("doc-{}", i),
                    score: 0.9 - i as f32 * 0.1,
                    metadata: Some(MatchMetadata {
                        text: Some(text.to_string()),
                        tags: vec![],
                    }),
                })
                .collect())
        });

        Retriever::new(Arc::new(embedder), Arc::new(index), "starbot", 3)
    }

    fn unused_llm() -> MockLlmProvider {
        let mut llm = MockLlmProvider::new();
        llm.expect_invoke().times(0);
        llm
    }

    fn answering_llm(answer: &'static str, seen: Arc<Mutex<Vec<String>>>) -> MockLlmProvider {
        let mut llm = MockLlmProvider::new();
        llm.expect_invoke().times(1).returning(move |prompt, _| {
            seen.lock().unwrap().push(prompt.to_string());
            Ok(answer.to_string())
        });
        llm
    }

    fn engine(
        retriever: Retriever,
        primary: MockLlmProvider,
        fallback: MockLlmProvider,
        summarizer: MockLlmProvider,
        config: EngineConfig,
    ) -> ConversationEngine {
        ConversationEngine::new(
            retriever,
            PromptBuilder::default(),
            Summarizer::new(Arc::new(summarizer)),
            Arc::new(primary),
            Arc::new(fallback),
            config,
        )
    }

    fn history(n: usize) -> Vec<ConversationTurn> {
        (0..n)
            .map(|i| {
                if i % 2 == 0 {
                    ConversationTurn::user(format!("question {}", i))
                } else {
                    ConversationTurn::assistant(format!("answer {}", i))
                }
            })
            .collect()
    }

    #[tokio::test]
    async fn test_empty_context_short_circuits_without_model_calls() {
        let engine = engine(
            retriever_with(vec![]),
            unused_llm(),
            unused_llm(),
            unused_llm(),
            EngineConfig::default(),
        );

        let result = engine
            .chat("tell me something unrelated", &history(8), Some("prior".to_string()))
            .await
            .unwrap();

        assert_eq!(result.answer, FALLBACK_MESSAGE);
        assert_eq!(result.updated_summary.as_deref(), Some("prior"));
    }

    #[tokio::test]
    async fn test_unrelated_question_without_summary() {
        let engine = engine(
            retriever_with(vec![]),
            unused_llm(),
            unused_llm(),
            unused_llm(),
            EngineConfig::default(),
        );

        let result = engine.chat("tell me something unrelated", &[], None).await.unwrap();
        assert_eq!(result.answer, FALLBACK_MESSAGE);
        assert_eq!(result.updated_summary, None);
    }

    #[tokio::test]
    async fn test_configured_fallback_message() {
        let config = EngineConfig {
            fallback_message: "Nothing on that yet.".to_string(),
            ..EngineConfig::default()
        };
        let engine = engine(retriever_with(vec![]), unused_llm(), unused_llm(), unused_llm(), config);

        let result = engine.chat("?", &[], None).await.unwrap();
        assert_eq!(result.answer, "Nothing on that yet.");
        assert_eq!(engine.fallback_message(), "Nothing on that yet.");
    }

    #[tokio::test]
    async fn test_grounded_answer_uses_snippet_text() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let engine = engine(
            retriever_with(vec!["Built X, a tool for Y"]),
            answering_llm("  I built X, a tool for Y.\n", seen.clone()),
            unused_llm(),
            unused_llm(),
            EngineConfig::default(),
        );

        let result = engine
            .chat("What projects have you built?", &[], None)
            .await
            .unwrap();

        assert_eq!(result.answer, "I built X, a tool for Y.");
        assert_eq!(result.updated_summary, None);
        let prompts = seen.lock().unwrap();
        assert!(prompts[0].contains("Built X, a tool for Y"));
    }

    #[tokio::test]
    async fn test_prompt_orders_policy_summary_context_question() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let engine = engine(
            retriever_with(vec!["first snippet", "second snippet"]),
            answering_llm("ok", seen.clone()),
            unused_llm(),
            unused_llm(),
            EngineConfig::default(),
        );

        engine
            .chat("Which tools?", &[], Some("Visitor likes Rust.".to_string()))
            .await
            .unwrap();

        let prompts = seen.lock().unwrap();
        let prompt = &prompts[0];
        let positions: Vec<usize> = [
            "Answering Rules:",
            "Response Length:",
            "Visitor likes Rust.",
            "first snippet",
            "second snippet",
            "User Question:\nWhich tools?",
        ]
        .iter()
        .map(|needle| prompt.find(needle).unwrap())
        .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test]
    async fn test_rate_limited_primary_falls_back_once_with_same_prompt() {
        let primary_seen = Arc::new(Mutex::new(Vec::new()));
        let fallback_seen = Arc::new(Mutex::new(Vec::new()));

        let mut primary = MockLlmProvider::new();
        let recorder = primary_seen.clone();
        primary.expect_invoke().times(1).returning(move |prompt, _| {
            recorder.lock().unwrap().push(prompt.to_string());
            Err(ModelError::RateLimited { retry_after_ms: Some(1000) })
        });

        let engine = engine(
            retriever_with(vec!["Built X"]),
            primary,
            answering_llm(" from fallback ", fallback_seen.clone()),
            unused_llm(),
            EngineConfig::default(),
        );

        let result = engine.chat("What did you build?", &[], None).await.unwrap();

        assert_eq!(result.answer, "from fallback");
        assert_eq!(*primary_seen.lock().unwrap(), *fallback_seen.lock().unwrap());
    }

    #[tokio::test]
    async fn test_primary_timeout_also_falls_back() {
        let mut primary = MockLlmProvider::new();
        primary
            .expect_invoke()
            .times(1)
            .returning(|_, _| Err(ModelError::Timeout));

        let engine = engine(
            retriever_with(vec!["Built X"]),
            primary,
            answering_llm("fallback answer", Arc::new(Mutex::new(Vec::new()))),
            unused_llm(),
            EngineConfig::default(),
        );

        let result = engine.chat("q", &[], None).await.unwrap();
        assert_eq!(result.answer, "fallback answer");
    }

    #[tokio::test]
    async fn test_other_primary_errors_propagate_without_fallback() {
        let mut primary = MockLlmProvider::new();
        primary.expect_invoke().times(1).returning(|_, _| {
            Err(ModelError::Provider {
                status: Some(401),
                message: "invalid api key".to_string(),
            })
        });

        let engine = engine(
            retriever_with(vec!["Built X"]),
            primary,
            unused_llm(),
            unused_llm(),
            EngineConfig::default(),
        );

        let err = engine.chat("q", &history(6), None).await.unwrap_err();
        assert!(matches!(err, ChatError::Model(ModelError::Provider { .. })));
    }

    #[tokio::test]
    async fn test_fallback_failure_is_hard_failure() {
        let mut primary = MockLlmProvider::new();
        primary
            .expect_invoke()
            .times(1)
            .returning(|_, _| Err(ModelError::RateLimited { retry_after_ms: None }));
        let mut fallback = MockLlmProvider::new();
        fallback
            .expect_invoke()
            .times(1)
            .returning(|_, _| Err(ModelError::RateLimited { retry_after_ms: None }));

        let engine = engine(
            retriever_with(vec!["Built X"]),
            primary,
            fallback,
            unused_llm(),
            EngineConfig::default(),
        );

        assert!(engine.chat("q", &[], None).await.is_err());
    }

    #[tokio::test]
    async fn test_summary_disabled_keeps_summary() {
        let config = EngineConfig {
            enable_summary: false,
            ..EngineConfig::default()
        };
        let engine = engine(
            retriever_with(vec!["Built X"]),
            answering_llm("answer", Arc::new(Mutex::new(Vec::new()))),
            unused_llm(),
            unused_llm(),
            config,
        );

        let result = engine
            .chat("q", &history(20), Some("kept".to_string()))
            .await
            .unwrap();
        assert_eq!(result.updated_summary.as_deref(), Some("kept"));
    }

    #[tokio::test]
    async fn test_below_threshold_skips_summarizer() {
        let engine = engine(
            retriever_with(vec!["Built X"]),
            answering_llm("answer", Arc::new(Mutex::new(Vec::new()))),
            unused_llm(),
            unused_llm(),
            EngineConfig::default(),
        );

        let result = engine.chat("q", &history(5), None).await.unwrap();
        assert_eq!(result.updated_summary, None);
    }

    #[tokio::test]
    async fn test_threshold_reached_refreshes_summary() {
        let mut summarizer = MockLlmProvider::new();
        summarizer
            .expect_invoke()
            .withf(|prompt, temperature| {
                *temperature == 0.0
                    && prompt.contains("Previous summary:\nold")
                    && prompt.contains("USER: question 0")
                    && prompt.contains("ASSISTANT: answer 5")
            })
            .times(1)
            .returning(|_, _| Ok(" new summary ".to_string()));

        let engine = engine(
            retriever_with(vec!["Built X"]),
            answering_llm("answer", Arc::new(Mutex::new(Vec::new()))),
            unused_llm(),
            summarizer,
            EngineConfig::default(),
        );

        let result = engine
            .chat("q", &history(6), Some("old".to_string()))
            .await
            .unwrap();
        assert_eq!(result.answer, "answer");
        assert_eq!(result.updated_summary.as_deref(), Some("new summary"));
    }

    #[tokio::test]
    async fn test_summarizer_failure_keeps_previous_summary() {
        let mut summarizer = MockLlmProvider::new();
        summarizer
            .expect_invoke()
            .times(1)
            .returning(|_, _| Err(ModelError::Timeout));

        let engine = engine(
            retriever_with(vec!["Built X"]),
            answering_llm("answer", Arc::new(Mutex::new(Vec::new()))),
            unused_llm(),
            summarizer,
            EngineConfig::default(),
        );

        let result = engine
            .chat("q", &history(7), Some("old".to_string()))
            .await
            .unwrap();
        assert_eq!(result.answer, "answer");
        assert_eq!(result.updated_summary.as_deref(), Some("old"));
    }

    #[tokio::test]
    async fn test_answer_temperature_is_configured_value() {
        let mut primary = MockLlmProvider::new();
        primary
            .expect_invoke()
            .withf(|_, temperature| (*temperature - 0.4).abs() < f32::EPSILON)
            .times(1)
            .returning(|_, _| Ok("answer".to_string()));

        let engine = engine(
            retriever_with(vec!["Built X"]),
            primary,
            unused_llm(),
            unused_llm(),
            EngineConfig::default(),
        );

        engine.chat("q", &[], None).await.unwrap();
    }
}
