use std::sync::Arc;

use tracing::debug;

use crate::models::ConversationTurn;
use crate::services::providers::LlmProvider;
use crate::utils::error::ModelError;

pub const SUMMARY_PROMPT: &str = "Summarize the conversation so far in 3-5 concise lines.
Focus only on topics discussed and user intent.
Do not add new information or assumptions.
Keep the summary factual and neutral.";

/// Summaries must be reproducible for identical input.
pub const SUMMARY_TEMPERATURE: f32 = 0.0;

pub struct Summarizer {
    llm: Arc<dyn LlmProvider>,
}

impl Summarizer {
    pub fn new(llm: Arc<dyn LlmProvider>) -> Self {
        Self { llm }
    }

    pub async fn summarize(
        &self,
        previous_summary: Option<&str>,
        recent_messages: &[ConversationTurn],
    ) -> Result<String, ModelError> {
        let prompt = Self::build_prompt(previous_summary, recent_messages);
        debug!(
            "Summarizing {} messages (previous summary: {})",
            recent_messages.len(),
            previous_summary.is_some()
        );

        let response = self.llm.invoke(&prompt, SUMMARY_TEMPERATURE).await?;
        Ok(response.trim().to_string())
    }

    pub fn build_prompt(
        previous_summary: Option<&str>,
        recent_messages: &[ConversationTurn],
    ) -> String {
        let mut summary_input = String::new();

        if let Some(previous) = previous_summary.filter(|s| !s.trim().is_empty()) {
            summary_input.push_str(&format!("Previous summary:\n{}\n\n", previous));
        }

        summary_input.push_str("Recent messages:\n");
        for msg in recent_messages {
            summary_input.push_str(&format!("{}: {}\n", msg.role.label(), msg.content));
        }

        format!("{}\n\n{}", SUMMARY_PROMPT, summary_input)
    }
}
