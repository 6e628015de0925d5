use crate::config::LlmConfig;
use crate::services::providers::LlmProvider;
use crate::utils::error::ModelError;
use anyhow::{Context, Result};
use reqwest::{header::RETRY_AFTER, Client, StatusCode};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: [CompletionMessage<'a>; 1],
    max_tokens: usize,
    temperature: f32,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct CompletionMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: Message,
}

#[derive(Debug, Deserialize)]
struct Message {
    content: Option<String>,
}

/// One hosted model behind an OpenAI-compatible `/chat/completions` endpoint.
#[derive(Clone)]
pub struct LlmService {
    client: Client,
    base_url: String,
    api_key: String,
    model: String,
    max_tokens: usize,
}

impl LlmService {
    /// Shared HTTP client for every model role.
    pub fn build_client(config: &LlmConfig) -> Result<Client> {
        Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create LLM HTTP client")
    }

    pub fn new(client: Client, config: &LlmConfig, model: impl Into<String>) -> Self {
        Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: model.into(),
            max_tokens: config.max_tokens,
        }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    async fn generate(&self, prompt: &str, temperature: f32) -> Result<String, ModelError> {
        debug!(model = %self.model, "Calling model with {} prompt chars", prompt.len());

        let request = ChatCompletionRequest {
            model: &self.model,
            messages: [CompletionMessage {
                role: "user",
                content: prompt,
            }],
            max_tokens: self.max_tokens,
            temperature,
            stream: false,
        };

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after_ms = response
                .headers()
                .get(RETRY_AFTER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<f64>().ok())
                .map(|secs| (secs * 1000.0) as u64);
            return Err(ModelError::RateLimited { retry_after_ms });
        }

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ModelError::Provider {
                status: Some(status.as_u16()),
                message: body,
            });
        }

        let chat_response: ChatCompletionResponse =
            response.json().await.map_err(|e| {
                if e.is_timeout() {
                    ModelError::Timeout
                } else {
                    ModelError::InvalidResponse(e.to_string())
                }
            })?;

        let choice = chat_response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| ModelError::InvalidResponse("no choices returned".to_string()))?;

        choice.message.content.ok_or(ModelError::EmptyResponse)
    }
}

fn map_transport_error(err: reqwest::Error) -> ModelError {
    if err.is_timeout() {
        ModelError::Timeout
    } else {
        ModelError::Provider {
            status: err.status().map(|s| s.as_u16()),
            message: format!("Failed to call LLM API: {}", err),
        }
    }
}

#[async_trait::async_trait]
impl LlmProvider for LlmService {
    async fn invoke(&self, prompt: &str, temperature: f32) -> Result<String, ModelError> {
        self.generate(prompt, temperature).await
    }
}
