use crate::config::EmbeddingConfig;
use crate::services::providers::EmbeddingProvider;
use anyhow::{Context, Result};
use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    content: &'a str,
    // Send both for compatibility
    input: &'a str,
    model: &'a str,
}

#[derive(Clone)]
pub struct EmbeddingService {
    client: Client,
    base_url: String,
    model: String,
    dimension: usize,
}

impl EmbeddingService {
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create embedding HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            dimension: config.dimension,
        })
    }

    async fn embed_internal(&self, text: &str) -> Result<Vec<f32>> {
        debug!("Generating embedding for {} chars", text.len());

        let request = EmbeddingRequest {
            content: text,
            input: text,
            model: &self.model,
        };

        let response = self
            .client
            .post(format!("{}/embedding", self.base_url))
            .json(&request)
            .send()
            .await
            .context("Failed to connect to embedding server")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Embedding API error ({}): {}", status, body);
        }

        let json_value: Value = response
            .json()
            .await
            .context("Failed to parse embedding response as JSON")?;

        let embedding = parse_embedding(&json_value)?;

        if embedding.is_empty() {
            anyhow::bail!("Generated embedding is empty");
        }

        if embedding.len() != self.dimension {
            anyhow::bail!(
                "Embedding dimension mismatch: expected {}, got {}",
                self.dimension,
                embedding.len()
            );
        }

        Ok(embedding)
    }
}

/// Accepts llama.cpp (`{"embedding": [...]}`), OpenAI (`{"data": [{"embedding": [...]}]}`)
/// and bare array shapes.
fn parse_embedding(value: &Value) -> Result<Vec<f32>> {
    fn floats(values: &[Value]) -> Vec<f32> {
        values
            .iter()
            .filter_map(|v| v.as_f64().map(|f| f as f32))
            .collect()
    }

    if let Some(arr) = value.as_array() {
        let first = arr
            .first()
            .context("Empty array returned from embedding server")?;
        if let Some(inner) = first.get("embedding").and_then(Value::as_array) {
            return Ok(floats(inner));
        }
        return Ok(floats(arr));
    }

    if let Some(inner) = value.get("embedding").and_then(Value::as_array) {
        return Ok(floats(inner));
    }

    if let Some(inner) = value
        .get("data")
        .and_then(Value::as_array)
        .and_then(|data| data.first())
        .and_then(|item| item.get("embedding"))
        .and_then(Value::as_array)
    {
        return Ok(floats(inner));
    }

    anyhow::bail!("Unrecognized embedding response format: {}", value)
}

#[async_trait::async_trait]
impl EmbeddingProvider for EmbeddingService {
    async fn encode(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_internal(text).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service(base_url: String, dimension: usize) -> EmbeddingService {
        EmbeddingService::new(&EmbeddingConfig {
            base_url,
            model: "all-MiniLM-L6-v2".to_string(),
            dimension,
            timeout_seconds: 5,
        })
        .unwrap()
    }

    #[test]
    fn test_parse_shapes() {
        assert_eq!(parse_embedding(&json!({"embedding": [0.5, 1.0]})).unwrap(), vec![0.5, 1.0]);
        assert_eq!(
            parse_embedding(&json!({"data": [{"embedding": [0.25]}]})).unwrap(),
            vec![0.25]
        );
        assert!(parse_embedding(&json!([])).is_err());
        assert_eq!(parse_embedding(&json!([1.0, 2.0])).unwrap(), vec![1.0, 2.0]);
        assert_eq!(
            parse_embedding(&json!([{"embedding": [3.0]}])).unwrap(),
            vec![3.0]
        );
        assert!(parse_embedding(&json!({"vector": [1.0]})).is_err());
    }

    #[tokio::test]
    async fn test_encode_llama_server_format() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embedding"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"embedding": [0.1, 0.2, 0.3]})))
            .mount(&server)
            .await;

        let embedding = service(server.uri(), 3).encode("hello").await.unwrap();
        assert_eq!(embedding.len(), 3);
    }

    #[tokio::test]
    async fn test_dimension_mismatch_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embedding"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"embedding": [0.1, 0.2]})))
            .mount(&server)
            .await;

        let err = service(server.uri(), 384).encode("hello").await.unwrap_err();
        assert!(err.to_string().contains("dimension mismatch"));
    }

    #[tokio::test]
    async fn test_server_error_is_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embedding"))
            .respond_with(ResponseTemplate::new(500).set_body_string("model not loaded"))
            .mount(&server)
            .await;

        assert!(service(server.uri(), 3).encode("hello").await.is_err());
    }
}
