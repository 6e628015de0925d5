use crate::config::VectorStoreConfig;
use crate::services::providers::{VectorMatch, VectorRecord, VectorSearchProvider};
use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct QueryRequest<'a> {
    vector: &'a [f32],
    top_k: usize,
    include_metadata: bool,
    namespace: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DeleteRequest<'a> {
    delete_all: bool,
    namespace: &'a str,
}

#[derive(Debug, Serialize)]
struct UpsertRequest<'a> {
    vectors: &'a [VectorRecord],
    namespace: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UpsertResponse {
    #[serde(default)]
    upserted_count: usize,
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    matches: Vec<VectorMatch>,
}

/// Client for a Pinecone-compatible index `/query` endpoint.
#[derive(Clone)]
pub struct VectorStoreService {
    client: Client,
    base_url: String,
    api_key: String,
}

impl VectorStoreService {
    pub fn new(config: &VectorStoreConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_seconds))
            .build()
            .context("Failed to create vector store HTTP client")?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        })
    }

    async fn post<B: Serialize + ?Sized>(&self, endpoint: &str, body: &B) -> Result<reqwest::Response> {
        let response = self
            .client
            .post(format!("{}{}", self.base_url, endpoint))
            .header("Api-Key", &self.api_key)
            .json(body)
            .send()
            .await
            .context("Failed to connect to vector store")?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Vector store error on {} ({}): {}", endpoint, status, body);
        }

        Ok(response)
    }
}

#[async_trait::async_trait]
impl VectorSearchProvider for VectorStoreService {
    async fn query(
        &self,
        embedding: &[f32],
        top_k: usize,
        include_metadata: bool,
        namespace: &str,
    ) -> Result<Vec<VectorMatch>> {
        let request = QueryRequest {
            vector: embedding,
            top_k,
            include_metadata,
            namespace,
        };

        let parsed: QueryResponse = self
            .post("/query", &request)
            .await?
            .json()
            .await
            .context("Failed to parse vector store response")?;

        debug!("Vector store returned {} matches", parsed.matches.len());
        Ok(parsed.matches)
    }

    async fn delete_all(&self, namespace: &str) -> Result<()> {
        self.post(
            "/vectors/delete",
            &DeleteRequest {
                delete_all: true,
                namespace,
            },
        )
        .await?;

        debug!("Cleared namespace '{}'", namespace);
        Ok(())
    }

    async fn upsert(&self, vectors: &[VectorRecord], namespace: &str) -> Result<usize> {
        let parsed: UpsertResponse = self
            .post("/vectors/upsert", &UpsertRequest { vectors, namespace })
            .await?
            .json()
            .await
            .context("Failed to parse upsert response")?;

        debug!("Upserted {} vectors into '{}'", parsed.upserted_count, namespace);
        Ok(parsed.upserted_count)
    }
}
