//! Seams to the external services the chat core depends on.
//!
//! The concrete HTTP adapters live next to this module; tests swap in
//! generated mocks.

use anyhow::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::utils::error::ModelError;

/// One match returned by the vector index.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VectorMatch {
    pub id: String,
    #[serde(default)]
    pub score: f32,
    #[serde(default)]
    pub metadata: Option<MatchMetadata>,
}

/// Metadata stored alongside each vector at upload time.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct MatchMetadata {
    #[serde(default)]
    pub text: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Metadata written with each vector when the index is rebuilt.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecordMetadata {
    pub text: String,
    pub tags: Vec<String>,
    /// Name of the data file the record came from.
    pub source: String,
}

/// One vector to upsert.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VectorRecord {
    pub id: String,
    pub values: Vec<f32>,
    pub metadata: RecordMetadata,
}

/// Trait for embedding service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    async fn encode(&self, text: &str) -> Result<Vec<f32>>;
}

/// Trait for vector search service
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VectorSearchProvider: Send + Sync {
    async fn query(
        &self,
        embedding: &[f32],
        top_k: usize,
        include_metadata: bool,
        namespace: &str,
    ) -> Result<Vec<VectorMatch>>;

    /// Remove every vector in `namespace`.
    async fn delete_all(&self, namespace: &str) -> Result<()>;

    /// Insert or overwrite `vectors`; returns the count the index reports.
    async fn upsert(&self, vectors: &[VectorRecord], namespace: &str) -> Result<usize>;
}

/// Trait for a hosted chat model
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait LlmProvider: Send + Sync {
    async fn invoke(&self, prompt: &str, temperature: f32) -> Result<String, ModelError>;
}
