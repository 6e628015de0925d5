use std::cmp::Ordering;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use crate::config::VectorStoreConfig;
use crate::models::ContextSnippet;
use crate::services::providers::{EmbeddingProvider, VectorMatch, VectorSearchProvider};
use crate::utils::text::{format_tags, preview};

const PREVIEW_CHARS: usize = 120;

/// Turns a query into ranked context snippets.
///
/// Never fails: any embedding or index error is logged and yields an empty
/// list, which the engine answers with its fallback message.
pub struct Retriever {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorSearchProvider>,
    namespace: String,
    top_k: usize,
}

impl Retriever {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorSearchProvider>,
        namespace: impl Into<String>,
        top_k: usize,
    ) -> Self {
        Self {
            embedder,
            index,
            namespace: namespace.into(),
            top_k: top_k.max(1),
        }
    }

    pub fn from_config(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorSearchProvider>,
        config: &VectorStoreConfig,
    ) -> Self {
        Self::new(embedder, index, config.namespace.clone(), config.top_k)
    }

    pub async fn retrieve(&self, query: &str) -> Vec<ContextSnippet> {
        match self.try_retrieve(query).await {
            Ok(snippets) => snippets,
            Err(e) => {
                warn!("Retrieval unavailable, continuing without context: {:#}", e);
                Vec::new()
            }
        }
    }

    async fn try_retrieve(&self, query: &str) -> Result<Vec<ContextSnippet>> {
        let embedding = self
            .embedder
            .encode(query)
            .await
            .context("Failed to embed query")?;
        debug!("Query embedded (dim = {})", embedding.len());

        let matches = self
            .index
            .query(&embedding, self.top_k, true, &self.namespace)
            .await
            .context("Vector search failed")?;

        let snippets = rank(matches, self.top_k);

        info!("Retrieved {} context snippets", snippets.len());
        for (i, snippet) in snippets.iter().enumerate() {
            debug!(
                "{}. [{} | {:.3} | {}] {}",
                i + 1,
                snippet.id,
                snippet.score,
                format_tags(&snippet.tags),
                preview(&snippet.text, PREVIEW_CHARS)
            );
        }

        Ok(snippets)
    }
}

/// Map matches to snippets, drop those without stored text, order by
/// descending score and cap at `top_k`.
fn rank(matches: Vec<VectorMatch>, top_k: usize) -> Vec<ContextSnippet> {
    let mut snippets: Vec<ContextSnippet> = matches
        .into_iter()
        .filter_map(|m| {
            let metadata = m.metadata.unwrap_or_default();
            let text = metadata.text.filter(|t| !t.trim().is_empty())?;
            Some(ContextSnippet {
                id: m.id,
                text,
                tags: metadata.tags,
                score: m.score,
            })
        })
        .collect();

    snippets.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));
    snippets.truncate(top_k);
    snippets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::providers::{MatchMetadata, MockEmbeddingProvider, MockVectorSearchProvider};

    fn vector_match(id: &str, score: f32, text: Option<&str>) -> VectorMatch {
        VectorMatch {
            id: id.to_string(),
            score,
            metadata: Some(MatchMetadata {
                text: text.map(str::to_string),
                tags: vec!["projects".to_string()],
            }),
        }
    }

    fn embedder_ok() -> MockEmbeddingProvider {
        let mut embedder = MockEmbeddingProvider::new();
        embedder
            .expect_encode()
            .returning(|_| Ok(vec![0.1, 0.2, 0.3]));
        embedder
    }

    #[tokio::test]
    async fn test_retrieve_orders_by_score_and_caps() {
        let mut index = MockVectorSearchProvider::new();
        index
            .expect_query()
            .withf(|embedding, top_k, include_metadata, namespace| {
                embedding.len() == 3 && *top_k == 3 && *include_metadata && namespace == "starbot"
            })
            .times(1)
            .returning(|_, _, _, _| {
                Ok(vec![
                    vector_match("low", 0.2, Some("low")),
                    vector_match("high", 0.9, Some("high")),
                    vector_match("mid", 0.5, Some("mid")),
                    vector_match("extra", 0.1, Some("extra")),
                ])
            });

        let retriever = Retriever::new(Arc::new(embedder_ok()), Arc::new(index), "starbot", 3);
        let snippets = retriever.retrieve("What projects have you built?").await;

        let ids: Vec<&str> = snippets.iter().map(|s| s.id.as_str()).collect();
        assert_eq!(ids, vec!["high", "mid", "low"]);
        assert_eq!(snippets[0].tags, vec!["projects".to_string()]);
    }

    #[tokio::test]
    async fn test_no_matches_is_empty() {
        let mut index = MockVectorSearchProvider::new();
        index.expect_query().returning(|_, _, _, _| Ok(vec![]));

        let retriever = Retriever::new(Arc::new(embedder_ok()), Arc::new(index), "starbot", 3);
        assert!(retriever.retrieve("anything").await.is_empty());
    }

    #[tokio::test]
    async fn test_index_failure_degrades_to_empty() {
        let mut index = MockVectorSearchProvider::new();
        index
            .expect_query()
            .returning(|_, _, _, _| Err(anyhow::anyhow!("connection reset")));

        let retriever = Retriever::new(Arc::new(embedder_ok()), Arc::new(index), "starbot", 3);
        assert!(retriever.retrieve("anything").await.is_empty());
    }

    #[tokio::test]
    async fn test_embedding_failure_skips_index() {
        let mut embedder = MockEmbeddingProvider::new();
        embedder
            .expect_encode()
            .returning(|_| Err(anyhow::anyhow!("embedding server down")));
        let mut index = MockVectorSearchProvider::new();
        index.expect_query().times(0);

        let retriever = Retriever::new(Arc::new(embedder), Arc::new(index), "starbot", 3);
        assert!(retriever.retrieve("anything").await.is_empty());
    }

    #[test]
    fn test_rank_drops_matches_without_text() {
        let snippets = rank(
            vec![
                vector_match("a", 0.8, None),
                vector_match("b", 0.7, Some("   ")),
                VectorMatch {
                    id: "c".to_string(),
                    score: 0.6,
                    metadata: None,
                },
                vector_match("d", 0.5, Some("kept")),
            ],
            3,
        );
        assert_eq!(snippets.len(), 1);
        assert_eq!(snippets[0].id, "d");
    }
}
