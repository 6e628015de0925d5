//! Full rebuild of the vector index from the JSON knowledge files.
//!
//! Every `*.json` file in the data directory holds an array of
//! `{id, text, tags}` records. The file stem is stored as `source`.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result};
use serde::Deserialize;
use tracing::{debug, info};

use crate::services::providers::{
    EmbeddingProvider, RecordMetadata, VectorRecord, VectorSearchProvider,
};

pub const DEFAULT_BATCH_SIZE: usize = 100;

#[derive(Debug, Clone, Deserialize)]
struct RawRecord {
    id: String,
    text: String,
    #[serde(default)]
    tags: Vec<String>,
}

/// One knowledge record ready to embed.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceRecord {
    pub id: String,
    pub text: String,
    pub tags: Vec<String>,
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RebuildReport {
    pub records: usize,
    pub batches: usize,
    pub upserted: usize,
}

/// Read every `*.json` file in `dir`, in file-name order.
pub fn load_records(dir: impl AsRef<Path>) -> Result<Vec<SourceRecord>> {
    let dir = dir.as_ref();

    let mut files: Vec<PathBuf> = std::fs::read_dir(dir)
        .with_context(|| format!("Failed to read data directory {}", dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && path.extension().is_some_and(|ext| ext == "json"))
        .collect();
    files.sort();

    if files.is_empty() {
        anyhow::bail!("No JSON files found in {}", dir.display());
    }

    let mut records = Vec::new();
    for file in &files {
        let source = file
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let contents = std::fs::read_to_string(file)
            .with_context(|| format!("Failed to read {}", file.display()))?;
        let raw: Vec<RawRecord> = serde_json::from_str(&contents)
            .with_context(|| format!("Invalid records in {}", file.display()))?;

        debug!("Loaded {} records from {}", raw.len(), file.display());

        records.extend(raw.into_iter().map(|r| SourceRecord {
            id: r.id,
            text: r.text,
            tags: r.tags,
            source: source.clone(),
        }));
    }

    info!("Loaded {} records from {} files", records.len(), files.len());
    Ok(records)
}

/// Clears a namespace and refills it. Safe to run repeatedly.
pub struct IndexRebuilder {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorSearchProvider>,
    namespace: String,
    batch_size: usize,
}

impl IndexRebuilder {
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorSearchProvider>,
        namespace: impl Into<String>,
        batch_size: usize,
    ) -> Self {
        Self {
            embedder,
            index,
            namespace: namespace.into(),
            batch_size: batch_size.max(1),
        }
    }

    /// Embeds everything before touching the index, so an embedding failure
    /// leaves the existing namespace intact.
    pub async fn rebuild(&self, records: Vec<SourceRecord>) -> Result<RebuildReport> {
        if records.is_empty() {
            anyhow::bail!("Refusing to rebuild namespace '{}' with no records", self.namespace);
        }

        let start_time = Instant::now();
        let total = records.len();

        let mut vectors = Vec::with_capacity(total);
        for (i, record) in records.into_iter().enumerate() {
            let values = self
                .embedder
                .encode(&record.text)
                .await
                .with_context(|| format!("Failed to embed record {}", record.id))?;

            debug!("Embedded {}/{}: {}", i + 1, total, record.id);

            vectors.push(VectorRecord {
                id: record.id,
                values,
                metadata: RecordMetadata {
                    text: record.text,
                    tags: record.tags,
                    source: record.source,
                },
            });
        }

        info!("Deleting all vectors in namespace '{}'", self.namespace);
        self.index
            .delete_all(&self.namespace)
            .await
            .context("Failed to clear namespace")?;

        let batch_count = vectors.len().div_ceil(self.batch_size);
        let mut upserted = 0;
        for (batch_idx, batch) in vectors.chunks(self.batch_size).enumerate() {
            upserted += self
                .index
                .upsert(batch, &self.namespace)
                .await
                .with_context(|| format!("Upsert of batch {} failed", batch_idx + 1))?;

            info!(
                "Uploaded batch {}/{} ({} vectors)",
                batch_idx + 1,
                batch_count,
                batch.len()
            );
        }

        info!(
            "🎉 Index rebuilt: {} records, {} upserted in {}ms",
            total,
            upserted,
            start_time.elapsed().as_millis()
        );

        Ok(RebuildReport {
            records: total,
            batches: batch_count,
            upserted,
        })
    }
}
