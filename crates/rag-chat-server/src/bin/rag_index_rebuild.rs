use anyhow::Result;
use clap::Parser;
use std::sync::Arc;
use tracing::info;

use rag_chat_server::config::{settings::DEFAULT_CONFIG_PATH, Settings};
use rag_chat_server::services::indexer::{load_records, DEFAULT_BATCH_SIZE};
use rag_chat_server::services::{EmbeddingService, IndexRebuilder, VectorStoreService};

#[derive(Parser, Debug)]
#[command(
    name = "rag-index-rebuild",
    version,
    about = "Clear the knowledge namespace and re-embed every data file"
)]
struct Args {
    /// Path to the settings file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: String,

    /// Directory holding the `*.json` knowledge files
    #[arg(long, default_value = "data")]
    data_dir: String,

    /// Vectors per upsert request
    #[arg(long, default_value_t = DEFAULT_BATCH_SIZE)]
    batch_size: usize,

    /// Load and validate the data files without touching the index
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,rag_chat_server=info".to_string()),
        )
        .with_target(false)
        .init();

    let settings = Settings::load_from(&args.config)?;
    let records = load_records(&args.data_dir)?;

    if args.dry_run {
        info!("Dry run: {} records valid, index not modified", records.len());
        return Ok(());
    }

    let embedder = Arc::new(EmbeddingService::new(&settings.embedding)?);
    let index = Arc::new(VectorStoreService::new(&settings.vector_store)?);
    let rebuilder = IndexRebuilder::new(
        embedder,
        index,
        settings.vector_store.namespace.clone(),
        args.batch_size,
    );

    let report = rebuilder.rebuild(records).await?;
    info!(
        "✅ Namespace '{}' rebuilt: {} records in {} batches",
        settings.vector_store.namespace, report.records, report.batches
    );

    Ok(())
}
