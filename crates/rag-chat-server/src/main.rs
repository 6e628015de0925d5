use anyhow::Result;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::info;

use rag_chat_server::config::Settings;
use rag_chat_server::{build_router, AppState};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            std::env::var("RUST_LOG")
                .unwrap_or_else(|_| "info,rag_chat_server=debug".to_string()),
        )
        .with_target(true)
        .with_thread_ids(true)
        .json()
        .init();

    info!("🚀 Starting RAG chat server...");

    // Load configuration
    let settings = Settings::load()?;
    info!("✅ Configuration loaded");

    let state = AppState::from_settings(&settings)?;
    info!("✅ Conversation engine ready");

    // Periodic sweep of idle sessions
    let sessions = state.sessions.clone();
    let sweep_every = Duration::from_secs(settings.session.sweep_interval_seconds.max(1));
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(sweep_every);
        loop {
            interval.tick().await;
            sessions.cleanup_expired();
        }
    });

    let app = build_router(state, &settings.server.allowed_origins);

    // Server address
    let addr = SocketAddr::from((
        settings.server.host.parse::<std::net::IpAddr>()?,
        settings.server.port,
    ));

    info!("🎯 Server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}
