//! Scoring server binary
//!
//! Run with: cargo run -p sqd-rag --bin sqd-rag-server
//! Reads the config file named by `SQD_CONFIG`, or the default location.

use sqd_rag::{config::AppConfig, server::ScoringServer};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "sqd_rag=info,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config_path = std::env::var_os("SQD_CONFIG").map(PathBuf::from);
    let config = AppConfig::load(config_path.as_deref())?;

    tracing::info!("Configuration loaded");
    tracing::info!("  - Chat deployment: {}", config.openai.chat_deployment);
    tracing::info!("  - Embedding deployment: {}", config.openai.embedding_deployment);
    tracing::info!("  - Search index: {}", config.search.index_name);
    tracing::info!("  - Top K: {}", config.retrieval.top_k);

    let server = ScoringServer::new(config)?;

    println!("\nServer starting...");
    println!("  Health: http://{}/health", server.address());
    println!("  Score:  POST http://{}/score", server.address());
    println!("\nPress Ctrl+C to stop\n");

    server.start().await?;

    Ok(())
}
