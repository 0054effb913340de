use anyhow::Context;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

use virtual_stylist::config::StylistConfig;
use virtual_stylist::gemini::GeminiClient;
use virtual_stylist::routes::{router, AppState};
use virtual_stylist::session::StylingSessions;
use virtual_stylist::store::SledRecordStore;
use virtual_stylist::workflow::Stylist;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file
    dotenv::dotenv().ok();

    // Init tracing
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    fmt().with_env_filter(filter).init();

    let config = StylistConfig::from_env()?;
    if config.gemini.api_key.is_none() {
        tracing::warn!("GEMINI_API_KEY not set, running in demo mode with placeholder looks");
    }

    let gemini = GeminiClient::new(config.gemini.clone()).context("building Gemini client")?;
    let store = SledRecordStore::open(&config.store_path)
        .with_context(|| format!("opening saved-look store at {}", config.store_path.display()))?;

    let state = AppState {
        sessions: StylingSessions::new(Stylist::new(Arc::new(gemini)), Arc::new(store)),
    };
    let app = router(state, config.max_upload_bytes);

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .with_context(|| format!("invalid bind address {}:{}", config.host, config.port))?;
    tracing::info!(%addr, "Starting server");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    tracing::info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %e, "Failed to listen for shutdown signal");
    }
}
