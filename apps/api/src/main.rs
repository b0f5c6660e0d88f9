mod config;
mod db;
mod errors;
mod llm_client;
mod models;
mod reports;
mod routes;
mod state;
#[cfg(test)]
mod test_support;
mod transcript;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::llm_client::LlmClient;
use crate::reports::analyzer::ReportAnalyzer;
use crate::reports::dispatcher::ReportDispatcher;
use crate::reports::store::ReportStores;
use crate::routes::build_router;
use crate::state::AppState;
use crate::transcript::ElevenLabsClient;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!(
                "{}={}",
                env!("CARGO_PKG_NAME").replace('-', "_"),
                &config.rust_log
            ))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Karzo API v{}", env!("CARGO_PKG_VERSION"));

    // Initialize PostgreSQL
    let db = create_pool(&config.database_url).await?;

    // Transcript provider
    let transcripts = ElevenLabsClient::new(
        config.elevenlabs_base_url.clone(),
        config.elevenlabs_api_key.clone(),
        config.transcript_timeout,
    )?;
    info!(
        "Transcript client initialized (base url: {})",
        config.elevenlabs_base_url
    );

    // Initialize LLM client
    let llm = LlmClient::new(
        config.anthropic_api_url.clone(),
        config.anthropic_api_key.clone(),
        config.llm_timeout,
    )?;
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    let dispatcher = ReportDispatcher::new(
        ReportStores::postgres(db),
        Arc::new(transcripts),
        ReportAnalyzer::new(Arc::new(llm)),
        config.report_stale_after,
    );
    info!(
        "Report dispatcher ready (stale after {}s)",
        config.report_stale_after.as_secs()
    );

    let state = AppState { dispatcher };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive());

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
