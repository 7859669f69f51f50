mod config;
mod errors;
mod llm_client;
mod models;
mod pipeline;
mod routes;
mod state;
mod tokens;

use anyhow::Result;
use std::net::SocketAddr;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use std::sync::Arc;

use crate::config::Config;
use crate::llm_client::LlmClient;
use crate::pipeline::RunControl;
use crate::routes::build_router;
use crate::state::AppState;
use crate::tokens::{TiktokenEstimator, TokenEstimator};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting jobfit v{}", env!("CARGO_PKG_VERSION"));

    // Unknown tokenizer model is fatal before any request is accepted
    let estimator = TiktokenEstimator::for_model(&config.pipeline.tokenizer_model)?;
    info!("Token estimator initialized (model: {})", estimator.model_id());

    // Initialize LLM client
    let llm = LlmClient::with_base_url(
        config.anthropic_api_key.clone(),
        config.anthropic_base_url.clone(),
    );
    info!("LLM client initialized (model: {})", llm_client::MODEL);

    info!(
        "Batching: {} tokens / {} postings per batch, {} tokens per run, {}ms between batches",
        config.pipeline.batch_max_tokens,
        config.pipeline.max_items_per_batch,
        config.pipeline.input_max_tokens,
        config.pipeline.inter_batch_delay.as_millis()
    );

    // Build app state
    let state = AppState::new(Arc::new(llm), Arc::new(estimator), config.pipeline.clone());
    let control = state.control.clone();

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS once the web client has a fixed origin

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(control))
        .await?;

    Ok(())
}

/// Resolves on Ctrl-C. A run in progress stops before its next batch.
async fn shutdown_signal(control: RunControl) {
    let _ = tokio::signal::ctrl_c().await;
    info!("Shutdown requested; cancelling any active run");
    control.cancel();
}
