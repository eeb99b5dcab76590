mod config;
mod db;
mod engine;
mod errors;
mod llm_client;
mod models;
mod provider;
mod routes;
mod state;
mod store;
mod topics;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::db::create_pool;
use crate::engine::clock::SystemClock;
use crate::engine::prewarm::start_prewarm;
use crate::engine::FreshnessEngine;
use crate::llm_client::LlmClient;
use crate::provider::fetcher::FeedFetcher;
use crate::provider::FeedDigestProvider;
use crate::routes::build_router;
use crate::state::AppState;
use crate::store::{MemorySummaryStore, PgSummaryStore, SummaryStore};
use crate::topics::{JsonTopicStore, TopicStore};

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

    info!("Starting Daily Digest API v{}", env!("CARGO_PKG_VERSION"));

    // Topics are read once at startup
    let topics: Arc<dyn TopicStore> = Arc::new(JsonTopicStore::from_path(&config.topics_path)?);

    // Summary store
    let store: Arc<dyn SummaryStore> = if config.uses_memory_store() {
        warn!("DATABASE_URL=memory: summaries live in this process only and are lost on restart");
        Arc::new(MemorySummaryStore::new())
    } else {
        Arc::new(PgSummaryStore::new(create_pool(&config.database_url).await?))
    };

    // Content provider: feeds + LLM
    let llm = LlmClient::new(config.anthropic_api_key.clone())?;
    info!("LLM client initialized (model: {})", llm_client::MODEL);
    let provider = Arc::new(FeedDigestProvider::new(FeedFetcher::new()?, llm));

    let engine_config = config.engine_config()?;
    info!(
        "Freshness engine: timezone={} provider_timeout={}ms cooldown={}s max_attempts={} lease_ttl={}s",
        engine_config.timezone.name(),
        config.provider_timeout_ms,
        config.retry_cooldown_s,
        config.max_attempts_per_day,
        config.lease_ttl_s
    );
    let engine = Arc::new(FreshnessEngine::new(
        topics.clone(),
        store,
        provider,
        Arc::new(SystemClock),
        engine_config,
    ));

    if config.prewarm_interval_s > 0 {
        start_prewarm(
            engine.clone(),
            Duration::from_secs(config.prewarm_interval_s),
        );
    }

    let state = AppState { engine, topics };

    // Build router
    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: tighten CORS in production

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
