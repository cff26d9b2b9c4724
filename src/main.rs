//! Adaptive Feed Engine — Binary Entrypoint
//! Boots the Axum HTTP server, wiring config, shared state, the session
//! eviction task, and the Prometheus exporter.

use std::sync::Arc;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use adaptive_feed_engine::api::{self, AppState};
use adaptive_feed_engine::blend::Blender;
use adaptive_feed_engine::config::FeedConfig;
use adaptive_feed_engine::ledger::EngagementLedger;
use adaptive_feed_engine::metrics::Metrics;
use adaptive_feed_engine::session::SessionStore;
use adaptive_feed_engine::source::catalog::QueryCatalog;
use adaptive_feed_engine::source::providers::search_api::SearchApiSource;
use adaptive_feed_engine::source::types::ContentSource;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("adaptive_feed_engine=info,tower_http=info,warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact())
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op in prod environments.
    let _ = dotenvy::dotenv();
    init_tracing();

    // Invalid weights are a startup failure, never a per-request one.
    let config = Arc::new(FeedConfig::load_default()?);
    let catalog = Arc::new(QueryCatalog::load_default()?);
    let source: Arc<dyn ContentSource> = Arc::new(SearchApiSource::from_env()?);

    let metrics = Metrics::init(config.session_ttl_secs);

    let sessions = Arc::new(SessionStore::new());
    let _eviction = sessions.spawn_eviction_task(config.session_ttl(), config.eviction_interval());

    let state = AppState {
        blender: Arc::new(Blender::new(source, catalog, config.clone())),
        sessions,
        ledger: Arc::new(EngagementLedger::with_capacity(10_000)),
        config,
    };

    let app = api::router(state).merge(metrics.router());

    let addr = std::env::var("FEED_ADDR").unwrap_or_else(|_| "0.0.0.0:8000".to_string());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "adaptive feed engine listening");
    axum::serve(listener, app).await?;

    Ok(())
}
