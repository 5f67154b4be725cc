//! MonDash - status dashboards fed by pushed metrics

use anyhow::Context;
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use mondash::config::{Config, LogFormat};
use mondash::routes;
use mondash::state::AppState;
use mondash::storage::Storage;
use mondash::tasks::{lock_eviction, welcome};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    // Initialize tracing
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "mondash=info,tower_http=info".into());
    let registry = tracing_subscriber::registry().with(filter);
    match config.log_format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry.with(tracing_subscriber::fmt::layer().json()).init(),
    }

    let storage = Storage::open(&config.storage)
        .await
        .with_context(|| format!("Failed to open storage '{}'", config.storage))?;
    let storage = Arc::new(storage);

    // Create application state
    let state = AppState::new(Arc::clone(&storage), config.base_url.clone());

    // Spawn background tasks
    // 1. Lock eviction - drops idle per-dashboard locks
    let locks = storage.locks();
    let eviction_interval = config.lock_eviction_interval;
    tokio::spawn(async move {
        lock_eviction::lock_eviction_task(locks, eviction_interval).await;
    });

    // 2. Welcome dashboard demo, only with a configured token
    match config.api_token.clone() {
        Some(token) => {
            let dashboards = state.dashboards.clone();
            tokio::spawn(async move {
                welcome::welcome_task(dashboards, token).await;
            });
        }
        None => info!("API_TOKEN not set, welcome dashboard disabled"),
    }

    let app = routes::router(state, config.request_timeout);

    info!("MonDash v{} starting on {}", env!("CARGO_PKG_VERSION"), config.listen_addr);
    info!("Storage: {}", config.storage);
    info!("Request timeout: {:?}", config.request_timeout);

    // Start server
    let listener = tokio::net::TcpListener::bind(config.listen_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.listen_addr))?;
    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
