mod models;
mod handlers;
mod services;
mod query;
mod config;
mod errors;

use anyhow::Context;
use crate::{
    config::{Config, StoreBackend},
    handlers::AppState,
    services::Stores,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize basic tracing subscriber
    tracing_subscriber::fmt::init();

    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;

    let stores = match config.store.backend {
        StoreBackend::Redis => {
            let client = redis::Client::open(config.store.redis_url.as_str())
                .context("Invalid Redis URL")?;
            Stores::redis(client)
                .await
                .context("Failed to connect to Redis")?
        }
        StoreBackend::Memory => {
            tracing::warn!("Using in-memory store; data is lost on shutdown");
            Stores::in_memory()
        }
    };

    let addr = format!("{}:{}", config.server.host, config.server.port);
    let app = handlers::router(AppState::new(stores, config));

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    tracing::info!("Server running on {}", addr);

    axum::serve(listener, app.into_make_service())
        .await
        .context("Server error")?;

    Ok(())
}
