mod app_state;
mod config;
mod db;
mod error;
mod handlers;
mod middlewares;
mod models;
mod queries;
mod routes;
mod services;
mod store;
mod utils;
mod websocket;

#[cfg(test)]
mod testing;

use std::time::Duration;

use anyhow::Context;

use crate::app_state::AppState;
use crate::config::Config;
use crate::store::Stores;

#[tokio::main]
async fn main() {
    init_tracing();
    if let Err(e) = run().await {
        tracing::error!("server stopped: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    let stores = match &config.database_url {
        Some(url) => Stores::postgres(db::connect_to_db(url).await?),
        None => {
            tracing::warn!("DATABASE_URL not set, using in-memory stores");
            Stores::in_memory()
        }
    };

    let state = AppState::new(config.clone(), stores);
    state.message_limiter.spawn_sweeper(config.rate_sweep_interval);
    state.room_limiter.spawn_sweeper(config.rate_sweep_interval);
    spawn_maintenance(state.clone(), config.notification_purge_interval);

    let app = routes::create_routes(state);
    let listener = tokio::net::TcpListener::bind(&config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;
    tracing::info!(addr = %config.bind_addr, "listening");
    axum::serve(listener, app).await.context("Server error")?;
    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("workforce_realtime=info,warn"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

/// Purges expired notifications and key-store entries on a fixed period.
fn spawn_maintenance(state: AppState, every: Duration) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;
            match state.notifications.purge_expired().await {
                Ok(0) => {}
                Ok(purged) => tracing::info!(purged, "expired notifications purged"),
                Err(e) => tracing::warn!(error = %e, "notification purge failed"),
            }
            if let Err(e) = state.presence.purge_expired_markers().await {
                tracing::warn!(error = %e, "key store purge failed");
            }
        }
    })
}
