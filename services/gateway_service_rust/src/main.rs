mod config;
mod routes;

use anyhow::{Context, Result};
use config::Config;
use dotenv::dotenv;
use routes::AppState;
use settlement_rust_core::clients::{ButtondownClient, FredClient};
use settlement_rust_core::{RateQuoteCache, SubscriptionReconciler};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();

    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting Settlement Watch Gateway...");

    let config = Config::from_env().context("Failed to load configuration")?;

    if config.fred_api_key.is_none() {
        warn!("FRED_API_KEY not set; /api/rate will serve the fallback quote");
    }
    if config.buttondown_api_key.is_none() {
        warn!("BUTTONDOWN_API_KEY not set; /api/subscribe will fail");
    }

    // Clients
    let fred = FredClient::with_series(
        config.fred_api_key.clone(),
        &config.fred_series_id,
        config.upstream_timeout,
    )?
    .with_base_url(&config.fred_base_url);

    let buttondown =
        ButtondownClient::new(config.buttondown_api_key.clone(), config.upstream_timeout)?
            .with_base_url(&config.buttondown_base_url);

    let state = AppState {
        quotes: Arc::new(RateQuoteCache::with_ttl(
            Arc::new(fred),
            config.rate_cache_ttl,
        )),
        subscriptions: Arc::new(SubscriptionReconciler::new(Arc::new(buttondown))),
    };

    let mut app = routes::router(state);
    if let Some(dir) = &config.static_dir {
        info!("Serving static files from {}", dir.display());
        app = app.fallback_service(ServeDir::new(dir));
    }
    let app = app
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let listener = tokio::net::TcpListener::bind(config.bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind_addr))?;

    info!(
        "Gateway listening on {} (series {}, timeout {:?})",
        config.bind_addr, config.fred_series_id, config.upstream_timeout
    );

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
