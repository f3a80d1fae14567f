//! Coffee Market HTTP Server
//!
//! Axum-based server for the digital-goods marketplace and the
//! "buy me a coffee" donation links, with PayChangu hosted checkout.

mod auth;
mod config;
mod error;
mod handlers;
mod routes;
mod state;

use std::sync::Arc;

use market_core::{DonationStore, MarketStore, MemoryStore};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::config::Config;
use crate::state::{AppState, identity_from_config, seed_dev_users};

type Stores = (Arc<dyn MarketStore>, Arc<dyn DonationStore>);

#[cfg(feature = "postgres")]
async fn open_stores(config: &Config) -> anyhow::Result<Stores> {
    if let Some(url) = &config.database_url {
        let store = Arc::new(market_core::store::PgStore::connect(url).await?);
        tracing::info!("✓ Connected to Postgres");
        return Ok((store.clone(), store));
    }
    Ok(memory_stores())
}

#[cfg(not(feature = "postgres"))]
#[allow(clippy::unused_async)]
async fn open_stores(config: &Config) -> anyhow::Result<Stores> {
    if config.database_url.is_some() {
        tracing::warn!("⚠ DATABASE_URL set but built without the `postgres` feature");
    }
    Ok(memory_stores())
}

fn memory_stores() -> Stores {
    tracing::warn!("⚠ Using in-memory store - data is lost on restart");
    let store = Arc::new(MemoryStore::new());
    (store.clone(), store)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info,tower_http=debug".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;

    // Storage
    let (market, donations) = open_stores(&config).await?;
    seed_dev_users(market.as_ref(), &config.dev_sessions).await?;

    // Identity
    let identity = identity_from_config(&config);
    if config.supabase.is_none() && config.dev_sessions.is_empty() {
        tracing::warn!("⚠ No identity provider configured - every session is rejected");
        tracing::warn!("  Set SUPABASE_URL/SUPABASE_ANON_KEY or DEV_SESSIONS in .env");
    }

    // Payments
    let state = AppState::new(&config, market, donations, identity);

    if state.gateway.is_live() {
        tracing::info!("✓ PayChangu configured ({})", config.paychangu_api_url);
    } else {
        tracing::warn!("⚠ PayChangu running in test mode - no real payments");
    }
    if !state.webhooks.verifier().is_configured() {
        tracing::warn!("⚠ PAYCHANGU_WEBHOOK_SECRET not set - every webhook will be rejected");
    }
    if config.download_signing_secret.is_none() {
        tracing::warn!("⚠ DOWNLOAD_SIGNING_SECRET not set - signed URLs expire on restart");
    }

    let app = routes::app(state, &config.static_dir);

    // Start server
    let listener = tokio::net::TcpListener::bind(&config.bind_addr).await?;

    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("☕ coffee-market server running on http://{}", config.bind_addr);
    tracing::info!("══════════════════════════════════════════════════");
    tracing::info!("");
    tracing::info!("Endpoints:");
    tracing::info!("  GET  /health              - Health check");
    tracing::info!("  GET  /api/products        - Live products");
    tracing::info!("  POST /api/checkout        - Buy a product");
    tracing::info!("  GET  /api/download        - Signed download URL");
    tracing::info!("  POST /api/create-payment  - Donate via coffee link");
    tracing::info!("  POST /webhook             - PayChangu notifications");
    tracing::info!("");

    axum::serve(listener, app).await?;

    Ok(())
}
