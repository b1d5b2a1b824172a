//! Credit Ledger Service - HTTP API for credit grants and consumption.
//!
//! This is the main entry point for the credit ledger service.

use std::sync::Arc;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use credit_ledger_service::{create_router, AppState, ServiceConfig};
use credit_ledger_store::RocksStore;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,credit_ledger=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    tracing::info!("Starting Credit Ledger Service");

    // Load configuration from environment
    let config = ServiceConfig::from_env();

    tracing::info!(
        listen_addr = %config.listen_addr,
        data_dir = %config.data_dir,
        service_auth_configured = %config.service_api_key.is_some(),
        plan_catalog = ?config.plan_catalog_path,
        lock_timeout_ms = config.lock_timeout_ms,
        max_lock_retries = config.max_lock_retries,
        "Service configuration loaded"
    );

    if config.service_api_key.is_none() {
        tracing::warn!("SERVICE_API_KEY not set - all authenticated routes will reject requests");
    }

    // Initialize RocksDB store
    tracing::info!(path = %config.data_dir, "Opening RocksDB store");
    let store = Arc::new(RocksStore::open_with(
        &config.data_dir,
        config.store_options(),
    )?);

    // Build app state
    let state = AppState::new(store, config.clone())?;

    // Create the router
    let app = create_router(state);
    tracing::info!("Router configured with all API endpoints");

    // Start HTTP server
    tracing::info!(listen_addr = %config.listen_addr, "Starting HTTP server");
    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
