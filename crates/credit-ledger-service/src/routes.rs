//! Router configuration.
//!
//! This module sets up the Axum router with all routes and middleware.

use std::sync::Arc;
use std::time::Duration;

use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;

use crate::handlers::{credits, grants, health, reports};
use crate::state::AppState;

/// Create the service router with all routes and middleware.
///
/// # Routes
///
/// ## Public
/// - `GET /health` - Health check
///
/// ## Reporting (Service API Key auth)
/// - `GET /v1/users/:user_id/balance` - Available balance and breakdown
/// - `GET /v1/users/:user_id/records` - Credit records
/// - `GET /v1/users/:user_id/transactions` - Ledger history
///
/// ## Credits (Service API Key auth)
/// - `POST /v1/credits/check` - Check balance covers an amount
/// - `POST /v1/credits/consume` - Consume credits
/// - `POST /v1/credits/refund` - Refund a consumption
///
/// ## Grants (Service API Key auth)
/// - `POST /v1/grants/daily` - Daily free grant if due
/// - `POST /v1/grants/subscription` - Subscription period grant
pub fn create_router(state: AppState) -> Router {
    // Extract config values before moving state
    let cors = build_cors_layer(&state.config.cors_origins);
    let max_body_bytes = state.config.max_body_bytes;
    let request_timeout_seconds = state.config.request_timeout_seconds;

    let state = Arc::new(state);

    Router::new()
        // Health (public)
        .route("/health", get(health::health))
        // Reporting
        .route("/v1/users/:user_id/balance", get(reports::get_balance))
        .route("/v1/users/:user_id/records", get(reports::list_records))
        .route(
            "/v1/users/:user_id/transactions",
            get(reports::list_transactions),
        )
        // Credits
        .route("/v1/credits/check", post(credits::check_balance))
        .route("/v1/credits/consume", post(credits::consume))
        .route("/v1/credits/refund", post(credits::refund))
        // Grants
        .route("/v1/grants/daily", post(grants::daily_grant))
        .route("/v1/grants/subscription", post(grants::subscription_grant))
        // Middleware
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(RequestBodyLimitLayer::new(max_body_bytes))
                .layer(TimeoutLayer::new(Duration::from_secs(
                    request_timeout_seconds,
                ))),
        )
        .with_state(state)
}

/// Build the CORS layer from configured origins.
fn build_cors_layer(origins: &[String]) -> CorsLayer {
    if origins.iter().any(|o| o == "*") {
        CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any)
    } else {
        let origins: Vec<_> = origins.iter().filter_map(|o| o.parse().ok()).collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods(Any)
            .allow_headers(Any)
    }
}
