//! Credit ledger HTTP API service.
//!
//! This crate exposes the ledger operations over HTTP for:
//!
//! - Generation handlers (balance check, consume, refund)
//! - Billing webhook handlers (daily and subscription grants)
//! - Reporting (balance summary, records, transaction history)
//!
//! # Authentication
//!
//! Every route except `/health` requires the service API key in the
//! `x-api-key` header. User identity and plan tier come from the calling
//! service and are trusted as given.

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
// Allow some pedantic lints that are noisy for Axum handler functions
#![allow(clippy::missing_errors_doc)] // Axum handlers all return Result
#![allow(clippy::unused_async)]

pub mod auth;
pub mod config;
pub mod error;
pub mod handlers;
pub mod routes;
pub mod state;

pub use config::ServiceConfig;
pub use error::ApiError;
pub use routes::create_router;
pub use state::AppState;
