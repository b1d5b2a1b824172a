//! Application state.

use std::sync::Arc;

use credit_ledger::Ledger;
use credit_ledger_core::PlanError;
use credit_ledger_store::RocksStore;

use crate::config::ServiceConfig;
use crate::error::ApiError;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// The credit ledger.
    pub ledger: Arc<Ledger<RocksStore>>,

    /// Service configuration.
    pub config: ServiceConfig,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured plan catalog cannot be loaded.
    pub fn new(store: Arc<RocksStore>, config: ServiceConfig) -> Result<Self, PlanError> {
        let ledger_config = config.ledger_config()?;
        tracing::info!(
            daily_free_credits = ledger_config.daily_free_credits,
            purchasable_tiers = ledger_config.plans.tier_coefficients.len(),
            plan_overrides = ledger_config.plans.overrides.len(),
            "Ledger configured"
        );

        Ok(Self {
            ledger: Arc::new(Ledger::new(store, ledger_config)),
            config,
        })
    }

    /// Run a ledger mutation on the blocking pool.
    ///
    /// Mutations may wait on a user's ledger lock, which must not stall the
    /// async workers.
    pub async fn mutate<T, F>(&self, f: F) -> Result<T, ApiError>
    where
        F: FnOnce(&Ledger<RocksStore>) -> credit_ledger::Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let ledger = Arc::clone(&self.ledger);
        tokio::task::spawn_blocking(move || f(&ledger))
            .await
            .map_err(|e| ApiError::Internal(format!("ledger task failed: {e}")))?
            .map_err(ApiError::from)
    }
}
