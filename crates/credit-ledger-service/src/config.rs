//! Service configuration.

use std::str::FromStr;

use credit_ledger::{LedgerConfig, DEFAULT_DAILY_FREE_CREDITS};
use credit_ledger_core::{PlanCatalog, PlanError};
use credit_ledger_store::RocksStoreOptions;

/// Service configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    /// Address to listen on (default: "0.0.0.0:8080").
    pub listen_addr: String,

    /// Path to `RocksDB` data directory (default: "/data/credit-ledger").
    pub data_dir: String,

    /// Service API key for service-to-service auth.
    pub service_api_key: Option<String>,

    /// Credits issued by each daily free grant (default: 100).
    pub daily_free_credits: i64,

    /// Plan catalog JSON file. The built-in catalog is used when unset.
    pub plan_catalog_path: Option<String>,

    /// How long one attempt waits for a user's ledger lock, in milliseconds.
    pub lock_timeout_ms: i64,

    /// Lock attempts before a request fails as busy.
    pub max_lock_retries: u32,

    /// CORS allowed origins.
    pub cors_origins: Vec<String>,

    /// Maximum request body size in bytes.
    pub max_body_bytes: usize,

    /// Request timeout in seconds.
    pub request_timeout_seconds: u64,
}

impl ServiceConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let store_defaults = RocksStoreOptions::default();

        Self {
            listen_addr: std::env::var("LISTEN_ADDR").unwrap_or(defaults.listen_addr),
            data_dir: std::env::var("DATA_DIR").unwrap_or(defaults.data_dir),
            service_api_key: std::env::var("SERVICE_API_KEY").ok(),
            daily_free_credits: env_parse("DAILY_FREE_CREDITS")
                .unwrap_or(DEFAULT_DAILY_FREE_CREDITS),
            plan_catalog_path: std::env::var("PLAN_CATALOG_PATH").ok(),
            lock_timeout_ms: env_parse("LOCK_TIMEOUT_MS").unwrap_or(store_defaults.lock_timeout_ms),
            max_lock_retries: env_parse("MAX_LOCK_RETRIES")
                .unwrap_or(store_defaults.max_lock_attempts),
            cors_origins: std::env::var("CORS_ORIGINS")
                .unwrap_or_else(|_| "*".into())
                .split(',')
                .map(|s| s.trim().to_string())
                .collect(),
            max_body_bytes: env_parse("MAX_BODY_BYTES").unwrap_or(defaults.max_body_bytes),
            request_timeout_seconds: env_parse("REQUEST_TIMEOUT_SECONDS")
                .unwrap_or(defaults.request_timeout_seconds),
        }
    }

    /// Build the ledger configuration, loading the plan catalog file if one
    /// is configured.
    ///
    /// # Errors
    ///
    /// Returns an error if the catalog file cannot be read or is invalid,
    /// or if the daily grant size is negative.
    pub fn ledger_config(&self) -> Result<LedgerConfig, PlanError> {
        if self.daily_free_credits < 0 {
            return Err(PlanError::Invalid(format!(
                "DAILY_FREE_CREDITS must not be negative, got {}",
                self.daily_free_credits
            )));
        }

        let plans = match &self.plan_catalog_path {
            Some(path) => {
                let catalog = PlanCatalog::load(path)?;
                tracing::info!(path = %path, "Loaded plan catalog");
                catalog
            }
            None => {
                tracing::debug!("No plan catalog configured, using built-in catalog");
                PlanCatalog::default()
            }
        };

        Ok(LedgerConfig {
            daily_free_credits: self.daily_free_credits,
            plans,
        })
    }

    /// Lock settings for the `RocksDB` store.
    #[must_use]
    pub fn store_options(&self) -> RocksStoreOptions {
        RocksStoreOptions {
            lock_timeout_ms: self.lock_timeout_ms,
            max_lock_attempts: self.max_lock_retries.max(1),
        }
    }
}

fn env_parse<T: FromStr>(name: &str) -> Option<T> {
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            tracing::warn!(var = %name, value = %raw, "Ignoring unparsable environment variable");
            None
        }
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        let store_defaults = RocksStoreOptions::default();
        Self {
            listen_addr: "0.0.0.0:8080".into(),
            data_dir: "/data/credit-ledger".into(),
            service_api_key: None,
            daily_free_credits: DEFAULT_DAILY_FREE_CREDITS,
            plan_catalog_path: None,
            lock_timeout_ms: store_defaults.lock_timeout_ms,
            max_lock_retries: store_defaults.max_lock_attempts,
            cors_origins: vec!["*".into()],
            max_body_bytes: 1024 * 1024,
            request_timeout_seconds: 30,
        }
    }
}
