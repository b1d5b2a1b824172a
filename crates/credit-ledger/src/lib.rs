//! Credit ledger engines.
//!
//! [`Ledger`] wraps an injected [`Store`](credit_ledger_store::Store) and
//! implements the ledger operations:
//!
//! - [`Ledger::available_balance`]: sum of active records
//! - [`Ledger::issue_daily_grant_if_due`]: once-per-UTC-day free grant
//! - [`Ledger::issue_subscription_grant`]: plan-sized grant per paid period
//! - [`Ledger::consume`]: atomic multi-record deduction
//! - [`Ledger::refund`]: at-most-once reversal of a consumption
//!
//! Every mutating operation runs inside one
//! [`Store::atomically`](credit_ledger_store::Store::atomically) unit of work,
//! so all of a user's mutators serialize and either commit fully or not at
//! all.
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//!
//! use credit_ledger::{Ledger, LedgerConfig, LedgerError};
//! use credit_ledger_core::{PlanTier, UserId};
//! use credit_ledger_store::MemoryStore;
//!
//! let ledger = Ledger::new(Arc::new(MemoryStore::new()), LedgerConfig::default());
//! let user_id = UserId::new("user-42").unwrap();
//!
//! assert!(ledger.issue_daily_grant_if_due(&user_id, PlanTier::Free).unwrap());
//! let tx = ledger.consume(&user_id, 30, "thumbnail").unwrap();
//! assert_eq!(ledger.available_balance(&user_id).unwrap(), 70);
//!
//! ledger.refund(&tx, "generation failed").unwrap();
//! assert!(matches!(
//!     ledger.refund(&tx, "again"),
//!     Err(LedgerError::AlreadyRefunded(_))
//! ));
//! assert_eq!(ledger.available_balance(&user_id).unwrap(), 100);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod balance;
pub mod config;
pub mod consume;
pub mod daily;
pub mod error;
pub mod refund;
pub mod subscription;

use std::sync::Arc;

use credit_ledger_store::Store;

pub use balance::BalanceSummary;
pub use config::{LedgerConfig, DEFAULT_DAILY_FREE_CREDITS};
pub use consume::{allocate, Allocation};
pub use error::{LedgerError, Result};
pub use subscription::SubscriptionGrantOutcome;

/// The credit ledger over a storage backend.
pub struct Ledger<S> {
    store: Arc<S>,
    config: LedgerConfig,
}

impl<S> Clone for Ledger<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            config: self.config.clone(),
        }
    }
}

impl<S: Store> Ledger<S> {
    /// Create a ledger over `store`.
    #[must_use]
    pub fn new(store: Arc<S>, config: LedgerConfig) -> Self {
        Self { store, config }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    /// The ledger configuration.
    #[must_use]
    pub fn config(&self) -> &LedgerConfig {
        &self.config
    }
}
