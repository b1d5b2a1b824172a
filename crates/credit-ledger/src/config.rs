//! Ledger configuration.

use credit_ledger_core::PlanCatalog;

/// Default size of the daily free grant.
pub const DEFAULT_DAILY_FREE_CREDITS: i64 = 100;

/// Settings the ledger engines read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerConfig {
    /// Credits issued by each daily free grant.
    pub daily_free_credits: i64,

    /// Plan → credits table for subscription grants.
    pub plans: PlanCatalog,
}

impl Default for LedgerConfig {
    fn default() -> Self {
        Self {
            daily_free_credits: DEFAULT_DAILY_FREE_CREDITS,
            plans: PlanCatalog::default(),
        }
    }
}
