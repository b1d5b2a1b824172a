//! Database schema definitions and column families.
//!
//! This module defines the column families used in `RocksDB` storage.

/// Column family names for the `RocksDB` database.
pub mod cf {
    /// Credit records, keyed by `credit_id` (ULID).
    pub const CREDIT_RECORDS: &str = "credit_records";

    /// Index: records by user, keyed by `user_id || 0x00 || credit_id`.
    /// Value is empty (index only).
    pub const RECORDS_BY_USER: &str = "records_by_user";

    /// Ledger entries, keyed by `transaction_id` (ULID).
    pub const TRANSACTIONS: &str = "transactions";

    /// Index: ledger entries by user, keyed by `user_id || 0x00 || transaction_id`.
    /// Value is empty (index only).
    pub const TRANSACTIONS_BY_USER: &str = "transactions_by_user";

    /// Unique index: consume `transaction_id` → refund `transaction_id`.
    pub const REFUND_INDEX: &str = "refund_index";

    /// Unique index: `user_id || 0x00 || grant_type || 0x00 || day` → `credit_id`.
    pub const DAILY_GRANTS: &str = "daily_grants";

    /// Subscription state, keyed by `user_id`.
    pub const SUBSCRIPTIONS: &str = "subscriptions";

    /// Payment records, keyed by `user_id || 0x00 || payment_id`.
    pub const PAYMENTS: &str = "payments";

    /// One key per user, locked with `get_for_update` by every unit of work.
    /// Values are never written.
    pub const USER_LOCKS: &str = "user_locks";
}

/// Returns all column family names for database initialization.
#[must_use]
pub fn all_column_families() -> Vec<&'static str> {
    vec![
        cf::CREDIT_RECORDS,
        cf::RECORDS_BY_USER,
        cf::TRANSACTIONS,
        cf::TRANSACTIONS_BY_USER,
        cf::REFUND_INDEX,
        cf::DAILY_GRANTS,
        cf::SUBSCRIPTIONS,
        cf::PAYMENTS,
        cf::USER_LOCKS,
    ]
}
