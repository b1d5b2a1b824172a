//! Storage layer for the credit ledger.
//!
//! This crate provides persistent storage for credit records, ledger entries
//! and billing state, behind the [`Store`] trait.
//!
//! # Units of work
//!
//! Every mutation goes through [`Store::atomically`], which takes the
//! per-user lock, hands the closure a [`UserTxn`] view, and commits all of the
//! closure's writes together if it returns `Ok` (or discards them if it
//! returns `Err`). All mutators of one user therefore serialize, and no
//! partial state is ever visible.
//!
//! Backends:
//!
//! - [`RocksStore`]: `RocksDB` `TransactionDB` with pessimistic locking
//!   (`get_for_update` on a per-user lock key).
//! - [`MemoryStore`]: in-process tables behind a mutex, for tests.
//!
//! # Example
//!
//! ```no_run
//! use credit_ledger_core::{CreditRecord, GrantType, UserId};
//! use credit_ledger_store::{RocksStore, Store, StoreError};
//!
//! let store = RocksStore::open("/tmp/credit-ledger-db").unwrap();
//! let user_id = UserId::generate();
//!
//! store
//!     .atomically(&user_id, |txn| {
//!         let record = CreditRecord::new(user_id.clone(), GrantType::quota_pack(), 500, None);
//!         txn.put_record(&record)?;
//!         Ok::<_, StoreError>(())
//!     })
//!     .unwrap();
//!
//! let records = store.list_records_by_user(&user_id).unwrap();
//! assert_eq!(records.len(), 1);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
#[cfg(feature = "rocksdb-backend")]
pub mod keys;
pub mod memory;
#[cfg(feature = "rocksdb-backend")]
pub mod rocks;
#[cfg(feature = "rocksdb-backend")]
pub mod schema;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
#[cfg(feature = "rocksdb-backend")]
pub use rocks::{RocksStore, RocksStoreOptions};

use credit_ledger_core::{
    CreditId, CreditRecord, CreditTransaction, PaymentRecord, SubscriptionState, TransactionId,
    UserId,
};

/// The storage trait defining all database operations.
///
/// Reads on the trait itself are point-in-time and take no locks. Writes are
/// only possible inside [`Store::atomically`].
pub trait Store: Send + Sync {
    // =========================================================================
    // Point-in-time reads
    // =========================================================================

    /// Get a credit record by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_record(&self, credit_id: &CreditId) -> Result<Option<CreditRecord>>;

    /// List all credit records of a user, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_records_by_user(&self, user_id: &UserId) -> Result<Vec<CreditRecord>>;

    /// Get a ledger entry by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_transaction(&self, transaction_id: &TransactionId) -> Result<Option<CreditTransaction>>;

    /// List ledger entries for a user, ordered by time (newest first).
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_transactions_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CreditTransaction>>;

    /// Get the last processed subscription state of a user.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_subscription(&self, user_id: &UserId) -> Result<Option<SubscriptionState>>;

    /// List payment records of a user, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn list_payments_by_user(&self, user_id: &UserId) -> Result<Vec<PaymentRecord>>;

    // =========================================================================
    // Unit of work
    // =========================================================================

    /// Run `f` while holding the ledger lock of `user_id`.
    ///
    /// Writes made through the [`UserTxn`] commit atomically when `f` returns
    /// `Ok`, and are discarded when it returns `Err`.
    ///
    /// # Errors
    ///
    /// Returns the closure's error, or a storage error converted into `E` if
    /// the lock cannot be acquired or the commit fails.
    fn atomically<T, E, F>(&self, user_id: &UserId, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut dyn UserTxn) -> std::result::Result<T, E>,
        E: From<StoreError>;
}

/// A locked, transactional view of one user's ledger rows.
///
/// Reads observe the transaction's own uncommitted writes.
pub trait UserTxn {
    /// The user whose lock is held.
    fn user_id(&self) -> &UserId;

    /// All credit records of the locked user, in no particular order.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn records(&mut self) -> Result<Vec<CreditRecord>>;

    /// Get a credit record by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_record(&mut self, credit_id: &CreditId) -> Result<Option<CreditRecord>>;

    /// Insert or update a credit record of the locked user.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::UserMismatch` if the record belongs to another
    /// user, or an error if the database operation fails.
    fn put_record(&mut self, record: &CreditRecord) -> Result<()>;

    /// Get a ledger entry by ID.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_transaction(&mut self, transaction_id: &TransactionId)
        -> Result<Option<CreditTransaction>>;

    /// The refund entry reversing `consume_id`, if one exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn refund_of(&mut self, consume_id: &TransactionId) -> Result<Option<TransactionId>>;

    /// Append a ledger entry for the locked user.
    ///
    /// Refund entries also claim the refund index of the transaction they
    /// reverse.
    ///
    /// # Errors
    ///
    /// - `StoreError::Duplicate` if the entry ID exists, or a refund already
    ///   reverses the same transaction.
    /// - `StoreError::UserMismatch` if the entry belongs to another user.
    fn put_transaction(&mut self, transaction: &CreditTransaction) -> Result<()>;

    /// Claim the `(user, daily_free, day)` uniqueness key for `credit_id`.
    ///
    /// Returns `false` without writing if the day is already claimed.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn claim_daily_grant(&mut self, day_key: &str, credit_id: &CreditId) -> Result<bool>;

    /// Get the subscription state of the locked user.
    ///
    /// # Errors
    ///
    /// Returns an error if the database operation fails.
    fn get_subscription(&mut self) -> Result<Option<SubscriptionState>>;

    /// Write the subscription state of the locked user.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::UserMismatch` for another user's state.
    fn put_subscription(&mut self, subscription: &SubscriptionState) -> Result<()>;

    /// Append a payment record for the locked user.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::UserMismatch` for another user's payment.
    fn put_payment(&mut self, payment: &PaymentRecord) -> Result<()>;
}

/// Reject writes of rows owned by a user other than the locked one.
pub(crate) fn ensure_owner(locked: &UserId, owner: &UserId) -> Result<()> {
    if locked == owner {
        Ok(())
    } else {
        Err(StoreError::UserMismatch {
            expected: locked.to_string(),
            actual: owner.to_string(),
        })
    }
}
