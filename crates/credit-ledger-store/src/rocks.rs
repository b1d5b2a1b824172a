//! `RocksDB` storage implementation.
//!
//! This module provides the `RocksStore` implementation of the `Store` trait
//! on top of a pessimistic `TransactionDB`. A unit of work first locks the
//! user's key in the `user_locks` column family with `get_for_update`; every
//! other unit of work for the same user blocks there until the first one
//! commits or rolls back.

use std::path::Path;
use std::sync::Arc;

use rocksdb::{
    BoundColumnFamily, ColumnFamilyDescriptor, Direction, ErrorKind, IteratorMode, MultiThreaded,
    Options, SnapshotWithThreadMode, Transaction, TransactionDB, TransactionDBOptions,
};

use credit_ledger_core::{
    CreditId, CreditRecord, CreditTransaction, GrantType, PaymentRecord, SubscriptionState,
    TransactionId, TransactionType, UserId,
};

use crate::error::{Result, StoreError};
use crate::keys;
use crate::schema::{all_column_families, cf};
use crate::{ensure_owner, Store, UserTxn};

type Db = TransactionDB<MultiThreaded>;
type Snapshot<'a> = SnapshotWithThreadMode<'a, Db>;

/// Default time a unit of work waits for a user's lock, per attempt.
pub const DEFAULT_LOCK_TIMEOUT_MS: i64 = 1000;

/// Default number of lock acquisition attempts before giving up.
pub const DEFAULT_MAX_LOCK_ATTEMPTS: u32 = 5;

/// Locking options for [`RocksStore`].
#[derive(Debug, Clone, Copy)]
pub struct RocksStoreOptions {
    /// How long one attempt waits for a user's lock, in milliseconds.
    pub lock_timeout_ms: i64,

    /// How many times lock acquisition is attempted before
    /// `StoreError::LockTimeout` is returned.
    pub max_lock_attempts: u32,
}

impl Default for RocksStoreOptions {
    fn default() -> Self {
        Self {
            lock_timeout_ms: DEFAULT_LOCK_TIMEOUT_MS,
            max_lock_attempts: DEFAULT_MAX_LOCK_ATTEMPTS,
        }
    }
}

/// RocksDB-backed storage implementation.
pub struct RocksStore {
    db: Arc<Db>,
    options: RocksStoreOptions,
}

impl RocksStore {
    /// Open or create a `RocksDB` database at the given path.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::open_with(path, RocksStoreOptions::default())
    }

    /// Open or create a `RocksDB` database with explicit locking options.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be opened or created.
    pub fn open_with<P: AsRef<Path>>(path: P, options: RocksStoreOptions) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let mut txn_opts = TransactionDBOptions::default();
        txn_opts.set_txn_lock_timeout(options.lock_timeout_ms);

        let cf_descriptors: Vec<_> = all_column_families()
            .into_iter()
            .map(|name| ColumnFamilyDescriptor::new(name, Options::default()))
            .collect();

        let db = Db::open_cf_descriptors(&opts, &txn_opts, path, cf_descriptors)
            .map_err(db_err)?;

        Ok(Self {
            db: Arc::new(db),
            options,
        })
    }

    /// Get a column family handle.
    fn cf(&self, name: &str) -> Result<Arc<BoundColumnFamily<'_>>> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| StoreError::Database(format!("column family not found: {name}")))
    }

    /// Serialize a value using CBOR.
    fn serialize<T: serde::Serialize>(value: &T) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(value, &mut buf)
            .map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize a value from CBOR.
    fn deserialize<T: serde::de::DeserializeOwned>(data: &[u8]) -> Result<T> {
        ciborium::from_reader(data).map_err(|e| StoreError::Serialization(e.to_string()))
    }

    /// Read a CBOR value as of `snapshot`.
    fn get_value<T: serde::de::DeserializeOwned>(
        &self,
        snapshot: &Snapshot<'_>,
        name: &str,
        key: &[u8],
    ) -> Result<Option<T>> {
        let cf = self.cf(name)?;
        snapshot
            .get_cf(&cf, key)
            .map_err(db_err)?
            .map(|data| Self::deserialize(&data))
            .transpose()
    }

    /// Collect the trailing ULIDs of all index keys under `prefix` as of
    /// `snapshot`.
    fn index_ids(&self, snapshot: &Snapshot<'_>, name: &str, prefix: &[u8]) -> Result<Vec<[u8; 16]>> {
        let cf = self.cf(name)?;
        let iter = snapshot.iterator_cf(&cf, IteratorMode::From(prefix, Direction::Forward));
        collect_index_ids(iter, prefix)
    }

    /// Start a transaction holding the lock of `user_id`.
    fn begin(&self, user_id: &UserId) -> Result<Transaction<'_, Db>> {
        let lock_cf = self.cf(cf::USER_LOCKS)?;
        let lock_key = keys::user_lock_key(user_id);
        let max_attempts = self.options.max_lock_attempts.max(1);

        let mut attempt = 0;
        loop {
            attempt += 1;
            let txn = self.db.transaction();
            match txn.get_for_update_cf(&lock_cf, &lock_key, true) {
                Ok(_) => return Ok(txn),
                Err(e) if is_lock_contention(&e) => {
                    if attempt >= max_attempts {
                        tracing::warn!(
                            user_id = %user_id,
                            attempts = attempt,
                            "Gave up waiting for ledger lock"
                        );
                        return Err(StoreError::LockTimeout {
                            user_id: user_id.to_string(),
                        });
                    }
                    tracing::debug!(user_id = %user_id, attempt, "Ledger lock contended, retrying");
                }
                Err(e) => return Err(db_err(e)),
            }
        }
    }
}

/// Check if a `RocksDB` error means another transaction holds the lock.
fn is_lock_contention(err: &rocksdb::Error) -> bool {
    matches!(
        err.kind(),
        ErrorKind::Busy | ErrorKind::TimedOut | ErrorKind::TryAgain
    )
}

#[allow(clippy::needless_pass_by_value)]
fn db_err(err: rocksdb::Error) -> StoreError {
    StoreError::Database(err.to_string())
}

/// Walk an iterator positioned at `prefix` and collect trailing ULIDs until
/// the prefix no longer matches.
fn collect_index_ids<I>(iter: I, prefix: &[u8]) -> Result<Vec<[u8; 16]>>
where
    I: Iterator<Item = std::result::Result<(Box<[u8]>, Box<[u8]>), rocksdb::Error>>,
{
    let mut ids = Vec::new();
    for item in iter {
        let (key, _) = item.map_err(db_err)?;
        if !key.starts_with(prefix) {
            break;
        }
        match keys::trailing_ulid(&key, prefix.len()) {
            Some(id) => ids.push(id),
            None => tracing::warn!(key_len = key.len(), "Skipping malformed index key"),
        }
    }
    Ok(ids)
}

impl Store for RocksStore {
    // =========================================================================
    // Point-in-time reads
    // =========================================================================

    fn get_record(&self, credit_id: &CreditId) -> Result<Option<CreditRecord>> {
        self.get_value(
            &self.db.snapshot(),
            cf::CREDIT_RECORDS,
            &keys::record_key(credit_id),
        )
    }

    fn list_records_by_user(&self, user_id: &UserId) -> Result<Vec<CreditRecord>> {
        // Index scan and row reads share one snapshot, so a concurrent
        // multi-record commit is seen entirely or not at all
        let snapshot = self.db.snapshot();
        let prefix = keys::user_prefix(user_id);
        let mut records = Vec::new();
        for id in self.index_ids(&snapshot, cf::RECORDS_BY_USER, &prefix)? {
            let key = keys::record_key(&CreditId::from_bytes(id));
            if let Some(record) = self.get_value(&snapshot, cf::CREDIT_RECORDS, &key)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    fn get_transaction(&self, transaction_id: &TransactionId) -> Result<Option<CreditTransaction>> {
        self.get_value(
            &self.db.snapshot(),
            cf::TRANSACTIONS,
            &keys::transaction_key(transaction_id),
        )
    }

    fn list_transactions_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CreditTransaction>> {
        let snapshot = self.db.snapshot();
        let prefix = keys::user_prefix(user_id);

        // ULIDs are time-ordered, so reversing the index gives newest first
        let mut ids = self.index_ids(&snapshot, cf::TRANSACTIONS_BY_USER, &prefix)?;
        ids.reverse();

        let mut transactions = Vec::new();
        for id in ids.into_iter().skip(offset).take(limit) {
            let key = keys::transaction_key(&TransactionId::from_bytes(id));
            if let Some(tx) = self.get_value(&snapshot, cf::TRANSACTIONS, &key)? {
                transactions.push(tx);
            }
        }

        Ok(transactions)
    }

    fn get_subscription(&self, user_id: &UserId) -> Result<Option<SubscriptionState>> {
        self.get_value(
            &self.db.snapshot(),
            cf::SUBSCRIPTIONS,
            &keys::subscription_key(user_id),
        )
    }

    fn list_payments_by_user(&self, user_id: &UserId) -> Result<Vec<PaymentRecord>> {
        let cf = self.cf(cf::PAYMENTS)?;
        let prefix = keys::user_prefix(user_id);
        let snapshot = self.db.snapshot();
        let iter = snapshot.iterator_cf(&cf, IteratorMode::From(&prefix, Direction::Forward));

        let mut payments = Vec::new();
        for item in iter {
            let (key, value) = item.map_err(db_err)?;
            if !key.starts_with(&prefix) {
                break;
            }
            payments.push(Self::deserialize(&value)?);
        }
        Ok(payments)
    }

    // =========================================================================
    // Unit of work
    // =========================================================================

    fn atomically<T, E, F>(&self, user_id: &UserId, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut dyn UserTxn) -> std::result::Result<T, E>,
        E: From<StoreError>,
    {
        let txn = self.begin(user_id)?;

        let outcome = {
            let mut view = RocksUserTxn {
                store: self,
                txn: &txn,
                user_id,
            };
            f(&mut view)
        };

        match outcome {
            Ok(value) => {
                txn.commit().map_err(db_err)?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback_err) = txn.rollback() {
                    tracing::error!(error = %rollback_err, "Failed to roll back ledger transaction");
                }
                Err(e)
            }
        }
    }
}

/// A `UserTxn` backed by a `RocksDB` transaction.
struct RocksUserTxn<'a, 't> {
    store: &'a RocksStore,
    txn: &'t Transaction<'a, Db>,
    user_id: &'t UserId,
}

impl RocksUserTxn<'_, '_> {
    fn get_value<T: serde::de::DeserializeOwned>(&self, name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.store.cf(name)?;
        self.txn
            .get_cf(&cf, key)
            .map_err(db_err)?
            .map(|data| RocksStore::deserialize(&data))
            .transpose()
    }

    fn put_value<T: serde::Serialize>(&self, name: &str, key: &[u8], value: &T) -> Result<()> {
        let cf = self.store.cf(name)?;
        let value = RocksStore::serialize(value)?;
        self.txn.put_cf(&cf, key, value).map_err(db_err)
    }

    fn put_index(&self, name: &str, key: &[u8]) -> Result<()> {
        let cf = self.store.cf(name)?;
        self.txn.put_cf(&cf, key, []).map_err(db_err)
    }
}

impl UserTxn for RocksUserTxn<'_, '_> {
    fn user_id(&self) -> &UserId {
        self.user_id
    }

    fn records(&mut self) -> Result<Vec<CreditRecord>> {
        let cf = self.store.cf(cf::RECORDS_BY_USER)?;
        let prefix = keys::user_prefix(self.user_id);
        let iter = self
            .txn
            .iterator_cf(&cf, IteratorMode::From(&prefix, Direction::Forward));

        let mut records = Vec::new();
        for id in collect_index_ids(iter, &prefix)? {
            let credit_id = CreditId::from_bytes(id);
            if let Some(record) = self.get_record(&credit_id)? {
                records.push(record);
            }
        }
        Ok(records)
    }

    fn get_record(&mut self, credit_id: &CreditId) -> Result<Option<CreditRecord>> {
        self.get_value(cf::CREDIT_RECORDS, &keys::record_key(credit_id))
    }

    fn put_record(&mut self, record: &CreditRecord) -> Result<()> {
        ensure_owner(self.user_id, &record.user_id)?;
        self.put_value(cf::CREDIT_RECORDS, &keys::record_key(&record.id), record)?;
        self.put_index(
            cf::RECORDS_BY_USER,
            &keys::user_record_key(self.user_id, &record.id),
        )
    }

    fn get_transaction(
        &mut self,
        transaction_id: &TransactionId,
    ) -> Result<Option<CreditTransaction>> {
        self.get_value(cf::TRANSACTIONS, &keys::transaction_key(transaction_id))
    }

    fn refund_of(&mut self, consume_id: &TransactionId) -> Result<Option<TransactionId>> {
        let cf = self.store.cf(cf::REFUND_INDEX)?;
        let value = self
            .txn
            .get_cf(&cf, keys::refund_index_key(consume_id))
            .map_err(db_err)?;

        Ok(value.and_then(|bytes| {
            let bytes: [u8; 16] = bytes.as_slice().try_into().ok()?;
            Some(TransactionId::from_bytes(bytes))
        }))
    }

    fn put_transaction(&mut self, transaction: &CreditTransaction) -> Result<()> {
        ensure_owner(self.user_id, &transaction.user_id)?;

        let tx_cf = self.store.cf(cf::TRANSACTIONS)?;
        let tx_key = keys::transaction_key(&transaction.id);
        if self.txn.get_cf(&tx_cf, &tx_key).map_err(db_err)?.is_some() {
            return Err(StoreError::Duplicate {
                entity: "transaction",
                key: transaction.id.to_string(),
            });
        }

        if transaction.transaction_type == TransactionType::Refund {
            let related = transaction.related_transaction_id.ok_or_else(|| {
                StoreError::Database(format!(
                    "refund {} has no related transaction",
                    transaction.id
                ))
            })?;

            let refund_cf = self.store.cf(cf::REFUND_INDEX)?;
            let refund_key = keys::refund_index_key(&related);
            let existing = self
                .txn
                .get_for_update_cf(&refund_cf, &refund_key, true)
                .map_err(db_err)?;
            if existing.is_some() {
                return Err(StoreError::Duplicate {
                    entity: "refund",
                    key: related.to_string(),
                });
            }
            self.txn
                .put_cf(&refund_cf, &refund_key, transaction.id.to_bytes())
                .map_err(db_err)?;
        }

        let value = RocksStore::serialize(transaction)?;
        self.txn.put_cf(&tx_cf, &tx_key, value).map_err(db_err)?;
        self.put_index(
            cf::TRANSACTIONS_BY_USER,
            &keys::user_transaction_key(self.user_id, &transaction.id),
        )
    }

    fn claim_daily_grant(&mut self, day_key: &str, credit_id: &CreditId) -> Result<bool> {
        let cf = self.store.cf(cf::DAILY_GRANTS)?;
        let key = keys::daily_grant_key(self.user_id, GrantType::DAILY_FREE, day_key);

        let existing = self
            .txn
            .get_for_update_cf(&cf, &key, true)
            .map_err(db_err)?;
        if existing.is_some() {
            return Ok(false);
        }

        self.txn
            .put_cf(&cf, &key, credit_id.to_bytes())
            .map_err(db_err)?;
        Ok(true)
    }

    fn get_subscription(&mut self) -> Result<Option<SubscriptionState>> {
        self.get_value(cf::SUBSCRIPTIONS, &keys::subscription_key(self.user_id))
    }

    fn put_subscription(&mut self, subscription: &SubscriptionState) -> Result<()> {
        ensure_owner(self.user_id, &subscription.user_id)?;
        self.put_value(
            cf::SUBSCRIPTIONS,
            &keys::subscription_key(self.user_id),
            subscription,
        )
    }

    fn put_payment(&mut self, payment: &PaymentRecord) -> Result<()> {
        ensure_owner(self.user_id, &payment.user_id)?;
        self.put_value(
            cf::PAYMENTS,
            &keys::payment_key(self.user_id, &payment.id),
            payment,
        )
    }
}
