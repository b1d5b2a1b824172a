//! In-memory storage implementation.
//!
//! `MemoryStore` keeps every table in process memory behind a single mutex.
//! A unit of work holds the mutex for its whole duration and stages its
//! writes, which are applied only when the closure returns `Ok`. Units of
//! work are all-or-nothing as with the `RocksDB` backend, but serialize
//! across all users rather than per user.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};

use credit_ledger_core::{
    CreditId, CreditRecord, CreditTransaction, PaymentRecord, SubscriptionState, TransactionId,
    TransactionType, UserId,
};

use crate::error::{Result, StoreError};
use crate::{ensure_owner, Store, UserTxn};

/// Committed tables.
#[derive(Debug, Default)]
struct Tables {
    records: HashMap<CreditId, CreditRecord>,
    // BTreeMap keeps ULID (time) order for listings
    transactions: BTreeMap<TransactionId, CreditTransaction>,
    refund_index: HashMap<TransactionId, TransactionId>,
    daily_grants: HashMap<(UserId, String), CreditId>,
    subscriptions: HashMap<UserId, SubscriptionState>,
    payments: Vec<PaymentRecord>,
}

/// Writes staged by one unit of work.
#[derive(Debug, Default)]
struct Staged {
    records: HashMap<CreditId, CreditRecord>,
    transactions: BTreeMap<TransactionId, CreditTransaction>,
    refund_index: HashMap<TransactionId, TransactionId>,
    daily_grants: HashMap<String, CreditId>,
    subscription: Option<SubscriptionState>,
    payments: Vec<PaymentRecord>,
}

/// In-memory storage implementation for tests and embedding.
#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Tables>> {
        self.tables
            .lock()
            .map_err(|_| StoreError::Database("memory store mutex poisoned".into()))
    }
}

impl Store for MemoryStore {
    fn get_record(&self, credit_id: &CreditId) -> Result<Option<CreditRecord>> {
        Ok(self.lock()?.records.get(credit_id).cloned())
    }

    fn list_records_by_user(&self, user_id: &UserId) -> Result<Vec<CreditRecord>> {
        Ok(self
            .lock()?
            .records
            .values()
            .filter(|r| &r.user_id == user_id)
            .cloned()
            .collect())
    }

    fn get_transaction(&self, transaction_id: &TransactionId) -> Result<Option<CreditTransaction>> {
        Ok(self.lock()?.transactions.get(transaction_id).cloned())
    }

    fn list_transactions_by_user(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CreditTransaction>> {
        Ok(self
            .lock()?
            .transactions
            .values()
            .rev()
            .filter(|tx| &tx.user_id == user_id)
            .skip(offset)
            .take(limit)
            .cloned()
            .collect())
    }

    fn get_subscription(&self, user_id: &UserId) -> Result<Option<SubscriptionState>> {
        Ok(self.lock()?.subscriptions.get(user_id).cloned())
    }

    fn list_payments_by_user(&self, user_id: &UserId) -> Result<Vec<PaymentRecord>> {
        Ok(self
            .lock()?
            .payments
            .iter()
            .filter(|p| &p.user_id == user_id)
            .cloned()
            .collect())
    }

    fn atomically<T, E, F>(&self, user_id: &UserId, f: F) -> std::result::Result<T, E>
    where
        F: FnOnce(&mut dyn UserTxn) -> std::result::Result<T, E>,
        E: From<StoreError>,
    {
        let mut tables = self.lock()?;

        let (outcome, staged) = {
            let mut view = MemoryUserTxn {
                tables: &tables,
                staged: Staged::default(),
                user_id,
            };
            let outcome = f(&mut view);
            (outcome, view.staged)
        };

        let value = outcome?;
        apply(&mut tables, user_id, staged);
        Ok(value)
    }
}

/// Apply staged writes to the committed tables.
fn apply(tables: &mut Tables, user_id: &UserId, staged: Staged) {
    tables.records.extend(staged.records);
    tables.transactions.extend(staged.transactions);
    tables.refund_index.extend(staged.refund_index);
    tables.daily_grants.extend(
        staged
            .daily_grants
            .into_iter()
            .map(|(day, id)| ((user_id.clone(), day), id)),
    );
    if let Some(subscription) = staged.subscription {
        tables.subscriptions.insert(user_id.clone(), subscription);
    }
    tables.payments.extend(staged.payments);
}

/// A `UserTxn` over committed tables plus staged writes.
struct MemoryUserTxn<'a> {
    tables: &'a Tables,
    staged: Staged,
    user_id: &'a UserId,
}

impl UserTxn for MemoryUserTxn<'_> {
    fn user_id(&self) -> &UserId {
        self.user_id
    }

    fn records(&mut self) -> Result<Vec<CreditRecord>> {
        let mut records: Vec<CreditRecord> = self
            .tables
            .records
            .values()
            .filter(|r| &r.user_id == self.user_id && !self.staged.records.contains_key(&r.id))
            .cloned()
            .collect();
        records.extend(self.staged.records.values().cloned());
        Ok(records)
    }

    fn get_record(&mut self, credit_id: &CreditId) -> Result<Option<CreditRecord>> {
        Ok(self
            .staged
            .records
            .get(credit_id)
            .or_else(|| self.tables.records.get(credit_id))
            .cloned())
    }

    fn put_record(&mut self, record: &CreditRecord) -> Result<()> {
        ensure_owner(self.user_id, &record.user_id)?;
        self.staged.records.insert(record.id, record.clone());
        Ok(())
    }

    fn get_transaction(
        &mut self,
        transaction_id: &TransactionId,
    ) -> Result<Option<CreditTransaction>> {
        Ok(self
            .staged
            .transactions
            .get(transaction_id)
            .or_else(|| self.tables.transactions.get(transaction_id))
            .cloned())
    }

    fn refund_of(&mut self, consume_id: &TransactionId) -> Result<Option<TransactionId>> {
        Ok(self
            .staged
            .refund_index
            .get(consume_id)
            .or_else(|| self.tables.refund_index.get(consume_id))
            .copied())
    }

    fn put_transaction(&mut self, transaction: &CreditTransaction) -> Result<()> {
        ensure_owner(self.user_id, &transaction.user_id)?;

        if self.get_transaction(&transaction.id)?.is_some() {
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
            if self.refund_of(&related)?.is_some() {
                return Err(StoreError::Duplicate {
                    entity: "refund",
                    key: related.to_string(),
                });
            }
            self.staged.refund_index.insert(related, transaction.id);
        }

        self.staged
            .transactions
            .insert(transaction.id, transaction.clone());
        Ok(())
    }

    fn claim_daily_grant(&mut self, day_key: &str, credit_id: &CreditId) -> Result<bool> {
        let committed = self
            .tables
            .daily_grants
            .contains_key(&(self.user_id.clone(), day_key.to_string()));
        if committed || self.staged.daily_grants.contains_key(day_key) {
            return Ok(false);
        }
        self.staged
            .daily_grants
            .insert(day_key.to_string(), *credit_id);
        Ok(true)
    }

    fn get_subscription(&mut self) -> Result<Option<SubscriptionState>> {
        Ok(self
            .staged
            .subscription
            .clone()
            .or_else(|| self.tables.subscriptions.get(self.user_id).cloned()))
    }

    fn put_subscription(&mut self, subscription: &SubscriptionState) -> Result<()> {
        ensure_owner(self.user_id, &subscription.user_id)?;
        self.staged.subscription = Some(subscription.clone());
        Ok(())
    }

    fn put_payment(&mut self, payment: &PaymentRecord) -> Result<()> {
        ensure_owner(self.user_id, &payment.user_id)?;
        self.staged.payments.push(payment.clone());
        Ok(())
    }
}
