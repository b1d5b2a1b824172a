//! Balance aggregation and read-only reporting.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use credit_ledger_core::{
    record::sort_for_consumption, CreditRecord, CreditTransaction, PaymentRecord, UserId,
};
use credit_ledger_store::Store;
use serde::Serialize;

use crate::{Ledger, Result};

/// Available credit of a user, broken down by grant type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BalanceSummary {
    /// Sum of remaining credit over active records.
    pub available: i64,

    /// Remaining active credit per grant type.
    pub by_grant_type: BTreeMap<String, i64>,

    /// Number of records that can still be drawn from.
    pub active_records: usize,

    /// Earliest expiry among active records, if any expire.
    pub next_expiry: Option<DateTime<Utc>>,
}

impl BalanceSummary {
    /// Summarize `records` as of `now`. Expired and drained records count
    /// for nothing.
    #[must_use]
    pub fn from_records(records: &[CreditRecord], now: DateTime<Utc>) -> Self {
        let mut summary = Self {
            available: 0,
            by_grant_type: BTreeMap::new(),
            active_records: 0,
            next_expiry: None,
        };

        for record in records.iter().filter(|r| r.is_active(now)) {
            let remaining = record.remaining();
            summary.available = summary.available.saturating_add(remaining);
            let per_type = summary
                .by_grant_type
                .entry(record.grant_type.as_str().to_string())
                .or_insert(0);
            *per_type = per_type.saturating_add(remaining);
            summary.active_records += 1;
            if let Some(expires_at) = record.expires_at {
                summary.next_expiry = Some(
                    summary
                        .next_expiry
                        .map_or(expires_at, |current| current.min(expires_at)),
                );
            }
        }

        summary
    }
}

/// Sum of remaining credit over records active at `now`, saturating at
/// `i64::MAX` and never negative.
#[must_use]
pub fn available_in(records: &[CreditRecord], now: DateTime<Utc>) -> i64 {
    records
        .iter()
        .filter(|r| r.is_active(now))
        .map(CreditRecord::remaining)
        .fold(0_i64, i64::saturating_add)
        .max(0)
}

impl<S: Store> Ledger<S> {
    /// Current spendable credit of a user. Unknown users have zero.
    ///
    /// This is a point-in-time read and takes no lock.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub fn available_balance(&self, user_id: &UserId) -> Result<i64> {
        self.available_balance_at(user_id, Utc::now())
    }

    /// Spendable credit of a user as of `now`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub fn available_balance_at(&self, user_id: &UserId, now: DateTime<Utc>) -> Result<i64> {
        let records = self.store.list_records_by_user(user_id)?;
        Ok(available_in(&records, now))
    }

    /// Current balance with a per-grant-type breakdown.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub fn balance_summary(&self, user_id: &UserId) -> Result<BalanceSummary> {
        let records = self.store.list_records_by_user(user_id)?;
        Ok(BalanceSummary::from_records(&records, Utc::now()))
    }

    /// All records of a user, in consumption order, including expired and
    /// drained ones.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub fn list_records(&self, user_id: &UserId) -> Result<Vec<CreditRecord>> {
        let mut records = self.store.list_records_by_user(user_id)?;
        sort_for_consumption(&mut records);
        Ok(records)
    }

    /// A page of a user's ledger entries, newest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub fn list_transactions(
        &self,
        user_id: &UserId,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<CreditTransaction>> {
        Ok(self
            .store
            .list_transactions_by_user(user_id, limit, offset)?)
    }

    /// Subscription payments of a user, oldest first.
    ///
    /// # Errors
    ///
    /// Returns an error if the store read fails.
    pub fn list_payments(&self, user_id: &UserId) -> Result<Vec<PaymentRecord>> {
        Ok(self.store.list_payments_by_user(user_id)?)
    }
}
