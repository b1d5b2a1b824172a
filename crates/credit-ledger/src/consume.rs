//! Consumption engine.

use chrono::{DateTime, Utc};
use credit_ledger_core::{
    record::sort_for_consumption, CreditId, CreditRecord, CreditTransaction, TransactionId, UserId,
};
use credit_ledger_store::Store;
use tracing::{info, instrument, warn};

use crate::{balance::available_in, Ledger, LedgerError, Result};

/// The outcome of drawing an amount across a user's records.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    /// Records that were drawn from, with `consumed` already updated, in the
    /// order they were touched.
    pub touched: Vec<CreditRecord>,

    /// Available balance before the draw.
    pub balance_before: i64,

    /// Available balance after the draw.
    pub balance_after: i64,

    /// Remaining credit of the first touched record before the draw.
    pub record_balance_before: i64,

    /// Remaining credit of the first touched record after the draw.
    pub record_balance_after: i64,
}

impl Allocation {
    /// The first record drawn from. This is the record a consume entry
    /// points at and the one a refund restores.
    #[must_use]
    pub fn first_credit_id(&self) -> Option<CreditId> {
        self.touched.first().map(|r| r.id)
    }
}

/// Draw `amount` across `records` as of `now`.
///
/// Active records are drawn in consumption order (oldest issued first), each
/// contributing up to its remaining credit. If the active total is short,
/// nothing is drawn.
///
/// # Errors
///
/// Returns [`LedgerError::InsufficientCredit`] if the active records cannot
/// cover `amount`.
pub fn allocate(
    mut records: Vec<CreditRecord>,
    amount: i64,
    now: DateTime<Utc>,
) -> Result<Allocation> {
    let balance_before = available_in(&records, now);
    if balance_before < amount {
        return Err(LedgerError::InsufficientCredit {
            available: balance_before,
            required: amount,
        });
    }

    records.retain(|r| r.is_active(now));
    sort_for_consumption(&mut records);

    let mut still_needed = amount;
    let mut touched: Vec<CreditRecord> = Vec::new();
    let mut record_balance_before = 0;
    for mut record in records {
        if still_needed == 0 {
            break;
        }
        if touched.is_empty() {
            record_balance_before = record.remaining();
        }
        still_needed -= record.draw(still_needed);
        touched.push(record);
    }
    let record_balance_after = touched.first().map_or(0, CreditRecord::remaining);

    Ok(Allocation {
        touched,
        balance_before,
        balance_after: balance_before - amount,
        record_balance_before,
        record_balance_after,
    })
}

impl<S: Store> Ledger<S> {
    /// Deduct `amount` from a user's active credit.
    ///
    /// Either every touched record and one consume entry are written, or
    /// nothing is.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Validation`] for a non-positive amount,
    /// [`LedgerError::InsufficientCredit`] if the balance is short, or a
    /// storage error.
    pub fn consume(&self, user_id: &UserId, amount: i64, note: &str) -> Result<TransactionId> {
        self.consume_at(user_id, amount, note, Utc::now())
    }

    /// Deduct `amount` as of `now`. Records expiring before `now` are
    /// skipped.
    ///
    /// # Errors
    ///
    /// See [`Ledger::consume`].
    #[instrument(skip(self, note), fields(user_id = %user_id))]
    pub fn consume_at(
        &self,
        user_id: &UserId,
        amount: i64,
        note: &str,
        now: DateTime<Utc>,
    ) -> Result<TransactionId> {
        if amount <= 0 {
            return Err(LedgerError::Validation(format!(
                "consume amount must be positive, got {amount}"
            )));
        }

        let outcome = self.store.atomically(user_id, |txn| -> Result<_> {
            let allocation = allocate(txn.records()?, amount, now)?;
            let Some(credit_id) = allocation.first_credit_id() else {
                return Err(LedgerError::InsufficientCredit {
                    available: allocation.balance_before,
                    required: amount,
                });
            };

            for record in &allocation.touched {
                txn.put_record(record)?;
            }

            let transaction = CreditTransaction::consume(
                user_id.clone(),
                credit_id,
                amount,
                allocation.record_balance_before,
                allocation.record_balance_after,
                note.to_string(),
            );
            txn.put_transaction(&transaction)?;

            Ok((transaction.id, allocation))
        });

        match outcome {
            Ok((transaction_id, allocation)) => {
                info!(
                    transaction_id = %transaction_id,
                    amount,
                    records = allocation.touched.len(),
                    balance_after = allocation.balance_after,
                    "Consumed credits"
                );
                Ok(transaction_id)
            }
            Err(LedgerError::InsufficientCredit {
                available,
                required,
            }) => {
                warn!(available, required, "Insufficient credit");
                Err(LedgerError::InsufficientCredit {
                    available,
                    required,
                })
            }
            Err(err) => Err(err),
        }
    }
}
