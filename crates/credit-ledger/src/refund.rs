//! Refund engine.

use credit_ledger_core::{CreditTransaction, TransactionId};
use credit_ledger_store::{Store, StoreError};
use tracing::{info, instrument};

use crate::{Ledger, LedgerError, Result};

impl<S: Store> Ledger<S> {
    /// Reverse a consumption by returning its credits to the record it
    /// first drew from.
    ///
    /// A consumption is refunded at most once, even under concurrent calls.
    /// The returned credits keep that record's expiry, and the restore is
    /// capped at that record's `consumed`: credits a consumption drew from
    /// later records are not returned.
    ///
    /// # Errors
    ///
    /// - [`LedgerError::NotFound`] if the transaction or its record is gone
    /// - [`LedgerError::WrongType`] if the transaction is not a consumption
    /// - [`LedgerError::AlreadyRefunded`] on a second refund
    /// - [`LedgerError::InvalidAmount`] if the consumption amount is zero
    #[instrument(skip(self, note))]
    pub fn refund(&self, consume_id: &TransactionId, note: &str) -> Result<TransactionId> {
        // Point-in-time read to learn whose lock to take; the checks below
        // re-read under it.
        let owner = self
            .store
            .get_transaction(consume_id)?
            .ok_or_else(|| not_found("transaction", consume_id))?
            .user_id;

        let refund = self.store.atomically(&owner, |txn| -> Result<_> {
            let original = txn
                .get_transaction(consume_id)?
                .ok_or_else(|| not_found("transaction", consume_id))?;
            if !original.is_consume() {
                return Err(LedgerError::WrongType(original.id));
            }
            if txn.refund_of(&original.id)?.is_some() {
                return Err(LedgerError::AlreadyRefunded(original.id));
            }

            let amount = original.amount.checked_abs().unwrap_or(0);
            if amount == 0 {
                return Err(LedgerError::InvalidAmount {
                    id: original.id,
                    amount: original.amount,
                });
            }

            let mut record = txn
                .get_record(&original.credit_id)?
                .ok_or_else(|| not_found("credit record", &original.credit_id))?;
            let balance_before = record.remaining();
            record.restore(amount);
            let balance_after = record.remaining();

            let refund = CreditTransaction::refund(
                &original,
                amount,
                balance_before,
                balance_after,
                note.to_string(),
            );
            txn.put_record(&record)?;
            txn.put_transaction(&refund).map_err(|err| match err {
                StoreError::Duplicate {
                    entity: "refund", ..
                } => LedgerError::AlreadyRefunded(original.id),
                other => other.into(),
            })?;

            Ok(refund)
        })?;

        info!(
            refund_id = %refund.id,
            user_id = %refund.user_id,
            credit_id = %refund.credit_id,
            amount = refund.amount,
            "Refunded consumption"
        );
        Ok(refund.id)
    }
}

fn not_found(entity: &'static str, id: &impl ToString) -> LedgerError {
    LedgerError::NotFound {
        entity,
        id: id.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, Utc};
    use credit_ledger_core::{CreditRecord, GrantType, TransactionType, UserId};
    use credit_ledger_store::MemoryStore;

    use super::*;
    use crate::LedgerConfig;

    fn funded(amounts: &[i64]) -> (Ledger<MemoryStore>, UserId, Vec<CreditRecord>) {
        let ledger = Ledger::new(Arc::new(MemoryStore::new()), LedgerConfig::default());
        let user_id = UserId::new("refunder").unwrap();
        let now = Utc::now();
        let records: Vec<_> = amounts
            .iter()
            .enumerate()
            .map(|(i, amount)| {
                CreditRecord::issued_at(
                    user_id.clone(),
                    GrantType::quota_pack(),
                    *amount,
                    now - Duration::minutes(60 - i64::try_from(i).unwrap()),
                    None,
                )
            })
            .collect();
        ledger
            .store()
            .atomically(&user_id, |txn| -> Result<()> {
                for record in &records {
                    txn.put_record(record)?;
                }
                Ok(())
            })
            .unwrap();
        (ledger, user_id, records)
    }

    #[test]
    fn refund_restores_the_record_and_logs_entry() {
        let (ledger, user_id, records) = funded(&[100]);
        let consume_id = ledger.consume(&user_id, 40, "image").unwrap();

        let refund_id = ledger.refund(&consume_id, "generation failed").unwrap();

        assert_eq!(ledger.available_balance(&user_id).unwrap(), 100);
        let record = ledger.store().get_record(&records[0].id).unwrap().unwrap();
        assert_eq!(record.consumed, 0);

        let refund = ledger.store().get_transaction(&refund_id).unwrap().unwrap();
        assert_eq!(refund.transaction_type, TransactionType::Refund);
        assert_eq!(refund.amount, 40);
        assert_eq!(refund.related_transaction_id, Some(consume_id));
        assert_eq!(refund.credit_id, records[0].id);
        assert_eq!(refund.balance_before, 60);
        assert_eq!(refund.balance_after, 100);
        assert_eq!(refund.note, "generation failed");

        let history = ledger.list_transactions(&user_id, 10, 0).unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].id, refund_id);
    }

    #[test]
    fn second_refund_is_rejected() {
        let (ledger, user_id, _) = funded(&[100]);
        let consume_id = ledger.consume(&user_id, 40, "image").unwrap();

        ledger.refund(&consume_id, "first").unwrap();
        let err = ledger.refund(&consume_id, "second").unwrap_err();

        assert!(matches!(err, LedgerError::AlreadyRefunded(id) if id == consume_id));
        assert_eq!(ledger.available_balance(&user_id).unwrap(), 100);
        assert_eq!(ledger.list_transactions(&user_id, 10, 0).unwrap().len(), 2);
    }

    #[test]
    fn refund_of_a_refund_is_wrong_type() {
        let (ledger, user_id, _) = funded(&[100]);
        let consume_id = ledger.consume(&user_id, 10, "x").unwrap();
        let refund_id = ledger.refund(&consume_id, "x").unwrap();

        let err = ledger.refund(&refund_id, "again").unwrap_err();
        assert!(matches!(err, LedgerError::WrongType(id) if id == refund_id));
    }

    #[test]
    fn unknown_transaction_is_not_found() {
        let (ledger, _, _) = funded(&[1]);

        let err = ledger.refund(&TransactionId::generate(), "x").unwrap_err();
        assert!(matches!(
            err,
            LedgerError::NotFound {
                entity: "transaction",
                ..
            }
        ));
    }

    #[test]
    fn multi_record_consumption_refunds_into_first_record() {
        let (ledger, user_id, records) = funded(&[100, 50]);
        let consume_id = ledger.consume(&user_id, 120, "video").unwrap();

        ledger.refund(&consume_id, "failed").unwrap();

        let first = ledger.store().get_record(&records[0].id).unwrap().unwrap();
        let second = ledger.store().get_record(&records[1].id).unwrap().unwrap();
        assert_eq!(first.consumed, 0);
        assert_eq!(second.consumed, 20);
        // Credits drawn from the second record are not returned
        assert_eq!(ledger.available_balance(&user_id).unwrap(), 130);

        let entry = &ledger.list_transactions(&user_id, 1, 0).unwrap()[0];
        assert_eq!(entry.transaction_type, TransactionType::Refund);
        assert_eq!(entry.amount, 120);
        assert_eq!(entry.balance_before, 0);
        assert_eq!(entry.balance_after, 100);
    }

    #[test]
    fn refund_into_expired_record_does_not_revive_it() {
        let ledger = Ledger::new(Arc::new(MemoryStore::new()), LedgerConfig::default());
        let user_id = UserId::new("late").unwrap();
        let now = Utc::now();
        let record = CreditRecord::issued_at(
            user_id.clone(),
            GrantType::daily_free(),
            100,
            now - Duration::hours(1),
            Some(now + Duration::minutes(1)),
        );
        ledger
            .store()
            .atomically(&user_id, |txn| -> Result<()> {
                txn.put_record(&record)?;
                Ok(())
            })
            .unwrap();

        let consume_id = ledger.consume_at(&user_id, 30, "x", now).unwrap();
        ledger.refund(&consume_id, "x").unwrap();

        let later = now + Duration::minutes(5);
        assert_eq!(ledger.available_balance_at(&user_id, later).unwrap(), 0);
        assert_eq!(
            ledger.store().get_record(&record.id).unwrap().unwrap().consumed,
            0
        );
    }
}
