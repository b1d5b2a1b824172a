//! Daily free grant issuer.

use chrono::{DateTime, Utc};
use credit_ledger_core::{CreditRecord, DayWindow, GrantType, PlanTier, UserId};
use credit_ledger_store::Store;
use tracing::{debug, info, instrument};

use crate::{Ledger, Result};

impl<S: Store> Ledger<S> {
    /// Issue today's free grant to a free-tier user, at most once per UTC
    /// calendar day.
    ///
    /// Returns `true` if a grant was created by this call.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn issue_daily_grant_if_due(&self, user_id: &UserId, tier: PlanTier) -> Result<bool> {
        self.issue_daily_grant_at(user_id, tier, Utc::now())
    }

    /// Issue the free grant for the UTC day containing `now`.
    ///
    /// The grant is stamped `now` and expires at the last millisecond of
    /// that day.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    #[instrument(skip(self), fields(user_id = %user_id))]
    pub fn issue_daily_grant_at(
        &self,
        user_id: &UserId,
        tier: PlanTier,
        now: DateTime<Utc>,
    ) -> Result<bool> {
        if !tier.is_free() {
            debug!(tier = %tier, "Paid tier gets no daily grant");
            return Ok(false);
        }

        let day = DayWindow::containing(now);
        let amount = self.config.daily_free_credits;

        let issued = self.store.atomically(user_id, |txn| -> Result<_> {
            let already_issued = txn
                .records()?
                .iter()
                .any(|r| r.grant_type.is_daily_free() && day.contains(r.issued_at));
            if already_issued {
                return Ok(None);
            }

            let record = CreditRecord::issued_at(
                user_id.clone(),
                GrantType::daily_free(),
                amount,
                now,
                Some(day.end),
            );
            if !txn.claim_daily_grant(&day.key(), &record.id)? {
                return Ok(None);
            }
            txn.put_record(&record)?;

            Ok(Some(record.id))
        })?;

        match issued {
            Some(credit_id) => {
                info!(credit_id = %credit_id, amount, day = %day.key(), "Issued daily grant");
                Ok(true)
            }
            None => {
                debug!(day = %day.key(), "Daily grant already issued");
                Ok(false)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{Duration, TimeZone};
    use credit_ledger_store::MemoryStore;

    use super::*;
    use crate::LedgerConfig;

    fn ledger() -> Ledger<MemoryStore> {
        Ledger::new(Arc::new(MemoryStore::new()), LedgerConfig::default())
    }

    fn at(h: u32, m: u32, s: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 5, 17, h, m, s).unwrap()
    }

    #[test]
    fn first_call_of_the_day_issues() {
        let ledger = ledger();
        let user_id = UserId::new("free-user").unwrap();
        let now = at(9, 30, 0);

        assert!(ledger.issue_daily_grant_at(&user_id, PlanTier::Free, now).unwrap());

        let records = ledger.list_records(&user_id).unwrap();
        assert_eq!(records.len(), 1);
        let grant = &records[0];
        assert!(grant.grant_type.is_daily_free());
        assert_eq!(grant.amount, 100);
        assert_eq!(grant.consumed, 0);
        assert_eq!(grant.issued_at, now);
        assert_eq!(
            grant.expires_at,
            Some(at(23, 59, 59) + Duration::milliseconds(999))
        );
    }

    #[test]
    fn second_call_same_day_is_a_no_op() {
        let ledger = ledger();
        let user_id = UserId::new("free-user").unwrap();

        assert!(ledger
            .issue_daily_grant_at(&user_id, PlanTier::Free, at(0, 0, 0))
            .unwrap());
        assert!(!ledger
            .issue_daily_grant_at(&user_id, PlanTier::Free, at(23, 59, 59))
            .unwrap());
        assert_eq!(ledger.list_records(&user_id).unwrap().len(), 1);
    }

    #[test]
    fn spent_grant_is_not_reissued_the_same_day() {
        let ledger = ledger();
        let user_id = UserId::new("free-user").unwrap();
        let now = at(8, 0, 0);

        ledger.issue_daily_grant_at(&user_id, PlanTier::Free, now).unwrap();
        ledger.consume_at(&user_id, 100, "all of it", now).unwrap();

        assert!(!ledger
            .issue_daily_grant_at(&user_id, PlanTier::Free, now + Duration::hours(1))
            .unwrap());
        assert_eq!(
            ledger
                .available_balance_at(&user_id, now + Duration::hours(1))
                .unwrap(),
            0
        );
    }

    #[test]
    fn next_day_issues_again_and_old_grant_expires() {
        let ledger = ledger();
        let user_id = UserId::new("free-user").unwrap();
        let today = at(12, 0, 0);
        let tomorrow = today + Duration::days(1);

        assert!(ledger.issue_daily_grant_at(&user_id, PlanTier::Free, today).unwrap());
        assert!(ledger
            .issue_daily_grant_at(&user_id, PlanTier::Free, tomorrow)
            .unwrap());

        assert_eq!(ledger.list_records(&user_id).unwrap().len(), 2);
        assert_eq!(ledger.available_balance_at(&user_id, tomorrow).unwrap(), 100);
    }

    #[test]
    fn existing_grant_blocks_only_its_own_day() {
        let ledger = ledger();
        let midnight = at(0, 0, 0);
        let late = UserId::new("late-yesterday").unwrap();
        let early = UserId::new("early-today").unwrap();

        ledger
            .store()
            .atomically(&late, |txn| -> Result<()> {
                let last_millisecond = midnight - Duration::milliseconds(1);
                txn.put_record(&CreditRecord::issued_at(
                    late.clone(),
                    GrantType::daily_free(),
                    100,
                    last_millisecond,
                    Some(last_millisecond),
                ))?;
                Ok(())
            })
            .unwrap();
        ledger
            .store()
            .atomically(&early, |txn| -> Result<()> {
                txn.put_record(&CreditRecord::issued_at(
                    early.clone(),
                    GrantType::daily_free(),
                    100,
                    midnight,
                    Some(at(23, 59, 59) + Duration::milliseconds(999)),
                ))?;
                Ok(())
            })
            .unwrap();

        assert!(ledger
            .issue_daily_grant_at(&late, PlanTier::Free, midnight)
            .unwrap());
        assert!(!ledger
            .issue_daily_grant_at(&early, PlanTier::Free, at(6, 0, 0))
            .unwrap());
    }

    #[test]
    fn paid_tiers_get_nothing() {
        let ledger = ledger();
        let user_id = UserId::new("paying").unwrap();

        for tier in [PlanTier::Basic, PlanTier::Plus, PlanTier::Pro] {
            assert!(!ledger.issue_daily_grant_if_due(&user_id, tier).unwrap());
        }
        assert!(ledger.list_records(&user_id).unwrap().is_empty());
    }

    #[test]
    fn grant_size_follows_config() {
        let config = LedgerConfig {
            daily_free_credits: 25,
            ..LedgerConfig::default()
        };
        let ledger = Ledger::new(Arc::new(MemoryStore::new()), config);
        let user_id = UserId::new("configured").unwrap();

        ledger.issue_daily_grant_if_due(&user_id, PlanTier::Free).unwrap();
        assert_eq!(ledger.available_balance(&user_id).unwrap(), 25);
    }

    #[test]
    fn users_are_independent() {
        let ledger = ledger();
        let now = at(10, 0, 0);
        let alice = UserId::new("alice").unwrap();
        let bob = UserId::new("bob").unwrap();

        assert!(ledger.issue_daily_grant_at(&alice, PlanTier::Free, now).unwrap());
        assert!(ledger.issue_daily_grant_at(&bob, PlanTier::Free, now).unwrap());
    }
}
