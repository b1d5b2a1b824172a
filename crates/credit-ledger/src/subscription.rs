//! Subscription grant issuer.

use chrono::{DateTime, Utc};
use credit_ledger_core::{
    CreditId, CreditRecord, GrantType, PaymentId, PaymentRecord, PlanKey, SubscriptionState,
    UserId,
};
use credit_ledger_store::Store;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::{Ledger, Result};

/// What a subscription event did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SubscriptionGrantOutcome {
    /// A new grant was created.
    Issued {
        /// The new credit record.
        credit_id: CreditId,
        /// The payment record written alongside it.
        payment_id: PaymentId,
        /// Credits granted.
        amount: i64,
    },

    /// This period was already processed. Nothing was written.
    Duplicate,

    /// The period was recorded but nothing was paid, so nothing was granted.
    NoPayment,
}

impl<S: Store> Ledger<S> {
    /// Grant the plan's credits for a paid subscription period.
    ///
    /// Redelivery of the same period (same `period_ends_at`) is detected and
    /// ignored. The grant expires at `period_ends_at`.
    ///
    /// # Errors
    ///
    /// Returns [`LedgerError::Validation`](crate::LedgerError::Validation)
    /// if the plan has no credit allotment, or a storage error.
    #[instrument(skip(self), fields(user_id = %user_id, plan = %plan))]
    pub fn issue_subscription_grant(
        &self,
        user_id: &UserId,
        plan: PlanKey,
        period_ends_at: DateTime<Utc>,
        amount_paid: i64,
    ) -> Result<SubscriptionGrantOutcome> {
        let credits = self.config.plans.credits_for(plan)?;
        if period_ends_at <= Utc::now() {
            warn!(period_ends_at = %period_ends_at, "Subscription period already ended");
        }

        let outcome = self.store.atomically(user_id, |txn| -> Result<_> {
            if let Some(previous) = txn.get_subscription()? {
                if previous.already_processed(period_ends_at) {
                    return Ok(SubscriptionGrantOutcome::Duplicate);
                }
            }

            let state = SubscriptionState::new(user_id.clone(), plan, period_ends_at);
            if amount_paid <= 0 {
                txn.put_subscription(&state)?;
                return Ok(SubscriptionGrantOutcome::NoPayment);
            }

            let record = CreditRecord::new(
                user_id.clone(),
                GrantType::new(plan.to_string()),
                credits,
                Some(period_ends_at),
            );
            let payment =
                PaymentRecord::new(user_id.clone(), plan, amount_paid, period_ends_at, record.id);

            txn.put_record(&record)?;
            txn.put_payment(&payment)?;
            txn.put_subscription(&state)?;

            Ok(SubscriptionGrantOutcome::Issued {
                credit_id: record.id,
                payment_id: payment.id,
                amount: credits,
            })
        })?;

        match outcome {
            SubscriptionGrantOutcome::Issued {
                credit_id, amount, ..
            } => info!(credit_id = %credit_id, amount, "Issued subscription grant"),
            SubscriptionGrantOutcome::Duplicate => {
                info!(period_ends_at = %period_ends_at, "Subscription period already processed");
            }
            SubscriptionGrantOutcome::NoPayment => {
                info!(amount_paid, "Subscription period recorded without payment");
            }
        }

        Ok(outcome)
    }
}
