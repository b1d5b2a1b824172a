//! Billing-side state kept next to the ledger.
//!
//! The subscription grant issuer needs to recognise a redelivered payment
//! event. It does so by remembering, per user, the period end of the last
//! processed payment. Each genuine payment also leaves a `PaymentRecord`
//! written in the same atomic unit as the credit grant.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CreditId, PaymentId, PlanKey, UserId};

/// Last processed subscription billing state for a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionState {
    /// The subscriber.
    pub user_id: UserId,

    /// Plan of the last processed event.
    pub plan: PlanKey,

    /// Period end (next billing timestamp) of the last processed event.
    pub period_ends_at: DateTime<Utc>,

    /// When this state was last written.
    pub updated_at: DateTime<Utc>,
}

impl SubscriptionState {
    /// Create a state for a freshly processed event.
    #[must_use]
    pub fn new(user_id: UserId, plan: PlanKey, period_ends_at: DateTime<Utc>) -> Self {
        Self {
            user_id,
            plan,
            period_ends_at,
            updated_at: Utc::now(),
        }
    }

    /// Check if an incoming event for `period_ends_at` was already processed.
    #[must_use]
    pub fn already_processed(&self, period_ends_at: DateTime<Utc>) -> bool {
        self.period_ends_at == period_ends_at
    }
}

/// A successful subscription payment and the grant it produced.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    /// Unique payment ID (ULID).
    pub id: PaymentId,

    /// The paying user.
    pub user_id: UserId,

    /// The plan paid for.
    pub plan: PlanKey,

    /// Amount paid, in the payment platform's minor currency unit.
    pub amount_paid: i64,

    /// End of the paid period.
    pub period_ends_at: DateTime<Utc>,

    /// The credit record granted for this payment.
    pub credit_id: CreditId,

    /// When the payment was recorded.
    pub created_at: DateTime<Utc>,
}

impl PaymentRecord {
    /// Create a payment record for a grant.
    #[must_use]
    pub fn new(
        user_id: UserId,
        plan: PlanKey,
        amount_paid: i64,
        period_ends_at: DateTime<Utc>,
        credit_id: CreditId,
    ) -> Self {
        Self {
            id: PaymentId::generate(),
            user_id,
            plan,
            amount_paid,
            period_ends_at,
            credit_id,
            created_at: Utc::now(),
        }
    }
}
