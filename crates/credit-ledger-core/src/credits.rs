//! Ledger entry types.
//!
//! Every balance-affecting event after issuance (a consumption or a refund)
//! appends one `CreditTransaction`. Entries are immutable once written.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{CreditId, TransactionId, UserId};

/// A ledger entry recording a single consume or refund event.
///
/// `balance_before` and `balance_after` describe the remaining balance of the
/// referenced record (`credit_id`), not the user's total balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditTransaction {
    /// Unique transaction ID (ULID for time-ordering).
    pub id: TransactionId,

    /// The user whose credits were affected.
    pub user_id: UserId,

    /// The record this entry drew from or returned to.
    pub credit_id: CreditId,

    /// Type of transaction.
    pub transaction_type: TransactionType,

    /// Signed amount. Negative = consume, positive = refund.
    pub amount: i64,

    /// Remaining balance of the referenced record before this entry.
    pub balance_before: i64,

    /// Remaining balance of the referenced record after this entry.
    pub balance_after: i64,

    /// For refunds, the consume transaction being reversed.
    pub related_transaction_id: Option<TransactionId>,

    /// What the transaction paid for.
    pub note: String,

    /// When the entry was written.
    pub created_at: DateTime<Utc>,
}

impl CreditTransaction {
    /// Create a consume entry. The stored amount is always negative.
    #[must_use]
    pub fn consume(
        user_id: UserId,
        credit_id: CreditId,
        amount: i64,
        balance_before: i64,
        balance_after: i64,
        note: String,
    ) -> Self {
        Self {
            id: TransactionId::generate(),
            user_id,
            credit_id,
            transaction_type: TransactionType::Consume,
            amount: -amount.abs(),
            balance_before,
            balance_after,
            related_transaction_id: None,
            note,
            created_at: Utc::now(),
        }
    }

    /// Create a refund entry reversing `original`. The stored amount is
    /// always positive.
    #[must_use]
    pub fn refund(
        original: &CreditTransaction,
        amount: i64,
        balance_before: i64,
        balance_after: i64,
        note: String,
    ) -> Self {
        Self {
            id: TransactionId::generate(),
            user_id: original.user_id.clone(),
            credit_id: original.credit_id,
            transaction_type: TransactionType::Refund,
            amount: amount.abs(),
            balance_before,
            balance_after,
            related_transaction_id: Some(original.id),
            note,
            created_at: Utc::now(),
        }
    }

    /// Check if this entry is a consumption.
    #[must_use]
    pub fn is_consume(&self) -> bool {
        self.transaction_type == TransactionType::Consume
    }
}

/// Type of ledger entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionType {
    /// Credits drawn for a generation request.
    Consume,

    /// A previous consumption reversed.
    Refund,
}

impl TransactionType {
    /// Wire name of the type.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Consume => "consume",
            Self::Refund => "refund",
        }
    }
}
