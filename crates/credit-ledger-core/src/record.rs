//! Credit grants.
//!
//! A `CreditRecord` is one batch of credits issued to a user. Consumption
//! draws from records (`consumed` grows) and refunds return to them
//! (`consumed` shrinks). Records are never deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::{CreditId, UserId};

/// Grant category of a record.
///
/// This is an open set used for reporting. The consumption and refund
/// engines never branch on it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GrantType(String);

impl GrantType {
    /// Raw value of the daily free grant category.
    pub const DAILY_FREE: &'static str = "daily_free";

    /// Raw value of the purchased quota pack category.
    pub const QUOTA_PACK: &'static str = "quota_pack";

    /// Create a grant type from any string.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// The daily free grant category.
    #[must_use]
    pub fn daily_free() -> Self {
        Self(Self::DAILY_FREE.to_string())
    }

    /// The purchased quota pack category.
    #[must_use]
    pub fn quota_pack() -> Self {
        Self(Self::QUOTA_PACK.to_string())
    }

    /// Return the raw string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check if this is the daily free category.
    #[must_use]
    pub fn is_daily_free(&self) -> bool {
        self.0 == Self::DAILY_FREE
    }
}

impl fmt::Display for GrantType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// One grant of allowance.
///
/// Invariant: `0 <= consumed <= amount`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditRecord {
    /// Unique record ID (ULID).
    pub id: CreditId,

    /// The owning user.
    pub user_id: UserId,

    /// Grant category.
    pub grant_type: GrantType,

    /// Total credits granted.
    pub amount: i64,

    /// Credits already drawn from this record.
    pub consumed: i64,

    /// When the record was issued.
    pub issued_at: DateTime<Utc>,

    /// When the record expires. `None` never expires.
    pub expires_at: Option<DateTime<Utc>>,
}

impl CreditRecord {
    /// Create a fresh, unconsumed record issued now.
    #[must_use]
    pub fn new(
        user_id: UserId,
        grant_type: GrantType,
        amount: i64,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self::issued_at(user_id, grant_type, amount, Utc::now(), expires_at)
    }

    /// Create a fresh, unconsumed record with an explicit issuance time.
    #[must_use]
    pub fn issued_at(
        user_id: UserId,
        grant_type: GrantType,
        amount: i64,
        issued_at: DateTime<Utc>,
        expires_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: CreditId::generate(),
            user_id,
            grant_type,
            amount: amount.max(0),
            consumed: 0,
            issued_at,
            expires_at,
        }
    }

    /// Credits still available on this record, ignoring expiry.
    #[must_use]
    pub fn remaining(&self) -> i64 {
        (self.amount - self.consumed).max(0)
    }

    /// Check if the record has expired as of `now`.
    ///
    /// A record expiring exactly at `now` is still usable.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| expires_at < now)
    }

    /// Check if the record can be drawn from as of `now`.
    #[must_use]
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        self.remaining() > 0 && !self.is_expired(now)
    }

    /// Draw up to `wanted` credits, returning how many were taken.
    pub fn draw(&mut self, wanted: i64) -> i64 {
        let taken = wanted.clamp(0, self.remaining());
        self.consumed += taken;
        taken
    }

    /// Return `amount` credits, flooring `consumed` at zero.
    pub fn restore(&mut self, amount: i64) {
        self.consumed = (self.consumed - amount.max(0)).max(0);
    }
}

/// Sort records into consumption order: oldest issued first, ties by ID.
pub fn sort_for_consumption(records: &mut [CreditRecord]) {
    records.sort_by(|a, b| a.issued_at.cmp(&b.issued_at).then(a.id.cmp(&b.id)));
}
