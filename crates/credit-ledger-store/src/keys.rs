//! Key encoding utilities for `RocksDB`.
//!
//! User IDs are variable-length strings without NUL bytes, so user-scoped
//! keys are `user_id || 0x00 || suffix`. Because ULIDs are time-ordered,
//! iterating a user prefix yields rows in creation order.

use credit_ledger_core::{CreditId, PaymentId, TransactionId, UserId};

/// Separator between the user ID and the rest of a user-scoped key.
pub const SEPARATOR: u8 = 0x00;

/// Create the prefix for iterating all rows of a user.
#[must_use]
pub fn user_prefix(user_id: &UserId) -> Vec<u8> {
    let mut key = Vec::with_capacity(user_id.as_bytes().len() + 1);
    key.extend_from_slice(user_id.as_bytes());
    key.push(SEPARATOR);
    key
}

/// Create a user-scoped key ending with a 16-byte ULID.
fn user_scoped(user_id: &UserId, id: [u8; 16]) -> Vec<u8> {
    let mut key = user_prefix(user_id);
    key.extend_from_slice(&id);
    key
}

/// Create a credit record key.
#[must_use]
pub fn record_key(credit_id: &CreditId) -> Vec<u8> {
    credit_id.to_bytes().to_vec()
}

/// Create a user-record index key.
#[must_use]
pub fn user_record_key(user_id: &UserId, credit_id: &CreditId) -> Vec<u8> {
    user_scoped(user_id, credit_id.to_bytes())
}

/// Create a transaction key.
#[must_use]
pub fn transaction_key(transaction_id: &TransactionId) -> Vec<u8> {
    transaction_id.to_bytes().to_vec()
}

/// Create a user-transaction index key.
#[must_use]
pub fn user_transaction_key(user_id: &UserId, transaction_id: &TransactionId) -> Vec<u8> {
    user_scoped(user_id, transaction_id.to_bytes())
}

/// Create the refund index key of a consume transaction.
#[must_use]
pub fn refund_index_key(consume_id: &TransactionId) -> Vec<u8> {
    consume_id.to_bytes().to_vec()
}

/// Create the daily grant uniqueness key.
#[must_use]
pub fn daily_grant_key(user_id: &UserId, grant_type: &str, day_key: &str) -> Vec<u8> {
    let mut key = user_prefix(user_id);
    key.extend_from_slice(grant_type.as_bytes());
    key.push(SEPARATOR);
    key.extend_from_slice(day_key.as_bytes());
    key
}

/// Create a subscription state key.
#[must_use]
pub fn subscription_key(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Create a payment key.
#[must_use]
pub fn payment_key(user_id: &UserId, payment_id: &PaymentId) -> Vec<u8> {
    user_scoped(user_id, payment_id.to_bytes())
}

/// Create the per-user lock key.
#[must_use]
pub fn user_lock_key(user_id: &UserId) -> Vec<u8> {
    user_id.as_bytes().to_vec()
}

/// Extract the trailing 16-byte ULID from a user-scoped key.
///
/// Returns `None` if the key does not have exactly 16 bytes after the prefix.
#[must_use]
pub fn trailing_ulid(key: &[u8], prefix_len: usize) -> Option<[u8; 16]> {
    let rest = key.get(prefix_len..)?;
    rest.try_into().ok()
}
