//! API handlers.

use credit_ledger_core::UserId;

use crate::error::ApiError;

pub mod credits;
pub mod grants;
pub mod health;
pub mod reports;

/// Parse a user ID from a request, rejecting empty or oversized values.
pub(crate) fn parse_user_id(raw: &str) -> Result<UserId, ApiError> {
    UserId::new(raw).map_err(|e| ApiError::BadRequest(format!("Invalid user ID: {e}")))
}
