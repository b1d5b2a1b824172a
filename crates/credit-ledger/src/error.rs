//! Error types for ledger operations.

use credit_ledger_core::{PlanError, TransactionId};
use credit_ledger_store::StoreError;

/// Result type for ledger operations.
pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors returned by ledger operations.
///
/// Business outcomes (insufficient credit, refund guards) are ordinary
/// variants; only `Storage` signals an infrastructure fault.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Input rejected before any I/O.
    #[error("validation error: {0}")]
    Validation(String),

    /// Not enough active credit. Nothing was written.
    #[error("insufficient credit: available={available}, required={required}")]
    InsufficientCredit {
        /// Credit available at the time of the attempt.
        available: i64,
        /// Credit requested.
        required: i64,
    },

    /// A referenced transaction or record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// The kind of row.
        entity: &'static str,
        /// The missing ID.
        id: String,
    },

    /// The transaction to refund is not a consumption.
    #[error("transaction {0} is not a consumption")]
    WrongType(TransactionId),

    /// The consumption already has a refund.
    #[error("transaction {0} was already refunded")]
    AlreadyRefunded(TransactionId),

    /// The consumption carries no refundable amount.
    #[error("transaction {id} has non-refundable amount {amount}")]
    InvalidAmount {
        /// The consumption.
        id: TransactionId,
        /// Its recorded amount.
        amount: i64,
    },

    /// Storage failure. The operation was atomic, so retrying is safe.
    #[error("storage error: {0}")]
    Storage(#[from] StoreError),
}

impl LedgerError {
    /// Check if the caller may retry the same request unchanged.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Storage(err) => err.is_transient(),
            _ => false,
        }
    }
}

impl From<PlanError> for LedgerError {
    fn from(err: PlanError) -> Self {
        Self::Validation(err.to_string())
    }
}
