//! Error types for credit ledger storage.

/// Result type for storage operations.
pub type Result<T> = std::result::Result<T, StoreError>;

/// Errors that can occur in storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database operation failed.
    #[error("database error: {0}")]
    Database(String),

    /// Serialization/deserialization failed.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The per-user lock could not be acquired in time.
    ///
    /// Nothing was written; the whole operation is safe to retry.
    #[error("timed out waiting for ledger lock of user {user_id}")]
    LockTimeout {
        /// The contended user.
        user_id: String,
    },

    /// A uniqueness constraint was violated.
    #[error("duplicate {entity}: {key}")]
    Duplicate {
        /// The constrained entity.
        entity: &'static str,
        /// The conflicting key.
        key: String,
    },

    /// A write inside a unit of work targeted another user's rows.
    #[error("unit of work for user {expected} cannot write rows of user {actual}")]
    UserMismatch {
        /// The user whose lock is held.
        expected: String,
        /// The user the row belongs to.
        actual: String,
    },
}

impl StoreError {
    /// Check if retrying the whole operation may succeed.
    #[must_use]
    pub const fn is_transient(&self) -> bool {
        matches!(self, Self::LockTimeout { .. } | Self::Database(_))
    }
}
