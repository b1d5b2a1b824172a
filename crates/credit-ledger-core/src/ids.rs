//! Identifier types for the credit ledger.
//!
//! User IDs are opaque strings handed to us by the auth/session service.
//! Everything the ledger mints itself (records, transactions, payments) uses
//! ULIDs so identifiers sort by creation time.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Mutex;
use ulid::{Generator, Ulid};

/// Longest user ID accepted, in bytes.
pub const MAX_USER_ID_LEN: usize = 128;

/// An opaque user identifier supplied by the auth/session service.
///
/// The ledger never interprets the value. It must be non-empty, at most
/// [`MAX_USER_ID_LEN`] bytes, and must not contain NUL (used as the key
/// separator in storage).
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct UserId(String);

impl UserId {
    /// Create a `UserId`, validating the raw value.
    ///
    /// # Errors
    ///
    /// Returns an error if the value is empty, too long, or contains NUL.
    pub fn new(value: impl Into<String>) -> Result<Self, IdError> {
        let value = value.into();
        if value.is_empty() {
            return Err(IdError::EmptyUserId);
        }
        if value.len() > MAX_USER_ID_LEN {
            return Err(IdError::UserIdTooLong(value.len()));
        }
        if value.contains('\0') {
            return Err(IdError::InvalidUserId);
        }
        Ok(Self(value))
    }

    /// Generate a random `UserId` (for testing).
    #[must_use]
    pub fn generate() -> Self {
        Self(format!("user_{}", Ulid::new().to_string().to_lowercase()))
    }

    /// Return the raw string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Return the raw bytes.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

impl FromStr for UserId {
    type Err = IdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Debug for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserId({})", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for UserId {
    type Error = IdError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<UserId> for String {
    fn from(id: UserId) -> Self {
        id.0
    }
}

impl AsRef<[u8]> for UserId {
    fn as_ref(&self) -> &[u8] {
        self.0.as_bytes()
    }
}

static GENERATOR: Mutex<Generator> = Mutex::new(Generator::new());

/// Next monotonic ULID. Falls back to a random one if the generator is
/// unavailable or its random part overflows within one millisecond.
fn next_ulid() -> Ulid {
    GENERATOR
        .lock()
        .ok()
        .and_then(|mut generator| generator.generate().ok())
        .unwrap_or_else(Ulid::new)
}

/// Defines a ULID-backed identifier with string serde, byte conversion and
/// `Display`/`FromStr`.
macro_rules! ulid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(Ulid);

        impl $name {
            /// Create from an existing ULID.
            #[must_use]
            pub const fn from_ulid(ulid: Ulid) -> Self {
                Self(ulid)
            }

            /// Generate a new identifier with the current timestamp.
            ///
            /// Identifiers generated by one process sort in generation
            /// order, even within the same millisecond.
            #[must_use]
            pub fn generate() -> Self {
                Self(next_ulid())
            }

            /// Return the underlying ULID.
            #[must_use]
            pub const fn as_ulid(&self) -> &Ulid {
                &self.0
            }

            /// Return the 16 raw bytes.
            #[must_use]
            pub fn to_bytes(&self) -> [u8; 16] {
                self.0.to_bytes()
            }

            /// Create from 16 raw bytes.
            #[must_use]
            pub fn from_bytes(bytes: [u8; 16]) -> Self {
                Self(Ulid::from_bytes(bytes))
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let ulid = Ulid::from_string(s).map_err(|_| IdError::InvalidUlid)?;
                Ok(Self(ulid))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl TryFrom<String> for $name {
            type Error = IdError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl From<$name> for String {
            fn from(id: $name) -> Self {
                id.0.to_string()
            }
        }
    };
}

ulid_id!(
    /// Identifier of a credit grant (`CreditRecord`).
    CreditId
);

ulid_id!(
    /// Identifier of a ledger entry (`CreditTransaction`).
    ///
    /// Callers that may need to refund a consumption must keep this.
    TransactionId
);

ulid_id!(
    /// Identifier of a billing record written alongside a subscription grant.
    PaymentId
);

/// Errors that can occur when parsing identifiers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IdError {
    /// The user ID is empty.
    #[error("user ID must not be empty")]
    EmptyUserId,

    /// The user ID exceeds [`MAX_USER_ID_LEN`].
    #[error("user ID is {0} bytes, maximum is 128")]
    UserIdTooLong(usize),

    /// The user ID contains a forbidden character.
    #[error("user ID contains a NUL byte")]
    InvalidUserId,

    /// The input is not a valid ULID.
    #[error("invalid ULID format")]
    InvalidUlid,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn user_id_accepts_opaque_strings() {
        let id = UserId::new("auth0|5f1c2a").unwrap();
        assert_eq!(id.as_str(), "auth0|5f1c2a");
        assert_eq!(id.to_string(), "auth0|5f1c2a");
    }

    #[test]
    fn user_id_rejects_bad_values() {
        assert_eq!(UserId::new(""), Err(IdError::EmptyUserId));
        assert_eq!(UserId::new("a\0b"), Err(IdError::InvalidUserId));
        assert_eq!(
            UserId::new("x".repeat(MAX_USER_ID_LEN + 1)),
            Err(IdError::UserIdTooLong(MAX_USER_ID_LEN + 1))
        );
    }

    #[test]
    fn user_id_serde_rejects_empty() {
        let parsed: Result<UserId, _> = serde_json::from_str("\"\"");
        assert!(parsed.is_err());
    }

    #[test]
    fn transaction_id_parses_display_output() {
        let id = TransactionId::generate();
        let parsed: TransactionId = id.to_string().parse().unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn credit_id_rejects_garbage() {
        assert_eq!("not-a-ulid".parse::<CreditId>(), Err(IdError::InvalidUlid));
    }

    #[test]
    fn ids_sort_by_creation_time() {
        let ids: Vec<_> = (0..256).map(|_| TransactionId::generate()).collect();
        assert!(ids.windows(2).all(|pair| pair[0] < pair[1]));
    }
}
