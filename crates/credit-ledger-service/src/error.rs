//! API error types and responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use credit_ledger::LedgerError;
use credit_ledger_store::StoreError;
use serde::Serialize;

/// API error type.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Unauthorized - missing or invalid credentials.
    #[error("unauthorized")]
    Unauthorized,

    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Bad request - invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// The consumption was already refunded.
    #[error("already refunded: {0}")]
    AlreadyRefunded(String),

    /// Insufficient credits.
    #[error("insufficient credits: available={available}, required={required}")]
    InsufficientCredits {
        /// Current available balance.
        available: i64,
        /// Required amount.
        required: i64,
    },

    /// The user's ledger lock is contended. Safe to retry.
    #[error("ledger busy: {0}")]
    Busy(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    code: String,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<serde_json::Value>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message, details) = match &self {
            Self::Unauthorized => (
                StatusCode::UNAUTHORIZED,
                "unauthorized",
                self.to_string(),
                None,
            ),
            Self::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg.clone(), None),
            Self::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg.clone(), None),
            Self::AlreadyRefunded(id) => (
                StatusCode::CONFLICT,
                "already_refunded",
                format!("Transaction {id} was already refunded"),
                None,
            ),
            Self::InsufficientCredits {
                available,
                required,
            } => (
                StatusCode::PAYMENT_REQUIRED,
                "insufficient_credits",
                self.to_string(),
                Some(serde_json::json!({
                    "available": available,
                    "required": required
                })),
            ),
            Self::Busy(msg) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "busy",
                msg.clone(),
                Some(serde_json::json!({ "retryable": true })),
            ),
            Self::Internal(msg) => {
                tracing::error!(error = %msg, "Internal server error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = ErrorResponse {
            error: ErrorBody {
                code: code.to_string(),
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<LedgerError> for ApiError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::Validation(msg) => Self::BadRequest(msg),
            LedgerError::InsufficientCredit {
                available,
                required,
            } => Self::InsufficientCredits {
                available,
                required,
            },
            LedgerError::NotFound { entity, id } => {
                Self::NotFound(format!("{entity} not found: {id}"))
            }
            err @ (LedgerError::WrongType(_) | LedgerError::InvalidAmount { .. }) => {
                Self::BadRequest(err.to_string())
            }
            LedgerError::AlreadyRefunded(id) => Self::AlreadyRefunded(id.to_string()),
            LedgerError::Storage(err) => err.into(),
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            err @ StoreError::LockTimeout { .. } => Self::Busy(err.to_string()),
            err @ (StoreError::Duplicate { .. } | StoreError::UserMismatch { .. }) => {
                Self::Internal(err.to_string())
            }
            StoreError::Database(msg) | StoreError::Serialization(msg) => Self::Internal(msg),
        }
    }
}
