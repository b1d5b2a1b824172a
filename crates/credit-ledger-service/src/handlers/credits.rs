//! Consumption and refund handlers.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use credit_ledger_core::TransactionId;

use super::parse_user_id;
use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Balance check request.
#[derive(Debug, Deserialize)]
pub struct CheckBalanceRequest {
    /// User ID to check.
    pub user_id: String,
    /// Amount the caller intends to consume.
    pub amount: i64,
}

/// Balance check response.
#[derive(Debug, Serialize)]
pub struct CheckBalanceResponse {
    /// Whether the balance covers the amount right now.
    pub sufficient: bool,
    /// Current available balance.
    pub available: i64,
    /// Amount checked.
    pub required: i64,
}

/// Check whether a user can afford an amount, without consuming it.
///
/// The answer is advisory; only a consume is authoritative.
pub async fn check_balance(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Json(body): Json<CheckBalanceRequest>,
) -> Result<Json<CheckBalanceResponse>, ApiError> {
    let user_id = parse_user_id(&body.user_id)?;
    let available = state.ledger.available_balance(&user_id)?;

    tracing::debug!(
        service = %auth.service_name,
        user_id = %user_id,
        available,
        required = body.amount,
        "Balance check"
    );

    Ok(Json(CheckBalanceResponse {
        sufficient: available >= body.amount,
        available,
        required: body.amount,
    }))
}

/// Consume request.
#[derive(Debug, Deserialize)]
pub struct ConsumeRequest {
    /// User ID being charged.
    pub user_id: String,
    /// Credits to consume.
    pub amount: i64,
    /// What the credits pay for.
    #[serde(default)]
    pub note: String,
}

/// Consume response.
#[derive(Debug, Serialize)]
pub struct ConsumeResponse {
    /// The consume transaction, needed to refund it later.
    pub transaction_id: String,
    /// Credits consumed.
    pub amount: i64,
    /// Available balance after the consumption.
    pub available: i64,
}

/// Consume credits for a generation request.
pub async fn consume(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Json(body): Json<ConsumeRequest>,
) -> Result<Json<ConsumeResponse>, ApiError> {
    let user_id = parse_user_id(&body.user_id)?;
    let amount = body.amount;

    tracing::debug!(
        service = %auth.service_name,
        user_id = %user_id,
        amount,
        "Processing consume"
    );

    let (transaction_id, available) = state
        .mutate(move |ledger| {
            let transaction_id = ledger.consume(&user_id, amount, &body.note)?;
            let available = ledger.available_balance(&user_id)?;
            Ok((transaction_id, available))
        })
        .await?;

    Ok(Json(ConsumeResponse {
        transaction_id: transaction_id.to_string(),
        amount,
        available,
    }))
}

/// Refund request.
#[derive(Debug, Deserialize)]
pub struct RefundRequest {
    /// The consume transaction to reverse.
    pub transaction_id: String,
    /// Why the consumption is refunded.
    #[serde(default)]
    pub note: String,
}

/// Refund response.
#[derive(Debug, Serialize)]
pub struct RefundResponse {
    /// The new refund transaction.
    pub refund_transaction_id: String,
    /// The consume transaction that was reversed.
    pub refunded_transaction_id: String,
}

/// Refund a consumption after a failed or cancelled generation.
pub async fn refund(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Json(body): Json<RefundRequest>,
) -> Result<Json<RefundResponse>, ApiError> {
    let consume_id: TransactionId = body
        .transaction_id
        .parse()
        .map_err(|_| ApiError::BadRequest("Invalid transaction ID".into()))?;

    tracing::debug!(
        service = %auth.service_name,
        transaction_id = %consume_id,
        "Processing refund"
    );

    let refund_id = state
        .mutate(move |ledger| ledger.refund(&consume_id, &body.note))
        .await?;

    Ok(Json(RefundResponse {
        refund_transaction_id: refund_id.to_string(),
        refunded_transaction_id: consume_id.to_string(),
    }))
}
