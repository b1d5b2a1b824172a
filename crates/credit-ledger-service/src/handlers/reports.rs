//! Balance and history handlers for reporting.

use std::collections::BTreeMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use credit_ledger_core::{CreditRecord, CreditTransaction};

use super::parse_user_id;
use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Balance response.
#[derive(Debug, Serialize)]
pub struct BalanceResponse {
    /// The user.
    pub user_id: String,
    /// Spendable credit.
    pub available: i64,
    /// Spendable credit per grant type.
    pub by_grant_type: BTreeMap<String, i64>,
    /// Records that can still be drawn from.
    pub active_records: usize,
    /// Earliest expiry among active records.
    pub next_expiry: Option<String>,
}

/// Get the available balance of a user.
pub async fn get_balance(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(user_id): Path<String>,
) -> Result<Json<BalanceResponse>, ApiError> {
    let user_id = parse_user_id(&user_id)?;
    let summary = state.ledger.balance_summary(&user_id)?;

    Ok(Json(BalanceResponse {
        user_id: user_id.to_string(),
        available: summary.available,
        by_grant_type: summary.by_grant_type,
        active_records: summary.active_records,
        next_expiry: summary.next_expiry.map(|t| t.to_rfc3339()),
    }))
}

/// Credit record response.
#[derive(Debug, Serialize)]
pub struct RecordResponse {
    /// Record ID.
    pub id: String,
    /// Grant type.
    pub grant_type: String,
    /// Credits granted.
    pub amount: i64,
    /// Credits drawn.
    pub consumed: i64,
    /// Credits left, ignoring expiry.
    pub remaining: i64,
    /// Whether the record can be drawn from now.
    pub active: bool,
    /// Issue timestamp.
    pub issued_at: String,
    /// Expiry timestamp, if any.
    pub expires_at: Option<String>,
}

impl RecordResponse {
    fn from_record(record: &CreditRecord, now: DateTime<Utc>) -> Self {
        Self {
            id: record.id.to_string(),
            grant_type: record.grant_type.to_string(),
            amount: record.amount,
            consumed: record.consumed,
            remaining: record.remaining(),
            active: record.is_active(now),
            issued_at: record.issued_at.to_rfc3339(),
            expires_at: record.expires_at.map(|t| t.to_rfc3339()),
        }
    }
}

/// List records response.
#[derive(Debug, Serialize)]
pub struct ListRecordsResponse {
    /// Records in consumption order.
    pub records: Vec<RecordResponse>,
}

/// List every credit record of a user, including expired and drained ones.
pub async fn list_records(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(user_id): Path<String>,
) -> Result<Json<ListRecordsResponse>, ApiError> {
    let user_id = parse_user_id(&user_id)?;
    let now = Utc::now();
    let records = state
        .ledger
        .list_records(&user_id)?
        .iter()
        .map(|r| RecordResponse::from_record(r, now))
        .collect();

    Ok(Json(ListRecordsResponse { records }))
}

/// Transaction list query parameters.
#[derive(Debug, Deserialize)]
pub struct ListTransactionsQuery {
    /// Maximum number of transactions to return (default: 50).
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Offset for pagination (default: 0).
    #[serde(default)]
    pub offset: usize,
}

fn default_limit() -> usize {
    50
}

/// Transaction response.
#[derive(Debug, Serialize)]
pub struct TransactionResponse {
    /// Transaction ID.
    pub id: String,
    /// Record the transaction applied to.
    pub credit_id: String,
    /// Transaction type.
    pub transaction_type: String,
    /// Amount (negative = consume, positive = refund).
    pub amount: i64,
    /// Remaining credit of the record before.
    pub balance_before: i64,
    /// Remaining credit of the record after.
    pub balance_after: i64,
    /// The consumption a refund reverses.
    pub related_transaction_id: Option<String>,
    /// Caller-supplied note.
    pub note: String,
    /// Timestamp.
    pub created_at: String,
}

impl From<&CreditTransaction> for TransactionResponse {
    fn from(tx: &CreditTransaction) -> Self {
        Self {
            id: tx.id.to_string(),
            credit_id: tx.credit_id.to_string(),
            transaction_type: tx.transaction_type.as_str().to_string(),
            amount: tx.amount,
            balance_before: tx.balance_before,
            balance_after: tx.balance_after,
            related_transaction_id: tx.related_transaction_id.map(|id| id.to_string()),
            note: tx.note.clone(),
            created_at: tx.created_at.to_rfc3339(),
        }
    }
}

/// List transactions response.
#[derive(Debug, Serialize)]
pub struct ListTransactionsResponse {
    /// Transactions (newest first).
    pub transactions: Vec<TransactionResponse>,
    /// Whether there are more transactions.
    pub has_more: bool,
}

/// List the ledger history of a user.
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    _auth: ServiceAuth,
    Path(user_id): Path<String>,
    Query(query): Query<ListTransactionsQuery>,
) -> Result<Json<ListTransactionsResponse>, ApiError> {
    let user_id = parse_user_id(&user_id)?;

    // Fetch one more than requested to determine has_more
    let limit = query.limit.min(100);
    let transactions = state
        .ledger
        .list_transactions(&user_id, limit + 1, query.offset)?;

    let has_more = transactions.len() > limit;
    let transactions: Vec<_> = transactions
        .iter()
        .take(limit)
        .map(TransactionResponse::from)
        .collect();

    Ok(Json(ListTransactionsResponse {
        transactions,
        has_more,
    }))
}
