//! Grant handlers called by the billing webhook service.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use credit_ledger::SubscriptionGrantOutcome;
use credit_ledger_core::{PlanKey, PlanTier};

use super::parse_user_id;
use crate::auth::ServiceAuth;
use crate::error::ApiError;
use crate::state::AppState;

/// Daily grant request.
#[derive(Debug, Deserialize)]
pub struct DailyGrantRequest {
    /// User ID to check.
    pub user_id: String,
    /// The user's current plan tier.
    pub plan_tier: String,
}

/// Daily grant response.
#[derive(Debug, Serialize)]
pub struct DailyGrantResponse {
    /// Whether this call created today's grant.
    pub issued: bool,
    /// Available balance afterwards.
    pub available: i64,
}

/// Issue today's free grant if the user is on the free tier and has not
/// received it yet.
pub async fn daily_grant(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Json(body): Json<DailyGrantRequest>,
) -> Result<Json<DailyGrantResponse>, ApiError> {
    let user_id = parse_user_id(&body.user_id)?;
    let tier: PlanTier = body
        .plan_tier
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid plan tier: {e}")))?;

    tracing::debug!(
        service = %auth.service_name,
        user_id = %user_id,
        tier = %tier,
        "Processing daily grant check"
    );

    let (issued, available) = state
        .mutate(move |ledger| {
            let issued = ledger.issue_daily_grant_if_due(&user_id, tier)?;
            Ok((issued, ledger.available_balance(&user_id)?))
        })
        .await?;

    Ok(Json(DailyGrantResponse { issued, available }))
}

/// Subscription payment event.
#[derive(Debug, Deserialize)]
pub struct SubscriptionGrantRequest {
    /// Paying user.
    pub user_id: String,
    /// Plan key, such as `pro-monthly`.
    pub plan_key: String,
    /// End of the paid period (next billing time).
    pub period_ends_at: DateTime<Utc>,
    /// Amount paid in minor currency units.
    pub payment_amount: i64,
}

/// Subscription grant response.
#[derive(Debug, Serialize)]
pub struct SubscriptionGrantResponse {
    /// What the event did.
    #[serde(flatten)]
    pub outcome: SubscriptionGrantOutcome,
    /// Available balance afterwards.
    pub available: i64,
}

/// Grant plan credits for a paid subscription period.
///
/// Redelivered events answer `200` with a `duplicate` outcome so the
/// webhook sender stops retrying.
pub async fn subscription_grant(
    State(state): State<Arc<AppState>>,
    auth: ServiceAuth,
    Json(body): Json<SubscriptionGrantRequest>,
) -> Result<Json<SubscriptionGrantResponse>, ApiError> {
    let user_id = parse_user_id(&body.user_id)?;
    let plan: PlanKey = body
        .plan_key
        .parse()
        .map_err(|e| ApiError::BadRequest(format!("Invalid plan key: {e}")))?;
    let period_ends_at = body.period_ends_at;
    let payment_amount = body.payment_amount;

    tracing::debug!(
        service = %auth.service_name,
        user_id = %user_id,
        plan = %plan,
        period_ends_at = %period_ends_at,
        "Processing subscription payment"
    );

    let (outcome, available) = state
        .mutate(move |ledger| {
            let outcome =
                ledger.issue_subscription_grant(&user_id, plan, period_ends_at, payment_amount)?;
            Ok((outcome, ledger.available_balance(&user_id)?))
        })
        .await?;

    Ok(Json(SubscriptionGrantResponse { outcome, available }))
}
