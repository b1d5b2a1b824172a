//! Balance, record and transaction history integration tests.

mod common;

use common::TestHarness;
use serde_json::{json, Value};

// ============================================================================
// Balance
// ============================================================================

#[tokio::test]
async fn unknown_user_has_zero_balance() {
    let harness = TestHarness::new();

    let response = harness.get(&harness.user_path("balance")).await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["available"], 0);
    assert_eq!(body["active_records"], 0);
    assert!(body["next_expiry"].is_null());
}

#[tokio::test]
async fn balance_breaks_down_by_grant_type() {
    let harness = TestHarness::new();
    harness.fund_daily().await;
    harness
        .post("/v1/grants/subscription")
        .json(&json!({
            "user_id": harness.test_user_id.to_string(),
            "plan_key": "basic-monthly",
            "period_ends_at": "2099-01-01T00:00:00Z",
            "payment_amount": 500
        }))
        .await
        .assert_status_ok();

    let response = harness.get(&harness.user_path("balance")).await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["available"], 1600);
    assert_eq!(body["by_grant_type"]["daily_free"], 100);
    assert_eq!(body["by_grant_type"]["basic-monthly"], 1500);
    assert_eq!(body["active_records"], 2);
}

#[tokio::test]
async fn balance_without_api_key_fails() {
    let harness = TestHarness::new();

    let response = harness.server.get(&harness.user_path("balance")).await;

    response.assert_status_unauthorized();
}

// ============================================================================
// Records
// ============================================================================

#[tokio::test]
async fn records_show_consumption() {
    let harness = TestHarness::new();
    harness.fund_daily().await;
    harness.consume(25).await;

    let response = harness.get(&harness.user_path("records")).await;

    response.assert_status_ok();
    let body: Value = response.json();
    let records = body["records"].as_array().unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["grant_type"], "daily_free");
    assert_eq!(records[0]["amount"], 100);
    assert_eq!(records[0]["consumed"], 25);
    assert_eq!(records[0]["remaining"], 75);
    assert_eq!(records[0]["active"], true);
    assert!(records[0]["expires_at"].is_string());
}

// ============================================================================
// Transactions
// ============================================================================

#[tokio::test]
async fn list_transactions_empty() {
    let harness = TestHarness::new();

    let response = harness.get(&harness.user_path("transactions")).await;

    response.assert_status_ok();
    let body: Value = response.json();
    assert_eq!(body["transactions"].as_array().unwrap().len(), 0);
    assert_eq!(body["has_more"], false);
}

#[tokio::test]
async fn list_transactions_newest_first() {
    let harness = TestHarness::new();
    harness.fund_daily().await;
    let consume_id = harness.consume(10).await;
    harness
        .post("/v1/credits/refund")
        .json(&json!({ "transaction_id": consume_id }))
        .await
        .assert_status_ok();

    let response = harness.get(&harness.user_path("transactions")).await;

    response.assert_status_ok();
    let body: Value = response.json();
    let transactions = body["transactions"].as_array().unwrap();
    assert_eq!(transactions.len(), 2);
    assert_eq!(transactions[0]["transaction_type"], "refund");
    assert_eq!(transactions[0]["amount"], 10);
    assert_eq!(transactions[0]["related_transaction_id"], consume_id.as_str());
    assert_eq!(transactions[1]["transaction_type"], "consume");
    assert_eq!(transactions[1]["amount"], -10);
    assert_eq!(transactions[1]["balance_before"], 100);
    assert_eq!(transactions[1]["balance_after"], 90);
}

#[tokio::test]
async fn list_transactions_paginates() {
    let harness = TestHarness::new();
    harness.fund_daily().await;
    for _ in 0..5 {
        harness.consume(1).await;
    }

    let response = harness
        .get(&harness.user_path("transactions"))
        .add_query_param("limit", 2)
        .await;
    let body: Value = response.json();
    assert_eq!(body["transactions"].as_array().unwrap().len(), 2);
    assert_eq!(body["has_more"], true);

    let response = harness
        .get(&harness.user_path("transactions"))
        .add_query_param("limit", 2)
        .add_query_param("offset", 4)
        .await;
    let body: Value = response.json();
    assert_eq!(body["transactions"].as_array().unwrap().len(), 1);
    assert_eq!(body["has_more"], false);
}
