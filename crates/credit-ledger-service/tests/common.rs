//! Common test utilities for credit ledger integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::sync::Arc;

use axum::http::{HeaderName, HeaderValue};
use axum::Router;
use axum_test::{TestRequest, TestServer};
use serde_json::{json, Value};
use tempfile::TempDir;

use credit_ledger_core::UserId;
use credit_ledger_service::{create_router, AppState, ServiceConfig};
use credit_ledger_store::RocksStore;

fn api_key_header() -> HeaderName {
    HeaderName::from_static("x-api-key")
}

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// Temporary directory for the database (kept alive for test duration).
    pub _temp_dir: TempDir,
    /// A test user ID.
    pub test_user_id: UserId,
    /// The service API key for service-to-service requests.
    pub service_api_key: String,
}

impl TestHarness {
    /// Create a new test harness with a fresh database.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let store = RocksStore::open(temp_dir.path()).expect("Failed to open store");

        let service_api_key = "test-service-key".to_string();

        let config = ServiceConfig {
            listen_addr: "127.0.0.1:0".into(),
            data_dir: temp_dir.path().to_string_lossy().to_string(),
            service_api_key: Some(service_api_key.clone()),
            ..ServiceConfig::default()
        };

        let state = AppState::new(Arc::new(store), config).expect("Failed to build app state");
        let router: Router = create_router(state);

        let server = TestServer::new(router).expect("Failed to create test server");
        let test_user_id = UserId::generate();

        Self {
            server,
            _temp_dir: temp_dir,
            test_user_id,
            service_api_key,
        }
    }

    fn api_key(&self) -> HeaderValue {
        HeaderValue::from_str(&self.service_api_key).expect("Invalid API key header")
    }

    /// An authenticated GET request.
    pub fn get(&self, path: &str) -> TestRequest {
        self.server
            .get(path)
            .add_header(api_key_header(), self.api_key())
    }

    /// An authenticated POST request.
    pub fn post(&self, path: &str) -> TestRequest {
        self.server
            .post(path)
            .add_header(api_key_header(), self.api_key())
    }

    /// Path of a per-user reporting endpoint for the test user.
    pub fn user_path(&self, suffix: &str) -> String {
        format!("/v1/users/{}/{suffix}", self.test_user_id)
    }

    /// Give the test user today's free grant (100 credits).
    pub async fn fund_daily(&self) {
        self.post("/v1/grants/daily")
            .json(&json!({
                "user_id": self.test_user_id.to_string(),
                "plan_tier": "free"
            }))
            .await
            .assert_status_ok();
    }

    /// Consume from the test user and return the transaction ID.
    pub async fn consume(&self, amount: i64) -> String {
        let response = self
            .post("/v1/credits/consume")
            .json(&json!({
                "user_id": self.test_user_id.to_string(),
                "amount": amount,
                "note": "test"
            }))
            .await;
        response.assert_status_ok();
        let body: Value = response.json();
        body["transaction_id"]
            .as_str()
            .expect("transaction_id missing")
            .to_string()
    }

    /// The test user's available balance.
    pub async fn balance(&self) -> i64 {
        let response = self.get(&self.user_path("balance")).await;
        response.assert_status_ok();
        let body: Value = response.json();
        body["available"].as_i64().expect("available missing")
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
