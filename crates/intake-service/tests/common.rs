//! Common test utilities for intake-service integration tests.

#![allow(dead_code)] // Some utilities are used by different test files

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum_test::{TestResponse, TestServer};

use intake_core::OperatorId;
use intake_service::{
    create_router, AppState, DeliveryError, Notifier, ServiceConfig,
};
use intake_store::MemLedger;

/// A notifier that records every delivery instead of talking to a gateway.
///
/// Individual operators can be marked as failing to exercise the
/// best-effort fan-out.
#[derive(Default)]
pub struct RecordingNotifier {
    sent: Mutex<Vec<(i64, String)>>,
    failing: Mutex<HashSet<i64>>,
}

impl RecordingNotifier {
    /// Every `(operator, text)` delivered so far.
    pub fn sent(&self) -> Vec<(i64, String)> {
        self.sent.lock().unwrap().clone()
    }

    /// Make deliveries to this operator fail from now on.
    pub fn fail_for(&self, operator: i64) {
        self.failing.lock().unwrap().insert(operator);
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, operator: OperatorId, text: &str) -> Result<(), DeliveryError> {
        if self.failing.lock().unwrap().contains(&operator.get()) {
            return Err(DeliveryError::Api {
                status: 503,
                message: "operator unreachable".into(),
            });
        }
        self.sent
            .lock()
            .unwrap()
            .push((operator.get(), text.to_string()));
        Ok(())
    }
}

/// Test harness containing everything needed for integration tests.
pub struct TestHarness {
    /// The test server for making HTTP requests.
    pub server: TestServer,
    /// The shared application state (for driving the sweep directly).
    pub state: Arc<AppState>,
    /// Handle on the in-memory ledger backing the server.
    pub ledger: MemLedger,
    /// The recording notifier standing in for the chat gateway.
    pub notifier: Arc<RecordingNotifier>,
    /// API key the gateway presents on events.
    pub gateway_api_key: String,
    /// API key operators present on admin requests.
    pub admin_api_key: String,
}

impl TestHarness {
    /// Create a harness with one configured operator (id 1001).
    pub fn new() -> Self {
        Self::with_operators(&[1001])
    }

    /// Create a harness with the given operator ids.
    pub fn with_operators(operators: &[i64]) -> Self {
        let ledger = MemLedger::new();
        let notifier = Arc::new(RecordingNotifier::default());

        let gateway_api_key = "test-gateway-key".to_string();
        let admin_api_key = "test-admin-key".to_string();

        let config = ServiceConfig {
            operator_ids: operators.iter().copied().map(OperatorId::new).collect(),
            gateway_api_key: Some(gateway_api_key.clone()),
            admin_api_key: Some(admin_api_key.clone()),
            ..ServiceConfig::default()
        };

        let state = Arc::new(AppState::new(
            Arc::new(ledger.clone()),
            Some(Arc::clone(&notifier) as Arc<dyn Notifier>),
            config,
        ));
        let server =
            TestServer::new(create_router(Arc::clone(&state))).expect("Failed to create test server");

        Self {
            server,
            state,
            ledger,
            notifier,
            gateway_api_key,
            admin_api_key,
        }
    }

    /// POST one inbound event as the gateway.
    pub async fn event(&self, body: &serde_json::Value) -> TestResponse {
        self.server
            .post("/v1/events")
            .add_header("x-api-key", &self.gateway_api_key)
            .json(body)
            .await
    }

    /// The text of the first prompt in an event response.
    pub async fn event_text(&self, body: &serde_json::Value) -> String {
        let response = self.event(body).await;
        response.assert_status_ok();
        let json: serde_json::Value = response.json();
        json["prompts"][0]["text"]
            .as_str()
            .expect("prompt text")
            .to_string()
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

/// Drive a user through the whole intake flow: gender Male, age 29, weight
/// 82.0, workouts 4, diet and health note skipped.
pub async fn complete_default_intake(harness: &TestHarness, user_id: i64) {
    use serde_json::json;

    harness
        .event(&json!({"type": "start_conversation", "user_id": user_id}))
        .await
        .assert_status_ok();
    harness
        .event(&json!({"type": "select_option", "user_id": user_id, "option_id": "begin_intake"}))
        .await
        .assert_status_ok();
    harness
        .event(&json!({"type": "select_option", "user_id": user_id, "option_id": "gender_male"}))
        .await
        .assert_status_ok();
    for answer in ["29", "82.0", "4"] {
        harness
            .event(&json!({"type": "submit_answer", "user_id": user_id, "text": answer}))
            .await
            .assert_status_ok();
    }
    harness
        .event(&json!({"type": "skip", "user_id": user_id}))
        .await
        .assert_status_ok();
    let done = harness
        .event_text(&json!({"type": "skip", "user_id": user_id}))
        .await;
    assert!(done.contains("Thank you"), "unexpected reply: {done}");
}
