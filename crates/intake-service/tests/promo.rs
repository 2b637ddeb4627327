//! Promo redemption integration tests.

mod common;

use common::{complete_default_intake, TestHarness};
use serde_json::json;

async fn redeem(harness: &TestHarness, user_id: i64, code: &str) -> String {
    harness
        .event(&json!({"type": "select_option", "user_id": user_id, "option_id": "enter_promo"}))
        .await
        .assert_status_ok();
    harness
        .event_text(&json!({"type": "submit_answer", "user_id": user_id, "text": code}))
        .await
}

#[tokio::test]
async fn unknown_codes_are_rejected_plainly() {
    let harness = TestHarness::new();

    let reply = redeem(&harness, 1, "FAKE123").await;
    assert!(reply.contains("not found"), "unexpected reply: {reply}");
}

#[tokio::test]
async fn single_use_code_is_spent_for_other_users() {
    let harness = TestHarness::new();
    harness
        .server
        .post("/v1/promo-codes")
        .add_header("x-admin-key", &harness.admin_api_key)
        .json(&json!({"code": "VIP1", "description": "vip intro", "single_use": true}))
        .await
        .assert_status_ok();

    let reply = redeem(&harness, 1, "VIP1").await;
    assert!(reply.contains("applied"), "unexpected reply: {reply}");
    assert!(reply.contains("vip intro"));

    let reply = redeem(&harness, 2, "vip1").await;
    assert!(reply.contains("already been used"), "unexpected reply: {reply}");

    // The holder re-entering the code is a no-op success with the same
    // description.
    let reply = redeem(&harness, 1, " vip1 ").await;
    assert!(reply.contains("applied"), "unexpected reply: {reply}");
    assert!(reply.contains("vip intro"));
}

#[tokio::test]
async fn redeemed_code_rides_along_on_the_next_submission_only_once() {
    let harness = TestHarness::new();
    harness
        .server
        .post("/v1/promo-codes")
        .add_header("x-admin-key", &harness.admin_api_key)
        .json(&json!({"code": "VIP1", "single_use": true}))
        .await
        .assert_status_ok();

    let reply = redeem(&harness, 1, "VIP1").await;
    assert!(reply.contains("applied"));

    complete_default_intake(&harness, 1).await;

    let sent = harness.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert!(sent[0].1.contains("Promo codes: VIP1"));

    // A second submission by the same user must not re-attach the
    // single-use code.
    complete_default_intake(&harness, 1).await;
    let sent = harness.notifier.sent();
    assert_eq!(sent.len(), 2);
    assert!(!sent[1].1.contains("Promo codes:"), "unexpected report: {}", sent[1].1);
}

#[tokio::test]
async fn promo_entry_session_ends_after_one_attempt() {
    let harness = TestHarness::new();

    let reply = redeem(&harness, 1, "FAKE123").await;
    assert!(reply.contains("not found"));

    // The next free-text message is back at the menu, not a second attempt.
    let reply = harness
        .event_text(&json!({"type": "submit_answer", "user_id": 1, "text": "FAKE123"}))
        .await;
    assert!(reply.contains("Choose an option"), "unexpected reply: {reply}");
}
