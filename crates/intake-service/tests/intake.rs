//! Intake flow integration tests.

mod common;

use common::{complete_default_intake, TestHarness};
use serde_json::json;

use intake_core::{Gender, SubmissionId, UserId};
use intake_store::Ledger;

#[tokio::test]
async fn start_conversation_shows_menu_and_registers_user() {
    let harness = TestHarness::new();

    let response = harness
        .event(&json!({
            "type": "start_conversation",
            "user_id": 42,
            "username": "sam",
            "first_name": "Sam",
            "attribution": {"source": "newsletter"}
        }))
        .await;

    response.assert_status_ok();
    let body: serde_json::Value = response.json();
    assert_eq!(body["prompts"][0]["options"].as_array().unwrap().len(), 3);

    // The user exists now; a second start must not re-create it.
    let (user, created) = harness
        .ledger
        .get_or_create_user(
            UserId::new(42),
            &intake_core::UserProfile::default(),
            &intake_core::Attribution::default(),
        )
        .await
        .unwrap();
    assert!(!created);
    assert_eq!(user.username.as_deref(), Some("sam"));
    assert_eq!(user.attribution.source.as_deref(), Some("newsletter"));
}

#[tokio::test]
async fn completed_intake_is_persisted_attached_and_reported_once() {
    let harness = TestHarness::new();

    // Seed the promo code and redeem it before the flow.
    harness
        .server
        .post("/v1/promo-codes")
        .add_header("x-admin-key", &harness.admin_api_key)
        .json(&json!({"code": "SUMMER", "description": "seasonal"}))
        .await
        .assert_status_ok();

    harness
        .event(&json!({"type": "start_conversation", "user_id": 42, "first_name": "Sam", "username": "sam"}))
        .await
        .assert_status_ok();
    harness
        .event(&json!({"type": "select_option", "user_id": 42, "option_id": "enter_promo"}))
        .await
        .assert_status_ok();
    let reply = harness
        .event_text(&json!({"type": "submit_answer", "user_id": 42, "text": "summer"}))
        .await;
    assert!(reply.contains("SUMMER"), "unexpected reply: {reply}");

    // The whole flow: Male, 29, 82.0, 4, diet and health note skipped.
    harness
        .event(&json!({"type": "select_option", "user_id": 42, "option_id": "begin_intake"}))
        .await
        .assert_status_ok();
    harness
        .event(&json!({"type": "select_option", "user_id": 42, "option_id": "gender_male"}))
        .await
        .assert_status_ok();
    for answer in ["29", "82.0", "4"] {
        harness
            .event(&json!({"type": "submit_answer", "user_id": 42, "text": answer}))
            .await
            .assert_status_ok();
    }
    harness
        .event(&json!({"type": "skip", "user_id": 42}))
        .await
        .assert_status_ok();
    let done = harness
        .event_text(&json!({"type": "skip", "user_id": 42}))
        .await;
    assert!(done.contains("Thank you"));

    // Exactly one submission, with the expected answers and the code
    // attached, reported synchronously.
    let report = harness
        .ledger
        .submission_with_codes(SubmissionId::new(1))
        .await
        .unwrap()
        .expect("submission must exist");
    assert_eq!(report.submission.answers.gender, Some(Gender::Male));
    assert_eq!(report.submission.answers.age, Some(29));
    assert_eq!(report.submission.answers.weight, Some(82.0));
    assert_eq!(report.submission.answers.workouts_per_week, Some(4));
    assert!(report.submission.answers.diet.is_none());
    assert!(report.submission.answers.health_note.is_none());
    assert_eq!(report.promo_codes, vec!["SUMMER".to_string()]);
    assert!(report.submission.reported);
    assert!(harness
        .ledger
        .unreported_submissions()
        .await
        .unwrap()
        .is_empty());

    // One notification per configured operator, carrying the code.
    let sent = harness.notifier.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, 1001);
    assert!(sent[0].1.contains("Promo codes: SUMMER"));
    assert!(sent[0].1.contains("User: Sam (@sam)"));
    assert!(sent[0].1.contains("Age: 29"));
    assert!(!sent[0].1.contains("Diet:"));
}

#[tokio::test]
async fn invalid_answers_reprompt_without_advancing() {
    let harness = TestHarness::new();

    harness
        .event(&json!({"type": "select_option", "user_id": 7, "option_id": "begin_intake"}))
        .await
        .assert_status_ok();
    harness
        .event(&json!({"type": "select_option", "user_id": 7, "option_id": "gender_female"}))
        .await
        .assert_status_ok();

    let reply = harness
        .event_text(&json!({"type": "submit_answer", "user_id": 7, "text": "abc"}))
        .await;
    assert!(reply.contains("enter a number"), "unexpected reply: {reply}");

    let reply = harness
        .event_text(&json!({"type": "submit_answer", "user_id": 7, "text": "151"}))
        .await;
    assert!(reply.contains("valid age"), "unexpected reply: {reply}");

    let reply = harness
        .event_text(&json!({"type": "submit_answer", "user_id": 7, "text": "29"}))
        .await;
    assert!(reply.contains("weight"), "unexpected reply: {reply}");
}

#[tokio::test]
async fn comma_weight_is_accepted() {
    let harness = TestHarness::new();

    harness
        .event(&json!({"type": "select_option", "user_id": 9, "option_id": "begin_intake"}))
        .await
        .assert_status_ok();
    harness
        .event(&json!({"type": "select_option", "user_id": 9, "option_id": "gender_male"}))
        .await
        .assert_status_ok();
    harness
        .event(&json!({"type": "submit_answer", "user_id": 9, "text": "30"}))
        .await
        .assert_status_ok();
    harness
        .event(&json!({"type": "submit_answer", "user_id": 9, "text": "75,5"}))
        .await
        .assert_status_ok();
    harness
        .event(&json!({"type": "submit_answer", "user_id": 9, "text": "3"}))
        .await
        .assert_status_ok();
    harness
        .event(&json!({"type": "skip", "user_id": 9}))
        .await
        .assert_status_ok();
    harness
        .event(&json!({"type": "skip", "user_id": 9}))
        .await
        .assert_status_ok();

    let report = harness
        .ledger
        .submission_with_codes(SubmissionId::new(1))
        .await
        .unwrap()
        .unwrap();
    assert_eq!(report.submission.answers.weight, Some(75.5));
}

#[tokio::test]
async fn cancel_discards_the_session_unconditionally() {
    let harness = TestHarness::new();

    harness
        .event(&json!({"type": "select_option", "user_id": 5, "option_id": "begin_intake"}))
        .await
        .assert_status_ok();
    harness
        .event(&json!({"type": "select_option", "user_id": 5, "option_id": "gender_male"}))
        .await
        .assert_status_ok();

    let reply = harness
        .event_text(&json!({"type": "cancel", "user_id": 5}))
        .await;
    assert!(reply.contains("Cancelled"));

    // The next answer no longer belongs to a flow.
    let reply = harness
        .event_text(&json!({"type": "submit_answer", "user_id": 5, "text": "29"}))
        .await;
    assert!(reply.contains("Choose an option"), "unexpected reply: {reply}");

    // No submission was ever persisted.
    assert!(harness
        .ledger
        .unreported_submissions()
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn referral_clicks_are_recorded_and_unknown_slugs_ignored() {
    let harness = TestHarness::new();

    harness
        .server
        .post("/v1/links")
        .add_header("x-admin-key", &harness.admin_api_key)
        .json(&json!({"slug": "youtube2025", "description": "spring campaign"}))
        .await
        .assert_status_ok();

    harness
        .event(&json!({
            "type": "start_conversation",
            "user_id": 1,
            "referral_slug": "YouTube2025"
        }))
        .await
        .assert_status_ok();

    // An unknown slug is logged and ignored, not an error.
    harness
        .event(&json!({
            "type": "start_conversation",
            "user_id": 2,
            "referral_slug": "nope"
        }))
        .await
        .assert_status_ok();

    let response = harness
        .server
        .get("/v1/links")
        .add_header("x-admin-key", &harness.admin_api_key)
        .await;
    response.assert_status_ok();
    let links: serde_json::Value = response.json();
    assert_eq!(links[0]["slug"], "youtube2025");
    assert_eq!(links[0]["total_clicks"], 1);
    assert_eq!(links[0]["month_clicks"], 1);
}

#[tokio::test]
async fn events_require_the_gateway_key() {
    let harness = TestHarness::new();

    let response = harness
        .server
        .post("/v1/events")
        .json(&json!({"type": "start_conversation", "user_id": 1}))
        .await;
    response.assert_status_unauthorized();

    let response = harness
        .server
        .post("/v1/events")
        .add_header("x-api-key", "wrong")
        .json(&json!({"type": "start_conversation", "user_id": 1}))
        .await;
    response.assert_status_unauthorized();
}

#[tokio::test]
async fn users_complete_flows_independently() {
    let harness = TestHarness::with_operators(&[1001]);

    complete_default_intake(&harness, 100).await;
    complete_default_intake(&harness, 200).await;

    let reports = harness.ledger.unreported_submissions().await.unwrap();
    assert!(reports.is_empty());
    assert_eq!(harness.notifier.sent().len(), 2);
}
