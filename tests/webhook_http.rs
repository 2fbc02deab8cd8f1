//! HTTP integration tests for the Razorpay webhook endpoint.
//!
//! Drives the full router: signature gate, idempotent charge handling and
//! acknowledgement of events the ledger does not act on.

mod support;

use axum::http::StatusCode;
use serde_json::json;

use rental_ledger::domain::audit::ActionType;
use rental_ledger::domain::payment::PaymentMethod;
use support::{charged_event, signed_webhook, status_event, webhook, ymd, TestApp};

// =============================================================================
// Signature Gate
// =============================================================================

#[tokio::test]
async fn missing_signature_is_rejected_without_writes() {
    let app = TestApp::new();
    let created = app.create_subscription(true).await;
    let gateway_id = created["razorpaySubscriptionId"].as_str().unwrap();
    let history_before = app.ledger.action_history().len();

    let raw = charged_event(gateway_id, "pay_unsigned").to_string();
    let (status, body) = app.send(webhook(raw, None)).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], "error");
    assert!(app.ledger.payments().is_empty());
    assert_eq!(app.ledger.action_history().len(), history_before);
}

#[tokio::test]
async fn tampered_body_is_rejected() {
    let app = TestApp::new();
    let created = app.create_subscription(true).await;
    let gateway_id = created["razorpaySubscriptionId"].as_str().unwrap();

    let original = charged_event(gateway_id, "pay_1").to_string();
    let signature =
        rental_ledger::domain::webhook::compute_signature(support::SECRET, original.as_bytes())
            .unwrap();
    let tampered = original.replace("50000", "1");
    let (status, _) = app.send(webhook(tampered, Some(&signature))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(app.ledger.payments().is_empty());
}

#[tokio::test]
async fn unconfigured_secret_is_a_server_error() {
    let app = TestApp::without_webhook_secret();

    let (status, body) = app
        .send(signed_webhook(&status_event(
            "subscription.paused",
            "sub_any",
            "paused",
        )))
        .await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["status"], "error");
}

#[tokio::test]
async fn malformed_body_is_bad_request() {
    let app = TestApp::new();

    let (status, _) = app.send(signed_webhook(&json!({ "payload": {} }))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
}

// =============================================================================
// Acknowledged Events
// =============================================================================

#[tokio::test]
async fn unknown_event_is_acknowledged() {
    let app = TestApp::new();

    let (status, body) = app
        .send(signed_webhook(&json!({ "event": "invoice.paid", "payload": {} })))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["message"], "acknowledged");
}

#[tokio::test]
async fn unknown_gateway_subscription_is_acknowledged() {
    let app = TestApp::new();

    let (status, body) = app
        .send(signed_webhook(&charged_event("sub_unknown", "pay_orphan")))
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "not_found_local");
    assert!(app.ledger.payments().is_empty());
}

// =============================================================================
// Charge Idempotence
// =============================================================================

#[tokio::test]
async fn redelivered_charge_is_recorded_once() {
    let app = TestApp::new();
    let created = app.create_subscription(true).await;
    let id = created["id"].as_str().unwrap();
    let gateway_id = created["razorpaySubscriptionId"].as_str().unwrap();
    assert_eq!(gateway_id, "sub_mock_1");
    assert_eq!(app.stored(id).current_period_end, ymd(2024, 2, 1));

    let event = charged_event(gateway_id, "pay_abc123");
    let (first_status, first) = app.send(signed_webhook(&event)).await;
    let (second_status, second) = app.send(signed_webhook(&event)).await;

    assert_eq!(first_status, StatusCode::OK);
    assert_eq!(first["message"], "applied");
    assert_eq!(second_status, StatusCode::OK);
    assert_eq!(second["message"], "already_processed");

    let payments = app.ledger.payments();
    assert_eq!(payments.len(), 1);
    assert_eq!(payments[0].razorpay_payment_id.as_deref(), Some("pay_abc123"));
    assert_eq!(payments[0].amount.paise(), 50_000);
    assert_eq!(payments[0].method, PaymentMethod::RazorpayAutopay);

    let stored = app.stored(id);
    assert_eq!(stored.current_period_start, ymd(2024, 2, 1));
    assert_eq!(stored.current_period_end, ymd(2024, 3, 1));

    let actions: Vec<_> = app
        .ledger
        .action_history()
        .into_iter()
        .map(|h| h.action_type)
        .collect();
    assert_eq!(
        actions,
        vec![ActionType::SubscriptionCreated, ActionType::PaymentCompleted]
    );
}

#[tokio::test]
async fn gateway_pause_is_applied_once() {
    let app = TestApp::new();
    let created = app.create_subscription(true).await;
    let id = created["id"].as_str().unwrap();
    let gateway_id = created["razorpaySubscriptionId"].as_str().unwrap();

    let event = status_event("subscription.paused", gateway_id, "paused");
    let (_, first) = app.send(signed_webhook(&event)).await;
    let (_, second) = app.send(signed_webhook(&event)).await;

    assert_eq!(first["message"], "applied");
    assert_eq!(second["message"], "already_processed");
    assert_eq!(app.stored(id).status.to_string(), "PAUSED");
    assert_eq!(app.ledger.action_history().len(), 2);
}

// =============================================================================
// Health
// =============================================================================

#[tokio::test]
async fn health_check_responds() {
    let app = TestApp::new();

    let request = axum::http::Request::builder()
        .uri("/health")
        .body(axum::body::Body::empty())
        .unwrap();
    let (status, body) = app.send(request).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
}
