//! Shared harness for the HTTP integration tests.
//!
//! Builds the full axum router over the in-memory ledger, a mock payment
//! gateway and a recording push sender, and drives it with
//! `tower::ServiceExt::oneshot`.

#![allow(dead_code)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use secrecy::SecretString;
use serde_json::Value;
use tower::ServiceExt;

use rental_ledger::adapters::http::{
    app_router, HttpOptions, SubscriptionAppState, WebhookAppState,
};
use rental_ledger::adapters::memory::{InMemoryInstallations, InMemoryLedger, InMemoryRecipients};
use rental_ledger::adapters::razorpay::MockPaymentGateway;
use rental_ledger::application::handlers::{SubscriptionLifecycleService, WebhookDispatcher};
use rental_ledger::application::LedgerNotifier;
use rental_ledger::domain::foundation::{
    FranchiseId, InstallationRequestId, ProductId, SubscriptionId, Timestamp, UserId,
};
use rental_ledger::domain::installation::{InstallationRequest, InstallationStatus};
use rental_ledger::domain::subscription::Subscription;
use rental_ledger::domain::webhook::{compute_signature, SIGNATURE_HEADER};
use rental_ledger::ports::{NotificationError, NotificationGateway, PushNotification};

pub const SECRET: &str = "whsec_integration";
pub const CUSTOMER: &str = "cust-1";
pub const ADMIN: &str = "admin-1";

// =============================================================================
// Test Infrastructure
// =============================================================================

/// Push sender that records every notification.
#[derive(Default)]
pub struct RecordingPush {
    sent: Mutex<Vec<PushNotification>>,
}

impl RecordingPush {
    pub fn sent(&self) -> Vec<PushNotification> {
        self.sent.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationGateway for RecordingPush {
    async fn send_single_push_notification(
        &self,
        notification: PushNotification,
    ) -> Result<(), NotificationError> {
        self.sent.lock().unwrap().push(notification);
        Ok(())
    }
}

pub struct TestApp {
    pub router: Router,
    pub ledger: Arc<InMemoryLedger>,
    pub installations: Arc<InMemoryInstallations>,
    pub gateway: MockPaymentGateway,
    pub push: Arc<RecordingPush>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::build(Some(SECRET))
    }

    pub fn without_webhook_secret() -> Self {
        Self::build(None)
    }

    fn build(secret: Option<&str>) -> Self {
        let ledger = Arc::new(InMemoryLedger::new());
        let installations = Arc::new(InMemoryInstallations::new());
        let gateway = MockPaymentGateway::new();
        let push = Arc::new(RecordingPush::default());
        let recipients = Arc::new(
            InMemoryRecipients::new()
                .with_push_token(UserId::new(CUSTOMER).unwrap(), "ExponentPushToken[cust]")
                .with_push_token(UserId::new(ADMIN).unwrap(), "ExponentPushToken[admin]")
                .with_admin(UserId::new(ADMIN).unwrap()),
        );

        let notifier = Arc::new(LedgerNotifier::new(
            push.clone(),
            recipients,
            Duration::from_millis(500),
        ));
        let dispatcher = Arc::new(WebhookDispatcher::new(
            ledger.clone(),
            notifier.clone(),
            secret.map(|s| SecretString::new(s.to_string())),
        ));
        let service = Arc::new(SubscriptionLifecycleService::new(
            ledger.clone(),
            installations.clone(),
            Arc::new(gateway.clone()),
            notifier,
            Some("plan_monthly".to_string()),
        ));

        let router = app_router(
            SubscriptionAppState::new(service),
            WebhookAppState::new(dispatcher),
            &HttpOptions::default(),
        );

        Self {
            router,
            ledger,
            installations,
            gateway,
            push,
        }
    }

    /// Registers a completed installation for the default customer.
    pub fn completed_installation(&self) -> InstallationRequestId {
        let id = InstallationRequestId::new();
        self.installations.insert(InstallationRequest {
            id,
            customer_id: UserId::new(CUSTOMER).unwrap(),
            product_id: ProductId::new("prod-ro-1").unwrap(),
            franchise_id: FranchiseId::new("fr-1").unwrap(),
            status: InstallationStatus::Completed,
        });
        id
    }

    pub async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    /// Creates a subscription through the API, starting 2024-01-01.
    pub async fn create_subscription(&self, autopay: bool) -> Value {
        let installation = self.completed_installation();
        let (status, body) = self
            .send(api(
                "POST",
                "/api/subscriptions",
                (ADMIN, "ADMIN"),
                Some(serde_json::json!({
                    "installationRequestId": installation.to_string(),
                    "planName": "RO Purifier Monthly",
                    "monthlyAmount": 500,
                    "depositAmount": 1500,
                    "startDate": "2024-01-01T00:00:00Z",
                    "enableAutoPayment": autopay
                })),
            ))
            .await;
        assert_eq!(status, StatusCode::CREATED, "create failed: {}", body);
        body
    }

    pub fn stored(&self, id: &str) -> Subscription {
        let id: SubscriptionId = id.parse().unwrap();
        self.ledger.subscription(&id).unwrap()
    }
}

pub fn ymd(year: i32, month: u32, day: u32) -> Timestamp {
    Timestamp::from_ymd(year, month, day).unwrap()
}

// =============================================================================
// Request Builders
// =============================================================================

/// Authenticated API request as `(user_id, role)`.
pub fn api(method: &str, uri: &str, caller: (&str, &str), body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("x-user-id", caller.0)
        .header("x-user-role", caller.1);
    match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

/// Webhook delivery signed with [`SECRET`].
pub fn signed_webhook(payload: &Value) -> Request<Body> {
    let raw = payload.to_string();
    let signature = compute_signature(SECRET, raw.as_bytes()).unwrap();
    webhook(raw, Some(&signature))
}

pub fn webhook(raw: String, signature: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder()
        .method("POST")
        .uri("/razorpay")
        .header("content-type", "application/json");
    if let Some(signature) = signature {
        builder = builder.header(SIGNATURE_HEADER, signature);
    }
    builder.body(Body::from(raw)).unwrap()
}

pub fn charged_event(gateway_subscription_id: &str, payment_id: &str) -> Value {
    serde_json::json!({
        "event": "subscription.charged",
        "payload": {
            "subscription": { "entity": {
                "id": gateway_subscription_id,
                "status": "active",
                "plan_id": "plan_monthly",
                "paid_count": 1
            } },
            "payment": { "entity": {
                "id": payment_id,
                "amount": 50000,
                "currency": "INR",
                "status": "captured",
                "method": "upi",
                "subscription_id": gateway_subscription_id
            } }
        }
    })
}

pub fn status_event(event: &str, gateway_subscription_id: &str, status: &str) -> Value {
    serde_json::json!({
        "event": event,
        "payload": {
            "subscription": { "entity": {
                "id": gateway_subscription_id,
                "status": status
            } }
        }
    })
}
