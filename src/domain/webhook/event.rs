//! Razorpay webhook event types.
//!
//! The gateway body is deserialized into a loose envelope, then validated
//! into [`RazorpayEvent`]. Handlers only ever see the validated shape.

use serde::Deserialize;

use super::WebhookError;
use crate::domain::foundation::{Money, Timestamp};

// ════════════════════════════════════════════════════════════════════════════
// Validated shape
// ════════════════════════════════════════════════════════════════════════════

/// Fields taken from `payload.subscription.entity`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionEntity {
    pub id: String,
    pub status: Option<String>,
    pub plan_id: Option<String>,
    pub current_start: Option<Timestamp>,
    pub current_end: Option<Timestamp>,
    pub paid_count: Option<u32>,
}

/// Fields taken from `payload.payment.entity`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentEntity {
    pub id: String,
    /// Converted from gateway paise.
    pub amount: Money,
    pub currency: Option<String>,
    pub status: Option<String>,
    pub method: Option<String>,
    pub order_id: Option<String>,
    pub invoice_id: Option<String>,
    pub subscription_id: Option<String>,
    pub error_code: Option<String>,
    pub error_description: Option<String>,
}

/// A verified gateway event, tagged by type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RazorpayEvent {
    SubscriptionActivated(SubscriptionEntity),
    SubscriptionCharged {
        subscription: SubscriptionEntity,
        payment: PaymentEntity,
    },
    SubscriptionPaused(SubscriptionEntity),
    SubscriptionHalted(SubscriptionEntity),
    SubscriptionCancelled(SubscriptionEntity),
    SubscriptionCompleted(SubscriptionEntity),
    SubscriptionUpdated(SubscriptionEntity),
    PaymentCaptured(PaymentEntity),
    PaymentFailed(PaymentEntity),
    /// An event type this service does not act on.
    Unhandled(String),
}

impl RazorpayEvent {
    /// Parses and validates a raw webhook body.
    ///
    /// # Errors
    ///
    /// - `Parse` if the body is not a JSON envelope with an `event` string
    /// - `MissingField` if a known event lacks an entity or field it needs
    pub fn parse(raw_body: &[u8]) -> Result<Self, WebhookError> {
        let envelope: RawEnvelope =
            serde_json::from_slice(raw_body).map_err(|e| WebhookError::Parse(e.to_string()))?;
        let payload = envelope.payload;

        let event = match envelope.event.as_str() {
            "subscription.activated" => Self::SubscriptionActivated(subscription(&payload)?),
            "subscription.charged" => Self::SubscriptionCharged {
                subscription: subscription(&payload)?,
                payment: payment(&payload)?,
            },
            "subscription.paused" => Self::SubscriptionPaused(subscription(&payload)?),
            "subscription.halted" => Self::SubscriptionHalted(subscription(&payload)?),
            "subscription.cancelled" => Self::SubscriptionCancelled(subscription(&payload)?),
            "subscription.completed" => Self::SubscriptionCompleted(subscription(&payload)?),
            "subscription.updated" => Self::SubscriptionUpdated(subscription(&payload)?),
            "payment.captured" => Self::PaymentCaptured(payment(&payload)?),
            "payment.failed" => Self::PaymentFailed(payment(&payload)?),
            other => Self::Unhandled(other.to_string()),
        };
        Ok(event)
    }

    /// The gateway's event type string.
    pub fn name(&self) -> &str {
        match self {
            Self::SubscriptionActivated(_) => "subscription.activated",
            Self::SubscriptionCharged { .. } => "subscription.charged",
            Self::SubscriptionPaused(_) => "subscription.paused",
            Self::SubscriptionHalted(_) => "subscription.halted",
            Self::SubscriptionCancelled(_) => "subscription.cancelled",
            Self::SubscriptionCompleted(_) => "subscription.completed",
            Self::SubscriptionUpdated(_) => "subscription.updated",
            Self::PaymentCaptured(_) => "payment.captured",
            Self::PaymentFailed(_) => "payment.failed",
            Self::Unhandled(name) => name,
        }
    }
}

// ════════════════════════════════════════════════════════════════════════════
// Raw envelope
// ════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Deserialize)]
struct RawEnvelope {
    event: String,
    #[serde(default)]
    payload: RawPayload,
}

#[derive(Debug, Default, Deserialize)]
struct RawPayload {
    subscription: Option<RawWrapper<RawSubscription>>,
    payment: Option<RawWrapper<RawPayment>>,
}

#[derive(Debug, Deserialize)]
struct RawWrapper<T> {
    entity: T,
}

#[derive(Debug, Deserialize)]
struct RawSubscription {
    id: Option<String>,
    status: Option<String>,
    plan_id: Option<String>,
    current_start: Option<i64>,
    current_end: Option<i64>,
    paid_count: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct RawPayment {
    id: Option<String>,
    amount: Option<i64>,
    currency: Option<String>,
    status: Option<String>,
    method: Option<String>,
    order_id: Option<String>,
    invoice_id: Option<String>,
    subscription_id: Option<String>,
    error_code: Option<String>,
    error_description: Option<String>,
}

fn subscription(payload: &RawPayload) -> Result<SubscriptionEntity, WebhookError> {
    let raw = &payload
        .subscription
        .as_ref()
        .ok_or(WebhookError::MissingField("payload.subscription.entity"))?
        .entity;
    Ok(SubscriptionEntity {
        id: non_blank(raw.id.as_deref())
            .ok_or(WebhookError::MissingField("payload.subscription.entity.id"))?,
        status: raw.status.clone(),
        plan_id: raw.plan_id.clone(),
        current_start: raw.current_start.and_then(Timestamp::from_unix_secs),
        current_end: raw.current_end.and_then(Timestamp::from_unix_secs),
        paid_count: raw.paid_count,
    })
}

fn payment(payload: &RawPayload) -> Result<PaymentEntity, WebhookError> {
    let raw = &payload
        .payment
        .as_ref()
        .ok_or(WebhookError::MissingField("payload.payment.entity"))?
        .entity;
    let amount = raw
        .amount
        .ok_or(WebhookError::MissingField("payload.payment.entity.amount"))?;
    if amount < 0 {
        return Err(WebhookError::Parse("payment amount cannot be negative".into()));
    }
    Ok(PaymentEntity {
        id: non_blank(raw.id.as_deref())
            .ok_or(WebhookError::MissingField("payload.payment.entity.id"))?,
        amount: Money::from_paise(amount),
        currency: raw.currency.clone(),
        status: raw.status.clone(),
        method: raw.method.clone(),
        order_id: non_blank(raw.order_id.as_deref()),
        invoice_id: non_blank(raw.invoice_id.as_deref()),
        subscription_id: non_blank(raw.subscription_id.as_deref()),
        error_code: raw.error_code.clone(),
        error_description: raw.error_description.clone(),
    })
}

fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
