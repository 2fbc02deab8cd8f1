//! Request and response bodies for the subscription endpoints.
//!
//! Amounts cross the API in rupees and are stored in paise.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::application::handlers::{
    CreateSubscriptionCommand, GetSubscriptionResult, MarkPaymentCompletedCommand,
    MarkPaymentCompletedResult, TerminateSubscriptionCommand, UpdateSubscriptionCommand,
    UpdateSubscriptionResult,
};
use crate::domain::audit::ActionHistory;
use crate::domain::foundation::{
    InstallationRequestId, Money, PaymentId, SubscriptionId, Timestamp, ValidationError,
};
use crate::domain::payment::Payment;
use crate::domain::subscription::{Subscription, SubscriptionChanges};

/// Distinguishes an absent field from an explicit `null`.
fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

fn optional_amount(amount: Option<f64>, field: &str) -> Result<Option<Money>, ValidationError> {
    amount.map(|a| Money::from_major(a, field)).transpose()
}

// ════════════════════════════════════════════════════════════════════════════════
// Requests
// ════════════════════════════════════════════════════════════════════════════════

/// Request to create a subscription.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSubscriptionRequest {
    pub installation_request_id: Uuid,
    pub plan_name: String,
    pub monthly_amount: f64,
    #[serde(default)]
    pub deposit_amount: f64,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub enable_auto_payment: bool,
    pub plan_id: Option<String>,
    pub total_count: Option<u32>,
}

impl TryFrom<CreateSubscriptionRequest> for CreateSubscriptionCommand {
    type Error = ValidationError;

    fn try_from(req: CreateSubscriptionRequest) -> Result<Self, Self::Error> {
        Ok(CreateSubscriptionCommand {
            installation_request_id: InstallationRequestId::from_uuid(req.installation_request_id),
            plan_name: req.plan_name,
            monthly_amount: Money::from_major(req.monthly_amount, "monthly_amount")?,
            deposit_amount: Money::from_major(req.deposit_amount, "deposit_amount")?,
            start_date: req.start_date.map(Timestamp::from_datetime),
            end_date: req.end_date.map(Timestamp::from_datetime),
            enable_auto_payment: req.enable_auto_payment,
            plan_id: req.plan_id,
            total_count: req.total_count,
        })
    }
}

/// Request to edit a subscription. Absent fields are left alone.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSubscriptionRequest {
    pub plan_name: Option<String>,
    pub monthly_amount: Option<f64>,
    /// `null` clears the end date.
    #[serde(default, deserialize_with = "double_option")]
    pub end_date: Option<Option<DateTime<Utc>>>,
    pub next_payment_date: Option<DateTime<Utc>>,
    pub status: Option<String>,
    pub comment: Option<String>,
}

impl UpdateSubscriptionRequest {
    pub fn into_command(
        self,
        subscription_id: SubscriptionId,
    ) -> Result<UpdateSubscriptionCommand, ValidationError> {
        Ok(UpdateSubscriptionCommand {
            subscription_id,
            changes: SubscriptionChanges {
                plan_name: self.plan_name,
                monthly_amount: optional_amount(self.monthly_amount, "monthly_amount")?,
                end_date: self
                    .end_date
                    .map(|end| end.map(Timestamp::from_datetime)),
                next_payment_date: self.next_payment_date.map(Timestamp::from_datetime),
            },
            status: self.status.map(|s| s.parse()).transpose()?,
            comment: self.comment,
        })
    }
}

/// Optional body for pause and resume.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransitionRequest {
    pub reason: Option<String>,
}

/// Request to terminate a subscription.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TerminateSubscriptionRequest {
    pub reason: Option<String>,
    #[serde(default)]
    pub refund_deposit: bool,
}

impl TerminateSubscriptionRequest {
    pub fn into_command(self, subscription_id: SubscriptionId) -> TerminateSubscriptionCommand {
        TerminateSubscriptionCommand {
            subscription_id,
            reason: self.reason,
            refund_deposit: self.refund_deposit,
        }
    }
}

/// Request to record a manual payment.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkPaymentCompletedRequest {
    pub payment_id: Option<Uuid>,
    pub amount: Option<f64>,
    pub payment_method: String,
    pub reference: Option<String>,
    pub comment: Option<String>,
}

impl MarkPaymentCompletedRequest {
    pub fn into_command(
        self,
        subscription_id: SubscriptionId,
    ) -> Result<MarkPaymentCompletedCommand, ValidationError> {
        Ok(MarkPaymentCompletedCommand {
            subscription_id,
            payment_id: self.payment_id.map(PaymentId::from_uuid),
            amount: optional_amount(self.amount, "amount")?,
            method: self.payment_method.parse()?,
            reference: self.reference,
            comment: self.comment,
        })
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Responses
// ════════════════════════════════════════════════════════════════════════════════

/// Subscription as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionResponse {
    pub id: String,
    pub connect_id: String,
    pub razorpay_subscription_id: Option<String>,
    pub customer_id: String,
    pub product_id: String,
    pub franchise_id: String,
    pub installation_request_id: Option<String>,
    pub plan_name: String,
    pub monthly_amount: f64,
    pub deposit_amount: f64,
    pub status: String,
    pub start_date: Timestamp,
    pub end_date: Option<Timestamp>,
    pub current_period_start: Timestamp,
    pub current_period_end: Timestamp,
    pub next_payment_date: Timestamp,
    pub version: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl From<Subscription> for SubscriptionResponse {
    fn from(s: Subscription) -> Self {
        Self {
            id: s.id.to_string(),
            connect_id: s.connect_id.to_string(),
            razorpay_subscription_id: s.razorpay_subscription_id,
            customer_id: s.customer_id.to_string(),
            product_id: s.product_id.to_string(),
            franchise_id: s.franchise_id.to_string(),
            installation_request_id: s.installation_request_id.map(|id| id.to_string()),
            plan_name: s.plan_name,
            monthly_amount: s.monthly_amount.as_major(),
            deposit_amount: s.deposit_amount.as_major(),
            status: s.status.to_string(),
            start_date: s.start_date,
            end_date: s.end_date,
            current_period_start: s.current_period_start,
            current_period_end: s.current_period_end,
            next_payment_date: s.next_payment_date,
            version: s.version,
            created_at: s.created_at,
            updated_at: s.updated_at,
        }
    }
}

/// Payment row as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentResponse {
    pub id: String,
    pub amount: f64,
    pub payment_type: String,
    pub status: String,
    pub payment_method: String,
    pub razorpay_payment_id: Option<String>,
    pub razorpay_order_id: Option<String>,
    pub paid_date: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl From<Payment> for PaymentResponse {
    fn from(p: Payment) -> Self {
        Self {
            id: p.id.to_string(),
            amount: p.amount.as_major(),
            payment_type: p.payment_type.as_str().to_string(),
            status: p.status.as_str().to_string(),
            payment_method: p.method.as_str().to_string(),
            razorpay_payment_id: p.razorpay_payment_id,
            razorpay_order_id: p.razorpay_order_id,
            paid_date: p.paid_date,
            created_at: p.created_at,
        }
    }
}

/// Audit row as returned by the API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionHistoryResponse {
    pub id: String,
    pub action_type: String,
    pub payment_id: Option<String>,
    pub from_status: Option<String>,
    pub to_status: Option<String>,
    pub performed_by: String,
    pub performed_by_role: String,
    pub comment: Option<String>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub created_at: Timestamp,
}

impl From<ActionHistory> for ActionHistoryResponse {
    fn from(h: ActionHistory) -> Self {
        Self {
            id: h.id.to_string(),
            action_type: h.action_type.as_str().to_string(),
            payment_id: h.payment_id.map(|id| id.to_string()),
            from_status: h.from_status,
            to_status: h.to_status,
            performed_by: h.performed_by,
            performed_by_role: h.performed_by_role.as_str().to_string(),
            comment: h.comment,
            metadata: h.metadata,
            created_at: h.created_at,
        }
    }
}

/// `GET /api/subscriptions/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubscriptionDetailResponse {
    pub subscription: SubscriptionResponse,
    pub payments: Vec<PaymentResponse>,
    pub history: Vec<ActionHistoryResponse>,
}

impl From<GetSubscriptionResult> for SubscriptionDetailResponse {
    fn from(result: GetSubscriptionResult) -> Self {
        Self {
            subscription: result.subscription.into(),
            payments: result.payments.into_iter().map(Into::into).collect(),
            history: result.history.into_iter().map(Into::into).collect(),
        }
    }
}

/// `PATCH /api/subscriptions/{id}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSubscriptionResponse {
    pub subscription: SubscriptionResponse,
    pub changed_fields: Vec<String>,
    pub status_changed: bool,
}

impl From<UpdateSubscriptionResult> for UpdateSubscriptionResponse {
    fn from(result: UpdateSubscriptionResult) -> Self {
        Self {
            status_changed: result.status_change.is_some(),
            changed_fields: result
                .changed_fields
                .iter()
                .map(|f| f.to_string())
                .collect(),
            subscription: result.subscription.into(),
        }
    }
}

/// `POST /api/subscriptions/{id}/payments`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkPaymentCompletedResponse {
    pub payment: PaymentResponse,
    pub subscription: SubscriptionResponse,
    pub period_advanced: bool,
}

impl From<MarkPaymentCompletedResult> for MarkPaymentCompletedResponse {
    fn from(result: MarkPaymentCompletedResult) -> Self {
        Self {
            payment: result.payment.into(),
            subscription: result.subscription.into(),
            period_advanced: result.period_advanced,
        }
    }
}
