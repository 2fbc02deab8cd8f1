//! Payment reconcilers: recurring charges, one-off captures and failures.

use serde_json::{Map, Value};

use super::dispatcher::{store_error, Attempt, WebhookDispatcher};
use crate::application::notifier::NotificationKind;
use crate::application::settlement::{settle_existing_payment, settle_new_charge, Charge};
use crate::domain::audit::{ActionHistory, ActionType, Actor};
use crate::domain::foundation::Timestamp;
use crate::domain::payment::{Payment, PaymentMethod, PaymentStatus};
use crate::domain::webhook::{PaymentEntity, WebhookError, WebhookOutcome};
use crate::ports::{LedgerError, LedgerUnit};

/// How a commit attempt ended, short of a hard failure.
pub(super) enum Committed {
    Yes,
    Conflict,
    Duplicate,
}

pub(super) fn committed(result: Result<(), LedgerError>) -> Result<Committed, WebhookError> {
    match result {
        Ok(()) => Ok(Committed::Yes),
        Err(LedgerError::Conflict { .. }) => Ok(Committed::Conflict),
        Err(LedgerError::DuplicatePayment(_)) => Ok(Committed::Duplicate),
        Err(err) => Err(store_error(err)),
    }
}

fn gateway_metadata(event: &str, payment: &PaymentEntity) -> Map<String, Value> {
    let mut metadata = Map::new();
    metadata.insert("event".into(), Value::from(event));
    metadata.insert("amount_paise".into(), Value::from(payment.amount.paise()));
    let optional = [
        ("currency", &payment.currency),
        ("gateway_method", &payment.method),
        ("gateway_status", &payment.status),
        ("razorpay_subscription_id", &payment.subscription_id),
        ("razorpay_invoice_id", &payment.invoice_id),
    ];
    for (key, value) in optional {
        if let Some(value) = value {
            metadata.insert(key.into(), Value::from(value.as_str()));
        }
    }
    metadata
}

impl WebhookDispatcher {
    /// `subscription.charged`, or `payment.captured` carrying a subscription id.
    pub(super) async fn try_recurring_charge(
        &self,
        gateway_subscription_id: &str,
        payment: &PaymentEntity,
        event: &str,
    ) -> Result<Attempt, WebhookError> {
        if self
            .ledger
            .find_payment_by_gateway_id(&payment.id)
            .await
            .map_err(store_error)?
            .is_some()
        {
            tracing::debug!(
                razorpay_payment_id = %payment.id,
                "Charge already recorded; skipping redelivery"
            );
            return Ok(Attempt::Done(WebhookOutcome::AlreadyProcessed));
        }

        let Some(subscription) = self
            .ledger
            .find_subscription_by_gateway_id(gateway_subscription_id)
            .await
            .map_err(store_error)?
        else {
            tracing::info!(
                event,
                razorpay_subscription_id = %gateway_subscription_id,
                "No local subscription for charged gateway subscription"
            );
            return Ok(Attempt::Done(WebhookOutcome::NotFoundLocal));
        };

        let mut metadata = gateway_metadata(event, payment);
        metadata.insert(
            "razorpay_subscription_id".into(),
            Value::from(gateway_subscription_id),
        );
        let charge = Charge {
            amount: payment.amount,
            method: PaymentMethod::RazorpayAutopay,
            razorpay_payment_id: Some(payment.id.clone()),
            razorpay_order_id: payment.order_id.clone(),
            comment: None,
            metadata,
        };
        let (unit, settlement) =
            settle_new_charge(&subscription, charge, &Actor::System, Timestamp::now());

        match committed(self.ledger.commit(unit).await)? {
            Committed::Yes => {}
            Committed::Conflict => return Ok(Attempt::Conflict),
            Committed::Duplicate => {
                tracing::debug!(
                    razorpay_payment_id = %payment.id,
                    "Charge recorded concurrently; skipping"
                );
                return Ok(Attempt::Done(WebhookOutcome::AlreadyProcessed));
            }
        }

        tracing::info!(
            event,
            subscription_id = %subscription.id,
            payment_id = %settlement.payment.id,
            amount = %payment.amount,
            period_advanced = settlement.period_advanced,
            "Recorded recurring charge"
        );
        let current = settlement.subscription.as_ref().unwrap_or(&subscription);
        self.notifier
            .notify(NotificationKind::PaymentReceived, current, Some(payment.amount))
            .await;
        Ok(Attempt::Done(WebhookOutcome::Applied))
    }

    /// `payment.captured` without a subscription id: completes a local
    /// PENDING payment found by payment id or order id.
    pub(super) async fn try_capture(
        &self,
        payment: &PaymentEntity,
        event: &str,
    ) -> Result<Attempt, WebhookError> {
        let Some(local) = self.find_local_payment(payment).await? else {
            tracing::info!(
                event,
                razorpay_payment_id = %payment.id,
                "No local payment for captured gateway payment"
            );
            return Ok(Attempt::Done(WebhookOutcome::NotFoundLocal));
        };
        if local.status == PaymentStatus::Completed {
            tracing::debug!(payment_id = %local.id, "Payment already completed; skipping");
            return Ok(Attempt::Done(WebhookOutcome::AlreadyProcessed));
        }
        if local.amount != payment.amount {
            tracing::warn!(
                payment_id = %local.id,
                expected = %local.amount,
                captured = %payment.amount,
                "Captured amount differs from local payment"
            );
        }

        let subscription = match local.subscription_id {
            Some(id) => self
                .ledger
                .find_subscription_by_id(&id)
                .await
                .map_err(store_error)?,
            None => None,
        };

        let charge = Charge {
            amount: local.amount,
            method: local.method,
            razorpay_payment_id: Some(payment.id.clone()),
            razorpay_order_id: payment.order_id.clone(),
            comment: None,
            metadata: gateway_metadata(event, payment),
        };
        let payment_id = local.id;
        let (unit, settlement) = match settle_existing_payment(
            local,
            subscription.as_ref(),
            charge,
            &Actor::System,
            Timestamp::now(),
        ) {
            Ok(settled) => settled,
            Err(current) => {
                tracing::warn!(
                    payment_id = %payment_id,
                    status = %current,
                    "Captured payment cannot be completed from its current status"
                );
                return Ok(Attempt::Done(WebhookOutcome::Ignored));
            }
        };

        match committed(self.ledger.commit(unit).await)? {
            Committed::Yes => {}
            Committed::Conflict => return Ok(Attempt::Conflict),
            Committed::Duplicate => return Ok(Attempt::Done(WebhookOutcome::AlreadyProcessed)),
        }

        tracing::info!(
            event,
            payment_id = %payment_id,
            period_advanced = settlement.period_advanced,
            "Completed pending payment from gateway capture"
        );
        if let Some(sub) = settlement.subscription.as_ref().or(subscription.as_ref()) {
            self.notifier
                .notify(NotificationKind::PaymentReceived, sub, Some(settlement.payment.amount))
                .await;
        }
        Ok(Attempt::Done(WebhookOutcome::Applied))
    }

    /// `payment.failed`: marks a known local payment FAILED.
    pub(super) async fn try_failure(
        &self,
        payment: &PaymentEntity,
        event: &str,
    ) -> Result<Attempt, WebhookError> {
        let Some(local) = self.find_local_payment(payment).await? else {
            tracing::info!(
                event,
                razorpay_payment_id = %payment.id,
                "No local payment for failed gateway payment"
            );
            return Ok(Attempt::Done(WebhookOutcome::NotFoundLocal));
        };
        if local.status == PaymentStatus::Failed {
            tracing::debug!(payment_id = %local.id, "Payment already failed; skipping");
            return Ok(Attempt::Done(WebhookOutcome::AlreadyProcessed));
        }

        let now = Timestamp::now();
        let mut failed = local.clone();
        let from = match failed.fail(now) {
            Ok(from) => from,
            Err(rejected) => {
                tracing::warn!(
                    payment_id = %local.id,
                    status = %rejected.from,
                    "Gateway failure does not apply to payment in this status"
                );
                return Ok(Attempt::Done(WebhookOutcome::Ignored));
            }
        };
        if failed.razorpay_payment_id.is_none() {
            failed.razorpay_payment_id = Some(payment.id.clone());
        }

        let mut audit = ActionHistory::new(ActionType::PaymentFailed, &Actor::System, now)
            .for_payment(failed.id)
            .with_statuses(Some(from), PaymentStatus::Failed)
            .with_metadata("razorpay_payment_id", payment.id.as_str())
            .with_metadata("razorpay_order_id", payment.order_id.clone())
            .with_metadata("error_code", payment.error_code.clone())
            .with_metadata("error_description", payment.error_description.clone());
        for (key, value) in gateway_metadata(event, payment) {
            audit = audit.with_metadata(&key, value);
        }
        if let Some(subscription_id) = failed.subscription_id {
            audit = audit.for_subscription(subscription_id);
        }

        match committed(
            self.ledger
                .commit(LedgerUnit::new().update_payment(failed.clone()).append(audit))
                .await,
        )? {
            Committed::Yes => {}
            Committed::Conflict => return Ok(Attempt::Conflict),
            Committed::Duplicate => return Ok(Attempt::Done(WebhookOutcome::AlreadyProcessed)),
        }

        tracing::info!(
            event,
            payment_id = %failed.id,
            error = payment.error_description.as_deref().unwrap_or("unknown"),
            "Marked payment failed"
        );
        if let Some(subscription_id) = failed.subscription_id {
            match self.ledger.find_subscription_by_id(&subscription_id).await {
                Ok(Some(sub)) => {
                    self.notifier
                        .notify(NotificationKind::PaymentFailed, &sub, Some(failed.amount))
                        .await;
                }
                Ok(None) => {}
                Err(err) => tracing::warn!(
                    error = %err,
                    "Could not load subscription for failure notification"
                ),
            }
        }
        Ok(Attempt::Done(WebhookOutcome::Applied))
    }

    async fn find_local_payment(
        &self,
        payment: &PaymentEntity,
    ) -> Result<Option<Payment>, WebhookError> {
        if let Some(found) = self
            .ledger
            .find_payment_by_gateway_id(&payment.id)
            .await
            .map_err(store_error)?
        {
            return Ok(Some(found));
        }
        match &payment.order_id {
            Some(order_id) => self
                .ledger
                .find_payment_by_order_id(order_id)
                .await
                .map_err(store_error),
            None => Ok(None),
        }
    }
}
