//! Manual payment recording (cash, UPI, manual gateway links).
//!
//! Builds the same settlement unit a `subscription.charged` webhook does, so
//! both paths leave the subscription in the same state.

use serde_json::{Map, Value};

use super::{authorize, ledger_failure, SubscriptionLifecycleService, COLLECTORS};
use crate::application::handlers::MAX_COMMIT_ATTEMPTS;
use crate::application::notifier::NotificationKind;
use crate::application::settlement::{settle_existing_payment, settle_new_charge, Charge};
use crate::domain::audit::Actor;
use crate::domain::foundation::{
    AuthenticatedUser, Money, PaymentId, SubscriptionId, Timestamp, ValidationError,
};
use crate::domain::payment::{Payment, PaymentMethod};
use crate::domain::subscription::{Subscription, SubscriptionError, SubscriptionStatus};
use crate::ports::LedgerError;

/// Command to record money collected outside the autopay flow.
#[derive(Debug, Clone)]
pub struct MarkPaymentCompletedCommand {
    pub subscription_id: SubscriptionId,
    /// Completes this PENDING/FAILED row instead of inserting a new one.
    pub payment_id: Option<PaymentId>,
    /// Defaults to the pending row's amount, then the monthly amount.
    pub amount: Option<Money>,
    pub method: PaymentMethod,
    /// Receipt number, UPI reference or gateway payment id.
    pub reference: Option<String>,
    pub comment: Option<String>,
}

/// Result of a manual payment.
#[derive(Debug, Clone)]
pub struct MarkPaymentCompletedResult {
    pub payment: Payment,
    pub subscription: Subscription,
    pub period_advanced: bool,
}

impl SubscriptionLifecycleService {
    /// Records a COMPLETED payment and advances the billing period.
    ///
    /// # Errors
    ///
    /// - `Forbidden` unless the caller is ADMIN, FRANCHISE_OWNER or SERVICE_AGENT
    /// - `InvalidTransition` if the subscription is TERMINATED or EXPIRED
    /// - `PaymentNotFound` if `payment_id` names no payment of this subscription
    /// - `Validation` for autopay, a non-positive amount, a reused gateway
    ///   reference, or a payment that is already settled
    pub async fn mark_payment_completed(
        &self,
        user: &AuthenticatedUser,
        cmd: MarkPaymentCompletedCommand,
    ) -> Result<MarkPaymentCompletedResult, SubscriptionError> {
        authorize(user, COLLECTORS, "record payments")?;
        if cmd.method == PaymentMethod::RazorpayAutopay {
            return Err(ValidationError::invalid_format(
                "payment_method",
                "autopay charges are recorded from gateway events",
            )
            .into());
        }
        if let Some(amount) = cmd.amount {
            if amount.paise() <= 0 {
                return Err(ValidationError::invalid_format("amount", "must be positive").into());
            }
        }
        let reference = cmd
            .reference
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string);
        let actor = Actor::User(user.clone());
        let id = cmd.subscription_id;

        for attempt in 1..=MAX_COMMIT_ATTEMPTS {
            let subscription = self.load(&id).await?;
            if !matches!(
                subscription.status,
                SubscriptionStatus::Active | SubscriptionStatus::Paused
            ) {
                return Err(SubscriptionError::invalid_transition(
                    "record payment for",
                    subscription.status,
                ));
            }
            let existing = match cmd.payment_id {
                Some(payment_id) => Some(self.load_payment(&subscription, payment_id).await?),
                None => None,
            };

            let default_amount = existing
                .as_ref()
                .map(|p| p.amount)
                .unwrap_or(subscription.monthly_amount);
            let charge = manual_charge(&cmd, reference.clone(), default_amount);
            let now = Timestamp::now();

            let (unit, settlement) = match existing {
                Some(payment) => {
                    settle_existing_payment(payment, Some(&subscription), charge, &actor, now)
                        .map_err(|status| {
                            ValidationError::invalid_format(
                                "payment_id",
                                format!("payment is already {}", status),
                            )
                        })?
                }
                None => settle_new_charge(&subscription, charge, &actor, now),
            };

            match self.ledger.commit(unit).await {
                Ok(()) => {
                    let subscription = settlement.subscription.unwrap_or(subscription);
                    tracing::info!(
                        subscription_id = %id,
                        payment_id = %settlement.payment.id,
                        user_id = %user.id,
                        method = %settlement.payment.method,
                        amount = %settlement.payment.amount,
                        "Manual payment recorded"
                    );
                    self.notifier
                        .notify(
                            NotificationKind::PaymentReceived,
                            &subscription,
                            Some(settlement.payment.amount),
                        )
                        .await;
                    return Ok(MarkPaymentCompletedResult {
                        payment: settlement.payment,
                        subscription,
                        period_advanced: settlement.period_advanced,
                    });
                }
                Err(LedgerError::Conflict { .. }) => {
                    tracing::debug!(subscription_id = %id, attempt, "Version conflict; reloading");
                }
                Err(err) => return Err(ledger_failure(err, id)),
            }
        }
        Err(SubscriptionError::ConcurrentModification(id))
    }

    async fn load_payment(
        &self,
        subscription: &Subscription,
        payment_id: PaymentId,
    ) -> Result<Payment, SubscriptionError> {
        self.ledger
            .find_payment_by_id(&payment_id)
            .await
            .map_err(|err| ledger_failure(err, subscription.id))?
            .filter(|p| p.subscription_id == Some(subscription.id))
            .ok_or(SubscriptionError::PaymentNotFound(payment_id))
    }
}

fn manual_charge(
    cmd: &MarkPaymentCompletedCommand,
    reference: Option<String>,
    default_amount: Money,
) -> Charge {
    let mut metadata = Map::new();
    metadata.insert("recorded_via".into(), Value::from("manual"));
    // Only a manual gateway link carries a gateway payment id.
    let razorpay_payment_id = match cmd.method {
        PaymentMethod::RazorpayManual => reference,
        _ => {
            if let Some(reference) = reference {
                metadata.insert("reference".into(), Value::from(reference));
            }
            None
        }
    };
    Charge {
        amount: cmd.amount.unwrap_or(default_amount),
        method: cmd.method,
        razorpay_payment_id,
        razorpay_order_id: None,
        comment: cmd.comment.clone(),
        metadata,
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::{admin, agent, user, Fixture};
    use super::*;
    use crate::domain::audit::ActionType;
    use crate::domain::foundation::UserRole;
    use crate::domain::payment::{NewPayment, PaymentStatus, PaymentType};

    fn command(id: SubscriptionId) -> MarkPaymentCompletedCommand {
        MarkPaymentCompletedCommand {
            subscription_id: id,
            payment_id: None,
            amount: None,
            method: PaymentMethod::Cash,
            reference: Some("RCPT-0042".into()),
            comment: Some("Collected at visit".into()),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Success Tests
    // ═══════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn cash_payment_advances_period_by_one_month() {
        let fx = Fixture::new();

        let result = fx
            .service
            .mark_payment_completed(&agent(), command(fx.subscription.id))
            .await
            .unwrap();

        assert!(result.period_advanced);
        assert_eq!(result.payment.status, PaymentStatus::Completed);
        assert_eq!(result.payment.amount, Money::from_rupees(500));
        assert_eq!(result.payment.method, PaymentMethod::Cash);
        assert!(result.payment.razorpay_payment_id.is_none());

        let stored = fx.stored();
        assert_eq!(stored, result.subscription);
        assert_eq!(stored.current_period_end, Timestamp::from_ymd(2024, 2, 1).unwrap());
        assert_eq!(stored.next_payment_date, Timestamp::from_ymd(2024, 2, 1).unwrap());

        let history = fx.ledger.action_history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].action_type, ActionType::PaymentCompleted);
        assert_eq!(history[0].performed_by, "agent-1");
        assert_eq!(history[0].performed_by_role, UserRole::ServiceAgent);
        assert_eq!(history[0].metadata["reference"], "RCPT-0042");
        assert_eq!(history[0].comment.as_deref(), Some("Collected at visit"));
    }

    #[tokio::test]
    async fn completes_named_pending_payment() {
        let fx = Fixture::new();
        let pending = Payment::pending(
            NewPayment {
                user_id: fx.subscription.customer_id.clone(),
                subscription_id: Some(fx.subscription.id),
                franchise_id: fx.subscription.franchise_id.clone(),
                amount: Money::from_rupees(450),
                payment_type: PaymentType::Subscription,
                method: PaymentMethod::RazorpayManual,
                razorpay_payment_id: None,
                razorpay_order_id: Some("order_9".into()),
            },
            Timestamp::now(),
        );
        fx.ledger.seed_payment(pending.clone());

        let result = fx
            .service
            .mark_payment_completed(
                &admin(),
                MarkPaymentCompletedCommand {
                    payment_id: Some(pending.id),
                    method: PaymentMethod::RazorpayManual,
                    reference: Some("pay_manual_1".into()),
                    ..command(fx.subscription.id)
                },
            )
            .await
            .unwrap();

        assert_eq!(result.payment.id, pending.id);
        assert_eq!(result.payment.amount, Money::from_rupees(450));
        assert_eq!(result.payment.razorpay_payment_id.as_deref(), Some("pay_manual_1"));
        assert_eq!(fx.ledger.payments().len(), 1);
        assert_eq!(fx.ledger.payments()[0].status, PaymentStatus::Completed);
        assert_eq!(fx.stored().version, 1);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Rejection Tests
    // ═══════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn terminated_subscription_rejects_manual_payment() {
        let fx = Fixture::new();
        let mut terminated = fx.subscription.clone();
        terminated.id = SubscriptionId::new();
        terminated.status = SubscriptionStatus::Terminated;
        fx.ledger.seed_subscription(terminated.clone());

        let result = fx
            .service
            .mark_payment_completed(&admin(), command(terminated.id))
            .await;

        assert!(matches!(result, Err(SubscriptionError::InvalidTransition { .. })));
        assert!(fx.ledger.payments().is_empty());
    }

    #[tokio::test]
    async fn customer_cannot_record_payment() {
        let fx = Fixture::new();

        let result = fx
            .service
            .mark_payment_completed(
                &user("cust-1", UserRole::Customer),
                command(fx.subscription.id),
            )
            .await;

        assert!(matches!(result, Err(SubscriptionError::Forbidden(_))));
    }

    #[tokio::test]
    async fn autopay_method_is_rejected() {
        let fx = Fixture::new();

        let result = fx
            .service
            .mark_payment_completed(
                &admin(),
                MarkPaymentCompletedCommand {
                    method: PaymentMethod::RazorpayAutopay,
                    ..command(fx.subscription.id)
                },
            )
            .await;

        assert!(matches!(result, Err(SubscriptionError::Validation(_))));
    }

    #[tokio::test]
    async fn reused_gateway_reference_is_rejected() {
        let fx = Fixture::new();
        let manual = MarkPaymentCompletedCommand {
            method: PaymentMethod::RazorpayManual,
            reference: Some("pay_dup".into()),
            ..command(fx.subscription.id)
        };
        fx.service
            .mark_payment_completed(&admin(), manual.clone())
            .await
            .unwrap();

        let again = fx.service.mark_payment_completed(&admin(), manual).await;

        assert!(matches!(again, Err(SubscriptionError::Validation(_))));
        assert_eq!(fx.ledger.payments().len(), 1);
        assert_eq!(fx.stored().version, 1);
    }

    #[tokio::test]
    async fn unknown_payment_id_is_not_found() {
        let fx = Fixture::new();
        let missing = PaymentId::new();

        let result = fx
            .service
            .mark_payment_completed(
                &admin(),
                MarkPaymentCompletedCommand {
                    payment_id: Some(missing),
                    ..command(fx.subscription.id)
                },
            )
            .await;

        assert_eq!(result.unwrap_err(), SubscriptionError::PaymentNotFound(missing));
    }
}
