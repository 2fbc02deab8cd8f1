//! Payment settlement shared by the webhook and the lifecycle service.
//!
//! A recurring gateway charge and a manual cash/UPI collection both build
//! their ledger unit here, so the resulting subscription state is the same
//! whichever path records the money.

use serde_json::{Map, Value};

use crate::domain::audit::{ActionHistory, ActionType, Actor};
use crate::domain::foundation::{Money, Timestamp};
use crate::domain::payment::{NewPayment, Payment, PaymentMethod, PaymentStatus, PaymentType};
use crate::domain::subscription::Subscription;
use crate::ports::LedgerUnit;

/// A charge to record against a subscription.
#[derive(Debug, Clone)]
pub struct Charge {
    pub amount: Money,
    pub method: PaymentMethod,
    pub razorpay_payment_id: Option<String>,
    pub razorpay_order_id: Option<String>,
    pub comment: Option<String>,
    /// Extra audit metadata, e.g. raw gateway fields.
    pub metadata: Map<String, Value>,
}

/// State after a settlement unit commits.
#[derive(Debug, Clone)]
pub struct Settlement {
    pub payment: Payment,
    /// The subscription as stored after commit, if it was touched.
    pub subscription: Option<Subscription>,
    pub period_advanced: bool,
}

/// Records a new COMPLETED payment and advances the billing period.
///
/// Terminal subscriptions still get the payment row, but their period does
/// not move.
pub fn settle_new_charge(
    subscription: &Subscription,
    charge: Charge,
    actor: &Actor,
    now: Timestamp,
) -> (LedgerUnit, Settlement) {
    let payment = Payment::completed(
        NewPayment {
            user_id: subscription.customer_id.clone(),
            subscription_id: Some(subscription.id),
            franchise_id: subscription.franchise_id.clone(),
            amount: charge.amount,
            payment_type: PaymentType::Subscription,
            method: charge.method,
            razorpay_payment_id: charge.razorpay_payment_id.clone(),
            razorpay_order_id: charge.razorpay_order_id.clone(),
        },
        now,
    );

    let audit = ActionHistory::new(ActionType::PaymentCompleted, actor, now)
        .for_payment(payment.id)
        .with_statuses(None::<&str>, PaymentStatus::Completed);
    let mut unit = LedgerUnit::new().insert_payment(payment.clone());
    let (unit_tail, subscription, period_advanced, audit) =
        advance_subscription(subscription, audit, &charge, now);
    if let Some(updated) = unit_tail {
        unit = unit.update_subscription(updated);
    }

    (
        unit.append(audit),
        Settlement {
            payment,
            subscription,
            period_advanced,
        },
    )
}

/// Completes an existing PENDING (or FAILED) payment row.
///
/// When the row belongs to a subscription, that subscription is advanced
/// exactly as for a new charge.
pub fn settle_existing_payment(
    mut payment: Payment,
    subscription: Option<&Subscription>,
    charge: Charge,
    actor: &Actor,
    now: Timestamp,
) -> Result<(LedgerUnit, Settlement), PaymentStatus> {
    let from = payment
        .complete(charge.razorpay_payment_id.as_deref(), now)
        .map_err(|rejected| rejected.from)?;

    let audit = ActionHistory::new(ActionType::PaymentCompleted, actor, now)
        .for_payment(payment.id)
        .with_statuses(Some(from), PaymentStatus::Completed);
    let mut unit = LedgerUnit::new().update_payment(payment.clone());
    payment.version += 1;

    let billable = payment.payment_type == PaymentType::Subscription;
    let (updated, settled_subscription, period_advanced, audit) = match subscription {
        Some(sub) if billable => advance_subscription(sub, audit, &charge, now),
        Some(sub) => (None, None, false, with_charge_metadata(audit.for_subscription(sub.id), &charge)),
        None => (None, None, false, with_charge_metadata(audit, &charge)),
    };
    if let Some(updated) = updated {
        unit = unit.update_subscription(updated);
    }

    Ok((
        unit.append(audit),
        Settlement {
            payment,
            subscription: settled_subscription,
            period_advanced,
        },
    ))
}

/// Returns the subscription to write (if any), the post-commit view, whether
/// the period moved, and the audit row enriched with period metadata.
fn advance_subscription(
    subscription: &Subscription,
    audit: ActionHistory,
    charge: &Charge,
    now: Timestamp,
) -> (Option<Subscription>, Option<Subscription>, bool, ActionHistory) {
    let audit = with_charge_metadata(audit.for_subscription(subscription.id), charge)
        .with_metadata(
            "previous_period_end",
            subscription.current_period_end.to_rfc3339(),
        );

    if subscription.is_terminal() {
        let audit = audit.with_metadata("period_advanced", false);
        return (None, None, false, audit);
    }

    let mut updated = subscription.clone();
    let period = updated.advance_billing(now);
    let audit = audit
        .with_metadata("period_advanced", true)
        .with_metadata("current_period_end", period.end.to_rfc3339())
        .with_metadata("next_payment_date", period.next_payment_date.to_rfc3339());

    let mut committed = updated.clone();
    committed.version += 1;
    (Some(updated), Some(committed), true, audit)
}

fn with_charge_metadata(mut audit: ActionHistory, charge: &Charge) -> ActionHistory {
    audit = audit
        .with_metadata("amount", charge.amount.as_major())
        .with_metadata("payment_method", charge.method.as_str())
        .with_metadata("razorpay_payment_id", charge.razorpay_payment_id.clone())
        .with_metadata("razorpay_order_id", charge.razorpay_order_id.clone())
        .with_comment(charge.comment.clone());
    for (key, value) in &charge.metadata {
        audit = audit.with_metadata(key, value.clone());
    }
    audit
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::subscription::test_support::active_subscription;
    use crate::domain::subscription::SubscriptionStatus;
    use crate::ports::LedgerOp;

    fn ymd(y: i32, m: u32, d: u32) -> Timestamp {
        Timestamp::from_ymd(y, m, d).unwrap()
    }

    fn charge(method: PaymentMethod) -> Charge {
        Charge {
            amount: Money::from_rupees(500),
            method,
            razorpay_payment_id: None,
            razorpay_order_id: None,
            comment: None,
            metadata: Map::new(),
        }
    }

    #[test]
    fn new_charge_inserts_payment_advances_period_and_appends_one_row() {
        let sub = active_subscription(ymd(2024, 1, 1));

        let (unit, settlement) =
            settle_new_charge(&sub, charge(PaymentMethod::Cash), &Actor::System, Timestamp::now());

        let ops = unit.ops();
        assert_eq!(ops.len(), 3);
        assert!(matches!(ops[0], LedgerOp::InsertPayment(_)));
        assert!(matches!(ops[1], LedgerOp::UpdateSubscription { expected_version: 0, .. }));
        let audits: Vec<_> = ops
            .iter()
            .filter(|op| matches!(op, LedgerOp::AppendActionHistory(_)))
            .collect();
        assert_eq!(audits.len(), 1);

        let committed = settlement.subscription.unwrap();
        assert_eq!(committed.current_period_end, ymd(2024, 2, 1));
        assert_eq!(committed.next_payment_date, ymd(2024, 2, 1));
        assert_eq!(committed.version, 1);
        assert_eq!(settlement.payment.status, PaymentStatus::Completed);
    }

    #[test]
    fn automated_and_manual_charges_converge() {
        let sub = active_subscription(ymd(2024, 1, 1));

        let (_, automated) = settle_new_charge(
            &sub,
            Charge {
                razorpay_payment_id: Some("pay_1".into()),
                ..charge(PaymentMethod::RazorpayAutopay)
            },
            &Actor::System,
            Timestamp::now(),
        );
        let (_, manual) =
            settle_new_charge(&sub, charge(PaymentMethod::Upi), &Actor::System, Timestamp::now());

        let a = automated.subscription.unwrap();
        let m = manual.subscription.unwrap();
        assert_eq!(a.current_period_start, m.current_period_start);
        assert_eq!(a.current_period_end, m.current_period_end);
        assert_eq!(a.next_payment_date, m.next_payment_date);
        assert_eq!(automated.payment.amount, manual.payment.amount);
    }

    #[test]
    fn terminal_subscription_records_payment_without_advancing() {
        let mut sub = active_subscription(ymd(2024, 1, 1));
        sub.status = SubscriptionStatus::Terminated;

        let (unit, settlement) =
            settle_new_charge(&sub, charge(PaymentMethod::Cash), &Actor::System, Timestamp::now());

        assert_eq!(unit.ops().len(), 2);
        assert!(!settlement.period_advanced);
        assert!(settlement.subscription.is_none());
    }

    #[test]
    fn audit_row_carries_charge_metadata() {
        let sub = active_subscription(ymd(2024, 1, 1));
        let mut extra = Map::new();
        extra.insert("event".into(), Value::from("subscription.charged"));

        let (unit, _) = settle_new_charge(
            &sub,
            Charge {
                razorpay_payment_id: Some("pay_7".into()),
                metadata: extra,
                ..charge(PaymentMethod::RazorpayAutopay)
            },
            &Actor::System,
            Timestamp::now(),
        );

        let audit = unit
            .ops()
            .iter()
            .find_map(|op| match op {
                LedgerOp::AppendActionHistory(a) => Some(a.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(audit.action_type, ActionType::PaymentCompleted);
        assert_eq!(audit.to_status.as_deref(), Some("COMPLETED"));
        assert_eq!(audit.metadata["razorpay_payment_id"], "pay_7");
        assert_eq!(audit.metadata["event"], "subscription.charged");
        assert_eq!(audit.metadata["amount"], 500.0);
        assert_eq!(audit.subscription_id, Some(sub.id));
    }

    #[test]
    fn existing_pending_payment_is_completed_and_period_advanced() {
        let sub = active_subscription(ymd(2024, 1, 1));
        let pending = Payment::pending(
            NewPayment {
                user_id: sub.customer_id.clone(),
                subscription_id: Some(sub.id),
                franchise_id: sub.franchise_id.clone(),
                amount: Money::from_rupees(500),
                payment_type: PaymentType::Subscription,
                method: PaymentMethod::RazorpayManual,
                razorpay_payment_id: None,
                razorpay_order_id: Some("order_1".into()),
            },
            Timestamp::now(),
        );

        let (unit, settlement) = settle_existing_payment(
            pending,
            Some(&sub),
            Charge {
                razorpay_payment_id: Some("pay_2".into()),
                ..charge(PaymentMethod::RazorpayManual)
            },
            &Actor::System,
            Timestamp::now(),
        )
        .unwrap();

        assert_eq!(unit.ops().len(), 3);
        assert_eq!(settlement.payment.razorpay_payment_id.as_deref(), Some("pay_2"));
        assert_eq!(settlement.payment.version, 1);
        assert!(settlement.period_advanced);
    }

    #[test]
    fn completed_payment_cannot_be_settled_again() {
        let sub = active_subscription(ymd(2024, 1, 1));
        let (_, first) =
            settle_new_charge(&sub, charge(PaymentMethod::Cash), &Actor::System, Timestamp::now());

        let result = settle_existing_payment(
            first.payment,
            Some(&sub),
            charge(PaymentMethod::Cash),
            &Actor::System,
            Timestamp::now(),
        );

        assert_eq!(result.err(), Some(PaymentStatus::Completed));
    }
}
