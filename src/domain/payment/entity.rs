//! Payment entity.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::PaymentStatus;
use crate::domain::foundation::{
    FranchiseId, Money, PaymentId, StateMachine, SubscriptionId, Timestamp, TransitionRejected,
    UserId, ValidationError,
};

/// How the money was (or will be) collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    RazorpayAutopay,
    RazorpayManual,
    Cash,
    Upi,
}

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentMethod::RazorpayAutopay => "RAZORPAY_AUTOPAY",
            PaymentMethod::RazorpayManual => "RAZORPAY_MANUAL",
            PaymentMethod::Cash => "CASH",
            PaymentMethod::Upi => "UPI",
        }
    }
}

impl fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentMethod {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "RAZORPAY_AUTOPAY" => Ok(PaymentMethod::RazorpayAutopay),
            "RAZORPAY_MANUAL" => Ok(PaymentMethod::RazorpayManual),
            "CASH" => Ok(PaymentMethod::Cash),
            "UPI" => Ok(PaymentMethod::Upi),
            other => Err(ValidationError::invalid_format(
                "payment_method",
                format!("unknown payment method '{}'", other),
            )),
        }
    }
}

/// What the payment is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentType {
    Subscription,
    ServiceRequest,
    Installation,
}

impl PaymentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PaymentType::Subscription => "SUBSCRIPTION",
            PaymentType::ServiceRequest => "SERVICE_REQUEST",
            PaymentType::Installation => "INSTALLATION",
        }
    }
}

impl FromStr for PaymentType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "SUBSCRIPTION" => Ok(PaymentType::Subscription),
            "SERVICE_REQUEST" => Ok(PaymentType::ServiceRequest),
            "INSTALLATION" => Ok(PaymentType::Installation),
            other => Err(ValidationError::invalid_format(
                "type",
                format!("unknown payment type '{}'", other),
            )),
        }
    }
}

/// Inputs for a new payment row.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub user_id: UserId,
    pub subscription_id: Option<SubscriptionId>,
    pub franchise_id: FranchiseId,
    pub amount: Money,
    pub payment_type: PaymentType,
    pub method: PaymentMethod,
    pub razorpay_payment_id: Option<String>,
    pub razorpay_order_id: Option<String>,
}

/// A payment row in the ledger.
///
/// # Invariants
///
/// - `razorpay_payment_id` is unique across all rows
/// - `paid_date` is set exactly when status is COMPLETED or REFUNDED
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    pub user_id: UserId,
    pub subscription_id: Option<SubscriptionId>,
    pub franchise_id: FranchiseId,
    pub amount: Money,
    pub payment_type: PaymentType,
    pub status: PaymentStatus,
    pub method: PaymentMethod,
    pub razorpay_payment_id: Option<String>,
    pub razorpay_order_id: Option<String>,
    pub paid_date: Option<Timestamp>,
    pub version: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Payment {
    /// A payment already settled, as recorded for a gateway charge or a
    /// manual collection.
    pub fn completed(input: NewPayment, now: Timestamp) -> Self {
        Self::build(input, PaymentStatus::Completed, Some(now), now)
    }

    /// A payment awaiting settlement.
    pub fn pending(input: NewPayment, now: Timestamp) -> Self {
        Self::build(input, PaymentStatus::Pending, None, now)
    }

    fn build(
        input: NewPayment,
        status: PaymentStatus,
        paid_date: Option<Timestamp>,
        now: Timestamp,
    ) -> Self {
        Self {
            id: PaymentId::new(),
            user_id: input.user_id,
            subscription_id: input.subscription_id,
            franchise_id: input.franchise_id,
            amount: input.amount,
            payment_type: input.payment_type,
            status,
            method: input.method,
            razorpay_payment_id: input.razorpay_payment_id,
            razorpay_order_id: input.razorpay_order_id,
            paid_date,
            version: 0,
            created_at: now,
            updated_at: now,
        }
    }

    /// Marks the payment settled.
    ///
    /// The gateway payment id is recorded if the row did not have one yet.
    pub fn complete(
        &mut self,
        razorpay_payment_id: Option<&str>,
        now: Timestamp,
    ) -> Result<PaymentStatus, TransitionRejected<PaymentStatus>> {
        let from = self.status;
        self.status = from.transition_to(PaymentStatus::Completed)?;
        if self.razorpay_payment_id.is_none() {
            self.razorpay_payment_id = razorpay_payment_id.map(str::to_string);
        }
        self.paid_date = Some(now);
        self.updated_at = now;
        Ok(from)
    }

    /// Marks the charge attempt failed.
    pub fn fail(
        &mut self,
        now: Timestamp,
    ) -> Result<PaymentStatus, TransitionRejected<PaymentStatus>> {
        let from = self.status;
        self.status = from.transition_to(PaymentStatus::Failed)?;
        self.updated_at = now;
        Ok(from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> NewPayment {
        NewPayment {
            user_id: UserId::new("cust-1").unwrap(),
            subscription_id: Some(SubscriptionId::new()),
            franchise_id: FranchiseId::new("fr-1").unwrap(),
            amount: Money::from_rupees(500),
            payment_type: PaymentType::Subscription,
            method: PaymentMethod::RazorpayManual,
            razorpay_payment_id: None,
            razorpay_order_id: Some("order_1".into()),
        }
    }

    #[test]
    fn completed_payment_has_paid_date() {
        let now = Timestamp::now();
        let payment = Payment::completed(input(), now);
        assert_eq!(payment.status, PaymentStatus::Completed);
        assert_eq!(payment.paid_date, Some(now));
    }

    #[test]
    fn complete_records_gateway_id_and_returns_previous_status() {
        let mut payment = Payment::pending(input(), Timestamp::now());
        let from = payment.complete(Some("pay_9"), Timestamp::now()).unwrap();
        assert_eq!(from, PaymentStatus::Pending);
        assert_eq!(payment.razorpay_payment_id.as_deref(), Some("pay_9"));
        assert!(payment.paid_date.is_some());
    }

    #[test]
    fn completing_twice_is_rejected() {
        let mut payment = Payment::pending(input(), Timestamp::now());
        payment.complete(None, Timestamp::now()).unwrap();
        assert!(payment.complete(None, Timestamp::now()).is_err());
    }

    #[test]
    fn fail_moves_pending_to_failed() {
        let mut payment = Payment::pending(input(), Timestamp::now());
        assert_eq!(payment.fail(Timestamp::now()), Ok(PaymentStatus::Pending));
        assert_eq!(payment.status, PaymentStatus::Failed);
    }

    #[test]
    fn completed_payment_cannot_fail() {
        let mut payment = Payment::completed(input(), Timestamp::now());
        let before = payment.clone();
        assert!(payment.fail(Timestamp::now()).is_err());
        assert_eq!(payment, before);
    }

    #[test]
    fn method_parses_known_values() {
        assert_eq!("cash".parse::<PaymentMethod>().unwrap(), PaymentMethod::Cash);
        assert_eq!("UPI".parse::<PaymentMethod>().unwrap(), PaymentMethod::Upi);
        assert!("CHEQUE".parse::<PaymentMethod>().is_err());
    }
}
