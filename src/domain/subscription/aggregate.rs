//! Subscription aggregate.
//!
//! A subscription is a customer's monthly rental of one product, serviced by
//! one franchise. It is created when an installation completes and then
//! moves through the status table in [`SubscriptionStatus`].
//!
//! # Design Decisions
//!
//! - **Money in paise**: amounts are integer minor units
//! - **Never deleted**: terminal rows stay for audit
//! - **Optimistic versioning**: `version` is the value read from the store and
//!   is compared on write
//! - **Gateway id is write-once**: `razorpay_subscription_id` cannot change
//!   after it is set

use serde::{Deserialize, Serialize};

use super::{BillingPeriod, ConnectId, SubscriptionError, SubscriptionStatus};
use crate::domain::foundation::{
    FranchiseId, InstallationRequestId, Money, ProductId, StateMachine, SubscriptionId, Timestamp,
    UserId, ValidationError,
};

/// A status change that has been applied to the aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub from: SubscriptionStatus,
    pub to: SubscriptionStatus,
}

/// Result of applying a gateway-reported status to the aggregate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GatewayTransition {
    /// Status changed; an audit row is owed.
    Changed(StatusChange),
    /// Already in the target status. Redelivery.
    AlreadyInState,
    /// The table does not allow it from the current status.
    Rejected { current: SubscriptionStatus },
}

/// Inputs for a new subscription.
#[derive(Debug, Clone)]
pub struct NewSubscription {
    pub customer_id: UserId,
    pub product_id: ProductId,
    pub franchise_id: FranchiseId,
    pub installation_request_id: Option<InstallationRequestId>,
    pub plan_name: String,
    pub monthly_amount: Money,
    pub deposit_amount: Money,
    pub start_date: Timestamp,
    pub end_date: Option<Timestamp>,
}

/// Non-status fields that may be edited directly.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SubscriptionChanges {
    pub plan_name: Option<String>,
    pub monthly_amount: Option<Money>,
    /// `Some(None)` clears the end date, making the subscription open-ended.
    pub end_date: Option<Option<Timestamp>>,
    pub next_payment_date: Option<Timestamp>,
}

impl SubscriptionChanges {
    pub fn is_empty(&self) -> bool {
        self.plan_name.is_none()
            && self.monthly_amount.is_none()
            && self.end_date.is_none()
            && self.next_payment_date.is_none()
    }
}

/// Subscription aggregate.
///
/// # Invariants
///
/// - `current_period_end > current_period_start`
/// - `next_payment_date >= current_period_end` after every charge
/// - no transition out of TERMINATED or EXPIRED
/// - `razorpay_subscription_id` is immutable once set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subscription {
    pub id: SubscriptionId,
    pub connect_id: ConnectId,
    pub razorpay_subscription_id: Option<String>,
    pub customer_id: UserId,
    pub product_id: ProductId,
    pub franchise_id: FranchiseId,
    pub installation_request_id: Option<InstallationRequestId>,
    pub plan_name: String,
    pub monthly_amount: Money,
    pub deposit_amount: Money,
    pub status: SubscriptionStatus,
    pub start_date: Timestamp,
    pub end_date: Option<Timestamp>,
    pub current_period_start: Timestamp,
    pub current_period_end: Timestamp,
    pub next_payment_date: Timestamp,
    pub version: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl Subscription {
    /// Creates an ACTIVE subscription whose first period runs one month from
    /// `start_date`.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for a blank plan name, a non-positive monthly
    /// amount or an end date not after the start date.
    pub fn create(input: NewSubscription, now: Timestamp) -> Result<Self, SubscriptionError> {
        let plan_name = validate_plan_name(&input.plan_name)?;
        validate_monthly_amount(input.monthly_amount)?;
        if let Some(end) = input.end_date {
            validate_end_date(input.start_date, end)?;
        }
        let period = BillingPeriod::first(input.start_date);

        Ok(Self {
            id: SubscriptionId::new(),
            connect_id: ConnectId::generate(),
            razorpay_subscription_id: None,
            customer_id: input.customer_id,
            product_id: input.product_id,
            franchise_id: input.franchise_id,
            installation_request_id: input.installation_request_id,
            plan_name,
            monthly_amount: input.monthly_amount,
            deposit_amount: input.deposit_amount,
            status: SubscriptionStatus::Active,
            start_date: input.start_date,
            end_date: input.end_date,
            current_period_start: period.start,
            current_period_end: period.end,
            next_payment_date: period.next_payment_date,
            version: 0,
            created_at: now,
            updated_at: now,
        })
    }

    /// Links the gateway-side autopay subscription.
    ///
    /// # Errors
    ///
    /// Returns `Validation` if a different gateway id is already attached.
    pub fn attach_gateway_subscription(
        &mut self,
        gateway_id: impl Into<String>,
    ) -> Result<(), SubscriptionError> {
        let gateway_id = gateway_id.into();
        match &self.razorpay_subscription_id {
            Some(existing) if *existing == gateway_id => Ok(()),
            Some(_) => Err(ValidationError::invalid_format(
                "razorpay_subscription_id",
                "gateway subscription is already attached",
            )
            .into()),
            None => {
                self.razorpay_subscription_id = Some(gateway_id);
                Ok(())
            }
        }
    }

    /// Current billing window.
    pub fn period(&self) -> BillingPeriod {
        BillingPeriod {
            start: self.current_period_start,
            end: self.current_period_end,
            next_payment_date: self.next_payment_date,
        }
    }

    /// Moves the billing window forward by one paid interval.
    pub fn advance_billing(&mut self, now: Timestamp) -> BillingPeriod {
        let next = self.period().advance(self.start_date);
        self.current_period_start = next.start;
        self.current_period_end = next.end;
        self.next_payment_date = next.next_payment_date;
        self.updated_at = now;
        next
    }

    /// ACTIVE → PAUSED.
    pub fn pause(&mut self, now: Timestamp) -> Result<StatusChange, SubscriptionError> {
        self.require(&[SubscriptionStatus::Active], "pause")?;
        Ok(self.set_status(SubscriptionStatus::Paused, now))
    }

    /// PAUSED → ACTIVE.
    pub fn resume(&mut self, now: Timestamp) -> Result<StatusChange, SubscriptionError> {
        self.require(&[SubscriptionStatus::Paused], "resume")?;
        Ok(self.set_status(SubscriptionStatus::Active, now))
    }

    /// ACTIVE or PAUSED → TERMINATED.
    pub fn terminate(&mut self, now: Timestamp) -> Result<StatusChange, SubscriptionError> {
        self.require(
            &[SubscriptionStatus::Active, SubscriptionStatus::Paused],
            "terminate",
        )?;
        Ok(self.set_status(SubscriptionStatus::Terminated, now))
    }

    /// Applies a status the gateway reports, using the shared table.
    pub fn apply_gateway_status(
        &mut self,
        target: SubscriptionStatus,
        now: Timestamp,
    ) -> GatewayTransition {
        if self.status == target {
            return GatewayTransition::AlreadyInState;
        }
        match self.status.transition_to(target) {
            Ok(_) => GatewayTransition::Changed(self.set_status(target, now)),
            Err(rejected) => GatewayTransition::Rejected {
                current: rejected.from,
            },
        }
    }

    /// Applies field edits.
    ///
    /// Returns the names of the fields that actually changed.
    ///
    /// # Errors
    ///
    /// Returns `Validation` for a blank plan name, an end date not after the
    /// start date, or a next payment date before the current period end.
    pub fn apply_changes(
        &mut self,
        changes: &SubscriptionChanges,
        now: Timestamp,
    ) -> Result<Vec<&'static str>, SubscriptionError> {
        let plan_name = changes
            .plan_name
            .as_deref()
            .map(validate_plan_name)
            .transpose()?;
        if let Some(amount) = changes.monthly_amount {
            validate_monthly_amount(amount)?;
        }
        if let Some(Some(end)) = changes.end_date {
            validate_end_date(self.start_date, end)?;
        }
        if let Some(next) = changes.next_payment_date {
            if next < self.current_period_end {
                return Err(ValidationError::invalid_format(
                    "next_payment_date",
                    "cannot be before the current period end",
                )
                .into());
            }
        }

        let mut changed = Vec::new();
        if let Some(plan_name) = plan_name {
            if plan_name != self.plan_name {
                self.plan_name = plan_name;
                changed.push("plan_name");
            }
        }
        if let Some(amount) = changes.monthly_amount {
            if amount != self.monthly_amount {
                self.monthly_amount = amount;
                changed.push("monthly_amount");
            }
        }
        if let Some(end_date) = changes.end_date {
            if end_date != self.end_date {
                self.end_date = end_date;
                changed.push("end_date");
            }
        }
        if let Some(next) = changes.next_payment_date {
            if next != self.next_payment_date {
                self.next_payment_date = next;
                changed.push("next_payment_date");
            }
        }
        if !changed.is_empty() {
            self.updated_at = now;
        }
        Ok(changed)
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    fn require(
        &self,
        allowed: &[SubscriptionStatus],
        action: &'static str,
    ) -> Result<(), SubscriptionError> {
        if allowed.contains(&self.status) {
            Ok(())
        } else {
            Err(SubscriptionError::invalid_transition(action, self.status))
        }
    }

    fn set_status(&mut self, to: SubscriptionStatus, now: Timestamp) -> StatusChange {
        let from = self.status;
        self.status = to;
        self.updated_at = now;
        StatusChange { from, to }
    }
}

fn validate_plan_name(plan_name: &str) -> Result<String, ValidationError> {
    let trimmed = plan_name.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::empty_field("plan_name"));
    }
    Ok(trimmed.to_string())
}

fn validate_monthly_amount(amount: Money) -> Result<(), ValidationError> {
    if amount.paise() <= 0 {
        return Err(ValidationError::invalid_format("monthly_amount", "must be positive"));
    }
    Ok(())
}

fn validate_end_date(start: Timestamp, end: Timestamp) -> Result<(), ValidationError> {
    if end <= start {
        return Err(ValidationError::invalid_format(
            "end_date",
            "must be after the start date",
        ));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// ACTIVE subscription whose current period ends on `period_end`.
    pub fn active_subscription(period_end: Timestamp) -> Subscription {
        let start = period_end.add_days(-31);
        let mut sub = Subscription::create(
            NewSubscription {
                customer_id: UserId::new("cust-1").unwrap(),
                product_id: ProductId::new("prod-1").unwrap(),
                franchise_id: FranchiseId::new("fr-1").unwrap(),
                installation_request_id: None,
                plan_name: "RO Purifier Monthly".to_string(),
                monthly_amount: Money::from_rupees(500),
                deposit_amount: Money::from_rupees(1500),
                start_date: start,
                end_date: None,
            },
            start,
        )
        .unwrap();
        sub.current_period_start = start;
        sub.current_period_end = period_end;
        sub.next_payment_date = period_end;
        sub
    }
}
