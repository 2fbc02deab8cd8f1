//! SubscriptionLifecycleService - authenticated subscription commands.
//!
//! Every command follows the same shape: authorize the caller, load the
//! subscription, apply the guarded domain operation, commit one ledger unit
//! holding the change and its audit row, then notify. A unit rejected by the
//! version check is rebuilt from a fresh read, so a guard that no longer
//! holds after a concurrent webhook surfaces as a 409.

mod create;
mod get;
mod payments;
mod transitions;
mod update;

pub use create::{CreateSubscriptionCommand, DEFAULT_AUTOPAY_CYCLES};
pub use get::GetSubscriptionResult;
pub use payments::{MarkPaymentCompletedCommand, MarkPaymentCompletedResult};
pub use transitions::TerminateSubscriptionCommand;
pub use update::{UpdateSubscriptionCommand, UpdateSubscriptionResult};

use std::sync::Arc;

use super::MAX_COMMIT_ATTEMPTS;
use crate::application::notifier::LedgerNotifier;
use crate::domain::foundation::{AuthenticatedUser, SubscriptionId, UserRole, ValidationError};
use crate::domain::subscription::{Subscription, SubscriptionError};
use crate::ports::{InstallationReader, LedgerError, LedgerStore, LedgerUnit, PaymentGateway};

/// Roles allowed to change a subscription.
const MANAGERS: &[UserRole] = &[UserRole::Admin, UserRole::FranchiseOwner];

/// Roles allowed to record a manual payment.
const COLLECTORS: &[UserRole] = &[
    UserRole::Admin,
    UserRole::FranchiseOwner,
    UserRole::ServiceAgent,
];

/// Direct-API counterpart of the webhook reconcilers.
pub struct SubscriptionLifecycleService {
    ledger: Arc<dyn LedgerStore>,
    installations: Arc<dyn InstallationReader>,
    gateway: Arc<dyn PaymentGateway>,
    notifier: Arc<LedgerNotifier>,
    default_plan_id: Option<String>,
}

impl SubscriptionLifecycleService {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        installations: Arc<dyn InstallationReader>,
        gateway: Arc<dyn PaymentGateway>,
        notifier: Arc<LedgerNotifier>,
        default_plan_id: Option<String>,
    ) -> Self {
        Self {
            ledger,
            installations,
            gateway,
            notifier,
            default_plan_id: default_plan_id.filter(|p| !p.trim().is_empty()),
        }
    }

    async fn load(&self, id: &SubscriptionId) -> Result<Subscription, SubscriptionError> {
        self.ledger
            .find_subscription_by_id(id)
            .await
            .map_err(|err| ledger_failure(err, *id))?
            .ok_or(SubscriptionError::NotFound(*id))
    }

    /// Reads the subscription, lets `plan` build a unit from it, and commits.
    ///
    /// `plan` runs again on a fresh read after each version conflict, so it
    /// must re-check its guards every time.
    async fn commit_with_retry<T, F>(
        &self,
        id: &SubscriptionId,
        mut plan: F,
    ) -> Result<T, SubscriptionError>
    where
        F: FnMut(Subscription) -> Result<Planned<T>, SubscriptionError>,
    {
        for attempt in 1..=MAX_COMMIT_ATTEMPTS {
            let current = self.load(id).await?;
            let (unit, value) = match plan(current)? {
                Planned::Commit(unit, value) => (unit, value),
                Planned::Unchanged(value) => return Ok(value),
            };
            match self.ledger.commit(unit).await {
                Ok(()) => return Ok(value),
                Err(LedgerError::Conflict { .. }) => {
                    tracing::debug!(subscription_id = %id, attempt, "Version conflict; reloading");
                }
                Err(err) => return Err(ledger_failure(err, *id)),
            }
        }
        tracing::warn!(
            subscription_id = %id,
            attempts = MAX_COMMIT_ATTEMPTS,
            "Giving up after repeated version conflicts"
        );
        Err(SubscriptionError::ConcurrentModification(*id))
    }

    /// Cancels the linked gateway subscription, if any.
    async fn cancel_at_gateway(&self, subscription: &Subscription) -> Result<(), SubscriptionError> {
        let Some(gateway_id) = subscription.razorpay_subscription_id.as_deref() else {
            return Ok(());
        };
        self.gateway
            .cancel_subscription(gateway_id)
            .await
            .map_err(|err| {
                tracing::error!(
                    subscription_id = %subscription.id,
                    razorpay_subscription_id = gateway_id,
                    error = %err,
                    "Gateway cancellation failed"
                );
                SubscriptionError::Gateway(err.to_string())
            })?;
        tracing::info!(
            subscription_id = %subscription.id,
            razorpay_subscription_id = gateway_id,
            "Cancelled gateway subscription"
        );
        Ok(())
    }
}

/// What a planning step decided.
enum Planned<T> {
    Commit(LedgerUnit, T),
    /// Nothing to write.
    Unchanged(T),
}

fn authorize(
    user: &AuthenticatedUser,
    roles: &[UserRole],
    action: &str,
) -> Result<(), SubscriptionError> {
    if user.has_any_role(roles) {
        Ok(())
    } else {
        tracing::warn!(user_id = %user.id, role = %user.role, action, "Caller not permitted");
        Err(SubscriptionError::forbidden(format!(
            "role {} may not {}",
            user.role, action
        )))
    }
}

/// The subscription as the store holds it once `unit` commits.
fn after_commit(mut subscription: Subscription) -> Subscription {
    subscription.version += 1;
    subscription
}

fn ledger_failure(err: LedgerError, id: SubscriptionId) -> SubscriptionError {
    match err {
        LedgerError::Conflict { .. } => SubscriptionError::ConcurrentModification(id),
        LedgerError::DuplicatePayment(gateway_id) => ValidationError::invalid_format(
            "reference",
            format!("payment {} is already recorded", gateway_id),
        )
        .into(),
        LedgerError::DuplicateSubscription(gateway_id) => ValidationError::invalid_format(
            "razorpay_subscription_id",
            format!("gateway subscription {} is already linked", gateway_id),
        )
        .into(),
        LedgerError::Storage(message) => {
            tracing::error!(subscription_id = %id, error = %message, "Ledger failure");
            SubscriptionError::Store(message)
        }
    }
}
