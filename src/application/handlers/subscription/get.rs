//! Read a subscription with its payments and audit trail.

use super::{ledger_failure, SubscriptionLifecycleService};
use crate::domain::audit::ActionHistory;
use crate::domain::foundation::{AuthenticatedUser, SubscriptionId, UserRole};
use crate::domain::payment::Payment;
use crate::domain::subscription::{Subscription, SubscriptionError};

/// A subscription and everything recorded against it.
#[derive(Debug, Clone)]
pub struct GetSubscriptionResult {
    pub subscription: Subscription,
    pub payments: Vec<Payment>,
    pub history: Vec<ActionHistory>,
}

impl SubscriptionLifecycleService {
    /// Staff may read any subscription; customers only their own.
    pub async fn get(
        &self,
        user: &AuthenticatedUser,
        id: SubscriptionId,
    ) -> Result<GetSubscriptionResult, SubscriptionError> {
        let subscription = self.load(&id).await?;
        let own = user.role == UserRole::Customer && subscription.customer_id == user.id;
        if !user.role.is_staff() && !own {
            return Err(SubscriptionError::forbidden(
                "customers may only read their own subscriptions",
            ));
        }

        let payments = self
            .ledger
            .list_payments_for_subscription(&id)
            .await
            .map_err(|err| ledger_failure(err, id))?;
        let history = self
            .ledger
            .list_action_history(&id)
            .await
            .map_err(|err| ledger_failure(err, id))?;

        Ok(GetSubscriptionResult {
            subscription,
            payments,
            history,
        })
    }
}
