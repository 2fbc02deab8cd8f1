//! Subscription status reconcilers.

use super::charges::{committed, Committed};
use super::dispatcher::{store_error, Attempt, StatusRule, WebhookDispatcher};
use crate::domain::audit::{ActionHistory, ActionType, Actor, SYSTEM_ACTOR};
use crate::domain::foundation::Timestamp;
use crate::domain::subscription::GatewayTransition;
use crate::domain::webhook::{SubscriptionEntity, WebhookError, WebhookOutcome};
use crate::ports::LedgerUnit;

fn entity_audit(
    action: ActionType,
    entity: &SubscriptionEntity,
    event: &str,
    now: Timestamp,
) -> ActionHistory {
    ActionHistory::new(action, &Actor::System, now)
        .with_metadata("event", event)
        .with_metadata("razorpay_subscription_id", entity.id.as_str())
        .with_metadata("gateway_status", entity.status.clone())
        .with_metadata("plan_id", entity.plan_id.clone())
        .with_metadata("current_start", entity.current_start.map(|t| t.to_rfc3339()))
        .with_metadata("current_end", entity.current_end.map(|t| t.to_rfc3339()))
        .with_metadata("paid_count", entity.paid_count)
}

impl WebhookDispatcher {
    /// Paused, halted, cancelled and completed events.
    pub(super) async fn try_status_change(
        &self,
        entity: &SubscriptionEntity,
        rule: StatusRule,
        event: &str,
    ) -> Result<Attempt, WebhookError> {
        let Some(mut subscription) = self
            .ledger
            .find_subscription_by_gateway_id(&entity.id)
            .await
            .map_err(store_error)?
        else {
            tracing::info!(
                event,
                razorpay_subscription_id = %entity.id,
                "No local subscription for gateway status event"
            );
            return Ok(Attempt::Done(WebhookOutcome::NotFoundLocal));
        };

        let now = Timestamp::now();
        let change = match subscription.apply_gateway_status(rule.target, now) {
            GatewayTransition::Changed(change) => change,
            GatewayTransition::AlreadyInState => {
                tracing::debug!(
                    subscription_id = %subscription.id,
                    status = %rule.target,
                    "Subscription already in gateway status; skipping"
                );
                return Ok(Attempt::Done(WebhookOutcome::AlreadyProcessed));
            }
            GatewayTransition::Rejected { current } => {
                tracing::warn!(
                    event,
                    subscription_id = %subscription.id,
                    current = %current,
                    target = %rule.target,
                    "Gateway status change not allowed from current status"
                );
                return Ok(Attempt::Done(WebhookOutcome::Ignored));
            }
        };

        let audit = entity_audit(rule.action, entity, event, now)
            .for_subscription(subscription.id)
            .with_statuses(Some(change.from), change.to);
        let unit = LedgerUnit::new()
            .update_subscription(subscription.clone())
            .append(audit);
        match committed(self.ledger.commit(unit).await)? {
            Committed::Yes => {}
            Committed::Conflict => return Ok(Attempt::Conflict),
            Committed::Duplicate => return Ok(Attempt::Done(WebhookOutcome::AlreadyProcessed)),
        }
        subscription.version += 1;

        tracing::info!(
            event,
            subscription_id = %subscription.id,
            from = %change.from,
            to = %change.to,
            "Applied gateway status change"
        );
        self.notifier.notify(rule.notice, &subscription, None).await;
        Ok(Attempt::Done(WebhookOutcome::Applied))
    }

    /// `subscription.updated`: records the gateway view in the audit trail
    /// without touching subscription fields.
    pub(super) async fn try_record_update(
        &self,
        entity: &SubscriptionEntity,
        event: &str,
    ) -> Result<Attempt, WebhookError> {
        let Some(subscription) = self
            .ledger
            .find_subscription_by_gateway_id(&entity.id)
            .await
            .map_err(store_error)?
        else {
            tracing::info!(
                event,
                razorpay_subscription_id = %entity.id,
                "No local subscription for gateway update"
            );
            return Ok(Attempt::Done(WebhookOutcome::NotFoundLocal));
        };

        let audit = entity_audit(ActionType::SubscriptionUpdated, entity, event, Timestamp::now())
            .for_subscription(subscription.id);

        let history = self
            .ledger
            .list_action_history(&subscription.id)
            .await
            .map_err(store_error)?;
        let duplicate = history.iter().any(|row| {
            row.action_type == ActionType::SubscriptionUpdated
                && row.performed_by == SYSTEM_ACTOR
                && row.metadata == audit.metadata
        });
        if duplicate {
            tracing::debug!(
                subscription_id = %subscription.id,
                "Gateway update already recorded; skipping"
            );
            return Ok(Attempt::Done(WebhookOutcome::AlreadyProcessed));
        }

        match committed(self.ledger.commit(LedgerUnit::new().append(audit)).await)? {
            Committed::Yes => {}
            Committed::Conflict => return Ok(Attempt::Conflict),
            Committed::Duplicate => return Ok(Attempt::Done(WebhookOutcome::AlreadyProcessed)),
        }
        tracing::info!(
            event,
            subscription_id = %subscription.id,
            "Recorded gateway subscription update"
        );
        Ok(Attempt::Done(WebhookOutcome::Applied))
    }
}
