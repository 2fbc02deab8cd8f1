//! Pause, resume and terminate.

use super::{after_commit, authorize, Planned, SubscriptionLifecycleService, MANAGERS};
use crate::application::notifier::NotificationKind;
use crate::domain::audit::{ActionHistory, ActionType, Actor};
use crate::domain::foundation::{AuthenticatedUser, SubscriptionId, Timestamp};
use crate::domain::subscription::{StatusChange, Subscription, SubscriptionError};
use crate::ports::LedgerUnit;

/// Command to end a subscription for good.
#[derive(Debug, Clone)]
pub struct TerminateSubscriptionCommand {
    pub subscription_id: SubscriptionId,
    pub reason: Option<String>,
    /// Recorded for the refund workflow; no money moves here.
    pub refund_deposit: bool,
}

type Operation = fn(&mut Subscription, Timestamp) -> Result<StatusChange, SubscriptionError>;

/// One guarded status change and how to document it.
struct Transition {
    operation: Operation,
    action: ActionType,
    notice: NotificationKind,
    verb: &'static str,
}

const PAUSE: Transition = Transition {
    operation: Subscription::pause,
    action: ActionType::SubscriptionPaused,
    notice: NotificationKind::SubscriptionPaused,
    verb: "pause subscriptions",
};

const RESUME: Transition = Transition {
    operation: Subscription::resume,
    action: ActionType::SubscriptionResumed,
    notice: NotificationKind::SubscriptionResumed,
    verb: "resume subscriptions",
};

const TERMINATE: Transition = Transition {
    operation: Subscription::terminate,
    action: ActionType::SubscriptionTerminated,
    notice: NotificationKind::SubscriptionTerminated,
    verb: "terminate subscriptions",
};

impl SubscriptionLifecycleService {
    /// ACTIVE → PAUSED.
    pub async fn pause(
        &self,
        user: &AuthenticatedUser,
        id: SubscriptionId,
        reason: Option<String>,
    ) -> Result<Subscription, SubscriptionError> {
        self.transition(user, id, &PAUSE, reason, Vec::new()).await
    }

    /// PAUSED → ACTIVE.
    pub async fn resume(
        &self,
        user: &AuthenticatedUser,
        id: SubscriptionId,
        comment: Option<String>,
    ) -> Result<Subscription, SubscriptionError> {
        self.transition(user, id, &RESUME, comment, Vec::new()).await
    }

    /// ACTIVE or PAUSED → TERMINATED. Irreversible.
    ///
    /// A linked gateway subscription is cancelled first. If that fails the
    /// local row is left untouched and the caller gets `Gateway`.
    pub async fn terminate(
        &self,
        user: &AuthenticatedUser,
        cmd: TerminateSubscriptionCommand,
    ) -> Result<Subscription, SubscriptionError> {
        authorize(user, MANAGERS, TERMINATE.verb)?;

        let mut preview = self.load(&cmd.subscription_id).await?;
        (TERMINATE.operation)(&mut preview, Timestamp::now())?;
        self.cancel_at_gateway(&preview).await?;

        let metadata = vec![
            ("refund_deposit", serde_json::Value::from(cmd.refund_deposit)),
            (
                "deposit_amount",
                serde_json::Value::from(preview.deposit_amount.as_major()),
            ),
        ];
        self.transition(user, cmd.subscription_id, &TERMINATE, cmd.reason, metadata)
            .await
    }

    async fn transition(
        &self,
        user: &AuthenticatedUser,
        id: SubscriptionId,
        transition: &Transition,
        comment: Option<String>,
        metadata: Vec<(&'static str, serde_json::Value)>,
    ) -> Result<Subscription, SubscriptionError> {
        authorize(user, MANAGERS, transition.verb)?;
        let actor = Actor::User(user.clone());

        let (subscription, change) = self
            .commit_with_retry(&id, |mut subscription| {
                let now = Timestamp::now();
                let change = (transition.operation)(&mut subscription, now)?;
                let mut audit = ActionHistory::new(transition.action, &actor, now)
                    .for_subscription(subscription.id)
                    .with_statuses(Some(change.from), change.to)
                    .with_comment(comment.clone());
                for (key, value) in &metadata {
                    audit = audit.with_metadata(key, value.clone());
                }
                let unit = LedgerUnit::new()
                    .update_subscription(subscription.clone())
                    .append(audit);
                Ok(Planned::Commit(unit, (after_commit(subscription), change)))
            })
            .await?;

        tracing::info!(
            subscription_id = %subscription.id,
            user_id = %user.id,
            from = %change.from,
            to = %change.to,
            "Subscription status changed"
        );
        self.notifier.notify(transition.notice, &subscription, None).await;
        Ok(subscription)
    }
}
