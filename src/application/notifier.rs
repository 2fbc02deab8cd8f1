//! Best-effort notification fan-out after a ledger commit.
//!
//! Every recipient is attempted independently and all attempts are joined
//! with a bounded wait. Failures are logged one per recipient and never
//! returned to the caller: the ledger change they describe has already
//! committed.

use futures::future::join_all;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use crate::domain::foundation::{Money, UserId};
use crate::domain::subscription::Subscription;
use crate::ports::{NotificationError, NotificationGateway, PushNotification, RecipientDirectory};

/// Ledger events that produce a push notification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    PaymentReceived,
    PaymentFailed,
    SubscriptionPaused,
    SubscriptionResumed,
    SubscriptionCancelled,
    SubscriptionCompleted,
    SubscriptionTerminated,
}

impl NotificationKind {
    /// Value of the `type` key in the notification data.
    pub fn type_tag(&self) -> &'static str {
        match self {
            NotificationKind::PaymentReceived => "PAYMENT_RECEIVED",
            NotificationKind::PaymentFailed => "PAYMENT_FAILED",
            NotificationKind::SubscriptionPaused => "SUBSCRIPTION_PAUSED",
            NotificationKind::SubscriptionResumed => "SUBSCRIPTION_RESUMED",
            NotificationKind::SubscriptionCancelled => "SUBSCRIPTION_CANCELLED",
            NotificationKind::SubscriptionCompleted => "SUBSCRIPTION_COMPLETED",
            NotificationKind::SubscriptionTerminated => "SUBSCRIPTION_TERMINATED",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            NotificationKind::PaymentReceived => "Payment received",
            NotificationKind::PaymentFailed => "Payment failed",
            NotificationKind::SubscriptionPaused => "Subscription paused",
            NotificationKind::SubscriptionResumed => "Subscription resumed",
            NotificationKind::SubscriptionCancelled => "Subscription cancelled",
            NotificationKind::SubscriptionCompleted => "Subscription completed",
            NotificationKind::SubscriptionTerminated => "Subscription terminated",
        }
    }

    fn message(
        &self,
        subscription: &Subscription,
        amount: Option<Money>,
        audience: Audience,
    ) -> String {
        let subject = match audience {
            Audience::Customer => format!("Your subscription {}", subscription.connect_id),
            Audience::Staff => format!("Subscription {}", subscription.connect_id),
        };
        let amount = amount.unwrap_or(subscription.monthly_amount);
        match self {
            NotificationKind::PaymentReceived => format!(
                "{} payment of {} was received. Next payment is due on {}.",
                subject,
                amount,
                subscription.next_payment_date.as_datetime().format("%d %b %Y")
            ),
            NotificationKind::PaymentFailed => {
                format!("{} payment of {} could not be processed.", subject, amount)
            }
            NotificationKind::SubscriptionPaused => format!("{} has been paused.", subject),
            NotificationKind::SubscriptionResumed => format!("{} is active again.", subject),
            NotificationKind::SubscriptionCancelled => {
                format!("{} was cancelled at the payment gateway.", subject)
            }
            NotificationKind::SubscriptionCompleted => {
                format!("{} has completed its term.", subject)
            }
            NotificationKind::SubscriptionTerminated => {
                format!("{} has been terminated.", subject)
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Audience {
    Customer,
    Staff,
}

/// Counts from one fan-out.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct NotificationReport {
    pub attempted: usize,
    pub delivered: usize,
    pub failed: usize,
}

/// Sends ledger notifications to the customer, franchise owner and admins.
pub struct LedgerNotifier {
    gateway: Arc<dyn NotificationGateway>,
    directory: Arc<dyn RecipientDirectory>,
    timeout: Duration,
}

impl LedgerNotifier {
    pub fn new(
        gateway: Arc<dyn NotificationGateway>,
        directory: Arc<dyn RecipientDirectory>,
        timeout: Duration,
    ) -> Self {
        Self {
            gateway,
            directory,
            timeout,
        }
    }

    /// Notifies everyone concerned with `subscription`. Never fails.
    pub async fn notify(
        &self,
        kind: NotificationKind,
        subscription: &Subscription,
        amount: Option<Money>,
    ) -> NotificationReport {
        let recipients = self.resolve_recipients(subscription).await;

        let mut data = BTreeMap::new();
        data.insert("subscriptionId".to_string(), subscription.id.to_string());
        data.insert("connectId".to_string(), subscription.connect_id.to_string());
        data.insert("type".to_string(), kind.type_tag().to_string());

        let sends = recipients.into_iter().map(|(user_id, token, audience)| {
            let notification = PushNotification {
                push_token: token,
                title: kind.title().to_string(),
                message: kind.message(subscription, amount, audience),
                data: data.clone(),
            };
            async move {
                let send = self.gateway.send_single_push_notification(notification);
                let result = match tokio::time::timeout(self.timeout, send).await {
                    Ok(result) => result,
                    Err(_) => Err(NotificationError::Timeout),
                };
                (user_id, result)
            }
        });

        let results = join_all(sends).await;

        let mut report = NotificationReport {
            attempted: results.len(),
            ..Default::default()
        };
        for (user_id, result) in results {
            match result {
                Ok(()) => report.delivered += 1,
                Err(err) => {
                    report.failed += 1;
                    tracing::warn!(
                        user_id = %user_id,
                        subscription_id = %subscription.id,
                        notification = kind.type_tag(),
                        error = %err,
                        "Push notification failed"
                    );
                }
            }
        }
        report
    }

    /// Customer, franchise owner and admins with a push token, deduplicated.
    async fn resolve_recipients(
        &self,
        subscription: &Subscription,
    ) -> Vec<(UserId, String, Audience)> {
        let mut users: Vec<(UserId, Audience)> =
            vec![(subscription.customer_id.clone(), Audience::Customer)];

        match self.directory.franchise_owner(&subscription.franchise_id).await {
            Ok(Some(owner)) => users.push((owner, Audience::Staff)),
            Ok(None) => {}
            Err(err) => tracing::warn!(
                franchise_id = %subscription.franchise_id,
                error = %err,
                "Could not resolve franchise owner for notification"
            ),
        }
        match self.directory.admins().await {
            Ok(admins) => users.extend(admins.into_iter().map(|a| (a, Audience::Staff))),
            Err(err) => tracing::warn!(error = %err, "Could not resolve admins for notification"),
        }

        let mut seen = Vec::with_capacity(users.len());
        let mut recipients = Vec::with_capacity(users.len());
        for (user_id, audience) in users {
            if seen.contains(&user_id) {
                continue;
            }
            seen.push(user_id.clone());
            match self.directory.push_token(&user_id).await {
                Ok(Some(token)) => recipients.push((user_id, token, audience)),
                Ok(None) => tracing::debug!(user_id = %user_id, "No push token registered"),
                Err(err) => tracing::warn!(
                    user_id = %user_id,
                    error = %err,
                    "Could not resolve push token"
                ),
            }
        }
        recipients
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::RecordingGateway;
    use super::*;
    use crate::adapters::memory::InMemoryRecipients;
    use crate::domain::foundation::{FranchiseId, Timestamp};
    use crate::domain::subscription::test_support::active_subscription;

    fn directory(sub: &Subscription) -> InMemoryRecipients {
        InMemoryRecipients::new()
            .with_push_token(sub.customer_id.clone(), "tok-customer")
            .with_franchise_owner(FranchiseId::new("fr-1").unwrap(), UserId::new("owner").unwrap())
            .with_push_token(UserId::new("owner").unwrap(), "tok-owner")
            .with_admin(UserId::new("admin").unwrap())
            .with_push_token(UserId::new("admin").unwrap(), "tok-admin")
    }

    #[tokio::test]
    async fn notifies_customer_owner_and_admins() {
        let sub = active_subscription(Timestamp::from_ymd(2024, 1, 1).unwrap());
        let gateway = Arc::new(RecordingGateway::default());
        let notifier = LedgerNotifier::new(
            gateway.clone(),
            Arc::new(directory(&sub)),
            Duration::from_millis(200),
        );

        let report = notifier
            .notify(NotificationKind::SubscriptionPaused, &sub, None)
            .await;

        assert_eq!(report.attempted, 3);
        assert_eq!(report.delivered, 3);
        let sent = gateway.sent();
        assert!(sent.iter().all(|n| n.title == "Subscription paused"));
        assert_eq!(sent[0].data["type"], "SUBSCRIPTION_PAUSED");
        assert_eq!(sent[0].data["connectId"], sub.connect_id.to_string());
        assert!(sent[0].message.starts_with("Your subscription"));
    }

    #[tokio::test]
    async fn one_failure_does_not_block_the_others() {
        let sub = active_subscription(Timestamp::from_ymd(2024, 1, 1).unwrap());
        let gateway = Arc::new(RecordingGateway {
            failing: vec!["tok-owner".into()],
            ..Default::default()
        });
        let notifier = LedgerNotifier::new(
            gateway.clone(),
            Arc::new(directory(&sub)),
            Duration::from_millis(200),
        );

        let report = notifier
            .notify(NotificationKind::PaymentReceived, &sub, Some(Money::from_rupees(500)))
            .await;

        assert_eq!(report.failed, 1);
        assert_eq!(report.delivered, 2);
        assert_eq!(gateway.sent().len(), 2);
    }

    #[tokio::test]
    async fn hung_recipient_is_cut_off_by_timeout() {
        let sub = active_subscription(Timestamp::from_ymd(2024, 1, 1).unwrap());
        let gateway = Arc::new(RecordingGateway {
            hang: vec!["tok-admin".into()],
            ..Default::default()
        });
        let notifier = LedgerNotifier::new(
            gateway.clone(),
            Arc::new(directory(&sub)),
            Duration::from_millis(50),
        );

        let report = notifier
            .notify(NotificationKind::SubscriptionTerminated, &sub, None)
            .await;

        assert_eq!(report.failed, 1);
        assert_eq!(report.delivered, 2);
    }

    #[tokio::test]
    async fn owner_who_is_also_admin_is_notified_once() {
        let sub = active_subscription(Timestamp::from_ymd(2024, 1, 1).unwrap());
        let dir = directory(&sub).with_admin(UserId::new("owner").unwrap());
        let gateway = Arc::new(RecordingGateway::default());
        let notifier = LedgerNotifier::new(gateway.clone(), Arc::new(dir), Duration::from_millis(200));

        let report = notifier
            .notify(NotificationKind::SubscriptionResumed, &sub, None)
            .await;

        assert_eq!(report.attempted, 3);
    }

    #[tokio::test]
    async fn recipients_without_tokens_are_skipped() {
        let sub = active_subscription(Timestamp::from_ymd(2024, 1, 1).unwrap());
        let gateway = Arc::new(RecordingGateway::default());
        let notifier = LedgerNotifier::new(
            gateway.clone(),
            Arc::new(InMemoryRecipients::new()),
            Duration::from_millis(200),
        );

        let report = notifier
            .notify(NotificationKind::PaymentFailed, &sub, None)
            .await;

        assert_eq!(report, NotificationReport::default());
    }
}
