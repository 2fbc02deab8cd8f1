//! Create a subscription from a completed installation request.

use std::collections::BTreeMap;

use super::{authorize, ledger_failure, SubscriptionLifecycleService, MANAGERS};
use crate::domain::audit::{ActionHistory, ActionType, Actor};
use crate::domain::foundation::{
    AuthenticatedUser, InstallationRequestId, Money, Timestamp, ValidationError,
};
use crate::domain::subscription::{NewSubscription, Subscription, SubscriptionError};
use crate::ports::{CreateGatewaySubscription, LedgerUnit};

/// Billing cycles authorised on a new gateway subscription when the caller
/// does not say.
pub const DEFAULT_AUTOPAY_CYCLES: u32 = 12;

/// Command to start billing for an installation.
#[derive(Debug, Clone)]
pub struct CreateSubscriptionCommand {
    pub installation_request_id: InstallationRequestId,
    pub plan_name: String,
    pub monthly_amount: Money,
    pub deposit_amount: Money,
    /// Defaults to now.
    pub start_date: Option<Timestamp>,
    pub end_date: Option<Timestamp>,
    pub enable_auto_payment: bool,
    /// Overrides the configured default plan.
    pub plan_id: Option<String>,
    pub total_count: Option<u32>,
}

impl SubscriptionLifecycleService {
    /// Creates an ACTIVE subscription, optionally linked to a gateway autopay
    /// subscription.
    ///
    /// # Errors
    ///
    /// - `Forbidden` unless the caller is ADMIN or FRANCHISE_OWNER
    /// - `InstallationNotFound` / `InstallationNotCompleted`
    /// - `Validation` for bad fields or a missing autopay plan
    /// - `Gateway` if autopay provisioning fails; nothing is written
    pub async fn create(
        &self,
        user: &AuthenticatedUser,
        cmd: CreateSubscriptionCommand,
    ) -> Result<Subscription, SubscriptionError> {
        authorize(user, MANAGERS, "create subscriptions")?;

        let installation = self
            .installations
            .find_by_id(&cmd.installation_request_id)
            .await
            .map_err(|err| SubscriptionError::Store(err.to_string()))?
            .ok_or(SubscriptionError::InstallationNotFound(
                cmd.installation_request_id,
            ))?;
        if !installation.is_completed() {
            return Err(SubscriptionError::InstallationNotCompleted(installation.id));
        }

        let now = Timestamp::now();
        let mut subscription = Subscription::create(
            NewSubscription {
                customer_id: installation.customer_id.clone(),
                product_id: installation.product_id.clone(),
                franchise_id: installation.franchise_id.clone(),
                installation_request_id: Some(installation.id),
                plan_name: cmd.plan_name,
                monthly_amount: cmd.monthly_amount,
                deposit_amount: cmd.deposit_amount,
                start_date: cmd.start_date.unwrap_or(now),
                end_date: cmd.end_date,
            },
            now,
        )?;

        if cmd.enable_auto_payment {
            let plan_id = cmd
                .plan_id
                .filter(|p| !p.trim().is_empty())
                .or_else(|| self.default_plan_id.clone())
                .ok_or_else(|| ValidationError::empty_field("plan_id"))?;
            let mut notes = BTreeMap::new();
            notes.insert("subscription_id".to_string(), subscription.id.to_string());
            notes.insert("connect_id".to_string(), subscription.connect_id.to_string());

            let gateway_subscription = self
                .gateway
                .create_subscription(CreateGatewaySubscription {
                    plan_id,
                    total_count: cmd.total_count.unwrap_or(DEFAULT_AUTOPAY_CYCLES),
                    customer_notify: true,
                    notes,
                })
                .await
                .map_err(|err| {
                    tracing::error!(error = %err, "Autopay provisioning failed");
                    SubscriptionError::Gateway(err.to_string())
                })?;
            subscription.attach_gateway_subscription(gateway_subscription.id)?;
        }

        let audit = ActionHistory::new(
            ActionType::SubscriptionCreated,
            &Actor::User(user.clone()),
            now,
        )
        .for_subscription(subscription.id)
        .with_statuses(None::<&str>, subscription.status)
        .with_metadata("installation_request_id", installation.id.to_string())
        .with_metadata("connect_id", subscription.connect_id.to_string())
        .with_metadata("plan_name", subscription.plan_name.as_str())
        .with_metadata("monthly_amount", subscription.monthly_amount.as_major())
        .with_metadata("deposit_amount", subscription.deposit_amount.as_major())
        .with_metadata("auto_payment", cmd.enable_auto_payment)
        .with_metadata(
            "razorpay_subscription_id",
            subscription.razorpay_subscription_id.clone(),
        );

        let unit = LedgerUnit::new()
            .insert_subscription(subscription.clone())
            .append(audit);
        if let Err(err) = self.ledger.commit(unit).await {
            if let Some(gateway_id) = &subscription.razorpay_subscription_id {
                tracing::warn!(
                    razorpay_subscription_id = %gateway_id,
                    "Gateway subscription created but local insert failed"
                );
            }
            return Err(ledger_failure(err, subscription.id));
        }

        tracing::info!(
            subscription_id = %subscription.id,
            connect_id = %subscription.connect_id,
            installation_request_id = %installation.id,
            auto_payment = cmd.enable_auto_payment,
            "Subscription created"
        );
        Ok(subscription)
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::{admin, agent, Fixture, StubPaymentGateway};
    use super::*;
    use crate::domain::installation::InstallationStatus;
    use crate::domain::subscription::SubscriptionStatus;

    fn command(installation_request_id: InstallationRequestId) -> CreateSubscriptionCommand {
        CreateSubscriptionCommand {
            installation_request_id,
            plan_name: "RO Purifier Basic".into(),
            monthly_amount: Money::from_rupees(500),
            deposit_amount: Money::from_rupees(1500),
            start_date: Timestamp::from_ymd(2024, 3, 10),
            end_date: None,
            enable_auto_payment: false,
            plan_id: None,
            total_count: None,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Success Tests
    // ═══════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn creates_active_subscription_with_first_period() {
        let fx = Fixture::new();
        let request = fx.installation(InstallationStatus::Completed);

        let sub = fx.service.create(&admin(), command(request.id)).await.unwrap();

        assert_eq!(sub.status, SubscriptionStatus::Active);
        assert_eq!(sub.customer_id, request.customer_id);
        assert_eq!(sub.current_period_end, Timestamp::from_ymd(2024, 4, 10).unwrap());
        assert_eq!(sub.next_payment_date, Timestamp::from_ymd(2024, 4, 10).unwrap());
        assert!(sub.razorpay_subscription_id.is_none());
        assert!(sub.connect_id.as_str().starts_with("CN"));

        let stored = fx.ledger.subscription(&sub.id).unwrap();
        assert_eq!(stored, sub);
        let history = fx.ledger.action_history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].action_type, ActionType::SubscriptionCreated);
        assert_eq!(history[0].to_status.as_deref(), Some("ACTIVE"));
        assert_eq!(history[0].performed_by, "admin-1");
    }

    #[tokio::test]
    async fn autopay_links_gateway_subscription() {
        let fx = Fixture::new();
        let request = fx.installation(InstallationStatus::Completed);

        let sub = fx
            .service
            .create(
                &admin(),
                CreateSubscriptionCommand {
                    enable_auto_payment: true,
                    ..command(request.id)
                },
            )
            .await
            .unwrap();

        assert_eq!(sub.razorpay_subscription_id.as_deref(), Some("sub_gw_1"));
        let created = fx.gateway.created.lock().unwrap().clone();
        assert_eq!(created.len(), 1);
        assert_eq!(created[0].plan_id, "plan_default");
        assert_eq!(created[0].total_count, DEFAULT_AUTOPAY_CYCLES);
        assert_eq!(created[0].notes["subscription_id"], sub.id.to_string());
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Rejection Tests
    // ═══════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn rejects_incomplete_installation() {
        let fx = Fixture::new();
        let request = fx.installation(InstallationStatus::Scheduled);

        let result = fx.service.create(&admin(), command(request.id)).await;

        assert_eq!(
            result.unwrap_err(),
            SubscriptionError::InstallationNotCompleted(request.id)
        );
        assert!(fx.ledger.action_history().is_empty());
    }

    #[tokio::test]
    async fn rejects_unknown_installation() {
        let fx = Fixture::new();
        let id = InstallationRequestId::new();

        let result = fx.service.create(&admin(), command(id)).await;

        assert_eq!(result.unwrap_err(), SubscriptionError::InstallationNotFound(id));
    }

    #[tokio::test]
    async fn service_agent_cannot_create() {
        let fx = Fixture::new();
        let request = fx.installation(InstallationStatus::Completed);

        let result = fx.service.create(&agent(), command(request.id)).await;

        assert!(matches!(result, Err(SubscriptionError::Forbidden(_))));
    }

    #[tokio::test]
    async fn gateway_failure_writes_nothing() {
        let fx = Fixture::with_gateway(StubPaymentGateway {
            fail: true,
            ..Default::default()
        });
        let request = fx.installation(InstallationStatus::Completed);

        let result = fx
            .service
            .create(
                &admin(),
                CreateSubscriptionCommand {
                    enable_auto_payment: true,
                    ..command(request.id)
                },
            )
            .await;

        assert!(matches!(result, Err(SubscriptionError::Gateway(_))));
        assert!(fx.ledger.action_history().is_empty());
    }

    #[tokio::test]
    async fn rejects_non_positive_amount() {
        let fx = Fixture::new();
        let request = fx.installation(InstallationStatus::Completed);

        let result = fx
            .service
            .create(
                &admin(),
                CreateSubscriptionCommand {
                    monthly_amount: Money::ZERO,
                    ..command(request.id)
                },
            )
            .await;

        assert!(matches!(result, Err(SubscriptionError::Validation(_))));
    }
}
