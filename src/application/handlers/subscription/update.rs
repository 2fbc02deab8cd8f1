//! Field edits, with an optional status change routed through the guards.

use serde_json::{Map, Value};

use super::{after_commit, authorize, Planned, SubscriptionLifecycleService, MANAGERS};
use crate::application::notifier::NotificationKind;
use crate::domain::audit::{ActionHistory, ActionType, Actor};
use crate::domain::foundation::{AuthenticatedUser, SubscriptionId, Timestamp};
use crate::domain::subscription::{
    StatusChange, Subscription, SubscriptionChanges, SubscriptionError, SubscriptionStatus,
};
use crate::ports::LedgerUnit;

/// Command to edit a subscription.
#[derive(Debug, Clone)]
pub struct UpdateSubscriptionCommand {
    pub subscription_id: SubscriptionId,
    pub changes: SubscriptionChanges,
    /// Requested status; goes through pause/resume/terminate.
    pub status: Option<SubscriptionStatus>,
    pub comment: Option<String>,
}

/// Result of an update.
#[derive(Debug, Clone)]
pub struct UpdateSubscriptionResult {
    pub subscription: Subscription,
    pub changed_fields: Vec<&'static str>,
    pub status_change: Option<StatusChange>,
}

impl UpdateSubscriptionResult {
    pub fn is_noop(&self) -> bool {
        self.changed_fields.is_empty() && self.status_change.is_none()
    }
}

/// Applies `target` with the same guard the dedicated command uses.
fn route_status(
    subscription: &mut Subscription,
    target: SubscriptionStatus,
    now: Timestamp,
) -> Result<StatusChange, SubscriptionError> {
    match target {
        SubscriptionStatus::Paused => subscription.pause(now),
        SubscriptionStatus::Active => subscription.resume(now),
        SubscriptionStatus::Terminated => subscription.terminate(now),
        SubscriptionStatus::Expired => Err(SubscriptionError::invalid_transition(
            "expire",
            subscription.status,
        )),
        SubscriptionStatus::Pending => Err(SubscriptionError::invalid_transition(
            "reset",
            subscription.status,
        )),
    }
}

/// Field edits then the status route, on `subscription` in place.
fn plan_update(
    subscription: &mut Subscription,
    cmd: &UpdateSubscriptionCommand,
    now: Timestamp,
) -> Result<(Vec<&'static str>, Option<StatusChange>), SubscriptionError> {
    let changed_fields = subscription.apply_changes(&cmd.changes, now)?;
    let status_change = cmd
        .status
        .map(|target| route_status(subscription, target, now))
        .transpose()?;
    Ok((changed_fields, status_change))
}

fn transition_kinds(to: SubscriptionStatus) -> (ActionType, NotificationKind) {
    match to {
        SubscriptionStatus::Paused => (
            ActionType::SubscriptionPaused,
            NotificationKind::SubscriptionPaused,
        ),
        SubscriptionStatus::Terminated => (
            ActionType::SubscriptionTerminated,
            NotificationKind::SubscriptionTerminated,
        ),
        _ => (ActionType::SubscriptionResumed, NotificationKind::SubscriptionResumed),
    }
}

/// `{field: {from, to}}` for the audit row.
fn field_diff(before: &Subscription, after: &Subscription, fields: &[&'static str]) -> Value {
    let snapshot = |sub: &Subscription, field: &str| -> Value {
        match field {
            "plan_name" => Value::from(sub.plan_name.as_str()),
            "monthly_amount" => Value::from(sub.monthly_amount.as_major()),
            "end_date" => Value::from(sub.end_date.map(|d| d.to_rfc3339())),
            "next_payment_date" => Value::from(sub.next_payment_date.to_rfc3339()),
            _ => Value::Null,
        }
    };
    let mut diff = Map::new();
    for field in fields {
        let mut entry = Map::new();
        entry.insert("from".into(), snapshot(before, field));
        entry.insert("to".into(), snapshot(after, field));
        diff.insert((*field).to_string(), Value::Object(entry));
    }
    Value::Object(diff)
}

impl SubscriptionLifecycleService {
    /// Edits non-status fields and, when `status` is set, applies the
    /// matching guarded transition in the same unit.
    ///
    /// A request that changes nothing writes nothing.
    ///
    /// # Errors
    ///
    /// - `Forbidden` unless the caller is ADMIN or FRANCHISE_OWNER
    /// - `Validation` for bad field values
    /// - `InvalidTransition` when the requested status is not reachable
    pub async fn update(
        &self,
        user: &AuthenticatedUser,
        cmd: UpdateSubscriptionCommand,
    ) -> Result<UpdateSubscriptionResult, SubscriptionError> {
        authorize(user, MANAGERS, "update subscriptions")?;
        let actor = Actor::User(user.clone());

        // Nothing reaches the gateway unless the whole plan holds on the
        // current row.
        if cmd.status == Some(SubscriptionStatus::Terminated) {
            let mut preview = self.load(&cmd.subscription_id).await?;
            plan_update(&mut preview, &cmd, Timestamp::now())?;
            self.cancel_at_gateway(&preview).await?;
        }

        let result = self
            .commit_with_retry(&cmd.subscription_id, |mut subscription| {
                let now = Timestamp::now();
                let before = subscription.clone();
                let (changed_fields, status_change) = plan_update(&mut subscription, &cmd, now)?;

                if changed_fields.is_empty() && status_change.is_none() {
                    return Ok(Planned::Unchanged(UpdateSubscriptionResult {
                        subscription,
                        changed_fields,
                        status_change,
                    }));
                }

                let mut unit = LedgerUnit::new().update_subscription(subscription.clone());
                if !changed_fields.is_empty() {
                    unit = unit.append(
                        ActionHistory::new(ActionType::SubscriptionUpdated, &actor, now)
                            .for_subscription(subscription.id)
                            .with_comment(cmd.comment.clone())
                            .with_metadata(
                                "changes",
                                field_diff(&before, &subscription, &changed_fields),
                            ),
                    );
                }
                if let Some(change) = status_change {
                    let (action, _) = transition_kinds(change.to);
                    unit = unit.append(
                        ActionHistory::new(action, &actor, now)
                            .for_subscription(subscription.id)
                            .with_statuses(Some(change.from), change.to)
                            .with_comment(cmd.comment.clone()),
                    );
                }

                Ok(Planned::Commit(
                    unit,
                    UpdateSubscriptionResult {
                        subscription: after_commit(subscription),
                        changed_fields,
                        status_change,
                    },
                ))
            })
            .await?;

        if result.is_noop() {
            tracing::debug!(subscription_id = %cmd.subscription_id, "Update changed nothing");
            return Ok(result);
        }
        tracing::info!(
            subscription_id = %cmd.subscription_id,
            user_id = %user.id,
            fields = ?result.changed_fields,
            status_changed = result.status_change.is_some(),
            "Subscription updated"
        );
        if let Some(change) = result.status_change {
            let (_, notice) = transition_kinds(change.to);
            self.notifier.notify(notice, &result.subscription, None).await;
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::super::fixtures::{admin, Fixture};
    use super::*;
    use crate::domain::foundation::Money;

    fn command(id: SubscriptionId) -> UpdateSubscriptionCommand {
        UpdateSubscriptionCommand {
            subscription_id: id,
            changes: SubscriptionChanges::default(),
            status: None,
            comment: None,
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Field Tests
    // ═══════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn edits_fields_and_records_diff() {
        let fx = Fixture::new();

        let result = fx
            .service
            .update(
                &admin(),
                UpdateSubscriptionCommand {
                    changes: SubscriptionChanges {
                        plan_name: Some("RO Purifier Premium".into()),
                        monthly_amount: Some(Money::from_rupees(650)),
                        ..Default::default()
                    },
                    comment: Some("Upgraded".into()),
                    ..command(fx.subscription.id)
                },
            )
            .await
            .unwrap();

        assert_eq!(result.changed_fields, vec!["plan_name", "monthly_amount"]);
        assert_eq!(fx.stored().monthly_amount, Money::from_rupees(650));
        assert_eq!(fx.stored().status, SubscriptionStatus::Active);

        let history = fx.ledger.action_history();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].action_type, ActionType::SubscriptionUpdated);
        assert_eq!(history[0].metadata["changes"]["monthly_amount"]["from"], 500.0);
        assert_eq!(history[0].metadata["changes"]["monthly_amount"]["to"], 650.0);
        assert_eq!(history[0].comment.as_deref(), Some("Upgraded"));
    }

    #[tokio::test]
    async fn identical_values_write_nothing() {
        let fx = Fixture::new();

        let result = fx
            .service
            .update(
                &admin(),
                UpdateSubscriptionCommand {
                    changes: SubscriptionChanges {
                        plan_name: Some(fx.subscription.plan_name.clone()),
                        ..Default::default()
                    },
                    ..command(fx.subscription.id)
                },
            )
            .await
            .unwrap();

        assert!(result.is_noop());
        assert_eq!(fx.stored().version, 0);
        assert!(fx.ledger.action_history().is_empty());
    }

    #[tokio::test]
    async fn next_payment_date_before_period_end_is_rejected() {
        let fx = Fixture::new();

        let result = fx
            .service
            .update(
                &admin(),
                UpdateSubscriptionCommand {
                    changes: SubscriptionChanges {
                        next_payment_date: Timestamp::from_ymd(2023, 12, 1),
                        ..Default::default()
                    },
                    ..command(fx.subscription.id)
                },
            )
            .await;

        assert!(matches!(result, Err(SubscriptionError::Validation(_))));
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Status Routing Tests
    // ═══════════════════════════════════════════════════════════════════════

    #[tokio::test]
    async fn status_field_uses_transition_guards() {
        let fx = Fixture::new();

        let result = fx
            .service
            .update(
                &admin(),
                UpdateSubscriptionCommand {
                    changes: SubscriptionChanges {
                        plan_name: Some("Seasonal".into()),
                        ..Default::default()
                    },
                    status: Some(SubscriptionStatus::Paused),
                    ..command(fx.subscription.id)
                },
            )
            .await
            .unwrap();

        assert_eq!(
            result.status_change,
            Some(StatusChange {
                from: SubscriptionStatus::Active,
                to: SubscriptionStatus::Paused,
            })
        );
        let history = fx.ledger.action_history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].action_type, ActionType::SubscriptionUpdated);
        assert_eq!(history[1].action_type, ActionType::SubscriptionPaused);
        assert_eq!(fx.stored().version, 1);
        assert_eq!(fx.push.sent()[0].data["type"], "SUBSCRIPTION_PAUSED");
    }

    #[tokio::test]
    async fn expired_is_not_settable() {
        let fx = Fixture::new();

        let result = fx
            .service
            .update(
                &admin(),
                UpdateSubscriptionCommand {
                    status: Some(SubscriptionStatus::Expired),
                    ..command(fx.subscription.id)
                },
            )
            .await;

        assert!(matches!(result, Err(SubscriptionError::InvalidTransition { .. })));
        assert_eq!(fx.stored(), fx.subscription);
    }

    #[tokio::test]
    async fn status_guard_failure_discards_field_edits() {
        let fx = Fixture::new();

        let rejected = fx
            .service
            .update(
                &admin(),
                UpdateSubscriptionCommand {
                    changes: SubscriptionChanges {
                        plan_name: Some("Other".into()),
                        ..Default::default()
                    },
                    status: Some(SubscriptionStatus::Active),
                    ..command(fx.subscription.id)
                },
            )
            .await;

        assert_eq!(
            rejected.unwrap_err(),
            SubscriptionError::invalid_transition("resume", SubscriptionStatus::Active)
        );
        assert_eq!(fx.stored(), fx.subscription);
        assert!(fx.ledger.action_history().is_empty());
    }

    #[tokio::test]
    async fn terminate_via_status_on_terminated_is_rejected() {
        let fx = Fixture::new();
        let terminate = UpdateSubscriptionCommand {
            status: Some(SubscriptionStatus::Terminated),
            ..command(fx.subscription.id)
        };

        fx.service.update(&admin(), terminate.clone()).await.unwrap();
        let again = fx.service.update(&admin(), terminate).await;

        assert_eq!(
            again.unwrap_err(),
            SubscriptionError::invalid_transition("terminate", SubscriptionStatus::Terminated)
        );
        assert_eq!(fx.ledger.action_history().len(), 1);
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Gateway Cancellation Tests
    // ═══════════════════════════════════════════════════════════════════════

    fn linked(fx: &Fixture) -> Subscription {
        let mut linked = fx.subscription.clone();
        linked.id = SubscriptionId::new();
        linked.razorpay_subscription_id = Some("sub_linked".into());
        fx.ledger.seed_subscription(linked.clone());
        linked
    }

    #[tokio::test]
    async fn invalid_fields_stop_termination_before_gateway() {
        let fx = Fixture::new();
        let linked = linked(&fx);

        let result = fx
            .service
            .update(
                &admin(),
                UpdateSubscriptionCommand {
                    changes: SubscriptionChanges {
                        plan_name: Some("   ".into()),
                        ..Default::default()
                    },
                    status: Some(SubscriptionStatus::Terminated),
                    ..command(linked.id)
                },
            )
            .await;

        assert!(matches!(result, Err(SubscriptionError::Validation(_))));
        assert!(fx.gateway.cancelled.lock().unwrap().is_empty());
        assert_eq!(fx.ledger.subscription(&linked.id).unwrap(), linked);
    }

    #[tokio::test]
    async fn terminate_via_status_cancels_gateway_once() {
        let fx = Fixture::new();
        let linked = linked(&fx);

        let result = fx
            .service
            .update(
                &admin(),
                UpdateSubscriptionCommand {
                    status: Some(SubscriptionStatus::Terminated),
                    comment: Some("Customer relocating".into()),
                    ..command(linked.id)
                },
            )
            .await
            .unwrap();

        assert_eq!(result.subscription.status, SubscriptionStatus::Terminated);
        assert_eq!(
            fx.gateway.cancelled.lock().unwrap().clone(),
            vec!["sub_linked".to_string()]
        );
    }
}
