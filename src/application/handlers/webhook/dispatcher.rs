//! WebhookDispatcher - verifies, parses and routes Razorpay events.
//!
//! Signature checks run on the raw transport bytes before any field of the
//! body is read. Verified events go to one reconciler per event type.
//! Unhandled types and records unknown locally are acknowledged so the
//! gateway does not retry them.

use secrecy::{ExposeSecret, SecretString};
use std::future::Future;
use std::sync::Arc;

use crate::application::handlers::MAX_COMMIT_ATTEMPTS;
use crate::application::notifier::{LedgerNotifier, NotificationKind};
use crate::domain::audit::ActionType;
use crate::domain::subscription::SubscriptionStatus;
use crate::domain::webhook::{
    RazorpayEvent, RazorpaySignatureVerifier, WebhookError, WebhookOutcome,
};
use crate::ports::{LedgerError, LedgerStore};

/// Result of one read-modify-commit attempt.
pub(super) enum Attempt {
    Done(WebhookOutcome),
    /// The version check failed; reload and try again.
    Conflict,
}

/// How a gateway status event maps onto the ledger.
#[derive(Debug, Clone, Copy)]
pub(super) struct StatusRule {
    pub target: SubscriptionStatus,
    pub action: ActionType,
    pub notice: NotificationKind,
}

const PAUSED: StatusRule = StatusRule {
    target: SubscriptionStatus::Paused,
    action: ActionType::SubscriptionPaused,
    notice: NotificationKind::SubscriptionPaused,
};

const CANCELLED: StatusRule = StatusRule {
    target: SubscriptionStatus::Terminated,
    action: ActionType::SubscriptionTerminated,
    notice: NotificationKind::SubscriptionCancelled,
};

const COMPLETED: StatusRule = StatusRule {
    target: SubscriptionStatus::Expired,
    action: ActionType::SubscriptionExpired,
    notice: NotificationKind::SubscriptionCompleted,
};

/// Entry point for `POST /razorpay`.
pub struct WebhookDispatcher {
    pub(super) ledger: Arc<dyn LedgerStore>,
    pub(super) notifier: Arc<LedgerNotifier>,
    verifier: Option<RazorpaySignatureVerifier>,
}

impl WebhookDispatcher {
    /// A blank secret counts as not configured.
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        notifier: Arc<LedgerNotifier>,
        secret: Option<SecretString>,
    ) -> Self {
        let verifier = secret
            .filter(|s| !s.expose_secret().trim().is_empty())
            .map(RazorpaySignatureVerifier::new);
        Self {
            ledger,
            notifier,
            verifier,
        }
    }

    /// Verifies and processes one webhook delivery.
    ///
    /// # Errors
    ///
    /// - `SecretNotConfigured` if no webhook secret is set
    /// - `MissingSignature` / `InvalidSignature` on a failed signature check
    /// - `Parse` / `MissingField` for a malformed verified body
    /// - `Store` if the ledger failed; safe to redeliver
    pub async fn handle(
        &self,
        raw_body: &[u8],
        signature: Option<&str>,
    ) -> Result<WebhookOutcome, WebhookError> {
        let Some(verifier) = &self.verifier else {
            tracing::error!("Razorpay webhook secret is not configured; rejecting webhook");
            return Err(WebhookError::SecretNotConfigured);
        };
        let Some(signature) = signature.map(str::trim).filter(|s| !s.is_empty()) else {
            tracing::warn!("Webhook rejected: missing signature header");
            return Err(WebhookError::MissingSignature);
        };
        if !verifier.verify(raw_body, signature) {
            tracing::warn!(body_len = raw_body.len(), "Webhook rejected: invalid signature");
            return Err(WebhookError::InvalidSignature);
        }

        let event = RazorpayEvent::parse(raw_body).map_err(|err| {
            tracing::warn!(error = %err, "Webhook rejected: malformed payload");
            err
        })?;
        self.dispatch(event).await
    }

    /// Routes a verified event to its reconciler.
    pub async fn dispatch(&self, event: RazorpayEvent) -> Result<WebhookOutcome, WebhookError> {
        let name = event.name().to_string();
        let outcome = match event {
            RazorpayEvent::SubscriptionActivated(entity) => {
                tracing::info!(
                    event = %name,
                    razorpay_subscription_id = %entity.id,
                    "Subscription activated at gateway; first cycle is billed manually"
                );
                WebhookOutcome::Acknowledged
            }
            RazorpayEvent::SubscriptionCharged {
                subscription,
                payment,
            } => {
                self.retrying(|| self.try_recurring_charge(&subscription.id, &payment, &name))
                    .await?
            }
            RazorpayEvent::SubscriptionPaused(entity)
            | RazorpayEvent::SubscriptionHalted(entity) => {
                self.retrying(|| self.try_status_change(&entity, PAUSED, &name))
                    .await?
            }
            RazorpayEvent::SubscriptionCancelled(entity) => {
                self.retrying(|| self.try_status_change(&entity, CANCELLED, &name))
                    .await?
            }
            RazorpayEvent::SubscriptionCompleted(entity) => {
                self.retrying(|| self.try_status_change(&entity, COMPLETED, &name))
                    .await?
            }
            RazorpayEvent::SubscriptionUpdated(entity) => {
                self.retrying(|| self.try_record_update(&entity, &name))
                    .await?
            }
            RazorpayEvent::PaymentCaptured(payment) => match payment.subscription_id.clone() {
                Some(gateway_sub_id) => {
                    self.retrying(|| self.try_recurring_charge(&gateway_sub_id, &payment, &name))
                        .await?
                }
                None => {
                    self.retrying(|| self.try_capture(&payment, &name))
                        .await?
                }
            },
            RazorpayEvent::PaymentFailed(payment) => {
                self.retrying(|| self.try_failure(&payment, &name))
                    .await?
            }
            RazorpayEvent::Unhandled(_) => {
                tracing::info!(event = %name, "Ignoring unhandled webhook event type");
                WebhookOutcome::Acknowledged
            }
        };

        tracing::info!(event = %name, outcome = outcome.as_str(), "Webhook processed");
        Ok(outcome)
    }

    async fn retrying<F, Fut>(&self, mut attempt: F) -> Result<WebhookOutcome, WebhookError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<Attempt, WebhookError>>,
    {
        for round in 1..=MAX_COMMIT_ATTEMPTS {
            match attempt().await? {
                Attempt::Done(outcome) => return Ok(outcome),
                Attempt::Conflict => {
                    tracing::debug!(attempt = round, "Ledger version conflict; reloading")
                }
            }
        }
        tracing::error!(
            attempts = MAX_COMMIT_ATTEMPTS,
            "Giving up on webhook after repeated version conflicts"
        );
        Err(WebhookError::Store(
            "concurrent modification; retry later".to_string(),
        ))
    }
}

/// Maps a read failure to a retryable webhook error.
pub(super) fn store_error(err: LedgerError) -> WebhookError {
    tracing::error!(error = %err, "Ledger failure while processing webhook");
    WebhookError::Store(err.to_string())
}
