//! In-memory ledger store.
//!
//! Used by the test suites and by the binary when no database URL is
//! configured. Units are applied to a copy of the state and swapped in only
//! if every op succeeds, so a failing unit leaves nothing behind.

use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use crate::domain::audit::ActionHistory;
use crate::domain::foundation::{PaymentId, SubscriptionId};
use crate::domain::payment::Payment;
use crate::domain::subscription::Subscription;
use crate::ports::{LedgerError, LedgerOp, LedgerStore, LedgerUnit};

#[derive(Debug, Clone, Default)]
struct LedgerState {
    subscriptions: Vec<Subscription>,
    payments: Vec<Payment>,
    history: Vec<ActionHistory>,
}

impl LedgerState {
    fn apply(&mut self, op: LedgerOp) -> Result<(), LedgerError> {
        match op {
            LedgerOp::InsertSubscription(subscription) => {
                if let Some(gateway_id) = &subscription.razorpay_subscription_id {
                    if self
                        .subscriptions
                        .iter()
                        .any(|s| s.razorpay_subscription_id.as_ref() == Some(gateway_id))
                    {
                        return Err(LedgerError::DuplicateSubscription(gateway_id.clone()));
                    }
                }
                if self.subscriptions.iter().any(|s| s.id == subscription.id) {
                    return Err(LedgerError::storage(format!(
                        "subscription {} already exists",
                        subscription.id
                    )));
                }
                self.subscriptions.push(subscription);
            }
            LedgerOp::UpdateSubscription {
                mut subscription,
                expected_version,
            } => {
                let stored = self
                    .subscriptions
                    .iter_mut()
                    .find(|s| s.id == subscription.id)
                    .ok_or_else(|| {
                        LedgerError::storage(format!("subscription {} not found", subscription.id))
                    })?;
                if stored.version != expected_version {
                    return Err(LedgerError::Conflict {
                        entity: "subscription",
                        id: subscription.id.to_string(),
                    });
                }
                subscription.version = expected_version + 1;
                *stored = subscription;
            }
            LedgerOp::InsertPayment(payment) => {
                if let Some(gateway_id) = &payment.razorpay_payment_id {
                    if self
                        .payments
                        .iter()
                        .any(|p| p.razorpay_payment_id.as_ref() == Some(gateway_id))
                    {
                        return Err(LedgerError::DuplicatePayment(gateway_id.clone()));
                    }
                }
                self.payments.push(payment);
            }
            LedgerOp::UpdatePayment {
                mut payment,
                expected_version,
            } => {
                if let Some(gateway_id) = &payment.razorpay_payment_id {
                    if self.payments.iter().any(|p| {
                        p.id != payment.id && p.razorpay_payment_id.as_ref() == Some(gateway_id)
                    }) {
                        return Err(LedgerError::DuplicatePayment(gateway_id.clone()));
                    }
                }
                let stored = self
                    .payments
                    .iter_mut()
                    .find(|p| p.id == payment.id)
                    .ok_or_else(|| {
                        LedgerError::storage(format!("payment {} not found", payment.id))
                    })?;
                if stored.version != expected_version {
                    return Err(LedgerError::Conflict {
                        entity: "payment",
                        id: payment.id.to_string(),
                    });
                }
                payment.version = expected_version + 1;
                *stored = payment;
            }
            LedgerOp::AppendActionHistory(entry) => self.history.push(entry),
        }
        Ok(())
    }
}

/// Ledger held in process memory.
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    state: RwLock<LedgerState>,
    fail_commits: AtomicBool,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a subscription directly, bypassing units. For fixtures.
    pub fn seed_subscription(&self, subscription: Subscription) {
        self.write().subscriptions.push(subscription);
    }

    /// Stores a payment directly, bypassing units. For fixtures.
    pub fn seed_payment(&self, payment: Payment) {
        self.write().payments.push(payment);
    }

    /// Makes every later commit fail with a storage error.
    pub fn fail_commits(&self, fail: bool) {
        self.fail_commits.store(fail, Ordering::SeqCst);
    }

    // === Test Helpers ===

    pub fn subscription(&self, id: &SubscriptionId) -> Option<Subscription> {
        self.read().subscriptions.iter().find(|s| s.id == *id).cloned()
    }

    pub fn payments(&self) -> Vec<Payment> {
        self.read().payments.clone()
    }

    pub fn action_history(&self) -> Vec<ActionHistory> {
        self.read().history.clone()
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, LedgerState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, LedgerState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    async fn find_subscription_by_id(
        &self,
        id: &SubscriptionId,
    ) -> Result<Option<Subscription>, LedgerError> {
        Ok(self.subscription(id))
    }

    async fn find_subscription_by_gateway_id(
        &self,
        gateway_id: &str,
    ) -> Result<Option<Subscription>, LedgerError> {
        Ok(self
            .read()
            .subscriptions
            .iter()
            .find(|s| s.razorpay_subscription_id.as_deref() == Some(gateway_id))
            .cloned())
    }

    async fn find_payment_by_id(&self, id: &PaymentId) -> Result<Option<Payment>, LedgerError> {
        Ok(self.read().payments.iter().find(|p| p.id == *id).cloned())
    }

    async fn find_payment_by_gateway_id(
        &self,
        gateway_id: &str,
    ) -> Result<Option<Payment>, LedgerError> {
        Ok(self
            .read()
            .payments
            .iter()
            .find(|p| p.razorpay_payment_id.as_deref() == Some(gateway_id))
            .cloned())
    }

    async fn find_payment_by_order_id(
        &self,
        order_id: &str,
    ) -> Result<Option<Payment>, LedgerError> {
        Ok(self
            .read()
            .payments
            .iter()
            .find(|p| p.razorpay_order_id.as_deref() == Some(order_id))
            .cloned())
    }

    async fn list_payments_for_subscription(
        &self,
        id: &SubscriptionId,
    ) -> Result<Vec<Payment>, LedgerError> {
        Ok(self
            .read()
            .payments
            .iter()
            .filter(|p| p.subscription_id.as_ref() == Some(id))
            .cloned()
            .collect())
    }

    async fn list_action_history(
        &self,
        id: &SubscriptionId,
    ) -> Result<Vec<ActionHistory>, LedgerError> {
        Ok(self
            .read()
            .history
            .iter()
            .filter(|h| h.subscription_id.as_ref() == Some(id))
            .cloned()
            .collect())
    }

    async fn commit(&self, unit: LedgerUnit) -> Result<(), LedgerError> {
        if self.fail_commits.load(Ordering::SeqCst) {
            return Err(LedgerError::storage("injected commit failure"));
        }
        let mut guard = self.write();
        let mut next = guard.clone();
        for op in unit.into_ops() {
            next.apply(op)?;
        }
        *guard = next;
        Ok(())
    }
}
