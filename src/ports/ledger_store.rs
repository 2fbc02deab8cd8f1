//! Ledger store port.
//!
//! The ledger is the source of truth for subscriptions, payments and the
//! action history. Writes are grouped into a [`LedgerUnit`] that commits
//! atomically: a status change and the audit row documenting it land
//! together or not at all.
//!
//! # Concurrency
//!
//! Updates carry the version the caller read. The store rejects a unit whose
//! expected version no longer matches with [`LedgerError::Conflict`], and
//! bumps the stored version by one on success. Callers reload and
//! re-evaluate their guards on conflict.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::audit::ActionHistory;
use crate::domain::foundation::{DomainError, ErrorCode, PaymentId, SubscriptionId};
use crate::domain::payment::Payment;
use crate::domain::subscription::Subscription;

/// Errors returned by the ledger store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LedgerError {
    /// The row changed since it was read.
    #[error("{entity} {id} was modified concurrently")]
    Conflict { entity: &'static str, id: String },

    /// A payment with this gateway payment id already exists.
    #[error("payment with razorpay id {0} already recorded")]
    DuplicatePayment(String),

    /// A subscription with this gateway subscription id already exists.
    #[error("subscription with razorpay id {0} already recorded")]
    DuplicateSubscription(String),

    /// Any other persistence failure.
    #[error("storage error: {0}")]
    Storage(String),
}

impl LedgerError {
    pub fn storage(message: impl Into<String>) -> Self {
        LedgerError::Storage(message.into())
    }
}

impl From<LedgerError> for DomainError {
    fn from(err: LedgerError) -> Self {
        match &err {
            LedgerError::Conflict { .. } => {
                DomainError::new(ErrorCode::ConcurrentModification, err.to_string())
            }
            _ => DomainError::database(err.to_string()),
        }
    }
}

/// One write inside a ledger unit.
#[derive(Debug, Clone, PartialEq)]
pub enum LedgerOp {
    InsertSubscription(Subscription),
    UpdateSubscription {
        subscription: Subscription,
        expected_version: i64,
    },
    InsertPayment(Payment),
    UpdatePayment {
        payment: Payment,
        expected_version: i64,
    },
    AppendActionHistory(ActionHistory),
}

/// Writes that commit together.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerUnit {
    ops: Vec<LedgerOp>,
}

impl LedgerUnit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_subscription(mut self, subscription: Subscription) -> Self {
        self.ops.push(LedgerOp::InsertSubscription(subscription));
        self
    }

    /// Updates the row, expecting it still to be at `subscription.version`.
    pub fn update_subscription(mut self, subscription: Subscription) -> Self {
        let expected_version = subscription.version;
        self.ops.push(LedgerOp::UpdateSubscription {
            subscription,
            expected_version,
        });
        self
    }

    pub fn insert_payment(mut self, payment: Payment) -> Self {
        self.ops.push(LedgerOp::InsertPayment(payment));
        self
    }

    /// Updates the row, expecting it still to be at `payment.version`.
    pub fn update_payment(mut self, payment: Payment) -> Self {
        let expected_version = payment.version;
        self.ops.push(LedgerOp::UpdatePayment {
            payment,
            expected_version,
        });
        self
    }

    pub fn append(mut self, entry: ActionHistory) -> Self {
        self.ops.push(LedgerOp::AppendActionHistory(entry));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn ops(&self) -> &[LedgerOp] {
        &self.ops
    }

    pub fn into_ops(self) -> Vec<LedgerOp> {
        self.ops
    }
}

/// Persistence port for the subscription ledger.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    async fn find_subscription_by_id(
        &self,
        id: &SubscriptionId,
    ) -> Result<Option<Subscription>, LedgerError>;

    /// Looks up by `razorpay_subscription_id`.
    async fn find_subscription_by_gateway_id(
        &self,
        gateway_id: &str,
    ) -> Result<Option<Subscription>, LedgerError>;

    async fn find_payment_by_id(&self, id: &PaymentId) -> Result<Option<Payment>, LedgerError>;

    /// Looks up by `razorpay_payment_id`.
    async fn find_payment_by_gateway_id(
        &self,
        gateway_id: &str,
    ) -> Result<Option<Payment>, LedgerError>;

    /// Looks up by `razorpay_order_id`.
    async fn find_payment_by_order_id(&self, order_id: &str)
        -> Result<Option<Payment>, LedgerError>;

    /// Payments for a subscription, oldest first.
    async fn list_payments_for_subscription(
        &self,
        id: &SubscriptionId,
    ) -> Result<Vec<Payment>, LedgerError>;

    /// Audit rows for a subscription, oldest first.
    async fn list_action_history(
        &self,
        id: &SubscriptionId,
    ) -> Result<Vec<ActionHistory>, LedgerError>;

    /// Applies every op in `unit` atomically.
    ///
    /// # Errors
    ///
    /// - `Conflict` if an update's expected version is stale
    /// - `DuplicatePayment` if an inserted payment reuses a gateway payment id
    /// - `DuplicateSubscription` if a gateway subscription id is reused
    /// - `Storage` on any other failure
    async fn commit(&self, unit: LedgerUnit) -> Result<(), LedgerError>;
}
