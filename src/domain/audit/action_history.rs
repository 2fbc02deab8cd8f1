//! Action history rows and who performed them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::domain::foundation::{
    ActionHistoryId, AuthenticatedUser, PaymentId, SubscriptionId, Timestamp, UserRole,
};

/// `performed_by` value recorded for gateway-driven changes.
pub const SYSTEM_ACTOR: &str = "system";

/// Domain event documented by an audit row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActionType {
    PaymentCompleted,
    PaymentFailed,
    SubscriptionCreated,
    SubscriptionPaused,
    SubscriptionResumed,
    SubscriptionTerminated,
    SubscriptionExpired,
    SubscriptionUpdated,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActionType::PaymentCompleted => "PAYMENT_COMPLETED",
            ActionType::PaymentFailed => "PAYMENT_FAILED",
            ActionType::SubscriptionCreated => "SUBSCRIPTION_CREATED",
            ActionType::SubscriptionPaused => "SUBSCRIPTION_PAUSED",
            ActionType::SubscriptionResumed => "SUBSCRIPTION_RESUMED",
            ActionType::SubscriptionTerminated => "SUBSCRIPTION_TERMINATED",
            ActionType::SubscriptionExpired => "SUBSCRIPTION_EXPIRED",
            ActionType::SubscriptionUpdated => "SUBSCRIPTION_UPDATED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Some(match value {
            "PAYMENT_COMPLETED" => ActionType::PaymentCompleted,
            "PAYMENT_FAILED" => ActionType::PaymentFailed,
            "SUBSCRIPTION_CREATED" => ActionType::SubscriptionCreated,
            "SUBSCRIPTION_PAUSED" => ActionType::SubscriptionPaused,
            "SUBSCRIPTION_RESUMED" => ActionType::SubscriptionResumed,
            "SUBSCRIPTION_TERMINATED" => ActionType::SubscriptionTerminated,
            "SUBSCRIPTION_EXPIRED" => ActionType::SubscriptionExpired,
            "SUBSCRIPTION_UPDATED" => ActionType::SubscriptionUpdated,
            _ => return None,
        })
    }
}

impl fmt::Display for ActionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Who caused a change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    /// The gateway, via a webhook. Recorded as `system` with role ADMIN.
    System,
    /// An authenticated API caller.
    User(AuthenticatedUser),
}

impl Actor {
    pub fn performed_by(&self) -> String {
        match self {
            Actor::System => SYSTEM_ACTOR.to_string(),
            Actor::User(user) => user.id.to_string(),
        }
    }

    pub fn role(&self) -> UserRole {
        match self {
            Actor::System => UserRole::Admin,
            Actor::User(user) => user.role,
        }
    }
}

/// Immutable audit record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ActionHistory {
    pub id: ActionHistoryId,
    pub payment_id: Option<PaymentId>,
    pub subscription_id: Option<SubscriptionId>,
    pub action_type: ActionType,
    pub from_status: Option<String>,
    pub to_status: Option<String>,
    pub performed_by: String,
    pub performed_by_role: UserRole,
    pub comment: Option<String>,
    pub metadata: Map<String, Value>,
    pub created_at: Timestamp,
}

impl ActionHistory {
    /// Starts a row for `action_type` performed by `actor`.
    pub fn new(action_type: ActionType, actor: &Actor, now: Timestamp) -> Self {
        Self {
            id: ActionHistoryId::new(),
            payment_id: None,
            subscription_id: None,
            action_type,
            from_status: None,
            to_status: None,
            performed_by: actor.performed_by(),
            performed_by_role: actor.role(),
            comment: None,
            metadata: Map::new(),
            created_at: now,
        }
    }

    pub fn for_subscription(mut self, id: SubscriptionId) -> Self {
        self.subscription_id = Some(id);
        self
    }

    pub fn for_payment(mut self, id: PaymentId) -> Self {
        self.payment_id = Some(id);
        self
    }

    pub fn with_statuses(mut self, from: Option<impl fmt::Display>, to: impl fmt::Display) -> Self {
        self.from_status = from.map(|s| s.to_string());
        self.to_status = Some(to.to_string());
        self
    }

    pub fn with_comment(mut self, comment: Option<impl Into<String>>) -> Self {
        self.comment = comment.map(Into::into).filter(|c: &String| !c.trim().is_empty());
        self
    }

    /// Adds a metadata entry. `None` values are skipped.
    pub fn with_metadata(mut self, key: &str, value: impl Into<Value>) -> Self {
        let value = value.into();
        if !value.is_null() {
            self.metadata.insert(key.to_string(), value);
        }
        self
    }
}
