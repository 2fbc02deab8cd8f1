//! Subscription status state machine.
//!
//! Shared by the webhook reconcilers and the lifecycle service. Both sides
//! validate every status write through this table.

use crate::domain::foundation::{StateMachine, ValidationError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Rental subscription status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SubscriptionStatus {
    /// Created but not yet billing. Rows created by the lifecycle service
    /// start ACTIVE; this state exists for imported or gateway-first rows.
    Pending,

    /// Billing normally.
    Active,

    /// Billing suspended by staff or by the gateway (paused / halted).
    Paused,

    /// Ended early. Irreversible.
    Terminated,

    /// Ran to the end of its term. Irreversible.
    Expired,
}

impl SubscriptionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionStatus::Pending => "PENDING",
            SubscriptionStatus::Active => "ACTIVE",
            SubscriptionStatus::Paused => "PAUSED",
            SubscriptionStatus::Terminated => "TERMINATED",
            SubscriptionStatus::Expired => "EXPIRED",
        }
    }
}

impl StateMachine for SubscriptionStatus {
    fn valid_transitions(&self) -> Vec<Self> {
        use SubscriptionStatus::*;
        match self {
            Pending => vec![Active, Terminated],
            Active => vec![Paused, Terminated, Expired],
            Paused => vec![Active, Terminated, Expired],
            Terminated => vec![],
            Expired => vec![],
        }
    }
}

impl fmt::Display for SubscriptionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SubscriptionStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "PENDING" => Ok(SubscriptionStatus::Pending),
            "ACTIVE" => Ok(SubscriptionStatus::Active),
            "PAUSED" => Ok(SubscriptionStatus::Paused),
            "TERMINATED" => Ok(SubscriptionStatus::Terminated),
            "EXPIRED" => Ok(SubscriptionStatus::Expired),
            other => Err(ValidationError::invalid_format(
                "status",
                format!("unknown subscription status '{}'", other),
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use SubscriptionStatus::*;

    #[test]
    fn active_can_pause_terminate_and_expire() {
        assert!(Active.can_transition_to(&Paused));
        assert!(Active.can_transition_to(&Terminated));
        assert!(Active.can_transition_to(&Expired));
    }

    #[test]
    fn paused_can_resume() {
        assert_eq!(Paused.transition_to(Active), Ok(Active));
    }

    #[test]
    fn active_cannot_move_to_active() {
        assert!(Active.transition_to(Active).is_err());
    }

    #[test]
    fn pending_cannot_pause() {
        assert!(!Pending.can_transition_to(&Paused));
    }

    #[test]
    fn terminated_and_expired_are_terminal() {
        assert!(Terminated.is_terminal());
        assert!(Expired.is_terminal());
        assert!(!Paused.is_terminal());
    }

    #[test]
    fn nothing_leaves_a_terminal_state() {
        for target in [Pending, Active, Paused, Terminated, Expired] {
            assert!(!Terminated.can_transition_to(&target));
            assert!(!Expired.can_transition_to(&target));
        }
    }

    #[test]
    fn serializes_screaming_snake_case() {
        assert_eq!(serde_json::to_string(&Terminated).unwrap(), "\"TERMINATED\"");
    }

    #[test]
    fn parses_case_insensitively() {
        assert_eq!("paused".parse::<SubscriptionStatus>().unwrap(), Paused);
        assert!("HALTED".parse::<SubscriptionStatus>().is_err());
    }
}
