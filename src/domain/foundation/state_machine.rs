//! State machine trait for status enums.
//!
//! Subscription and payment statuses both implement this so that the webhook
//! reconcilers and the lifecycle service validate transitions through the
//! same table.

use thiserror::Error;

/// A transition the state machine does not allow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("cannot transition from {from:?} to {to:?}")]
pub struct TransitionRejected<S: std::fmt::Debug> {
    pub from: S,
    pub to: S,
}

/// Trait for status enums that represent state machines.
///
/// Implementors list their edges in `valid_transitions`; everything else
/// is derived from that table.
pub trait StateMachine: Sized + Copy + PartialEq + std::fmt::Debug {
    /// Returns all valid target states from current state.
    fn valid_transitions(&self) -> Vec<Self>;

    /// Returns true if transition from self to target is valid.
    fn can_transition_to(&self, target: &Self) -> bool {
        self.valid_transitions().contains(target)
    }

    /// Performs transition with validation, returning error if invalid.
    fn transition_to(&self, target: Self) -> Result<Self, TransitionRejected<Self>> {
        if self.can_transition_to(&target) {
            Ok(target)
        } else {
            Err(TransitionRejected {
                from: *self,
                to: target,
            })
        }
    }

    /// Checks if current state is terminal (no valid outgoing transitions).
    fn is_terminal(&self) -> bool {
        self.valid_transitions().is_empty()
    }
}
