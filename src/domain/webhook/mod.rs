//! Webhook domain - Razorpay event parsing, signature checks and outcomes.

mod errors;
mod event;
mod verifier;

pub use errors::WebhookError;
pub use event::{PaymentEntity, RazorpayEvent, SubscriptionEntity};
pub use verifier::{compute_signature, verify_signature, RazorpaySignatureVerifier};

/// Header carrying the hex HMAC of the body.
pub const SIGNATURE_HEADER: &str = "x-razorpay-signature";

/// How a verified event was handled. Every variant is acknowledged with 200.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// A ledger change was committed.
    Applied,
    /// Redelivery of something already recorded. Nothing written.
    AlreadyProcessed,
    /// The gateway id has no local counterpart. Nothing written.
    NotFoundLocal,
    /// Not actionable from the current local state. Nothing written.
    Ignored,
    /// Known event that needs no ledger change, or an unhandled type.
    Acknowledged,
}

impl WebhookOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            WebhookOutcome::Applied => "applied",
            WebhookOutcome::AlreadyProcessed => "already_processed",
            WebhookOutcome::NotFoundLocal => "not_found_local",
            WebhookOutcome::Ignored => "ignored",
            WebhookOutcome::Acknowledged => "acknowledged",
        }
    }
}
