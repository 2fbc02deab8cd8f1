//! Razorpay webhook signature verification.
//!
//! Razorpay signs the exact request body with HMAC-SHA256 using the webhook
//! secret and sends the lowercase hex digest in `x-razorpay-signature`.
//! The digest must be computed over the transport bytes, never over a
//! re-serialized body.

use hmac::{Hmac, Mac};
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// Verifier for Razorpay webhook signatures.
#[derive(Clone)]
pub struct RazorpaySignatureVerifier {
    secret: SecretString,
}

impl RazorpaySignatureVerifier {
    pub fn new(secret: SecretString) -> Self {
        Self { secret }
    }

    /// Returns true if `signature` is the hex HMAC of `raw_body`.
    pub fn verify(&self, raw_body: &[u8], signature: &str) -> bool {
        verify_signature(raw_body, Some(signature), Some(self.secret.expose_secret()))
    }
}

impl std::fmt::Debug for RazorpaySignatureVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RazorpaySignatureVerifier")
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

/// Checks a received signature against the raw body.
///
/// Never panics. Returns false for a missing or blank header, a missing or
/// blank secret, or a mismatch.
pub fn verify_signature(raw_body: &[u8], received: Option<&str>, secret: Option<&str>) -> bool {
    let (Some(received), Some(secret)) = (received, secret) else {
        return false;
    };
    let received = received.trim();
    if received.is_empty() || secret.is_empty() {
        return false;
    }
    let Some(expected) = compute_signature(secret, raw_body) else {
        return false;
    };
    constant_time_compare(expected.as_bytes(), received.as_bytes())
}

/// Lowercase hex HMAC-SHA256 of `body` under `secret`.
pub fn compute_signature(secret: &str, body: &[u8]) -> Option<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).ok()?;
    mac.update(body);
    Some(hex::encode(mac.finalize().into_bytes()))
}

fn constant_time_compare(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.ct_eq(b).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "rzp_webhook_secret";
    const BODY: &[u8] = br#"{"event":"subscription.charged","payload":{}}"#;

    fn sign(secret: &str, body: &[u8]) -> String {
        compute_signature(secret, body).unwrap()
    }

    #[test]
    fn accepts_matching_signature() {
        let sig = sign(SECRET, BODY);
        assert!(verify_signature(BODY, Some(&sig), Some(SECRET)));
    }

    #[test]
    fn signature_is_lowercase_hex() {
        let sig = sign(SECRET, BODY);
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    }

    #[test]
    fn rejects_signature_from_other_secret() {
        let sig = sign("another_secret", BODY);
        assert!(!verify_signature(BODY, Some(&sig), Some(SECRET)));
    }

    #[test]
    fn rejects_when_body_bytes_differ() {
        let sig = sign(SECRET, BODY);
        let reformatted = br#"{"event": "subscription.charged", "payload": {}}"#;
        assert!(!verify_signature(reformatted, Some(&sig), Some(SECRET)));
    }

    #[test]
    fn rejects_missing_header_or_secret() {
        let sig = sign(SECRET, BODY);
        assert!(!verify_signature(BODY, None, Some(SECRET)));
        assert!(!verify_signature(BODY, Some(""), Some(SECRET)));
        assert!(!verify_signature(BODY, Some(&sig), None));
        assert!(!verify_signature(BODY, Some(&sig), Some("")));
    }

    #[test]
    fn rejects_truncated_signature() {
        let sig = sign(SECRET, BODY);
        assert!(!verify_signature(BODY, Some(&sig[..40]), Some(SECRET)));
    }

    #[test]
    fn verifier_wraps_secret() {
        let verifier = RazorpaySignatureVerifier::new(SecretString::new(SECRET.to_string()));
        assert!(verifier.verify(BODY, &sign(SECRET, BODY)));
        assert!(!format!("{:?}", verifier).contains(SECRET));
    }
}
