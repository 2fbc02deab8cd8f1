//! Customer-facing subscription identifier.

use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::domain::foundation::ValidationError;

const PREFIX: &str = "CN";
const BODY_LEN: usize = 8;
const ALPHABET: &[u8; 36] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

/// `CN` followed by eight uppercase alphanumerics, e.g. `CN7QK2M9XA`.
///
/// Assigned once at creation and never changed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConnectId(String);

impl ConnectId {
    /// Generates a fresh id from random uuid bytes.
    pub fn generate() -> Self {
        let bytes = Uuid::new_v4().into_bytes();
        let body: String = bytes
            .iter()
            .take(BODY_LEN)
            .map(|b| ALPHABET[(*b as usize) % ALPHABET.len()] as char)
            .collect();
        Self(format!("{}{}", PREFIX, body))
    }

    /// Parses a stored value, checking the format.
    pub fn parse(value: impl Into<String>) -> Result<Self, ValidationError> {
        let value = value.into();
        let body = value
            .strip_prefix(PREFIX)
            .ok_or_else(|| ValidationError::invalid_format("connect_id", "must start with CN"))?;
        if body.len() != BODY_LEN
            || !body
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
        {
            return Err(ValidationError::invalid_format(
                "connect_id",
                "expected 8 uppercase alphanumeric characters after CN",
            ));
        }
        Ok(Self(value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConnectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
