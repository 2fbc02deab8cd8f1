//! Money value object.
//!
//! Amounts are held as integer paise. The gateway reports minor units
//! (paise) while API clients and the catalog speak rupees; both convert
//! at the boundary through this type so the ledger never stores floats.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::ValidationError;

/// An INR amount in paise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Money(i64);

impl Money {
    pub const ZERO: Money = Money(0);

    /// Amount already expressed in paise (gateway minor units).
    pub fn from_paise(paise: i64) -> Self {
        Self(paise)
    }

    /// Whole rupees.
    pub fn from_rupees(rupees: i64) -> Self {
        Self(rupees * 100)
    }

    /// Rupee amount from an API body, rounded to the nearest paisa.
    pub fn from_major(amount: f64, field: &str) -> Result<Self, ValidationError> {
        if !amount.is_finite() {
            return Err(ValidationError::invalid_format(field, "amount must be a number"));
        }
        if amount < 0.0 {
            return Err(ValidationError::invalid_format(field, "amount cannot be negative"));
        }
        Ok(Self((amount * 100.0).round() as i64))
    }

    pub fn paise(&self) -> i64 {
        self.0
    }

    /// Rupees as a decimal for JSON responses.
    pub fn as_major(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    pub fn is_zero(&self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "INR {}.{:02}", self.0 / 100, (self.0 % 100).abs())
    }
}
