//! Billing period arithmetic.
//!
//! One billing interval is one calendar month. The automated charge path and
//! the manual settlement path both advance through [`BillingPeriod::advance`]
//! so they always land on the same dates.

use crate::domain::foundation::Timestamp;
use chrono::Datelike;
use serde::{Deserialize, Serialize};

/// Months covered by one charge.
pub const BILLING_INTERVAL_MONTHS: u32 = 1;

/// The `[start, end)` window the current charge pays for, plus the date the
/// next charge is due.
///
/// # Invariants
///
/// - `end > start`
/// - `next_payment_date >= end`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BillingPeriod {
    pub start: Timestamp,
    pub end: Timestamp,
    pub next_payment_date: Timestamp,
}

impl BillingPeriod {
    /// First period of a new subscription starting at `start`.
    pub fn first(start: Timestamp) -> Self {
        let end = start.add_months(BILLING_INTERVAL_MONTHS);
        Self {
            start,
            end,
            next_payment_date: end,
        }
    }

    /// Period after one more interval has been paid for.
    ///
    /// The new window starts where the old one ended and ends on the first
    /// `anchor + n months` after that, so a subscription that started on the
    /// 31st returns to the 31st after a short month. The next payment date
    /// moves forward by one interval but never falls before the new end.
    pub fn advance(&self, anchor: Timestamp) -> Self {
        let start = self.end;
        let end = anchored_after(anchor, start);
        let shifted = self.next_payment_date.add_months(BILLING_INTERVAL_MONTHS);
        let next_payment_date = if shifted < end { end } else { shifted };
        Self {
            start,
            end,
            next_payment_date,
        }
    }
}

/// First `anchor + n months` strictly after `after`.
fn anchored_after(anchor: Timestamp, after: Timestamp) -> Timestamp {
    let (a, b) = (anchor.as_datetime(), after.as_datetime());
    let months = (b.year() - a.year()) * 12 + b.month() as i32 - a.month() as i32;
    let from = u32::try_from(months).unwrap_or(0);
    (from..=from + 2)
        .map(|n| anchor.add_months(n))
        .find(|candidate| *candidate > after)
        .unwrap_or_else(|| after.add_months(BILLING_INTERVAL_MONTHS))
}
