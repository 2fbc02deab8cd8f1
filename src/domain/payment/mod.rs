//! Payment domain - ledger rows for money received or expected.

mod entity;
mod status;

pub use entity::{NewPayment, Payment, PaymentMethod, PaymentType};
pub use status::PaymentStatus;
