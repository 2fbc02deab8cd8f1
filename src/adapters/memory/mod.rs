//! In-memory adapters for tests and database-less development runs.

mod directory;
mod ledger;

pub use directory::{InMemoryInstallations, InMemoryRecipients};
pub use ledger::InMemoryLedger;
