//! PostgreSQL adapters - Database implementations for the ledger ports.
//!
//! - `PostgresLedgerStore` - Subscriptions, payments and action history
//! - `PostgresInstallationReader` - Installation request lookups
//! - `PostgresRecipientDirectory` - Push tokens, franchise owners and admins

mod installation_reader;
mod ledger_store;
mod recipient_directory;

pub use installation_reader::PostgresInstallationReader;
pub use ledger_store::PostgresLedgerStore;
pub use recipient_directory::PostgresRecipientDirectory;
