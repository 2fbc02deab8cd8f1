//! Ports - Interfaces for external dependencies.
//!
//! Following hexagonal architecture, ports define the contracts between
//! the domain and the outside world. Adapters implement these ports.
//!
//! ## Ledger
//!
//! - `LedgerStore` - Subscriptions, payments and action history, with atomic units
//!
//! ## Collaborators
//!
//! - `NotificationGateway` - Best-effort push delivery
//! - `RecipientDirectory` - Push tokens, franchise owners and admins
//! - `PaymentGateway` - Autopay subscription provisioning
//! - `InstallationReader` - Installation request lookups

mod installation_reader;
mod ledger_store;
mod notification_gateway;
mod payment_gateway;
mod recipient_directory;

pub use installation_reader::InstallationReader;
pub use ledger_store::{LedgerError, LedgerOp, LedgerStore, LedgerUnit};
pub use notification_gateway::{NotificationError, NotificationGateway, PushNotification};
pub use payment_gateway::{
    CreateGatewaySubscription, GatewaySubscription, PaymentGateway, PaymentGatewayError,
};
pub use recipient_directory::RecipientDirectory;
