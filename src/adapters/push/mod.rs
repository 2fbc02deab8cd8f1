//! Push notification adapters.
//!
//! - `ExpoPushSender` - Delivers through the Expo push HTTP API
//! - `LoggingPushSender` - Logs instead of sending (dev mode, disabled push)

mod expo;
mod logging;

pub use expo::ExpoPushSender;
pub use logging::LoggingPushSender;
