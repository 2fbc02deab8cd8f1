//! Recipient directory port.
//!
//! Resolves who should hear about a ledger change and which device token
//! reaches them. Backed by the user tables owned by the wider platform.

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, FranchiseId, UserId};

/// Lookup of notification recipients.
#[async_trait]
pub trait RecipientDirectory: Send + Sync {
    /// Registered push token for a user, if any.
    async fn push_token(&self, user_id: &UserId) -> Result<Option<String>, DomainError>;

    /// Owner of a franchise, if the franchise has one.
    async fn franchise_owner(&self, franchise_id: &FranchiseId)
        -> Result<Option<UserId>, DomainError>;

    /// All platform admins.
    async fn admins(&self) -> Result<Vec<UserId>, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recipient_directory_is_object_safe() {
        fn _accepts_dyn(_dir: &dyn RecipientDirectory) {}
    }
}
