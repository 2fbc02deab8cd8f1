//! Installation reader port (read side).

use async_trait::async_trait;

use crate::domain::foundation::{DomainError, InstallationRequestId};
use crate::domain::installation::InstallationRequest;

/// Read access to installation requests.
#[async_trait]
pub trait InstallationReader: Send + Sync {
    /// Returns `None` if no such request exists.
    async fn find_by_id(
        &self,
        id: &InstallationRequestId,
    ) -> Result<Option<InstallationRequest>, DomainError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn installation_reader_is_object_safe() {
        fn _accepts_dyn(_reader: &dyn InstallationReader) {}
    }
}
