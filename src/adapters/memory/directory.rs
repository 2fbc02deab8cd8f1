//! In-memory installation and recipient lookups.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};

use crate::domain::foundation::{DomainError, FranchiseId, InstallationRequestId, UserId};
use crate::domain::installation::InstallationRequest;
use crate::ports::{InstallationReader, RecipientDirectory};

/// Installation requests held in memory.
#[derive(Debug, Default)]
pub struct InMemoryInstallations {
    requests: RwLock<HashMap<InstallationRequestId, InstallationRequest>>,
}

impl InMemoryInstallations {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, request: InstallationRequest) {
        self.requests
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(request.id, request);
    }
}

#[async_trait]
impl InstallationReader for InMemoryInstallations {
    async fn find_by_id(
        &self,
        id: &InstallationRequestId,
    ) -> Result<Option<InstallationRequest>, DomainError> {
        Ok(self
            .requests
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned())
    }
}

#[derive(Debug, Default)]
struct DirectoryState {
    push_tokens: HashMap<UserId, String>,
    franchise_owners: HashMap<FranchiseId, UserId>,
    admins: Vec<UserId>,
}

/// Notification recipients held in memory.
#[derive(Debug, Default)]
pub struct InMemoryRecipients {
    state: RwLock<DirectoryState>,
}

impl InMemoryRecipients {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_push_token(self, user_id: UserId, token: impl Into<String>) -> Self {
        self.write().push_tokens.insert(user_id, token.into());
        self
    }

    pub fn with_franchise_owner(self, franchise_id: FranchiseId, owner: UserId) -> Self {
        self.write().franchise_owners.insert(franchise_id, owner);
        self
    }

    pub fn with_admin(self, admin: UserId) -> Self {
        self.write().admins.push(admin);
        self
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, DirectoryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> std::sync::RwLockWriteGuard<'_, DirectoryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl RecipientDirectory for InMemoryRecipients {
    async fn push_token(&self, user_id: &UserId) -> Result<Option<String>, DomainError> {
        Ok(self.read().push_tokens.get(user_id).cloned())
    }

    async fn franchise_owner(
        &self,
        franchise_id: &FranchiseId,
    ) -> Result<Option<UserId>, DomainError> {
        Ok(self.read().franchise_owners.get(franchise_id).cloned())
    }

    async fn admins(&self) -> Result<Vec<UserId>, DomainError> {
        Ok(self.read().admins.clone())
    }
}
