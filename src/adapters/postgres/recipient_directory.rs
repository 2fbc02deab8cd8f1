//! PostgreSQL implementation of RecipientDirectory.

use async_trait::async_trait;
use sqlx::PgPool;

use crate::domain::foundation::{DomainError, FranchiseId, UserId, UserRole};
use crate::ports::RecipientDirectory;

/// Resolves recipients from the platform's `users` and `franchises` tables.
#[derive(Clone)]
pub struct PostgresRecipientDirectory {
    pool: PgPool,
}

impl PostgresRecipientDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn query_failed(context: &'static str) -> impl FnOnce(sqlx::Error) -> DomainError {
    move |e| DomainError::database(format!("{}: {}", context, e))
}

#[async_trait]
impl RecipientDirectory for PostgresRecipientDirectory {
    async fn push_token(&self, user_id: &UserId) -> Result<Option<String>, DomainError> {
        let token: Option<Option<String>> =
            sqlx::query_scalar("SELECT push_token FROM users WHERE id = $1")
                .bind(user_id.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(query_failed("Failed to load push token"))?;

        Ok(token.flatten().filter(|t| !t.trim().is_empty()))
    }

    async fn franchise_owner(
        &self,
        franchise_id: &FranchiseId,
    ) -> Result<Option<UserId>, DomainError> {
        let owner: Option<Option<String>> =
            sqlx::query_scalar("SELECT owner_id FROM franchises WHERE id = $1")
                .bind(franchise_id.as_str())
                .fetch_optional(&self.pool)
                .await
                .map_err(query_failed("Failed to load franchise owner"))?;

        owner
            .flatten()
            .map(|id| UserId::new(id).map_err(DomainError::from))
            .transpose()
    }

    async fn admins(&self) -> Result<Vec<UserId>, DomainError> {
        let ids: Vec<String> = sqlx::query_scalar("SELECT id FROM users WHERE role = $1 ORDER BY id")
            .bind(UserRole::Admin.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(query_failed("Failed to list admins"))?;

        ids.into_iter()
            .map(|id| UserId::new(id).map_err(DomainError::from))
            .collect()
    }
}
