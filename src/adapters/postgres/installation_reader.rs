//! PostgreSQL implementation of InstallationReader.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::foundation::{
    DomainError, FranchiseId, InstallationRequestId, ProductId, UserId,
};
use crate::domain::installation::{InstallationRequest, InstallationStatus};
use crate::ports::InstallationReader;

/// Reads installation requests owned by the field-service side of the platform.
#[derive(Clone)]
pub struct PostgresInstallationReader {
    pool: PgPool,
}

impl PostgresInstallationReader {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct InstallationRow {
    id: Uuid,
    customer_id: String,
    product_id: String,
    franchise_id: String,
    status: String,
}

impl TryFrom<InstallationRow> for InstallationRequest {
    type Error = DomainError;

    fn try_from(row: InstallationRow) -> Result<Self, Self::Error> {
        Ok(InstallationRequest {
            id: InstallationRequestId::from_uuid(row.id),
            customer_id: UserId::new(row.customer_id)?,
            product_id: ProductId::new(row.product_id)?,
            franchise_id: FranchiseId::new(row.franchise_id)?,
            status: InstallationStatus::parse(&row.status)?,
        })
    }
}

#[async_trait]
impl InstallationReader for PostgresInstallationReader {
    async fn find_by_id(
        &self,
        id: &InstallationRequestId,
    ) -> Result<Option<InstallationRequest>, DomainError> {
        let row: Option<InstallationRow> = sqlx::query_as(
            r#"
            SELECT id, customer_id, product_id, franchise_id, status
            FROM installation_requests
            WHERE id = $1
            "#,
        )
        .bind(id.as_uuid())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| DomainError::database(format!("Failed to load installation request: {}", e)))?;

        row.map(InstallationRequest::try_from).transpose()
    }
}
