//! Installation requests, as far as the subscription ledger needs them.
//!
//! The installation workflow itself lives elsewhere; subscriptions only read
//! whether a request has completed and whom it belongs to.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::foundation::{
    FranchiseId, InstallationRequestId, ProductId, UserId, ValidationError,
};

/// Progress of an installation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum InstallationStatus {
    Requested,
    Scheduled,
    InProgress,
    Completed,
    Cancelled,
}

impl InstallationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            InstallationStatus::Requested => "REQUESTED",
            InstallationStatus::Scheduled => "SCHEDULED",
            InstallationStatus::InProgress => "IN_PROGRESS",
            InstallationStatus::Completed => "COMPLETED",
            InstallationStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        match value {
            "REQUESTED" => Ok(InstallationStatus::Requested),
            "SCHEDULED" => Ok(InstallationStatus::Scheduled),
            "IN_PROGRESS" => Ok(InstallationStatus::InProgress),
            "COMPLETED" => Ok(InstallationStatus::Completed),
            "CANCELLED" => Ok(InstallationStatus::Cancelled),
            other => Err(ValidationError::invalid_format(
                "installation_status",
                format!("unknown installation status '{}'", other),
            )),
        }
    }
}

impl fmt::Display for InstallationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read model of an installation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstallationRequest {
    pub id: InstallationRequestId,
    pub customer_id: UserId,
    pub product_id: ProductId,
    pub franchise_id: FranchiseId,
    pub status: InstallationStatus,
}

impl InstallationRequest {
    /// Only a completed installation can start billing.
    pub fn is_completed(&self) -> bool {
        self.status == InstallationStatus::Completed
    }
}
