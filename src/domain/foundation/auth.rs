//! Caller identity as handed over by the auth collaborator.
//!
//! Token validation happens upstream; by the time a request reaches the
//! lifecycle service we only see who the caller is and which role they hold.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::{UserId, ValidationError};

/// Roles recognised by the rental platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UserRole {
    Admin,
    FranchiseOwner,
    ServiceAgent,
    Customer,
}

impl UserRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "ADMIN",
            UserRole::FranchiseOwner => "FRANCHISE_OWNER",
            UserRole::ServiceAgent => "SERVICE_AGENT",
            UserRole::Customer => "CUSTOMER",
        }
    }

    /// Staff roles can read any subscription.
    pub fn is_staff(&self) -> bool {
        !matches!(self, UserRole::Customer)
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "ADMIN" => Ok(UserRole::Admin),
            "FRANCHISE_OWNER" => Ok(UserRole::FranchiseOwner),
            "SERVICE_AGENT" => Ok(UserRole::ServiceAgent),
            "CUSTOMER" => Ok(UserRole::Customer),
            other => Err(ValidationError::invalid_format(
                "role",
                format!("unknown role '{}'", other),
            )),
        }
    }
}

/// Authenticated caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthenticatedUser {
    pub id: UserId,
    pub role: UserRole,
}

impl AuthenticatedUser {
    pub fn new(id: UserId, role: UserRole) -> Self {
        Self { id, role }
    }

    /// True if the caller holds one of `roles`.
    pub fn has_any_role(&self, roles: &[UserRole]) -> bool {
        roles.contains(&self.role)
    }
}
