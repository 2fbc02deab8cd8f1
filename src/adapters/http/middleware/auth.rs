//! Caller identity extractor for axum.
//!
//! Authentication happens upstream. The auth collaborator forwards the
//! verified identity as two headers:
//!
//! ```text
//! x-user-id:   <user id>
//! x-user-role: ADMIN | FRANCHISE_OWNER | SERVICE_AGENT | CUSTOMER
//! ```
//!
//! `RequireAuth` turns them into an `AuthenticatedUser`. A missing header or
//! an unknown role is a 401; role checks per command happen in the
//! application layer and surface as 403.
//!
//! ```ignore
//! async fn handler(RequireAuth(user): RequireAuth) -> impl IntoResponse {
//!     format!("Hello, {}!", user.id)
//! }
//! ```

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};

use crate::adapters::http::error::ErrorResponse;
use crate::domain::foundation::{AuthenticatedUser, ErrorCode, UserId, UserRole};

pub const USER_ID_HEADER: &str = "x-user-id";
pub const USER_ROLE_HEADER: &str = "x-user-role";

/// Extractor that requires an authenticated caller.
#[derive(Debug, Clone)]
pub struct RequireAuth(pub AuthenticatedUser);

#[async_trait]
impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        authenticated_user(&parts.headers).map(RequireAuth)
    }
}

fn authenticated_user(headers: &HeaderMap) -> Result<AuthenticatedUser, AuthRejection> {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|v| !v.is_empty())
    };

    let id = header(USER_ID_HEADER)
        .and_then(|v| UserId::new(v).ok())
        .ok_or(AuthRejection::Unauthenticated)?;
    let role: UserRole = header(USER_ROLE_HEADER)
        .ok_or(AuthRejection::Unauthenticated)?
        .parse()
        .map_err(|_| AuthRejection::UnknownRole)?;

    Ok(AuthenticatedUser::new(id, role))
}

/// Rejection when caller identity is missing or unusable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthRejection {
    Unauthenticated,
    UnknownRole,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        let message = match self {
            AuthRejection::Unauthenticated => "Authentication is required",
            AuthRejection::UnknownRole => "Unrecognised user role",
        };
        let body = ErrorResponse::new(ErrorCode::Unauthorized.to_string(), message);
        (StatusCode::UNAUTHORIZED, Json(body)).into_response()
    }
}
