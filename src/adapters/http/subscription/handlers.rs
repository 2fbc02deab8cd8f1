//! HTTP handlers for subscription endpoints.
//!
//! Each handler turns a request body into a command, runs it on the
//! lifecycle service and maps the result to a response DTO.

use std::sync::Arc;

use axum::extract::State;
use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use uuid::Uuid;

use crate::adapters::http::error::ApiError;
use crate::adapters::http::extract::{ApiJson, ApiPath, OptionalJson};
use crate::adapters::http::middleware::RequireAuth;
use crate::application::handlers::{CreateSubscriptionCommand, SubscriptionLifecycleService};
use crate::domain::foundation::SubscriptionId;

use super::dto::{
    CreateSubscriptionRequest, MarkPaymentCompletedRequest, MarkPaymentCompletedResponse,
    SubscriptionDetailResponse, SubscriptionResponse, TerminateSubscriptionRequest,
    TransitionRequest, UpdateSubscriptionRequest, UpdateSubscriptionResponse,
};

// ════════════════════════════════════════════════════════════════════════════════
// Application State
// ════════════════════════════════════════════════════════════════════════════════

/// Shared state for the subscription routes.
#[derive(Clone)]
pub struct SubscriptionAppState {
    pub service: Arc<SubscriptionLifecycleService>,
}

impl SubscriptionAppState {
    pub fn new(service: Arc<SubscriptionLifecycleService>) -> Self {
        Self { service }
    }
}

// ════════════════════════════════════════════════════════════════════════════════
// Query Handlers
// ════════════════════════════════════════════════════════════════════════════════

/// GET /api/subscriptions/{id}
pub async fn get_subscription(
    State(state): State<SubscriptionAppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<Uuid>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .service
        .get(&user, SubscriptionId::from_uuid(id))
        .await?;
    Ok(Json(SubscriptionDetailResponse::from(result)))
}

// ════════════════════════════════════════════════════════════════════════════════
// Command Handlers
// ════════════════════════════════════════════════════════════════════════════════

/// POST /api/subscriptions
pub async fn create_subscription(
    State(state): State<SubscriptionAppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(request): ApiJson<CreateSubscriptionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let cmd = CreateSubscriptionCommand::try_from(request)?;
    let subscription = state.service.create(&user, cmd).await?;
    Ok((
        StatusCode::CREATED,
        Json(SubscriptionResponse::from(subscription)),
    ))
}

/// PATCH /api/subscriptions/{id}
pub async fn update_subscription(
    State(state): State<SubscriptionAppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<UpdateSubscriptionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let cmd = request.into_command(SubscriptionId::from_uuid(id))?;
    let result = state.service.update(&user, cmd).await?;
    Ok(Json(UpdateSubscriptionResponse::from(result)))
}

/// POST /api/subscriptions/{id}/pause
pub async fn pause_subscription(
    State(state): State<SubscriptionAppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<Uuid>,
    OptionalJson(body): OptionalJson<TransitionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let subscription = state
        .service
        .pause(&user, SubscriptionId::from_uuid(id), body.reason)
        .await?;
    Ok(Json(SubscriptionResponse::from(subscription)))
}

/// POST /api/subscriptions/{id}/resume
pub async fn resume_subscription(
    State(state): State<SubscriptionAppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<Uuid>,
    OptionalJson(body): OptionalJson<TransitionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let subscription = state
        .service
        .resume(&user, SubscriptionId::from_uuid(id), body.reason)
        .await?;
    Ok(Json(SubscriptionResponse::from(subscription)))
}

/// POST /api/subscriptions/{id}/terminate
pub async fn terminate_subscription(
    State(state): State<SubscriptionAppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<Uuid>,
    OptionalJson(request): OptionalJson<TerminateSubscriptionRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let subscription = state
        .service
        .terminate(&user, request.into_command(SubscriptionId::from_uuid(id)))
        .await?;
    Ok(Json(SubscriptionResponse::from(subscription)))
}

/// POST /api/subscriptions/{id}/payments
pub async fn mark_payment_completed(
    State(state): State<SubscriptionAppState>,
    RequireAuth(user): RequireAuth,
    ApiPath(id): ApiPath<Uuid>,
    ApiJson(request): ApiJson<MarkPaymentCompletedRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let cmd = request.into_command(SubscriptionId::from_uuid(id))?;
    let result = state.service.mark_payment_completed(&user, cmd).await?;
    Ok((
        StatusCode::CREATED,
        Json(MarkPaymentCompletedResponse::from(result)),
    ))
}
