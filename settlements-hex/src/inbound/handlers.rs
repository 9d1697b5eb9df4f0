//! HTTP request handlers.
//!
//! Boundary marshaling only: parse path/query/body, call the service,
//! translate errors. All protocol logic lives in the service layer.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Deserialize;

use settlements_types::{
    AppError, PaymentRepository, PlanAudience, PlanResponse, ServicePaymentId,
    dto::{
        CompleteServicePaymentRequest, CompleteUpgradeRequest, CreateServiceCheckoutRequest,
        CreateSubscriptionCheckoutRequest, UpgradePlanRequest,
    },
};

use crate::SettlementService;

/// Application state shared across handlers.
pub struct AppState<R: PaymentRepository> {
    pub service: SettlementService<R>,
}

/// Wrapper to implement IntoResponse for AppError (orphan rule workaround).
pub struct ApiError(pub AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, body) = match &self.0 {
            AppError::BadRequest(msg) => (
                StatusCode::BAD_REQUEST,
                serde_json::json!({ "error": msg }),
            ),
            AppError::Forbidden(msg) => (
                StatusCode::FORBIDDEN,
                serde_json::json!({ "error": msg }),
            ),
            AppError::NotFound(msg) => (
                StatusCode::NOT_FOUND,
                serde_json::json!({ "error": msg }),
            ),
            AppError::GatewayDeclined { status, message } => (
                StatusCode::BAD_REQUEST,
                serde_json::json!({ "error": message, "gateway_status": status }),
            ),
            AppError::DependencyUnavailable {
                dependency,
                message,
            } => (
                StatusCode::SERVICE_UNAVAILABLE,
                serde_json::json!({
                    "error": message,
                    "dependency": dependency,
                    "retryable": true,
                }),
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                serde_json::json!({ "error": msg }),
            ),
        };

        let mut body = body;
        body["code"] = serde_json::json!(status.as_u16());
        (status, Json(body)).into_response()
    }
}

/// Health check endpoint.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy" }))
}

// ─────────────────────────────────────────────────────────────────────────────
// Subscription payments
// ─────────────────────────────────────────────────────────────────────────────

/// Open a checkout session for a subscription plan.
#[tracing::instrument(skip(state, req), fields(user_id = req.user_id, plan_id = req.plan_id))]
pub async fn create_subscription_checkout<R: PaymentRepository>(
    State(state): State<Arc<AppState<R>>>,
    Json(req): Json<CreateSubscriptionCheckoutRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let resp = state.service.create_subscription_checkout(req).await?;
    Ok(Json(resp))
}

/// Verify a checkout session against the gateway.
#[tracing::instrument(skip(state), fields(session_id = %session_id))]
pub async fn verify_checkout<R: PaymentRepository>(
    State(state): State<Arc<AppState<R>>>,
    Path(session_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let resp = state.service.verify_checkout(&session_id).await?;
    Ok(Json(resp))
}

/// Complete a plan upgrade after gateway checkout success.
#[tracing::instrument(skip(state, req), fields(session_id = %req.session_id))]
pub async fn complete_upgrade<R: PaymentRepository>(
    State(state): State<Arc<AppState<R>>>,
    Json(req): Json<CompleteUpgradeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state.service.complete_plan_upgrade(&req.session_id).await?;
    Ok(Json(outcome))
}

/// Refund a completed subscription payment.
#[tracing::instrument(skip(state, req), fields(session_id = %req.session_id))]
pub async fn refund_subscription<R: PaymentRepository>(
    State(state): State<Arc<AppState<R>>>,
    Json(req): Json<CompleteUpgradeRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state
        .service
        .refund_subscription_payment(&req.session_id)
        .await?;
    Ok(Json(outcome))
}

/// Check the gateway-side status of a transaction.
#[tracing::instrument(skip(state))]
pub async fn payment_status<R: PaymentRepository>(
    State(state): State<Arc<AppState<R>>>,
    Path((provider, transaction_ref)): Path<(String, String)>,
) -> Result<impl IntoResponse, ApiError> {
    let resp = state
        .service
        .get_payment_status(&provider, &transaction_ref)
        .await?;
    Ok(Json(resp))
}

// ─────────────────────────────────────────────────────────────────────────────
// Service payments
// ─────────────────────────────────────────────────────────────────────────────

/// Open a checkout session paying for a completed work order.
#[tracing::instrument(skip(state, req), fields(user_id = req.user_id, work_order_id = req.work_order_id))]
pub async fn create_service_checkout<R: PaymentRepository>(
    State(state): State<Arc<AppState<R>>>,
    Json(req): Json<CreateServiceCheckoutRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let resp = state.service.create_service_checkout(req).await?;
    Ok(Json(resp))
}

/// Complete a service payment after gateway checkout success.
#[tracing::instrument(skip(state, req), fields(session_id = %req.session_id))]
pub async fn complete_service_payment<R: PaymentRepository>(
    State(state): State<Arc<AppState<R>>>,
    Json(req): Json<CompleteServicePaymentRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let outcome = state
        .service
        .complete_service_payment(&req.session_id)
        .await?;
    Ok(Json(outcome))
}

/// Refund a completed service payment.
#[tracing::instrument(skip(state), fields(payment_id = %id))]
pub async fn refund_service_payment<R: PaymentRepository>(
    State(state): State<Arc<AppState<R>>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id: ServicePaymentId = id
        .parse()
        .map_err(|_| AppError::BadRequest("Invalid service payment ID".into()))?;
    let outcome = state.service.refund_service_payment(id).await?;
    Ok(Json(outcome))
}

/// Get the service payment for a work order.
#[tracing::instrument(skip(state))]
pub async fn service_payment_by_work_order<R: PaymentRepository>(
    State(state): State<Arc<AppState<R>>>,
    Path(work_order_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let resp = state
        .service
        .get_service_payment_by_work_order(work_order_id)
        .await?;
    Ok(Json(resp))
}

// ─────────────────────────────────────────────────────────────────────────────
// Plans
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct PlansQuery {
    #[serde(rename = "userType")]
    pub user_type: Option<String>,
}

/// List plans for one side of the marketplace.
#[tracing::instrument(skip(state))]
pub async fn list_plans<R: PaymentRepository>(
    State(state): State<Arc<AppState<R>>>,
    Query(query): Query<PlansQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let audience = match query.user_type.as_deref() {
        Some(t) if t.eq_ignore_ascii_case("provider") => PlanAudience::Provider,
        _ => PlanAudience::Owner,
    };
    let plans = state.service.list_plans(audience).await?;
    let resources: Vec<PlanResponse> = plans.into_iter().map(Into::into).collect();
    Ok(Json(resources))
}

/// Get a plan by id.
#[tracing::instrument(skip(state))]
pub async fn get_plan<R: PaymentRepository>(
    State(state): State<Arc<AppState<R>>>,
    Path(plan_id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let plan = state.service.get_plan(plan_id).await?;
    Ok(Json(PlanResponse::from(plan)))
}

/// Upgrade a user's plan without a payment flow.
#[tracing::instrument(skip(state, req), fields(user_id = req.user_id, plan_id = req.plan_id))]
pub async fn upgrade_plan<R: PaymentRepository>(
    State(state): State<Arc<AppState<R>>>,
    Json(req): Json<UpgradePlanRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let plan = state.service.upgrade_plan(req).await?;
    Ok((StatusCode::CREATED, Json(PlanResponse::from(plan))))
}
