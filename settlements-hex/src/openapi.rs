//! OpenAPI specification and documentation.

#![allow(dead_code)] // Path functions are only used by utoipa for documentation generation

use settlements_types::domain::{Currency, PaymentId, PaymentStatus, ServicePaymentId};
use settlements_types::dto::{
    CompleteServicePaymentRequest, CompleteUpgradeRequest, CounterpartyKind,
    CreateServiceCheckoutRequest, CreateSubscriptionCheckoutRequest, DownstreamStatus,
    PaymentStatusResponse, PlanResponse, RefundOutcome, ServiceCheckoutResponse,
    ServicePaymentOutcome, ServicePaymentResponse, SubscriptionCheckoutResponse, UpgradeOutcome,
    UpgradePlanRequest, VerifySessionResponse, WorkOrderSummary,
};
use settlements_types::ports::NormalizedStatus;
use utoipa::OpenApi;

// Dummy functions to generate path documentation
// These are not the actual handlers, just for OpenAPI path generation

/// Health check endpoint
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Service is healthy", body = inline(serde_json::Value), example = json!({"status": "healthy"}))
    )
)]
async fn health() {}

/// Create a checkout session for a subscription plan
#[utoipa::path(
    post,
    path = "/api/v1/payments/checkout-session",
    tag = "payments",
    request_body = CreateSubscriptionCheckoutRequest,
    responses(
        (status = 200, description = "Checkout session created", body = SubscriptionCheckoutResponse),
        (status = 404, description = "Plan not found"),
        (status = 503, description = "Payment gateway unavailable")
    )
)]
async fn create_subscription_checkout() {}

/// Verify a checkout session against the gateway
#[utoipa::path(
    get,
    path = "/api/v1/payments/verify/{session_id}",
    tag = "payments",
    params(
        ("session_id" = String, Path, description = "Gateway checkout session id")
    ),
    responses(
        (status = 200, description = "Session state", body = VerifySessionResponse),
        (status = 404, description = "Session not found")
    )
)]
async fn verify_checkout() {}

/// Complete a plan upgrade after checkout success
#[utoipa::path(
    post,
    path = "/api/v1/payments/complete-upgrade",
    tag = "payments",
    request_body = CompleteUpgradeRequest,
    responses(
        (status = 200, description = "Plan upgraded (idempotent)", body = UpgradeOutcome),
        (status = 400, description = "Payment not captured or metadata invalid"),
        (status = 503, description = "Dependency unavailable; safe to retry")
    )
)]
async fn complete_upgrade() {}

/// Refund a completed subscription payment
#[utoipa::path(
    post,
    path = "/api/v1/payments/refund",
    tag = "payments",
    request_body = CompleteUpgradeRequest,
    responses(
        (status = 200, description = "Payment refunded", body = RefundOutcome),
        (status = 400, description = "Payment not refundable")
    )
)]
async fn refund_subscription() {}

/// Gateway-side status of a transaction
#[utoipa::path(
    get,
    path = "/api/v1/payments/{provider}/{transaction_ref}",
    tag = "payments",
    params(
        ("provider" = String, Path, description = "Configured gateway name"),
        ("transaction_ref" = String, Path, description = "Gateway transaction reference")
    ),
    responses(
        (status = 200, description = "Status retrieved", body = PaymentStatusResponse),
        (status = 400, description = "Provider not configured")
    )
)]
async fn payment_status() {}

/// Create a checkout session paying for a completed work order
#[utoipa::path(
    post,
    path = "/api/v1/service-payments/checkout",
    tag = "service-payments",
    request_body = CreateServiceCheckoutRequest,
    responses(
        (status = 200, description = "Checkout session created", body = ServiceCheckoutResponse),
        (status = 400, description = "Work order not payable"),
        (status = 403, description = "Requester is not an Owner"),
        (status = 404, description = "Work order, service request or provider missing")
    )
)]
async fn create_service_checkout() {}

/// Complete a service payment after checkout success
#[utoipa::path(
    post,
    path = "/api/v1/service-payments/complete",
    tag = "service-payments",
    request_body = CompleteServicePaymentRequest,
    responses(
        (status = 200, description = "Payment completed (idempotent)", body = ServicePaymentOutcome),
        (status = 400, description = "Payment not captured or metadata invalid"),
        (status = 503, description = "Dependency unavailable; safe to retry")
    )
)]
async fn complete_service_payment() {}

/// Refund a completed service payment
#[utoipa::path(
    post,
    path = "/api/v1/service-payments/{id}/refund",
    tag = "service-payments",
    params(
        ("id" = ServicePaymentId, Path, description = "Service payment id")
    ),
    responses(
        (status = 200, description = "Payment refunded", body = RefundOutcome),
        (status = 400, description = "Payment not refundable"),
        (status = 404, description = "Payment not found")
    )
)]
async fn refund_service_payment() {}

/// Get the service payment recorded for a work order
#[utoipa::path(
    get,
    path = "/api/v1/service-payments/by-work-order/{work_order_id}",
    tag = "service-payments",
    params(
        ("work_order_id" = i64, Path, description = "Work order id")
    ),
    responses(
        (status = 200, description = "Payment found", body = ServicePaymentResponse),
        (status = 404, description = "No payment for this work order")
    )
)]
async fn service_payment_by_work_order() {}

/// List plans for one side of the marketplace
#[utoipa::path(
    get,
    path = "/api/v1/plans",
    tag = "plans",
    params(
        ("userType" = Option<String>, Query, description = "\"owner\" (default) or \"provider\"")
    ),
    responses(
        (status = 200, description = "Plan catalog partition", body = Vec<PlanResponse>)
    )
)]
async fn list_plans() {}

/// Get a plan by id
#[utoipa::path(
    get,
    path = "/api/v1/plans/{plan_id}",
    tag = "plans",
    params(
        ("plan_id" = i64, Path, description = "Plan id")
    ),
    responses(
        (status = 200, description = "Plan found", body = PlanResponse),
        (status = 404, description = "Plan not found")
    )
)]
async fn get_plan() {}

/// Upgrade a user's plan without a payment flow
#[utoipa::path(
    post,
    path = "/api/v1/plans/upgrade",
    tag = "plans",
    request_body = UpgradePlanRequest,
    responses(
        (status = 201, description = "Plan upgraded", body = PlanResponse),
        (status = 400, description = "Profile update refused"),
        (status = 404, description = "Plan not found")
    )
)]
async fn upgrade_plan() {}

/// OpenAPI documentation for the Settlements API.
#[derive(OpenApi)]
#[openapi(
    info(
        title = "Payment & Commission Settlement API",
        version = "1.0.0",
        description = "Settles subscription payments (subscriber → platform) and service payments (Owner → platform → Provider, with a flat percentage commission) against an external payment gateway, with idempotent completion.",
        license(name = "MIT"),
    ),
    paths(
        health,
        create_subscription_checkout,
        verify_checkout,
        complete_upgrade,
        refund_subscription,
        payment_status,
        create_service_checkout,
        complete_service_payment,
        refund_service_payment,
        service_payment_by_work_order,
        list_plans,
        get_plan,
        upgrade_plan,
    ),
    components(
        schemas(
            CreateSubscriptionCheckoutRequest,
            SubscriptionCheckoutResponse,
            CreateServiceCheckoutRequest,
            ServiceCheckoutResponse,
            WorkOrderSummary,
            VerifySessionResponse,
            CompleteUpgradeRequest,
            CompleteServicePaymentRequest,
            UpgradeOutcome,
            ServicePaymentOutcome,
            ServicePaymentResponse,
            PlanResponse,
            UpgradePlanRequest,
            PaymentStatusResponse,
            RefundOutcome,
            DownstreamStatus,
            CounterpartyKind,
            NormalizedStatus,
            PaymentStatus,
            Currency,
            PaymentId,
            ServicePaymentId,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "payments", description = "Subscription payment flow"),
        (name = "service-payments", description = "Owner → Provider settlement flow"),
        (name = "plans", description = "Plan catalog queries and upgrades"),
    )
)]
pub struct ApiDoc;
