//! Data Transfer Objects (DTOs) for requests and responses.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::{
    BillingCycle, Currency, PaymentId, PaymentStatus, Plan, ServicePayment, ServicePaymentId,
};
use crate::ports::NormalizedStatus;

// ─────────────────────────────────────────────────────────────────────────────
// Checkout DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Request to open a checkout session for a subscription plan.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateSubscriptionCheckoutRequest {
    /// Subscriber's user id
    #[schema(example = 7)]
    pub user_id: i64,
    /// Plan to subscribe to
    #[schema(example = 2)]
    pub plan_id: i64,
    /// Where the gateway redirects after successful payment
    pub success_url: String,
    /// Where the gateway redirects after cancellation
    pub cancel_url: String,
}

/// Response after opening a subscription checkout session.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct SubscriptionCheckoutResponse {
    /// Gateway checkout session id
    pub session_id: String,
    /// Redirect URL for the subscriber's browser
    pub checkout_url: String,
}

/// Request to open a checkout session paying for a completed work order.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CreateServiceCheckoutRequest {
    /// Requesting user; must resolve to an Owner
    #[schema(example = 7)]
    pub user_id: i64,
    /// Work order being paid for; must be resolved with a recorded cost
    #[schema(example = 41)]
    pub work_order_id: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cancel_url: Option<String>,
}

/// Work-order summary echoed back with a service checkout.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct WorkOrderSummary {
    pub id: i64,
    pub number: String,
    pub title: String,
    pub provider_name: String,
}

/// Response after opening a service-payment checkout session.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServiceCheckoutResponse {
    pub session_id: String,
    pub checkout_url: String,
    pub total_amount: Decimal,
    pub platform_fee: Decimal,
    pub provider_amount: Decimal,
    pub platform_fee_percentage: Decimal,
    pub work_order: WorkOrderSummary,
}

// ─────────────────────────────────────────────────────────────────────────────
// Verification & completion DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// Gateway-side view of a checkout session (pure read, safe to re-execute).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VerifySessionResponse {
    pub session_id: String,
    pub payment_status: NormalizedStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub customer_email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount_total: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    pub metadata: HashMap<String, String>,
}

/// Request to complete a plan upgrade after gateway checkout success.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CompleteUpgradeRequest {
    pub session_id: String,
}

/// Request to complete a service payment after gateway checkout success.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct CompleteServicePaymentRequest {
    pub session_id: String,
}

/// Whether the counterparty-side settlement went through synchronously.
///
/// `Pending` means the money moved at the gateway and the local record is
/// `Completed`, but the counterparty mutation is still outstanding - an
/// operational retry concern, not a payment failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DownstreamStatus {
    Settled,
    Pending,
}

/// Which profile kind a subscriber resolved to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum CounterpartyKind {
    Owner,
    Provider,
}

/// Result of completing a subscription plan upgrade.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpgradeOutcome {
    pub payment_id: PaymentId,
    pub user_type: CounterpartyKind,
    pub plan_id: i64,
    pub plan_name: String,
    /// For Owner upgrades
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_units: Option<i64>,
    /// For Provider upgrades
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_clients: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_ref: Option<String>,
    pub downstream: DownstreamStatus,
}

/// Result of completing a service payment.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServicePaymentOutcome {
    pub service_payment_id: ServicePaymentId,
    pub work_order_id: i64,
    pub provider_id: i64,
    pub provider_amount: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transaction_ref: Option<String>,
    pub downstream: DownstreamStatus,
}

// ─────────────────────────────────────────────────────────────────────────────
// Query DTOs
// ─────────────────────────────────────────────────────────────────────────────

/// A service payment as returned by queries.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ServicePaymentResponse {
    pub payment_id: ServicePaymentId,
    pub work_order_id: i64,
    pub service_request_id: i64,
    pub owner_id: i64,
    pub provider_id: i64,
    pub total_amount: Decimal,
    pub platform_fee: Decimal,
    pub provider_amount: Decimal,
    pub currency: Currency,
    pub status: PaymentStatus,
    pub description: String,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gateway_charge_ref: Option<String>,
}

impl From<ServicePayment> for ServicePaymentResponse {
    fn from(p: ServicePayment) -> Self {
        Self {
            payment_id: p.id,
            work_order_id: p.work_order_id,
            service_request_id: p.service_request_id,
            owner_id: p.owner_id,
            provider_id: p.provider_id,
            total_amount: p.total_amount,
            platform_fee: p.platform_fee,
            provider_amount: p.provider_amount,
            currency: p.currency,
            status: p.status,
            description: p.description,
            created_at: p.created_at,
            completed_at: p.completed_at,
            gateway_charge_ref: p.gateway_charge_ref,
        }
    }
}

/// A subscription plan as returned by queries.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PlanResponse {
    pub id: i64,
    #[schema(example = "Standard")]
    pub name: String,
    pub price: Decimal,
    pub currency: Currency,
    pub billing_cycle: BillingCycle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_units: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_clients: Option<i64>,
    pub features: Vec<String>,
}

impl From<Plan> for PlanResponse {
    fn from(p: Plan) -> Self {
        Self {
            id: p.id,
            name: p.name,
            price: p.price.amount(),
            currency: p.price.currency(),
            billing_cycle: p.billing_cycle,
            max_units: p.max_units,
            max_clients: p.max_clients,
            features: p.features,
        }
    }
}

/// Request to upgrade a user's plan without a payment flow.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct UpgradePlanRequest {
    pub user_id: i64,
    pub plan_id: i64,
}

/// Gateway-side status of a transaction.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct PaymentStatusResponse {
    pub transaction_ref: String,
    pub provider: String,
    pub status: NormalizedStatus,
}

/// Result of an explicit refund operation.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RefundOutcome {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refund_ref: Option<String>,
    pub amount: Decimal,
    pub status: PaymentStatus,
}
