//! Domain events published after successful completion transitions.
//!
//! Events are immutable facts and carry denormalized amounts so that
//! downstream consumers never need to query this engine back.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::service_payment::{ServicePayment, ServicePaymentId};
use super::subscription_payment::SubscriptionPayment;

/// Wire event type for [`PaymentProcessedEvent`].
pub const EVENT_PAYMENT_PROCESSED: &str = "PAYMENT_PROCESSED";
/// Wire event type for [`ServicePaymentCompletedEvent`].
pub const EVENT_SERVICE_PAYMENT_COMPLETED: &str = "SERVICE_PAYMENT_COMPLETED";

/// Which settlement flow produced a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentType {
    Subscription,
    Service,
}

impl AsRef<str> for PaymentType {
    fn as_ref(&self) -> &str {
        match self {
            Self::Subscription => "Subscription",
            Self::Service => "Service",
        }
    }
}

impl std::fmt::Display for PaymentType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_ref())
    }
}

/// Published exactly once per successful completion transition, for both
/// settlement flows.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentProcessedEvent {
    /// Id of the settling aggregate (subscription or service payment).
    pub payment_id: Uuid,
    pub payment_type: PaymentType,
    pub user_id: i64,
    pub amount: Decimal,
    /// Plan id, for subscription payments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subscription_id: Option<i64>,
    /// For service payments.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_payment_id: Option<ServicePaymentId>,
    /// For service payments: who receives the money.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_id: Option<i64>,
    /// For service payments: amount the provider receives.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub provider_amount: Option<Decimal>,
    pub gateway_session_id: String,
    pub occurred_at: DateTime<Utc>,
}

impl PaymentProcessedEvent {
    /// Builds the event from a completed subscription payment row.
    pub fn from_subscription(payment: &SubscriptionPayment) -> Self {
        Self {
            payment_id: payment.id.into_uuid(),
            payment_type: PaymentType::Subscription,
            user_id: payment.user_id,
            amount: payment.amount.amount(),
            subscription_id: Some(payment.plan_id),
            service_payment_id: None,
            provider_id: None,
            provider_amount: None,
            gateway_session_id: payment.gateway_session_id.clone(),
            occurred_at: payment.completed_at.unwrap_or_else(Utc::now),
        }
    }

    /// Builds the event from a completed service payment row. The payer's
    /// identity is the Owner id; amounts are the front-loaded split.
    pub fn from_service(payment: &ServicePayment) -> Self {
        Self {
            payment_id: payment.id.into_uuid(),
            payment_type: PaymentType::Service,
            user_id: payment.owner_id,
            amount: payment.total_amount,
            subscription_id: None,
            service_payment_id: Some(payment.id),
            provider_id: Some(payment.provider_id),
            provider_amount: Some(payment.provider_amount),
            gateway_session_id: payment.gateway_txn_ref.clone().unwrap_or_default(),
            occurred_at: payment.completed_at.unwrap_or_else(Utc::now),
        }
    }
}

/// Published exactly once when an Owner → Provider settlement completes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePaymentCompletedEvent {
    pub service_payment_id: ServicePaymentId,
    pub work_order_id: i64,
    pub owner_id: i64,
    pub provider_id: i64,
    pub total_amount: Decimal,
    pub platform_fee: Decimal,
    pub provider_amount: Decimal,
    pub gateway_session_id: String,
}

impl ServicePaymentCompletedEvent {
    /// Builds the event from a completed service payment row.
    pub fn from_payment(payment: &ServicePayment) -> Self {
        Self {
            service_payment_id: payment.id,
            work_order_id: payment.work_order_id,
            owner_id: payment.owner_id,
            provider_id: payment.provider_id,
            total_amount: payment.total_amount,
            platform_fee: payment.platform_fee,
            provider_amount: payment.provider_amount,
            gateway_session_id: payment.gateway_txn_ref.clone().unwrap_or_default(),
        }
    }
}
