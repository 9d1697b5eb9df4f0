//! Payment gateway capability port.
//!
//! One implementation per gateway (Stripe, Culqi, Izipay), selected by
//! configuration. Every adapter normalizes its native status vocabulary
//! onto [`NormalizedStatus`], mapping anything it does not recognize to
//! `Failed` - never to `Succeeded`.
//!
//! Amounts cross this boundary as major-unit decimals; each adapter owns
//! its minor-unit conversion internally.

use std::collections::HashMap;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::domain::Currency;
use crate::error::GatewayError;

/// Gateway status vocabulary, normalized across providers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum NormalizedStatus {
    Pending,
    Processing,
    Succeeded,
    Failed,
    Canceled,
    Refunded,
}

impl NormalizedStatus {
    /// True only when the gateway has actually captured the funds.
    pub fn is_paid(&self) -> bool {
        matches!(self, Self::Succeeded)
    }
}

impl std::fmt::Display for NormalizedStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

/// Request to create a direct charge.
#[derive(Debug, Clone)]
pub struct ChargeRequest {
    /// Major-unit amount to charge.
    pub amount: Decimal,
    pub currency: Currency,
    pub description: String,
    pub customer_email: String,
    pub customer_name: String,
    /// Payment token obtained by the frontend (card token, payment method id).
    pub payment_token: String,
    pub metadata: HashMap<String, String>,
}

/// Outcome of a charge attempt.
///
/// A business decline is `success = false` with a status and message; it is
/// never an `Err`.
#[derive(Debug, Clone)]
pub struct ChargeResult {
    pub success: bool,
    pub transaction_ref: Option<String>,
    pub status: NormalizedStatus,
    pub error_message: Option<String>,
    pub amount: Decimal,
    pub currency: Currency,
}

/// Outcome of a refund attempt.
#[derive(Debug, Clone)]
pub struct RefundResult {
    pub success: bool,
    pub refund_ref: Option<String>,
    /// Major-unit amount refunded.
    pub amount: Decimal,
    pub error_message: Option<String>,
}

/// Request to open a hosted checkout session.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    /// Major-unit amount.
    pub amount: Decimal,
    pub currency: Currency,
    pub product_name: String,
    pub description: String,
    pub success_url: String,
    pub cancel_url: String,
    /// Business context recovered verbatim at completion time; the sole
    /// channel for it.
    pub metadata: HashMap<String, String>,
}

/// A gateway checkout session, as created or as later fetched for
/// verification.
#[derive(Debug, Clone)]
pub struct CheckoutSession {
    pub id: String,
    /// Redirect URL, present on freshly created sessions.
    pub url: Option<String>,
    pub status: NormalizedStatus,
    pub customer_email: Option<String>,
    /// Major-unit total, when the gateway reports one.
    pub amount_total: Option<Decimal>,
    pub currency: Option<String>,
    /// Underlying payment-intent/charge reference, once known.
    pub payment_intent_ref: Option<String>,
    pub metadata: HashMap<String, String>,
}

/// Payment gateway capability set.
#[async_trait::async_trait]
pub trait PaymentProvider: Send + Sync + 'static {
    /// Provider name (e.g. "Stripe", "Culqi", "Izipay").
    fn name(&self) -> &'static str;

    /// Creates a charge. Declines come back in the result, not as errors.
    async fn create_charge(&self, request: ChargeRequest) -> Result<ChargeResult, GatewayError>;

    /// Fetches the authoritative status of a transaction.
    async fn get_status(&self, transaction_ref: &str)
    -> Result<NormalizedStatus, GatewayError>;

    /// Refunds a transaction, fully (`None`) or partially.
    async fn refund(
        &self,
        transaction_ref: &str,
        amount: Option<Decimal>,
    ) -> Result<RefundResult, GatewayError>;

    /// Opens a hosted checkout session carrying the given metadata.
    async fn create_checkout(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError>;

    /// Fetches a checkout session by id (the verify step of completion).
    async fn get_checkout(&self, session_id: &str) -> Result<CheckoutSession, GatewayError>;
}
