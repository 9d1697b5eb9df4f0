//! Stripe gateway adapter.
//!
//! Talks to the Stripe REST API (form-encoded requests, Bearer secret key).
//! Stripe amounts are minor units (cents); the conversion happens here and
//! nowhere else.

use std::collections::HashMap;

use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use serde::Deserialize;

use settlements_types::{
    ChargeRequest, ChargeResult, CheckoutRequest, CheckoutSession, GatewayError, NormalizedStatus,
    PaymentProvider, RefundResult,
};

use super::{OUTBOUND_TIMEOUT, gateway_transport_error, http_client};

const DEFAULT_API_BASE: &str = "https://api.stripe.com/v1";

pub struct StripeProvider {
    api_base: String,
    secret_key: String,
    http: reqwest::Client,
}

impl StripeProvider {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self::with_api_base(secret_key, DEFAULT_API_BASE)
    }

    /// Overrides the API base URL (stripe-mock, tests).
    pub fn with_api_base(secret_key: impl Into<String>, api_base: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            secret_key: secret_key.into(),
            http: http_client(OUTBOUND_TIMEOUT),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }
}

/// Converts a major-unit decimal into Stripe's cents.
fn to_minor_units(amount: Decimal) -> Result<i64, GatewayError> {
    (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| GatewayError::InvalidResponse(format!("Amount out of range: {}", amount)))
}

/// Converts Stripe cents back into a major-unit decimal.
fn from_minor_units(minor: i64) -> Decimal {
    Decimal::new(minor, 2)
}

fn map_intent_status(status: &str) -> NormalizedStatus {
    match status {
        "succeeded" => NormalizedStatus::Succeeded,
        "processing" => NormalizedStatus::Processing,
        "requires_payment_method" => NormalizedStatus::Failed,
        "requires_confirmation" => NormalizedStatus::Pending,
        "requires_action" => NormalizedStatus::Pending,
        "canceled" => NormalizedStatus::Canceled,
        _ => NormalizedStatus::Failed,
    }
}

fn map_session_status(payment_status: &str) -> NormalizedStatus {
    match payment_status {
        "paid" | "no_payment_required" => NormalizedStatus::Succeeded,
        "unpaid" => NormalizedStatus::Pending,
        _ => NormalizedStatus::Failed,
    }
}

// Stripe API response models

#[derive(Deserialize)]
struct StripePaymentIntent {
    id: String,
    status: String,
}

#[derive(Deserialize)]
struct StripeRefund {
    id: String,
    status: Option<String>,
    amount: i64,
}

#[derive(Deserialize)]
struct StripeCheckoutSession {
    id: String,
    url: Option<String>,
    payment_status: Option<String>,
    customer_email: Option<String>,
    customer_details: Option<StripeCustomerDetails>,
    amount_total: Option<i64>,
    currency: Option<String>,
    payment_intent: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

#[derive(Deserialize)]
struct StripeCustomerDetails {
    email: Option<String>,
}

#[derive(Deserialize)]
struct StripeErrorEnvelope {
    error: StripeErrorBody,
}

#[derive(Deserialize)]
struct StripeErrorBody {
    message: Option<String>,
}

impl From<StripeCheckoutSession> for CheckoutSession {
    fn from(s: StripeCheckoutSession) -> Self {
        let status = s
            .payment_status
            .as_deref()
            .map(map_session_status)
            .unwrap_or(NormalizedStatus::Failed);
        CheckoutSession {
            id: s.id,
            url: s.url,
            status,
            customer_email: s
                .customer_email
                .or(s.customer_details.and_then(|d| d.email)),
            amount_total: s.amount_total.map(from_minor_units),
            currency: s.currency.map(|c| c.to_uppercase()),
            payment_intent_ref: s.payment_intent,
            metadata: s.metadata,
        }
    }
}

#[async_trait::async_trait]
impl PaymentProvider for StripeProvider {
    fn name(&self) -> &'static str {
        "Stripe"
    }

    async fn create_charge(&self, request: ChargeRequest) -> Result<ChargeResult, GatewayError> {
        tracing::debug!(amount = %request.amount, currency = %request.currency, "Creating Stripe payment intent");

        let amount_minor = to_minor_units(request.amount)?;

        let mut form: Vec<(String, String)> = vec![
            ("amount".into(), amount_minor.to_string()),
            ("currency".into(), request.currency.to_string().to_lowercase()),
            ("description".into(), request.description.clone()),
            ("receipt_email".into(), request.customer_email.clone()),
            ("payment_method".into(), request.payment_token.clone()),
            ("confirm".into(), "true".into()),
            ("automatic_payment_methods[enabled]".into(), "true".into()),
            (
                "automatic_payment_methods[allow_redirects]".into(),
                "never".into(),
            ),
        ];
        for (key, value) in &request.metadata {
            form.push((format!("metadata[{}]", key), value.clone()));
        }

        let response = self
            .http
            .post(self.url("/payment_intents"))
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await
            .map_err(gateway_transport_error)?;

        if !response.status().is_success() {
            // Declines come back as 402s with an error body; surface them as
            // a failed result, not as an error.
            let body = response.text().await.map_err(gateway_transport_error)?;
            let message = serde_json::from_str::<StripeErrorEnvelope>(&body)
                .ok()
                .and_then(|e| e.error.message)
                .unwrap_or_else(|| "Payment failed".to_string());
            return Ok(ChargeResult {
                success: false,
                transaction_ref: None,
                status: NormalizedStatus::Failed,
                error_message: Some(message),
                amount: request.amount,
                currency: request.currency,
            });
        }

        let intent: StripePaymentIntent = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        let status = map_intent_status(&intent.status);
        Ok(ChargeResult {
            success: status == NormalizedStatus::Succeeded,
            transaction_ref: Some(intent.id),
            status,
            error_message: (status != NormalizedStatus::Succeeded)
                .then(|| format!("Payment {}", intent.status)),
            amount: request.amount,
            currency: request.currency,
        })
    }

    async fn get_status(&self, transaction_ref: &str) -> Result<NormalizedStatus, GatewayError> {
        let response = self
            .http
            .get(self.url(&format!("/payment_intents/{}", transaction_ref)))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(gateway_transport_error)?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(GatewayError::NotFound(format!(
                "Payment intent {} not found",
                transaction_ref
            )));
        }
        if !response.status().is_success() {
            return Err(GatewayError::InvalidResponse(format!(
                "HTTP {}",
                response.status()
            )));
        }

        let intent: StripePaymentIntent = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        Ok(map_intent_status(&intent.status))
    }

    async fn refund(
        &self,
        transaction_ref: &str,
        amount: Option<Decimal>,
    ) -> Result<RefundResult, GatewayError> {
        let mut form: Vec<(String, String)> =
            vec![("payment_intent".into(), transaction_ref.to_string())];
        if let Some(amount) = amount {
            form.push(("amount".into(), to_minor_units(amount)?.to_string()));
        }

        let response = self
            .http
            .post(self.url("/refunds"))
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await
            .map_err(gateway_transport_error)?;

        if !response.status().is_success() {
            let body = response.text().await.map_err(gateway_transport_error)?;
            let message = serde_json::from_str::<StripeErrorEnvelope>(&body)
                .ok()
                .and_then(|e| e.error.message)
                .unwrap_or_else(|| "Refund failed".to_string());
            return Ok(RefundResult {
                success: false,
                refund_ref: None,
                amount: amount.unwrap_or(Decimal::ZERO),
                error_message: Some(message),
            });
        }

        let refund: StripeRefund = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        let succeeded = refund.status.as_deref() == Some("succeeded");
        Ok(RefundResult {
            success: succeeded,
            refund_ref: Some(refund.id),
            amount: from_minor_units(refund.amount),
            error_message: (!succeeded).then(|| {
                format!(
                    "Refund {}",
                    refund.status.unwrap_or_else(|| "failed".to_string())
                )
            }),
        })
    }

    async fn create_checkout(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        let amount_minor = to_minor_units(request.amount)?;

        let mut form: Vec<(String, String)> = vec![
            ("mode".into(), "payment".into()),
            ("payment_method_types[0]".into(), "card".into()),
            (
                "line_items[0][price_data][currency]".into(),
                request.currency.to_string().to_lowercase(),
            ),
            (
                "line_items[0][price_data][product_data][name]".into(),
                request.product_name.clone(),
            ),
            (
                "line_items[0][price_data][product_data][description]".into(),
                request.description.clone(),
            ),
            (
                "line_items[0][price_data][unit_amount]".into(),
                amount_minor.to_string(),
            ),
            ("line_items[0][quantity]".into(), "1".into()),
            (
                "success_url".into(),
                format!("{}?session_id={{CHECKOUT_SESSION_ID}}", request.success_url),
            ),
            ("cancel_url".into(), request.cancel_url.clone()),
        ];
        for (key, value) in &request.metadata {
            form.push((format!("metadata[{}]", key), value.clone()));
        }

        let response = self
            .http
            .post(self.url("/checkout/sessions"))
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await
            .map_err(gateway_transport_error)?;

        if !response.status().is_success() {
            return Err(GatewayError::InvalidResponse(format!(
                "Checkout session creation failed: HTTP {}",
                response.status()
            )));
        }

        let session: StripeCheckoutSession = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        Ok(session.into())
    }

    async fn get_checkout(&self, session_id: &str) -> Result<CheckoutSession, GatewayError> {
        let response = self
            .http
            .get(self.url(&format!("/checkout/sessions/{}", session_id)))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(gateway_transport_error)?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(GatewayError::NotFound(format!(
                "Checkout session {} not found",
                session_id
            )));
        }
        if !response.status().is_success() {
            return Err(GatewayError::InvalidResponse(format!(
                "HTTP {}",
                response.status()
            )));
        }

        let session: StripeCheckoutSession = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        Ok(session.into())
    }
}
