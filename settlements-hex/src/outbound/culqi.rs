//! Culqi gateway adapter.
//!
//! Charges, refunds and orders against the Culqi JSON API (Bearer secret
//! key). Culqi amounts are minor units (céntimos); the conversion happens
//! here and nowhere else. Hosted-checkout parity is mapped onto Culqi
//! Orders.

use std::collections::HashMap;

use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use serde::Deserialize;
use serde_json::json;

use settlements_types::{
    ChargeRequest, ChargeResult, CheckoutRequest, CheckoutSession, GatewayError, NormalizedStatus,
    PaymentProvider, RefundResult,
};

use super::{OUTBOUND_TIMEOUT, gateway_transport_error, http_client};

const DEFAULT_API_BASE: &str = "https://api.culqi.com/v2";

/// Outcome type Culqi reports on a successful sale.
const OUTCOME_SALE_OK: &str = "venta_exitosa";

pub struct CulqiProvider {
    api_base: String,
    secret_key: String,
    http: reqwest::Client,
}

impl CulqiProvider {
    pub fn new(secret_key: impl Into<String>) -> Self {
        Self::with_api_base(secret_key, DEFAULT_API_BASE)
    }

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

/// Converts a major-unit decimal into Culqi's céntimos.
fn to_minor_units(amount: Decimal) -> Result<i64, GatewayError> {
    (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| GatewayError::InvalidResponse(format!("Amount out of range: {}", amount)))
}

fn from_minor_units(minor: i64) -> Decimal {
    Decimal::new(minor, 2)
}

fn map_charge_outcome(outcome: Option<&str>) -> NormalizedStatus {
    match outcome {
        Some(OUTCOME_SALE_OK) => NormalizedStatus::Succeeded,
        Some("pending") => NormalizedStatus::Processing,
        Some("rechazada") => NormalizedStatus::Failed,
        Some("cancelada") => NormalizedStatus::Canceled,
        _ => NormalizedStatus::Failed,
    }
}

fn map_order_state(state: Option<&str>) -> NormalizedStatus {
    match state {
        Some("paid") => NormalizedStatus::Succeeded,
        Some("created") | Some("pending") => NormalizedStatus::Pending,
        Some("expired") => NormalizedStatus::Failed,
        Some("deleted") => NormalizedStatus::Canceled,
        _ => NormalizedStatus::Failed,
    }
}

// Culqi API response models

#[derive(Deserialize)]
struct CulqiCharge {
    id: Option<String>,
    outcome: Option<CulqiOutcome>,
}

#[derive(Deserialize)]
struct CulqiOutcome {
    #[serde(rename = "type")]
    outcome_type: Option<String>,
    user_message: Option<String>,
}

#[derive(Deserialize)]
struct CulqiError {
    user_message: Option<String>,
    merchant_message: Option<String>,
}

#[derive(Deserialize)]
struct CulqiRefund {
    id: Option<String>,
    object: Option<String>,
    amount: Option<i64>,
}

#[derive(Deserialize)]
struct CulqiOrder {
    id: String,
    state: Option<String>,
    payment_url: Option<String>,
    amount: Option<i64>,
    currency_code: Option<String>,
    payment_code: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

impl From<CulqiOrder> for CheckoutSession {
    fn from(order: CulqiOrder) -> Self {
        CheckoutSession {
            id: order.id,
            url: order.payment_url,
            status: map_order_state(order.state.as_deref()),
            customer_email: None,
            amount_total: order.amount.map(from_minor_units),
            currency: order.currency_code,
            payment_intent_ref: order.payment_code,
            metadata: order.metadata,
        }
    }
}

async fn error_message(response: reqwest::Response) -> String {
    let fallback = format!("Culqi API error: HTTP {}", response.status());
    match response.json::<CulqiError>().await {
        Ok(err) => err
            .user_message
            .or(err.merchant_message)
            .unwrap_or(fallback),
        Err(_) => fallback,
    }
}

#[async_trait::async_trait]
impl PaymentProvider for CulqiProvider {
    fn name(&self) -> &'static str {
        "Culqi"
    }

    async fn create_charge(&self, request: ChargeRequest) -> Result<ChargeResult, GatewayError> {
        tracing::debug!(amount = %request.amount, currency = %request.currency, "Creating Culqi charge");

        let body = json!({
            "amount": to_minor_units(request.amount)?,
            "currency_code": request.currency.to_string(),
            "description": request.description,
            "email": request.customer_email,
            "source_id": request.payment_token,
            "metadata": request.metadata,
        });

        let response = self
            .http
            .post(self.url("/charges"))
            .bearer_auth(&self.secret_key)
            .json(&body)
            .send()
            .await
            .map_err(gateway_transport_error)?;

        if !response.status().is_success() {
            let message = error_message(response).await;
            return Ok(ChargeResult {
                success: false,
                transaction_ref: None,
                status: NormalizedStatus::Failed,
                error_message: Some(message),
                amount: request.amount,
                currency: request.currency,
            });
        }

        let charge: CulqiCharge = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        let outcome_type = charge
            .outcome
            .as_ref()
            .and_then(|o| o.outcome_type.as_deref());
        let status = map_charge_outcome(outcome_type);

        Ok(ChargeResult {
            success: status == NormalizedStatus::Succeeded,
            transaction_ref: charge.id,
            status,
            error_message: (status != NormalizedStatus::Succeeded).then(|| {
                charge
                    .outcome
                    .and_then(|o| o.user_message)
                    .unwrap_or_else(|| "Payment failed".to_string())
            }),
            amount: request.amount,
            currency: request.currency,
        })
    }

    async fn get_status(&self, transaction_ref: &str) -> Result<NormalizedStatus, GatewayError> {
        let response = self
            .http
            .get(self.url(&format!("/charges/{}", transaction_ref)))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(gateway_transport_error)?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(GatewayError::NotFound(format!(
                "Charge {} not found",
                transaction_ref
            )));
        }
        if !response.status().is_success() {
            return Err(GatewayError::InvalidResponse(format!(
                "HTTP {}",
                response.status()
            )));
        }

        let charge: CulqiCharge = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        Ok(map_charge_outcome(
            charge.outcome.as_ref().and_then(|o| o.outcome_type.as_deref()),
        ))
    }

    async fn refund(
        &self,
        transaction_ref: &str,
        amount: Option<Decimal>,
    ) -> Result<RefundResult, GatewayError> {
        let minor = amount.map(to_minor_units).transpose()?;
        let body = json!({
            "amount": minor,
            "charge_id": transaction_ref,
            "reason": "solicitud_comprador",
        });

        let response = self
            .http
            .post(self.url("/refunds"))
            .bearer_auth(&self.secret_key)
            .json(&body)
            .send()
            .await
            .map_err(gateway_transport_error)?;

        if !response.status().is_success() {
            let message = error_message(response).await;
            return Ok(RefundResult {
                success: false,
                refund_ref: None,
                amount: amount.unwrap_or(Decimal::ZERO),
                error_message: Some(message),
            });
        }

        let refund: CulqiRefund = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        let succeeded = refund.object.as_deref() == Some("refund");
        Ok(RefundResult {
            success: succeeded,
            refund_ref: refund.id,
            amount: refund
                .amount
                .map(from_minor_units)
                .or(amount)
                .unwrap_or(Decimal::ZERO),
            error_message: (!succeeded).then(|| "Refund failed".to_string()),
        })
    }

    async fn create_checkout(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        let body = json!({
            "amount": to_minor_units(request.amount)?,
            "currency_code": request.currency.to_string(),
            "description": format!("{} - {}", request.product_name, request.description),
            "order_number": uuid::Uuid::new_v4().to_string(),
            "confirm": false,
            "metadata": request.metadata,
        });

        let response = self
            .http
            .post(self.url("/orders"))
            .bearer_auth(&self.secret_key)
            .json(&body)
            .send()
            .await
            .map_err(gateway_transport_error)?;

        if !response.status().is_success() {
            return Err(GatewayError::InvalidResponse(format!(
                "Order creation failed: HTTP {}",
                response.status()
            )));
        }

        let order: CulqiOrder = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        Ok(order.into())
    }

    async fn get_checkout(&self, session_id: &str) -> Result<CheckoutSession, GatewayError> {
        let response = self
            .http
            .get(self.url(&format!("/orders/{}", session_id)))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(gateway_transport_error)?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(GatewayError::NotFound(format!(
                "Order {} not found",
                session_id
            )));
        }
        if !response.status().is_success() {
            return Err(GatewayError::InvalidResponse(format!(
                "HTTP {}",
                response.status()
            )));
        }

        let order: CulqiOrder = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;
        Ok(order.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_minor_unit_conversion() {
        assert_eq!(to_minor_units(dec!(100.00)).unwrap(), 10000);
        assert_eq!(to_minor_units(dec!(40.51)).unwrap(), 4051);
        assert_eq!(from_minor_units(4051), dec!(40.51));
    }

    #[test]
    fn test_charge_outcome_map_is_fail_closed() {
        assert_eq!(
            map_charge_outcome(Some("venta_exitosa")),
            NormalizedStatus::Succeeded
        );
        assert_eq!(map_charge_outcome(Some("pending")), NormalizedStatus::Processing);
        assert_eq!(map_charge_outcome(Some("rechazada")), NormalizedStatus::Failed);
        assert_eq!(map_charge_outcome(Some("cancelada")), NormalizedStatus::Canceled);
        assert_eq!(map_charge_outcome(Some("nuevo_estado")), NormalizedStatus::Failed);
        assert_eq!(map_charge_outcome(None), NormalizedStatus::Failed);
    }

    #[test]
    fn test_order_state_map_is_fail_closed() {
        assert_eq!(map_order_state(Some("paid")), NormalizedStatus::Succeeded);
        assert_eq!(map_order_state(Some("created")), NormalizedStatus::Pending);
        assert_eq!(map_order_state(Some("expired")), NormalizedStatus::Failed);
        assert_eq!(map_order_state(Some("whatever")), NormalizedStatus::Failed);
        assert_eq!(map_order_state(None), NormalizedStatus::Failed);
    }
}
