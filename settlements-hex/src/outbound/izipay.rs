//! Izipay gateway adapter.
//!
//! JSON API with Basic authentication (`shop_id:api_key`). Izipay amounts
//! are minor units and its currency codes are ISO 4217 numeric; both
//! conversions live here. Hosted-checkout parity is mapped onto Izipay
//! payment orders.

use rust_decimal::{Decimal, RoundingStrategy, prelude::ToPrimitive};
use serde::Deserialize;
use serde_json::json;

use settlements_types::{
    ChargeRequest, ChargeResult, CheckoutRequest, CheckoutSession, Currency, GatewayError,
    NormalizedStatus, PaymentProvider, RefundResult,
};

use super::{OUTBOUND_TIMEOUT, gateway_transport_error, http_client};

pub struct IzipayProvider {
    api_base: String,
    shop_id: String,
    api_key: String,
    http: reqwest::Client,
}

impl IzipayProvider {
    pub fn new(
        api_base: impl Into<String>,
        shop_id: impl Into<String>,
        api_key: impl Into<String>,
    ) -> Self {
        Self {
            api_base: api_base.into().trim_end_matches('/').to_string(),
            shop_id: shop_id.into(),
            api_key: api_key.into(),
            http: http_client(OUTBOUND_TIMEOUT),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.api_base, path)
    }

    fn request(&self, method: reqwest::Method, path: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, self.url(path))
            .basic_auth(&self.shop_id, Some(&self.api_key))
    }
}

/// Converts a major-unit decimal into Izipay's minor units.
fn to_minor_units(amount: Decimal) -> Result<i64, GatewayError> {
    (amount * Decimal::ONE_HUNDRED)
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_i64()
        .ok_or_else(|| GatewayError::InvalidResponse(format!("Amount out of range: {}", amount)))
}

fn from_minor_units(minor: i64) -> Decimal {
    Decimal::new(minor, 2)
}

/// Izipay uses ISO 4217 numeric currency codes.
fn numeric_currency_code(currency: Currency) -> &'static str {
    match currency {
        Currency::USD => "840",
        Currency::PEN => "604",
        Currency::EUR => "978",
    }
}

fn map_order_status(status: Option<&str>) -> NormalizedStatus {
    match status {
        Some("PAID") => NormalizedStatus::Succeeded,
        Some("RUNNING") => NormalizedStatus::Processing,
        Some("UNPAID") => NormalizedStatus::Pending,
        Some("CANCELLED") => NormalizedStatus::Canceled,
        Some("ABANDONED") => NormalizedStatus::Failed,
        _ => NormalizedStatus::Failed,
    }
}

// Izipay API response models

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IzipayEnvelope {
    status: Option<String>,
    answer: Option<IzipayAnswer>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct IzipayAnswer {
    transaction_uuid: Option<String>,
    order_status: Option<String>,
    error_message: Option<String>,
    payment_order_id: Option<String>,
    payment_url: Option<String>,
    amount: Option<i64>,
    #[serde(default)]
    metadata: std::collections::HashMap<String, String>,
}

impl IzipayEnvelope {
    fn is_success(&self) -> bool {
        self.status.as_deref() == Some("SUCCESS")
    }

    fn error_message(&self) -> String {
        self.answer
            .as_ref()
            .and_then(|a| a.error_message.clone())
            .unwrap_or_else(|| "Payment failed".to_string())
    }
}

async fn parse_envelope(response: reqwest::Response) -> Result<IzipayEnvelope, GatewayError> {
    if !response.status().is_success() {
        return Err(GatewayError::InvalidResponse(format!(
            "HTTP {}",
            response.status()
        )));
    }
    response
        .json()
        .await
        .map_err(|e| GatewayError::InvalidResponse(e.to_string()))
}

#[async_trait::async_trait]
impl PaymentProvider for IzipayProvider {
    fn name(&self) -> &'static str {
        "Izipay"
    }

    async fn create_charge(&self, request: ChargeRequest) -> Result<ChargeResult, GatewayError> {
        tracing::debug!(amount = %request.amount, currency = %request.currency, "Creating Izipay payment");

        let mut names = request.customer_name.split_whitespace();
        let first_name = names.next().unwrap_or(&request.customer_name);
        let last_name = names.next().unwrap_or("");

        let body = json!({
            "amount": to_minor_units(request.amount)?,
            "currency": numeric_currency_code(request.currency),
            "orderId": request.metadata.get("orderId").cloned()
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            "customer": {
                "email": request.customer_email,
                "reference": request.customer_email,
                "billingDetails": {
                    "firstName": first_name,
                    "lastName": last_name,
                },
            },
            "formAction": "PAYMENT",
            "paymentMethodToken": request.payment_token,
        });

        let response = self
            .request(reqwest::Method::POST, "/Charge/CreatePayment")
            .json(&body)
            .send()
            .await
            .map_err(gateway_transport_error)?;

        if !response.status().is_success() {
            return Ok(ChargeResult {
                success: false,
                transaction_ref: None,
                status: NormalizedStatus::Failed,
                error_message: Some(format!("Izipay API error: HTTP {}", response.status())),
                amount: request.amount,
                currency: request.currency,
            });
        }

        let envelope: IzipayEnvelope = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        let success = envelope.is_success();
        let status = map_order_status(
            envelope
                .answer
                .as_ref()
                .and_then(|a| a.order_status.as_deref()),
        );
        let transaction_ref = envelope
            .answer
            .as_ref()
            .and_then(|a| a.transaction_uuid.clone());
        let error_message = (!success).then(|| envelope.error_message());

        Ok(ChargeResult {
            success,
            transaction_ref,
            status,
            error_message,
            amount: request.amount,
            currency: request.currency,
        })
    }

    async fn get_status(&self, transaction_ref: &str) -> Result<NormalizedStatus, GatewayError> {
        let response = self
            .request(
                reqwest::Method::GET,
                &format!("/Transaction/Get?uuid={}", transaction_ref),
            )
            .send()
            .await
            .map_err(gateway_transport_error)?;

        let envelope = parse_envelope(response).await?;
        Ok(map_order_status(
            envelope
                .answer
                .as_ref()
                .and_then(|a| a.order_status.as_deref()),
        ))
    }

    async fn refund(
        &self,
        transaction_ref: &str,
        amount: Option<Decimal>,
    ) -> Result<RefundResult, GatewayError> {
        let minor = amount.map(to_minor_units).transpose()?;
        let body = json!({
            "uuid": transaction_ref,
            "amount": minor,
        });

        let response = self
            .request(reqwest::Method::POST, "/Transaction/Refund")
            .json(&body)
            .send()
            .await
            .map_err(gateway_transport_error)?;

        if !response.status().is_success() {
            return Ok(RefundResult {
                success: false,
                refund_ref: None,
                amount: amount.unwrap_or(Decimal::ZERO),
                error_message: Some(format!("Izipay refund error: HTTP {}", response.status())),
            });
        }

        let envelope: IzipayEnvelope = response
            .json()
            .await
            .map_err(|e| GatewayError::InvalidResponse(e.to_string()))?;

        let success = envelope.is_success();
        Ok(RefundResult {
            success,
            refund_ref: envelope
                .answer
                .as_ref()
                .and_then(|a| a.transaction_uuid.clone()),
            amount: amount.unwrap_or(Decimal::ZERO),
            error_message: (!success).then(|| envelope.error_message()),
        })
    }

    async fn create_checkout(
        &self,
        request: CheckoutRequest,
    ) -> Result<CheckoutSession, GatewayError> {
        let body = json!({
            "amount": to_minor_units(request.amount)?,
            "currency": numeric_currency_code(request.currency),
            "orderId": uuid::Uuid::new_v4().to_string(),
            "description": format!("{} - {}", request.product_name, request.description),
            "returnUrl": request.success_url,
            "cancelUrl": request.cancel_url,
            "metadata": request.metadata,
        });

        let response = self
            .request(reqwest::Method::POST, "/Charge/CreatePaymentOrder")
            .json(&body)
            .send()
            .await
            .map_err(gateway_transport_error)?;

        let envelope = parse_envelope(response).await?;
        if !envelope.is_success() {
            return Err(GatewayError::InvalidResponse(envelope.error_message()));
        }

        let answer = envelope
            .answer
            .ok_or_else(|| GatewayError::InvalidResponse("Missing answer body".into()))?;
        let id = answer
            .payment_order_id
            .ok_or_else(|| GatewayError::InvalidResponse("Missing payment order id".into()))?;

        Ok(CheckoutSession {
            id,
            url: answer.payment_url,
            status: map_order_status(answer.order_status.as_deref()),
            customer_email: None,
            amount_total: answer.amount.map(from_minor_units),
            currency: None,
            payment_intent_ref: answer.transaction_uuid,
            metadata: answer.metadata,
        })
    }

    async fn get_checkout(&self, session_id: &str) -> Result<CheckoutSession, GatewayError> {
        let response = self
            .request(
                reqwest::Method::GET,
                &format!("/PaymentOrder/Get?paymentOrderId={}", session_id),
            )
            .send()
            .await
            .map_err(gateway_transport_error)?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(GatewayError::NotFound(format!(
                "Payment order {} not found",
                session_id
            )));
        }

        let envelope = parse_envelope(response).await?;
        let answer = envelope
            .answer
            .ok_or_else(|| GatewayError::InvalidResponse("Missing answer body".into()))?;

        Ok(CheckoutSession {
            id: answer
                .payment_order_id
                .unwrap_or_else(|| session_id.to_string()),
            url: answer.payment_url,
            status: map_order_status(answer.order_status.as_deref()),
            customer_email: None,
            amount_total: answer.amount.map(from_minor_units),
            currency: None,
            payment_intent_ref: answer.transaction_uuid,
            metadata: answer.metadata,
        })
    }
}
