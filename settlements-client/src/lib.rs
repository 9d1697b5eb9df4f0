//! # Settlements Client SDK
//!
//! A typed Rust client for the Settlements API.

use reqwest::Client;
use serde::de::DeserializeOwned;

use settlements_types::ServicePaymentId;
use settlements_types::dto::{
    CompleteServicePaymentRequest, CompleteUpgradeRequest, CreateServiceCheckoutRequest,
    CreateSubscriptionCheckoutRequest, PaymentStatusResponse, PlanResponse, RefundOutcome,
    ServiceCheckoutResponse, ServicePaymentOutcome, ServicePaymentResponse,
    SubscriptionCheckoutResponse, UpgradeOutcome, UpgradePlanRequest, VerifySessionResponse,
};

/// Error type for client operations.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Settlements API client.
pub struct SettlementsClient {
    base_url: String,
    http: Client,
}

impl SettlementsClient {
    /// Creates a new client.
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: Client::new(),
        }
    }

    /// Checks if the API is healthy.
    pub async fn health(&self) -> Result<bool, ClientError> {
        let resp = self
            .http
            .get(format!("{}/health", self.base_url))
            .send()
            .await?;
        Ok(resp.status().is_success())
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Subscription payments
    // ─────────────────────────────────────────────────────────────────────────

    /// Opens a checkout session for a subscription plan.
    pub async fn create_subscription_checkout(
        &self,
        req: &CreateSubscriptionCheckoutRequest,
    ) -> Result<SubscriptionCheckoutResponse, ClientError> {
        self.post("/api/v1/payments/checkout-session", req).await
    }

    /// Reads the gateway-side state of a checkout session.
    pub async fn verify_session(
        &self,
        session_id: &str,
    ) -> Result<VerifySessionResponse, ClientError> {
        self.get(&format!("/api/v1/payments/verify/{}", session_id))
            .await
    }

    /// Completes a plan upgrade after checkout success. Idempotent.
    pub async fn complete_upgrade(&self, session_id: &str) -> Result<UpgradeOutcome, ClientError> {
        let req = CompleteUpgradeRequest {
            session_id: session_id.to_string(),
        };
        self.post("/api/v1/payments/complete-upgrade", &req).await
    }

    /// Refunds a completed subscription payment.
    pub async fn refund_subscription(
        &self,
        session_id: &str,
    ) -> Result<RefundOutcome, ClientError> {
        let req = CompleteUpgradeRequest {
            session_id: session_id.to_string(),
        };
        self.post("/api/v1/payments/refund", &req).await
    }

    /// Checks the gateway-side status of a transaction.
    pub async fn payment_status(
        &self,
        provider: &str,
        transaction_ref: &str,
    ) -> Result<PaymentStatusResponse, ClientError> {
        self.get(&format!("/api/v1/payments/{}/{}", provider, transaction_ref))
            .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Service payments
    // ─────────────────────────────────────────────────────────────────────────

    /// Opens a checkout session paying for a completed work order.
    pub async fn create_service_checkout(
        &self,
        req: &CreateServiceCheckoutRequest,
    ) -> Result<ServiceCheckoutResponse, ClientError> {
        self.post("/api/v1/service-payments/checkout", req).await
    }

    /// Completes a service payment after checkout success. Idempotent.
    pub async fn complete_service_payment(
        &self,
        session_id: &str,
    ) -> Result<ServicePaymentOutcome, ClientError> {
        let req = CompleteServicePaymentRequest {
            session_id: session_id.to_string(),
        };
        self.post("/api/v1/service-payments/complete", &req).await
    }

    /// Refunds a completed service payment.
    pub async fn refund_service_payment(
        &self,
        id: ServicePaymentId,
    ) -> Result<RefundOutcome, ClientError> {
        let resp = self
            .http
            .post(format!(
                "{}/api/v1/service-payments/{}/refund",
                self.base_url, id
            ))
            .send()
            .await?;
        self.handle_response(resp).await
    }

    /// Gets the service payment recorded for a work order.
    pub async fn service_payment_by_work_order(
        &self,
        work_order_id: i64,
    ) -> Result<ServicePaymentResponse, ClientError> {
        self.get(&format!(
            "/api/v1/service-payments/by-work-order/{}",
            work_order_id
        ))
        .await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Plans
    // ─────────────────────────────────────────────────────────────────────────

    /// Lists plans for one side of the marketplace ("owner" or "provider").
    pub async fn list_plans(&self, user_type: &str) -> Result<Vec<PlanResponse>, ClientError> {
        self.get(&format!("/api/v1/plans?userType={}", user_type))
            .await
    }

    /// Gets a plan by id.
    pub async fn get_plan(&self, plan_id: i64) -> Result<PlanResponse, ClientError> {
        self.get(&format!("/api/v1/plans/{}", plan_id)).await
    }

    /// Upgrades a user's plan without a payment flow.
    pub async fn upgrade_plan(
        &self,
        user_id: i64,
        plan_id: i64,
    ) -> Result<PlanResponse, ClientError> {
        let req = UpgradePlanRequest { user_id, plan_id };
        self.post("/api/v1/plans/upgrade", &req).await
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Internals
    // ─────────────────────────────────────────────────────────────────────────

    async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ClientError> {
        let resp = self
            .http
            .get(format!("{}{}", self.base_url, path))
            .send()
            .await?;
        self.handle_response(resp).await
    }

    async fn post<T: DeserializeOwned, B: serde::Serialize>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ClientError> {
        let resp = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await?;
        self.handle_response(resp).await
    }

    async fn handle_response<T: DeserializeOwned>(
        &self,
        resp: reqwest::Response,
    ) -> Result<T, ClientError> {
        let status = resp.status();
        if status.is_success() {
            let body = resp.text().await?;
            Ok(serde_json::from_str(&body)?)
        } else {
            let body = resp.text().await.unwrap_or_default();
            let message = serde_json::from_str::<serde_json::Value>(&body)
                .ok()
                .and_then(|v| v.get("error").and_then(|e| e.as_str()).map(String::from))
                .unwrap_or(body);
            Err(ClientError::Api {
                status: status.as_u16(),
                message,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_creation() {
        let client = SettlementsClient::new("http://localhost:3000");
        assert_eq!(client.base_url, "http://localhost:3000");
    }

    #[test]
    fn test_client_with_trailing_slash() {
        let client = SettlementsClient::new("http://localhost:3000/");
        assert_eq!(client.base_url, "http://localhost:3000");
    }
}
