//! HTTP facade for the Profiles microservice.
//!
//! Anti-corruption layer: only the fields this engine needs cross the
//! boundary. Business refusals (missing profile, rejected update) are
//! `Ok(None)` / `Ok(false)`; transport problems are `Err`.

use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;

use settlements_types::{FacadeError, ProfilesFacade};

use super::{OUTBOUND_TIMEOUT, facade_transport_error, http_client};

pub struct ProfilesHttpFacade {
    base_url: String,
    http: reqwest::Client,
}

impl ProfilesHttpFacade {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: http_client(OUTBOUND_TIMEOUT),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }
}

#[derive(Deserialize)]
struct IdResponse {
    id: i64,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProviderProfileResponse {
    #[allow(dead_code)]
    id: i64,
    company_name: Option<String>,
    user_id: Option<i64>,
}

#[async_trait::async_trait]
impl ProfilesFacade for ProfilesHttpFacade {
    async fn fetch_owner_id_by_user_id(&self, user_id: i64) -> Result<Option<i64>, FacadeError> {
        let response = self
            .http
            .get(self.url(&format!("/api/v1/profiles/owners/by-user/{}", user_id)))
            .send()
            .await
            .map_err(facade_transport_error)?;

        if !response.status().is_success() {
            return Ok(None);
        }
        let body: IdResponse = response
            .json()
            .await
            .map_err(|e| FacadeError::InvalidResponse(e.to_string()))?;
        Ok(Some(body.id))
    }

    async fn fetch_provider_id_by_user_id(
        &self,
        user_id: i64,
    ) -> Result<Option<i64>, FacadeError> {
        let response = self
            .http
            .get(self.url(&format!("/api/v1/profiles/providers/by-user/{}", user_id)))
            .send()
            .await
            .map_err(facade_transport_error)?;

        if !response.status().is_success() {
            return Ok(None);
        }
        let body: IdResponse = response
            .json()
            .await
            .map_err(|e| FacadeError::InvalidResponse(e.to_string()))?;
        Ok(Some(body.id))
    }

    async fn update_owner_plan(
        &self,
        owner_id: i64,
        plan_id: i64,
        max_units: i64,
    ) -> Result<bool, FacadeError> {
        let response = self
            .http
            .put(self.url(&format!("/api/v1/profiles/owners/{}/plan", owner_id)))
            .json(&json!({ "planId": plan_id, "maxUnits": max_units }))
            .send()
            .await
            .map_err(facade_transport_error)?;

        if response.status().is_success() {
            tracing::info!(owner_id, plan_id, "Updated owner plan");
            Ok(true)
        } else {
            tracing::warn!(owner_id, status = %response.status(), "Failed to update owner plan");
            Ok(false)
        }
    }

    async fn update_provider_plan(
        &self,
        provider_id: i64,
        plan_id: i64,
        max_clients: i64,
    ) -> Result<bool, FacadeError> {
        let response = self
            .http
            .put(self.url(&format!("/api/v1/profiles/providers/{}/plan", provider_id)))
            .json(&json!({ "planId": plan_id, "maxClients": max_clients }))
            .send()
            .await
            .map_err(facade_transport_error)?;

        if response.status().is_success() {
            tracing::info!(provider_id, plan_id, "Updated provider plan");
            Ok(true)
        } else {
            tracing::warn!(provider_id, status = %response.status(), "Failed to update provider plan");
            Ok(false)
        }
    }

    async fn update_provider_balance(
        &self,
        provider_id: i64,
        amount: Decimal,
    ) -> Result<bool, FacadeError> {
        let response = self
            .http
            .post(self.url(&format!("/api/v1/profiles/providers/{}/balance", provider_id)))
            .json(&json!({ "amount": amount, "description": "Service revenue" }))
            .send()
            .await
            .map_err(facade_transport_error)?;

        if response.status().is_success() {
            tracing::info!(provider_id, %amount, "Updated provider balance");
            Ok(true)
        } else {
            tracing::warn!(provider_id, status = %response.status(), "Failed to update provider balance");
            Ok(false)
        }
    }

    async fn fetch_provider_company_name(
        &self,
        provider_id: i64,
    ) -> Result<Option<String>, FacadeError> {
        let response = self
            .http
            .get(self.url(&format!("/api/v1/profiles/providers/{}", provider_id)))
            .send()
            .await
            .map_err(facade_transport_error)?;

        if !response.status().is_success() {
            return Ok(None);
        }
        let body: ProviderProfileResponse = response
            .json()
            .await
            .map_err(|e| FacadeError::InvalidResponse(e.to_string()))?;
        Ok(body.company_name)
    }

    async fn fetch_provider_user_id(&self, provider_id: i64) -> Result<Option<i64>, FacadeError> {
        let response = self
            .http
            .get(self.url(&format!("/api/v1/profiles/providers/{}", provider_id)))
            .send()
            .await
            .map_err(facade_transport_error)?;

        if !response.status().is_success() {
            return Ok(None);
        }
        let body: ProviderProfileResponse = response
            .json()
            .await
            .map_err(|e| FacadeError::InvalidResponse(e.to_string()))?;
        Ok(body.user_id)
    }
}
