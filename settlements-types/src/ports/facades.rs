//! Ports for sibling microservices reached over HTTP.
//!
//! Contract shared by all facades: business-level refusals are `Ok(false)`
//! or `Ok(None)`, transport failures are `Err(FacadeError)`. Identities
//! returned here are opaque; their existence is only ever validated through
//! these calls, never through local constraints.

use rust_decimal::Decimal;

use crate::error::FacadeError;

/// Work-order snapshot from the WorkOrders service.
#[derive(Debug, Clone)]
pub struct WorkOrderData {
    pub id: i64,
    pub number: String,
    pub title: String,
    pub status: String,
    pub service_request_id: Option<i64>,
    /// Cost recorded on resolution; major-unit decimal.
    pub cost: Option<Decimal>,
}

/// Service-request snapshot from the ServiceRequests service.
#[derive(Debug, Clone)]
pub struct ServiceRequestData {
    pub id: i64,
    pub client_id: i64,
    pub company_id: i64,
    pub status: String,
}

/// Profiles service: identity resolution and counterparty mutations.
#[async_trait::async_trait]
pub trait ProfilesFacade: Send + Sync + 'static {
    async fn fetch_owner_id_by_user_id(&self, user_id: i64) -> Result<Option<i64>, FacadeError>;

    async fn fetch_provider_id_by_user_id(&self, user_id: i64)
    -> Result<Option<i64>, FacadeError>;

    async fn update_owner_plan(
        &self,
        owner_id: i64,
        plan_id: i64,
        max_units: i64,
    ) -> Result<bool, FacadeError>;

    async fn update_provider_plan(
        &self,
        provider_id: i64,
        plan_id: i64,
        max_clients: i64,
    ) -> Result<bool, FacadeError>;

    /// Credits the provider's balance with a settled amount.
    async fn update_provider_balance(
        &self,
        provider_id: i64,
        amount: Decimal,
    ) -> Result<bool, FacadeError>;

    async fn fetch_provider_company_name(
        &self,
        provider_id: i64,
    ) -> Result<Option<String>, FacadeError>;

    async fn fetch_provider_user_id(&self, provider_id: i64) -> Result<Option<i64>, FacadeError>;
}

/// WorkOrders service: read-only.
#[async_trait::async_trait]
pub trait WorkOrdersFacade: Send + Sync + 'static {
    async fn fetch_work_order(&self, work_order_id: i64)
    -> Result<Option<WorkOrderData>, FacadeError>;
}

/// ServiceRequests service: read-only.
#[async_trait::async_trait]
pub trait ServiceRequestsFacade: Send + Sync + 'static {
    async fn fetch_service_request(
        &self,
        service_request_id: i64,
    ) -> Result<Option<ServiceRequestData>, FacadeError>;
}

/// Notifications service: best-effort informational messages.
#[async_trait::async_trait]
pub trait NotificationsFacade: Send + Sync + 'static {
    async fn create_in_app_notification(
        &self,
        user_id: i64,
        title: &str,
        message: &str,
    ) -> Result<bool, FacadeError>;
}
