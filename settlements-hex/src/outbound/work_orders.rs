//! HTTP facade for the WorkOrders microservice.

use rust_decimal::Decimal;
use serde::Deserialize;

use settlements_types::{FacadeError, WorkOrderData, WorkOrdersFacade};

use super::{OUTBOUND_TIMEOUT, facade_transport_error, http_client};

pub struct WorkOrdersHttpFacade {
    base_url: String,
    http: reqwest::Client,
}

impl WorkOrdersHttpFacade {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: http_client(OUTBOUND_TIMEOUT),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WorkOrderResponse {
    id: i64,
    work_order_number: String,
    title: String,
    status: String,
    service_request_id: Option<i64>,
    cost: Option<Decimal>,
}

#[async_trait::async_trait]
impl WorkOrdersFacade for WorkOrdersHttpFacade {
    async fn fetch_work_order(
        &self,
        work_order_id: i64,
    ) -> Result<Option<WorkOrderData>, FacadeError> {
        let response = self
            .http
            .get(format!("{}/api/v1/work-orders/{}", self.base_url, work_order_id))
            .send()
            .await
            .map_err(facade_transport_error)?;

        if !response.status().is_success() {
            return Ok(None);
        }

        let body: WorkOrderResponse = response
            .json()
            .await
            .map_err(|e| FacadeError::InvalidResponse(e.to_string()))?;

        Ok(Some(WorkOrderData {
            id: body.id,
            number: body.work_order_number,
            title: body.title,
            status: body.status,
            service_request_id: body.service_request_id,
            cost: body.cost,
        }))
    }
}
