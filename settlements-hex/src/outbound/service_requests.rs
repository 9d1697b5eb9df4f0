//! HTTP facade for the ServiceRequests microservice.

use serde::Deserialize;

use settlements_types::{FacadeError, ServiceRequestData, ServiceRequestsFacade};

use super::{OUTBOUND_TIMEOUT, facade_transport_error, http_client};

pub struct ServiceRequestsHttpFacade {
    base_url: String,
    http: reqwest::Client,
}

impl ServiceRequestsHttpFacade {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: http_client(OUTBOUND_TIMEOUT),
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct ServiceRequestResponse {
    id: i64,
    client_id: i64,
    company_id: i64,
    status: String,
}

#[async_trait::async_trait]
impl ServiceRequestsFacade for ServiceRequestsHttpFacade {
    async fn fetch_service_request(
        &self,
        service_request_id: i64,
    ) -> Result<Option<ServiceRequestData>, FacadeError> {
        let response = self
            .http
            .get(format!(
                "{}/api/v1/service-requests/{}",
                self.base_url, service_request_id
            ))
            .send()
            .await
            .map_err(facade_transport_error)?;

        if !response.status().is_success() {
            return Ok(None);
        }

        let body: ServiceRequestResponse = response
            .json()
            .await
            .map_err(|e| FacadeError::InvalidResponse(e.to_string()))?;

        Ok(Some(ServiceRequestData {
            id: body.id,
            client_id: body.client_id,
            company_id: body.company_id,
            status: body.status,
        }))
    }
}
