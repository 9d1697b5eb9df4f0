//! HTTP facade for the Notifications microservice. Best-effort only.

use serde_json::json;

use settlements_types::{FacadeError, NotificationsFacade};

use super::{OUTBOUND_TIMEOUT, facade_transport_error, http_client};

pub struct NotificationsHttpFacade {
    base_url: String,
    http: reqwest::Client,
}

impl NotificationsHttpFacade {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: http_client(OUTBOUND_TIMEOUT),
        }
    }
}

#[async_trait::async_trait]
impl NotificationsFacade for NotificationsHttpFacade {
    async fn create_in_app_notification(
        &self,
        user_id: i64,
        title: &str,
        message: &str,
    ) -> Result<bool, FacadeError> {
        let response = self
            .http
            .post(format!("{}/api/v1/notifications/in-app", self.base_url))
            .json(&json!({ "userId": user_id, "title": title, "message": message }))
            .send()
            .await
            .map_err(facade_transport_error)?;

        if response.status().is_success() {
            tracing::info!(user_id, "In-app notification created");
            Ok(true)
        } else {
            tracing::warn!(user_id, status = %response.status(), "Failed to create in-app notification");
            Ok(false)
        }
    }
}
