//! Event-bus publisher: delivers outbox events to the message bus over HTTP.

use settlements_types::{EventPublisher, OutboxEvent, PublishError};

use super::{OUTBOUND_TIMEOUT, http_client};

pub struct HttpEventBus {
    base_url: String,
    http: reqwest::Client,
}

impl HttpEventBus {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http: http_client(OUTBOUND_TIMEOUT),
        }
    }
}

#[async_trait::async_trait]
impl EventPublisher for HttpEventBus {
    async fn publish(&self, event: &OutboxEvent) -> Result<(), PublishError> {
        let body = serde_json::json!({
            "id": event.id,
            "eventType": event.event_type,
            "occurredAt": event.created_at,
            "payload": event.payload,
        });

        let response = self
            .http
            .post(format!("{}/events", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| PublishError::Transport(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(PublishError::Rejected {
                status: response.status().as_u16(),
            })
        }
    }
}
