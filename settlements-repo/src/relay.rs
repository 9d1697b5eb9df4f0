//! Outbox relay worker.
//!
//! Drains pending outbox events to the message bus with at-least-once
//! semantics: an event is retried with incremental backoff until it is
//! delivered or exhausts its attempt budget, and is only marked published
//! after the bus accepted it. The worker runs outside the request path, so
//! publication never blocks or fails an HTTP response.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{error, info, instrument, warn};

use settlements_types::{EventPublisher, OutboxEvent, PaymentRepository};

const POLL_INTERVAL: Duration = Duration::from_secs(1);
const BATCH_SIZE: i64 = 10;

pub struct EventRelay<R: PaymentRepository> {
    repo: R,
    publisher: Arc<dyn EventPublisher>,
}

impl<R: PaymentRepository> EventRelay<R> {
    pub fn new(repo: R, publisher: Arc<dyn EventPublisher>) -> Self {
        Self { repo, publisher }
    }

    #[instrument(skip(self))]
    pub async fn run(self) {
        info!("Starting outbox event relay");
        loop {
            match self.repo.fetch_publishable_events(BATCH_SIZE).await {
                Ok(events) => {
                    if !events.is_empty() {
                        info!("Delivering {} outbox events", events.len());
                        for event in events {
                            self.process_event(event).await;
                        }
                    }
                }
                Err(e) => {
                    error!("Failed to fetch outbox events: {}", e);
                }
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    #[instrument(skip(self, event), fields(event_id = %event.id, event_type = %event.event_type))]
    async fn process_event(&self, event: OutboxEvent) {
        match self.publisher.publish(&event).await {
            Ok(()) => {
                if let Err(e) = self.repo.mark_event_published(event.id).await {
                    error!("Failed to mark event published: {}", e);
                }
            }
            Err(e) => {
                warn!(
                    "Delivery attempt {} failed: {}",
                    event.attempts + 1,
                    e
                );
                if let Err(e2) = self
                    .repo
                    .record_publish_failure(event.id, &e.to_string())
                    .await
                {
                    error!("Failed to record publish failure: {}", e2);
                }
            }
        }
    }
}
