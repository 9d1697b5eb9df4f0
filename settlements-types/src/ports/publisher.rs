//! Outbound event delivery port, used by the relay worker.

use crate::domain::OutboxEvent;
use crate::error::PublishError;

/// Delivers one event to the message bus. The relay worker handles retry
/// and bookkeeping around this call.
#[async_trait::async_trait]
pub trait EventPublisher: Send + Sync + 'static {
    async fn publish(&self, event: &OutboxEvent) -> Result<(), PublishError>;
}
