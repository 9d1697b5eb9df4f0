//! Outbound HTTP Adapters
//!
//! Gateway adapters (one per payment provider, selected by configuration),
//! anti-corruption facades for the sibling microservices, and the event-bus
//! publisher used by the relay worker.

mod culqi;
mod event_bus;
mod izipay;
mod notifications;
mod profiles;
mod service_requests;
mod stripe;
mod work_orders;

pub use culqi::CulqiProvider;
pub use event_bus::HttpEventBus;
pub use izipay::IzipayProvider;
pub use notifications::NotificationsHttpFacade;
pub use profiles::ProfilesHttpFacade;
pub use service_requests::ServiceRequestsHttpFacade;
pub use stripe::StripeProvider;
pub use work_orders::WorkOrdersHttpFacade;

use std::time::Duration;

/// Bound on every outbound call so a hung dependency cannot stall a
/// completion request.
pub const OUTBOUND_TIMEOUT: Duration = Duration::from_secs(30);

/// Builds the reqwest client shared by an adapter, with the outbound
/// timeout applied.
pub(crate) fn http_client(timeout: Duration) -> reqwest::Client {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .unwrap_or_else(|_| reqwest::Client::new())
}

/// Maps a reqwest failure onto the gateway error taxonomy.
pub(crate) fn gateway_transport_error(err: reqwest::Error) -> settlements_types::GatewayError {
    if err.is_timeout() {
        settlements_types::GatewayError::Timeout
    } else {
        settlements_types::GatewayError::Transport(err.to_string())
    }
}

/// Maps a reqwest failure onto the facade error taxonomy.
pub(crate) fn facade_transport_error(err: reqwest::Error) -> settlements_types::FacadeError {
    if err.is_timeout() {
        settlements_types::FacadeError::Timeout
    } else {
        settlements_types::FacadeError::Transport(err.to_string())
    }
}
