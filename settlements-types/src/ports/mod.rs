//! Port traits implemented by adapters.
//!
//! - `repository` - persistence (driven by the application service)
//! - `provider` - payment gateway capability set
//! - `facades` - sibling microservices reached over HTTP
//! - `publisher` - outbound event delivery for the relay worker

pub mod facades;
pub mod provider;
pub mod publisher;
pub mod repository;

pub use facades::{
    NotificationsFacade, ProfilesFacade, ServiceRequestData, ServiceRequestsFacade, WorkOrderData,
    WorkOrdersFacade,
};
pub use provider::{
    ChargeRequest, ChargeResult, CheckoutRequest, CheckoutSession, NormalizedStatus,
    PaymentProvider, RefundResult,
};
pub use publisher::EventPublisher;
pub use repository::PaymentRepository;
