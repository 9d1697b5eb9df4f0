//! # Settlements Types
//!
//! Domain types and port traits for the payment and commission settlement
//! engine. This crate has ZERO external IO dependencies - only data
//! structures, business rules, and trait definitions.
//!
//! ## Architecture
//!
//! This crate represents the **innermost core** of the hexagonal architecture:
//! - `domain/` - Pure domain types (Money, payment aggregates, plans, events)
//! - `metadata/` - The checkout metadata wire contract
//! - `ports/` - Trait definitions that adapters must implement
//! - `dto/` - Data Transfer Objects for API boundaries
//! - `error/` - Domain and application error types

pub mod domain;
pub mod dto;
pub mod error;
pub mod metadata;
pub mod ports;

// Re-export commonly used types
pub use domain::{
    BillingCycle, Currency, Money, OutboxEvent, OutboxStatus, PaymentId, PaymentProcessedEvent,
    PaymentStatus, PaymentType, Plan, PlanAudience, ServicePayment,
    ServicePaymentCompletedEvent, ServicePaymentId, SubscriptionPayment, plan_audience,
};
pub use dto::*;
pub use error::{AppError, DomainError, FacadeError, GatewayError, PublishError, RepoError};
pub use metadata::CheckoutMetadata;
pub use ports::{
    ChargeRequest, ChargeResult, CheckoutRequest, CheckoutSession, EventPublisher,
    NormalizedStatus, NotificationsFacade, PaymentProvider, PaymentRepository, ProfilesFacade,
    RefundResult, ServiceRequestData, ServiceRequestsFacade, WorkOrderData, WorkOrdersFacade,
};
