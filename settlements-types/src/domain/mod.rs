//! Domain models for the settlement engine.

pub mod events;
pub mod money;
pub mod outbox;
pub mod plan;
pub mod service_payment;
pub mod status;
pub mod subscription_payment;

pub use events::{PaymentProcessedEvent, PaymentType, ServicePaymentCompletedEvent};
pub use money::{Currency, Money};
pub use outbox::{OutboxEvent, OutboxStatus};
pub use plan::{BillingCycle, Plan, PlanAudience, plan_audience};
pub use service_payment::{ServicePayment, ServicePaymentId};
pub use status::PaymentStatus;
pub use subscription_payment::{PaymentId, SubscriptionPayment};
