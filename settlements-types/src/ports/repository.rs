//! Repository port trait.
//!
//! This is the primary driven port in the hexagonal architecture.
//! Adapters (Postgres, SQLite, in-memory test doubles) implement this trait.

use uuid::Uuid;

use crate::domain::{
    OutboxEvent, Plan, ServicePayment, ServicePaymentId, SubscriptionPayment,
};
use crate::error::RepoError;

/// The persistence port for the settlement engine.
///
/// Completion methods are compare-and-swap transitions: the status update is
/// conditional on the row still being `Pending`, and the domain events
/// (derived from the final row) are written to the outbox in the same
/// database transaction as the transition. Exactly one concurrent caller per
/// aggregate observes `won == true`; everyone else gets the already-completed
/// row back. This closes the replay race without a lookup-then-write.
#[async_trait::async_trait]
pub trait PaymentRepository: Send + Sync + 'static {
    // ─────────────────────────────────────────────────────────────────────────
    // Plan catalog (read-only)
    // ─────────────────────────────────────────────────────────────────────────

    /// Lists the full plan catalog.
    async fn list_plans(&self) -> Result<Vec<Plan>, RepoError>;

    /// Gets a plan by id.
    async fn find_plan(&self, plan_id: i64) -> Result<Option<Plan>, RepoError>;

    // ─────────────────────────────────────────────────────────────────────────
    // Subscription payments
    // ─────────────────────────────────────────────────────────────────────────

    /// Finds the payment for a gateway checkout session, if one exists.
    async fn find_subscription_payment_by_session(
        &self,
        session_id: &str,
    ) -> Result<Option<SubscriptionPayment>, RepoError>;

    /// Completes the subscription payment for `candidate.gateway_session_id`.
    ///
    /// Inserts `candidate` if no row exists for the session yet (checkout
    /// creation and first-verification paths converge here), then performs
    /// the conditional `Pending -> Completed` transition and, on winning,
    /// records a `PAYMENT_PROCESSED` outbox event built from the final row.
    /// Returns the final row and whether this call won the transition.
    async fn complete_subscription_payment(
        &self,
        candidate: SubscriptionPayment,
        gateway_txn_ref: Option<&str>,
    ) -> Result<(SubscriptionPayment, bool), RepoError>;

    /// Conditionally transitions `Completed -> Refunded` by session id.
    async fn mark_subscription_payment_refunded(
        &self,
        session_id: &str,
    ) -> Result<SubscriptionPayment, RepoError>;

    // ─────────────────────────────────────────────────────────────────────────
    // Service payments
    // ─────────────────────────────────────────────────────────────────────────

    /// Inserts a new pending service payment (created at checkout time).
    async fn insert_service_payment(&self, payment: &ServicePayment) -> Result<(), RepoError>;

    /// Gets a service payment by id.
    async fn find_service_payment(
        &self,
        id: ServicePaymentId,
    ) -> Result<Option<ServicePayment>, RepoError>;

    /// Gets the service payment for a work order, if any.
    async fn find_service_payment_by_work_order(
        &self,
        work_order_id: i64,
    ) -> Result<Option<ServicePayment>, RepoError>;

    /// Conditional `Pending -> Completed` transition. On winning, records
    /// `PAYMENT_PROCESSED` and `SERVICE_PAYMENT_COMPLETED` outbox events
    /// built from the final row.
    ///
    /// Returns `RepoError::NotFound` when no payment exists for `id`.
    async fn complete_service_payment(
        &self,
        id: ServicePaymentId,
        gateway_charge_ref: &str,
        gateway_txn_ref: &str,
    ) -> Result<(ServicePayment, bool), RepoError>;

    /// Conditionally transitions `Completed -> Refunded`.
    async fn mark_service_payment_refunded(
        &self,
        id: ServicePaymentId,
    ) -> Result<ServicePayment, RepoError>;

    // ─────────────────────────────────────────────────────────────────────────
    // Event outbox (relay worker)
    // ─────────────────────────────────────────────────────────────────────────

    /// Fetches events eligible for delivery: pending, under the attempt
    /// limit, and past their next-attempt time.
    async fn fetch_publishable_events(&self, limit: i64) -> Result<Vec<OutboxEvent>, RepoError>;

    /// Marks an event delivered.
    async fn mark_event_published(&self, id: Uuid) -> Result<(), RepoError>;

    /// Records a failed delivery attempt; parks the event as failed once
    /// the attempt limit is reached.
    async fn record_publish_failure(&self, id: Uuid, error: &str) -> Result<(), RepoError>;
}
