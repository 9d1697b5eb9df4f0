//! Subscription payment aggregate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::money::Money;
use super::status::PaymentStatus;
use crate::error::DomainError;

/// Unique identifier for a SubscriptionPayment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct PaymentId(Uuid);

impl PaymentId {
    /// Creates a new random PaymentId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a PaymentId from an existing UUID.
    pub fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// Returns the underlying UUID.
    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    /// Returns the UUID value.
    pub fn into_uuid(self) -> Uuid {
        self.0
    }
}

impl Default for PaymentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for PaymentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for PaymentId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A one-sided charge: subscriber pays the platform for a plan.
///
/// One record exists per gateway checkout session. The session id is the
/// idempotency anchor: the record may be created when the checkout session
/// is opened or on first successful verification, and both paths converge
/// on the same row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubscriptionPayment {
    /// Unique identifier
    pub id: PaymentId,
    /// Subscriber (foreign identity owned by the IAM/Profiles services)
    pub user_id: i64,
    /// Plan being paid for
    pub plan_id: i64,
    /// Amount charged, in the plan's currency
    pub amount: Money,
    /// Gateway checkout session id (unique per payment)
    pub gateway_session_id: String,
    /// Gateway transaction reference, set on completion
    pub gateway_txn_ref: Option<String>,
    /// Email captured by the gateway checkout, if any
    pub customer_email: Option<String>,
    /// Human-readable description
    pub description: String,
    pub status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl SubscriptionPayment {
    /// Creates a new pending subscription payment.
    pub fn new(
        user_id: i64,
        plan_id: i64,
        amount: Money,
        gateway_session_id: impl Into<String>,
        customer_email: Option<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            id: PaymentId::new(),
            user_id,
            plan_id,
            amount,
            gateway_session_id: gateway_session_id.into(),
            gateway_txn_ref: None,
            customer_email,
            description: description.into(),
            status: PaymentStatus::Pending,
            created_at: Utc::now(),
            completed_at: None,
        }
    }

    /// Reconstructs a payment from database fields.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: PaymentId,
        user_id: i64,
        plan_id: i64,
        amount: Money,
        gateway_session_id: String,
        gateway_txn_ref: Option<String>,
        customer_email: Option<String>,
        description: String,
        status: PaymentStatus,
        created_at: DateTime<Utc>,
        completed_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            user_id,
            plan_id,
            amount,
            gateway_session_id,
            gateway_txn_ref,
            customer_email,
            description,
            status,
            created_at,
            completed_at,
        }
    }

    /// Transitions `Pending -> Completed`, recording the gateway reference.
    pub fn mark_completed(&mut self, gateway_txn_ref: Option<String>) -> Result<(), DomainError> {
        if self.status != PaymentStatus::Pending {
            return Err(DomainError::InvalidStatusTransition {
                from: self.status,
                to: PaymentStatus::Completed,
            });
        }
        self.status = PaymentStatus::Completed;
        self.gateway_txn_ref = gateway_txn_ref;
        self.completed_at = Some(Utc::now());
        Ok(())
    }

    /// Transitions `Pending -> Failed`.
    pub fn mark_failed(&mut self) -> Result<(), DomainError> {
        if self.status != PaymentStatus::Pending {
            return Err(DomainError::InvalidStatusTransition {
                from: self.status,
                to: PaymentStatus::Failed,
            });
        }
        self.status = PaymentStatus::Failed;
        Ok(())
    }

    /// Transitions `Completed -> Refunded`.
    pub fn mark_refunded(&mut self) -> Result<(), DomainError> {
        if self.status != PaymentStatus::Completed {
            return Err(DomainError::InvalidStatusTransition {
                from: self.status,
                to: PaymentStatus::Refunded,
            });
        }
        self.status = PaymentStatus::Refunded;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Currency;
    use rust_decimal_macros::dec;

    fn payment() -> SubscriptionPayment {
        SubscriptionPayment::new(
            7,
            2,
            Money::new(dec!(35.13), Currency::USD).unwrap(),
            "cs_test_123",
            Some("owner@example.com".to_string()),
            "Subscription to Standard",
        )
    }

    #[test]
    fn test_new_payment_is_pending() {
        let p = payment();
        assert_eq!(p.status, PaymentStatus::Pending);
        assert!(p.completed_at.is_none());
        assert!(p.gateway_txn_ref.is_none());
    }

    #[test]
    fn test_mark_completed() {
        let mut p = payment();
        p.mark_completed(Some("pi_456".to_string())).unwrap();
        assert_eq!(p.status, PaymentStatus::Completed);
        assert_eq!(p.gateway_txn_ref.as_deref(), Some("pi_456"));
        assert!(p.completed_at.is_some());
    }

    #[test]
    fn test_double_completion_rejected() {
        let mut p = payment();
        p.mark_completed(None).unwrap();
        let result = p.mark_completed(None);
        assert!(matches!(
            result,
            Err(DomainError::InvalidStatusTransition { .. })
        ));
    }

    #[test]
    fn test_refund_requires_completed() {
        let mut p = payment();
        assert!(p.mark_refunded().is_err());
        p.mark_completed(None).unwrap();
        p.mark_refunded().unwrap();
        assert_eq!(p.status, PaymentStatus::Refunded);
    }
}
