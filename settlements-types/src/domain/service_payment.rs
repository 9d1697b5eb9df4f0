//! Service payment aggregate.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use super::money::Currency;
use super::status::PaymentStatus;
use crate::error::DomainError;

/// Unique identifier for a ServicePayment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(transparent)]
pub struct ServicePaymentId(Uuid);

impl ServicePaymentId {
    /// Creates a new random ServicePaymentId.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a ServicePaymentId from an existing UUID.
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

impl Default for ServicePaymentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ServicePaymentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for ServicePaymentId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

/// A two-sided settlement: Owner pays the platform, the platform keeps a
/// commission and credits the Provider with the remainder.
///
/// The commission split is computed once, at creation time, from the
/// work-order cost and the platform fee percentage. Completion is a pure
/// state transition and never recomputes the split.
///
/// `owner_id`, `provider_id`, `work_order_id` and `service_request_id` are
/// foreign identities owned by sibling services; they carry no local
/// referential integrity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServicePayment {
    /// Unique identifier
    pub id: ServicePaymentId,
    /// Completed work order being paid for (one payment per work order)
    pub work_order_id: i64,
    /// Service request the work order belongs to
    pub service_request_id: i64,
    /// Owner who pays
    pub owner_id: i64,
    /// Provider who receives the payment
    pub provider_id: i64,
    /// Gross amount charged to the Owner
    pub total_amount: Decimal,
    /// Fee percentage applied at creation
    pub fee_percentage: Decimal,
    /// Platform commission
    pub platform_fee: Decimal,
    /// Amount credited to the Provider (total minus fee)
    pub provider_amount: Decimal,
    pub currency: Currency,
    /// Gateway charge/payment-intent reference, set on completion
    pub gateway_charge_ref: Option<String>,
    /// Gateway transaction/session reference, set on completion
    pub gateway_txn_ref: Option<String>,
    pub status: PaymentStatus,
    pub description: String,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl ServicePayment {
    /// Creates a new pending service payment, front-loading the commission
    /// split from the work-order cost.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        work_order_id: i64,
        service_request_id: i64,
        owner_id: i64,
        provider_id: i64,
        total_amount: Decimal,
        fee_percentage: Decimal,
        currency: Currency,
        description: impl Into<String>,
    ) -> Result<Self, DomainError> {
        let split = commission::split(total_amount, fee_percentage)?;

        Ok(Self {
            id: ServicePaymentId::new(),
            work_order_id,
            service_request_id,
            owner_id,
            provider_id,
            total_amount: split.total_amount,
            fee_percentage: split.fee_percentage,
            platform_fee: split.platform_fee,
            provider_amount: split.counterparty_amount,
            currency,
            gateway_charge_ref: None,
            gateway_txn_ref: None,
            status: PaymentStatus::Pending,
            description: description.into(),
            created_at: Utc::now(),
            completed_at: None,
        })
    }

    /// Reconstructs a payment from database fields.
    #[allow(clippy::too_many_arguments)]
    pub fn from_parts(
        id: ServicePaymentId,
        work_order_id: i64,
        service_request_id: i64,
        owner_id: i64,
        provider_id: i64,
        total_amount: Decimal,
        fee_percentage: Decimal,
        platform_fee: Decimal,
        provider_amount: Decimal,
        currency: Currency,
        gateway_charge_ref: Option<String>,
        gateway_txn_ref: Option<String>,
        status: PaymentStatus,
        description: String,
        created_at: DateTime<Utc>,
        completed_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id,
            work_order_id,
            service_request_id,
            owner_id,
            provider_id,
            total_amount,
            fee_percentage,
            platform_fee,
            provider_amount,
            currency,
            gateway_charge_ref,
            gateway_txn_ref,
            status,
            description,
            created_at,
            completed_at,
        }
    }

    /// Transitions `Pending -> Completed`, recording gateway references.
    pub fn mark_completed(
        &mut self,
        gateway_charge_ref: impl Into<String>,
        gateway_txn_ref: impl Into<String>,
    ) -> Result<(), DomainError> {
        if self.status != PaymentStatus::Pending {
            return Err(DomainError::InvalidStatusTransition {
                from: self.status,
                to: PaymentStatus::Completed,
            });
        }
        self.status = PaymentStatus::Completed;
        self.gateway_charge_ref = Some(gateway_charge_ref.into());
        self.gateway_txn_ref = Some(gateway_txn_ref.into());
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
