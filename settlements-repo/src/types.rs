//! Shared database types with feature-gated fields for SQLite and PostgreSQL.
//!
//! SQLite stores UUIDs, decimals and timestamps as TEXT; PostgreSQL uses
//! native UUID / NUMERIC / TIMESTAMPTZ columns. The row structs carry both
//! shapes behind feature gates and converge in `into_domain`.

use rust_decimal::Decimal;
use sqlx::FromRow;

use settlements_types::{
    BillingCycle, Currency, Money, OutboxEvent, OutboxStatus, PaymentId, PaymentStatus, Plan,
    RepoError, ServicePayment, ServicePaymentId, SubscriptionPayment,
};

// ─────────────────────────────────────────────────────────────────────────────
// Feature-gated imports
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(not(feature = "sqlite"))]
use chrono::{DateTime, Utc};
#[cfg(not(feature = "sqlite"))]
use uuid::Uuid;

// ─────────────────────────────────────────────────────────────────────────────
// Parsing helpers
// ─────────────────────────────────────────────────────────────────────────────

pub fn parse_currency(s: &str) -> Result<Currency, RepoError> {
    s.parse()
        .map_err(|_| RepoError::Database(format!("Unknown currency: {}", s)))
}

pub fn parse_status(s: &str) -> Result<PaymentStatus, RepoError> {
    s.parse().map_err(RepoError::Database)
}

pub fn parse_billing_cycle(s: &str) -> Result<BillingCycle, RepoError> {
    match s {
        "Monthly" => Ok(BillingCycle::Monthly),
        other => Err(RepoError::Database(format!(
            "Unknown billing cycle: {}",
            other
        ))),
    }
}

#[cfg(feature = "sqlite")]
pub fn parse_decimal(s: &str) -> Result<Decimal, RepoError> {
    s.parse()
        .map_err(|_| RepoError::Database(format!("Invalid decimal: {}", s)))
}

#[cfg(feature = "sqlite")]
pub fn parse_timestamp(s: &str) -> Result<chrono::DateTime<chrono::Utc>, RepoError> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map_err(|e| RepoError::Database(e.to_string()))
        .map(|dt| dt.with_timezone(&chrono::Utc))
}

#[cfg(feature = "sqlite")]
pub fn parse_uuid(s: &str) -> Result<uuid::Uuid, RepoError> {
    uuid::Uuid::parse_str(s).map_err(|e| RepoError::Database(e.to_string()))
}

// ─────────────────────────────────────────────────────────────────────────────
// Database row structs (derive FromRow for automatic mapping)
// ─────────────────────────────────────────────────────────────────────────────

/// Plan row from database.
#[derive(FromRow)]
pub struct DbPlan {
    pub id: i64,
    pub name: String,

    #[cfg(not(feature = "sqlite"))]
    pub price: Decimal,
    #[cfg(feature = "sqlite")]
    pub price: String,

    pub currency: String,
    pub billing_cycle: String,
    pub max_units: Option<i64>,
    pub max_clients: Option<i64>,

    #[cfg(not(feature = "sqlite"))]
    pub features: serde_json::Value,
    #[cfg(feature = "sqlite")]
    pub features: String,
}

impl DbPlan {
    pub fn into_domain(self) -> Result<Plan, RepoError> {
        let currency = parse_currency(&self.currency)?;
        let billing_cycle = parse_billing_cycle(&self.billing_cycle)?;

        #[cfg(not(feature = "sqlite"))]
        let (price, features) = {
            let features: Vec<String> = serde_json::from_value(self.features)
                .map_err(|e| RepoError::Database(e.to_string()))?;
            (self.price, features)
        };

        #[cfg(feature = "sqlite")]
        let (price, features) = {
            let price = parse_decimal(&self.price)?;
            let features: Vec<String> = serde_json::from_str(&self.features)
                .map_err(|e| RepoError::Database(e.to_string()))?;
            (price, features)
        };

        Ok(Plan {
            id: self.id,
            name: self.name,
            price: Money::new(price, currency).map_err(RepoError::Domain)?,
            billing_cycle,
            max_units: self.max_units,
            max_clients: self.max_clients,
            features,
        })
    }
}

/// Subscription payment row from database.
#[derive(FromRow)]
pub struct DbSubscriptionPayment {
    #[cfg(not(feature = "sqlite"))]
    pub id: Uuid,
    #[cfg(feature = "sqlite")]
    pub id: String,

    pub user_id: i64,
    pub plan_id: i64,

    #[cfg(not(feature = "sqlite"))]
    pub amount: Decimal,
    #[cfg(feature = "sqlite")]
    pub amount: String,

    pub currency: String,
    pub gateway_session_id: String,
    pub gateway_txn_ref: Option<String>,
    pub customer_email: Option<String>,
    pub description: String,
    pub status: String,

    #[cfg(not(feature = "sqlite"))]
    pub created_at: DateTime<Utc>,
    #[cfg(feature = "sqlite")]
    pub created_at: String,

    #[cfg(not(feature = "sqlite"))]
    pub completed_at: Option<DateTime<Utc>>,
    #[cfg(feature = "sqlite")]
    pub completed_at: Option<String>,
}

impl DbSubscriptionPayment {
    pub fn into_domain(self) -> Result<SubscriptionPayment, RepoError> {
        let currency = parse_currency(&self.currency)?;
        let status = parse_status(&self.status)?;

        #[cfg(not(feature = "sqlite"))]
        let (id, amount, created_at, completed_at) =
            (self.id, self.amount, self.created_at, self.completed_at);

        #[cfg(feature = "sqlite")]
        let (id, amount, created_at, completed_at) = (
            parse_uuid(&self.id)?,
            parse_decimal(&self.amount)?,
            parse_timestamp(&self.created_at)?,
            self.completed_at.as_deref().map(parse_timestamp).transpose()?,
        );

        Ok(SubscriptionPayment::from_parts(
            PaymentId::from_uuid(id),
            self.user_id,
            self.plan_id,
            Money::new(amount, currency).map_err(RepoError::Domain)?,
            self.gateway_session_id,
            self.gateway_txn_ref,
            self.customer_email,
            self.description,
            status,
            created_at,
            completed_at,
        ))
    }
}

/// Service payment row from database.
#[derive(FromRow)]
pub struct DbServicePayment {
    #[cfg(not(feature = "sqlite"))]
    pub id: Uuid,
    #[cfg(feature = "sqlite")]
    pub id: String,

    pub work_order_id: i64,
    pub service_request_id: i64,
    pub owner_id: i64,
    pub provider_id: i64,

    #[cfg(not(feature = "sqlite"))]
    pub total_amount: Decimal,
    #[cfg(feature = "sqlite")]
    pub total_amount: String,

    #[cfg(not(feature = "sqlite"))]
    pub fee_percentage: Decimal,
    #[cfg(feature = "sqlite")]
    pub fee_percentage: String,

    #[cfg(not(feature = "sqlite"))]
    pub platform_fee: Decimal,
    #[cfg(feature = "sqlite")]
    pub platform_fee: String,

    #[cfg(not(feature = "sqlite"))]
    pub provider_amount: Decimal,
    #[cfg(feature = "sqlite")]
    pub provider_amount: String,

    pub currency: String,
    pub gateway_charge_ref: Option<String>,
    pub gateway_txn_ref: Option<String>,
    pub status: String,
    pub description: String,

    #[cfg(not(feature = "sqlite"))]
    pub created_at: DateTime<Utc>,
    #[cfg(feature = "sqlite")]
    pub created_at: String,

    #[cfg(not(feature = "sqlite"))]
    pub completed_at: Option<DateTime<Utc>>,
    #[cfg(feature = "sqlite")]
    pub completed_at: Option<String>,
}

impl DbServicePayment {
    pub fn into_domain(self) -> Result<ServicePayment, RepoError> {
        let currency = parse_currency(&self.currency)?;
        let status = parse_status(&self.status)?;

        #[cfg(not(feature = "sqlite"))]
        let (id, total_amount, fee_percentage, platform_fee, provider_amount, created_at, completed_at) = (
            self.id,
            self.total_amount,
            self.fee_percentage,
            self.platform_fee,
            self.provider_amount,
            self.created_at,
            self.completed_at,
        );

        #[cfg(feature = "sqlite")]
        let (id, total_amount, fee_percentage, platform_fee, provider_amount, created_at, completed_at) = (
            parse_uuid(&self.id)?,
            parse_decimal(&self.total_amount)?,
            parse_decimal(&self.fee_percentage)?,
            parse_decimal(&self.platform_fee)?,
            parse_decimal(&self.provider_amount)?,
            parse_timestamp(&self.created_at)?,
            self.completed_at.as_deref().map(parse_timestamp).transpose()?,
        );

        Ok(ServicePayment::from_parts(
            ServicePaymentId::from_uuid(id),
            self.work_order_id,
            self.service_request_id,
            self.owner_id,
            self.provider_id,
            total_amount,
            fee_percentage,
            platform_fee,
            provider_amount,
            currency,
            self.gateway_charge_ref,
            self.gateway_txn_ref,
            status,
            self.description,
            created_at,
            completed_at,
        ))
    }
}

/// Outbox event row from database.
#[derive(FromRow)]
pub struct DbOutboxEvent {
    #[cfg(not(feature = "sqlite"))]
    pub id: Uuid,
    #[cfg(feature = "sqlite")]
    pub id: String,

    pub event_type: String,

    #[cfg(not(feature = "sqlite"))]
    pub payload: serde_json::Value,
    #[cfg(feature = "sqlite")]
    pub payload: String,

    pub status: String,

    #[cfg(not(feature = "sqlite"))]
    pub created_at: DateTime<Utc>,
    #[cfg(feature = "sqlite")]
    pub created_at: String,

    #[cfg(not(feature = "sqlite"))]
    pub processed_at: Option<DateTime<Utc>>,
    #[cfg(feature = "sqlite")]
    pub processed_at: Option<String>,

    pub attempts: i32,
    pub last_error: Option<String>,
}

impl DbOutboxEvent {
    pub fn into_domain(self) -> Result<OutboxEvent, RepoError> {
        let status = match self.status.as_str() {
            "PENDING" => OutboxStatus::Pending,
            "PUBLISHED" => OutboxStatus::Published,
            "FAILED" => OutboxStatus::Failed,
            _ => OutboxStatus::Pending,
        };

        #[cfg(not(feature = "sqlite"))]
        let (id, payload, created_at, processed_at) =
            (self.id, self.payload, self.created_at, self.processed_at);

        #[cfg(feature = "sqlite")]
        let (id, payload, created_at, processed_at) = (
            parse_uuid(&self.id)?,
            serde_json::from_str(&self.payload)
                .map_err(|e| RepoError::Database(e.to_string()))?,
            parse_timestamp(&self.created_at)?,
            self.processed_at.as_deref().map(parse_timestamp).transpose()?,
        );

        Ok(OutboxEvent {
            id,
            event_type: self.event_type,
            payload,
            status,
            created_at,
            processed_at,
            attempts: self.attempts,
            last_error: self.last_error,
        })
    }
}
