//! Error types for the settlement engine.

use crate::domain::{Currency, PaymentStatus};
use crate::ports::NormalizedStatus;

/// Domain-level errors (business logic violations).
#[derive(Debug, thiserror::Error)]
pub enum DomainError {
    #[error("Amount cannot be negative")]
    NegativeAmount,

    #[error("Currency mismatch: expected {expected}, got {got}")]
    CurrencyMismatch { expected: Currency, got: Currency },

    #[error("Unknown currency: {0}")]
    UnknownCurrency(String),

    #[error(transparent)]
    Split(#[from] commission::SplitError),

    #[error("Invalid status transition: {from} -> {to}")]
    InvalidStatusTransition {
        from: PaymentStatus,
        to: PaymentStatus,
    },

    #[error("Missing checkout metadata key: {0}")]
    MissingMetadata(String),

    #[error("Invalid checkout metadata value for {key}: {value}")]
    InvalidMetadata { key: String, value: String },

    #[error("Validation error: {0}")]
    ValidationError(String),
}

/// Repository-level errors (data access failures).
#[derive(Debug, thiserror::Error)]
pub enum RepoError {
    #[error(transparent)]
    Domain(#[from] DomainError),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Transaction error: {0}")]
    Transaction(String),

    #[error("Entity not found")]
    NotFound,

    #[error("Conflict: {0}")]
    Conflict(String),
}

/// Transport-level failures talking to a payment gateway.
///
/// Business declines are NOT errors; they come back inside `ChargeResult`
/// with `success = false`. Only the conditions below surface as `Err`.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Gateway transport error: {0}")]
    Transport(String),

    #[error("Gateway request timed out")]
    Timeout,

    #[error("Unknown gateway object: {0}")]
    NotFound(String),

    #[error("Unexpected gateway response: {0}")]
    InvalidResponse(String),
}

/// Transport-level failures talking to a sibling microservice facade.
///
/// Business-level refusals are `Ok(false)` / `Ok(None)` from the facade
/// methods; only transport problems become `Err`.
#[derive(Debug, thiserror::Error)]
pub enum FacadeError {
    #[error("Facade transport error: {0}")]
    Transport(String),

    #[error("Facade request timed out")]
    Timeout,

    #[error("Unexpected facade response: {0}")]
    InvalidResponse(String),
}

/// Failure to deliver an outbox event to the message bus.
#[derive(Debug, thiserror::Error)]
pub enum PublishError {
    #[error("Publish transport error: {0}")]
    Transport(String),

    #[error("Event bus rejected the event: HTTP {status}")]
    Rejected { status: u16 },
}

/// Application-level errors (for HTTP responses).
///
/// Maps cleanly to HTTP status codes. `DependencyUnavailable` is the
/// retryable class: the caller may safely re-submit the same request.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Payment not completed at gateway: {message}")]
    GatewayDeclined {
        status: NormalizedStatus,
        message: String,
    },

    #[error("Dependency unavailable ({dependency}): {message}")]
    DependencyUnavailable {
        dependency: &'static str,
        message: String,
    },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Classifies a gateway failure: unknown objects are 404s, everything
    /// else is a retryable dependency error.
    pub fn gateway_unavailable(err: GatewayError) -> Self {
        match err {
            GatewayError::NotFound(what) => AppError::NotFound(what),
            other => AppError::DependencyUnavailable {
                dependency: "payment-gateway",
                message: other.to_string(),
            },
        }
    }

    /// Wraps a facade transport failure as a retryable dependency error.
    pub fn facade_unavailable(dependency: &'static str, err: FacadeError) -> Self {
        AppError::DependencyUnavailable {
            dependency,
            message: err.to_string(),
        }
    }

    /// True when the caller can retry the request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::DependencyUnavailable { .. })
    }
}

impl From<RepoError> for AppError {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Domain(DomainError::ValidationError(msg)) => AppError::BadRequest(msg),
            RepoError::Domain(e) => AppError::BadRequest(e.to_string()),
            RepoError::NotFound => AppError::NotFound("Resource not found".into()),
            RepoError::Database(e) => AppError::Internal(e),
            RepoError::Transaction(e) => AppError::Internal(e),
            RepoError::Conflict(e) => AppError::BadRequest(e),
        }
    }
}

impl From<DomainError> for AppError {
    fn from(err: DomainError) -> Self {
        AppError::BadRequest(err.to_string())
    }
}
