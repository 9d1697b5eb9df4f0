//! Checkout metadata wire contract.
//!
//! The key/value metadata attached to a gateway checkout session is the
//! SOLE channel for recovering business context at completion time. The
//! completion protocol never guesses identifiers from anywhere else, so
//! this contract must be preserved bit-exact: the keys below, camelCase,
//! with monetary values formatted as decimal strings with exactly two
//! fractional digits.

use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::domain::ServicePaymentId;
use crate::error::DomainError;

pub const KEY_PAYMENT_TYPE: &str = "paymentType";
pub const KEY_USER_ID: &str = "userId";
pub const KEY_PLAN_ID: &str = "planId";
pub const KEY_SERVICE_PAYMENT_ID: &str = "servicePaymentId";
pub const KEY_WORK_ORDER_ID: &str = "workOrderId";
pub const KEY_SERVICE_REQUEST_ID: &str = "serviceRequestId";
pub const KEY_OWNER_ID: &str = "ownerId";
pub const KEY_PROVIDER_ID: &str = "providerId";
pub const KEY_TOTAL_AMOUNT: &str = "totalAmount";
pub const KEY_PLATFORM_FEE: &str = "platformFee";
pub const KEY_PROVIDER_AMOUNT: &str = "providerAmount";

/// `paymentType` value marking the service-payment flow.
pub const PAYMENT_TYPE_SERVICE: &str = "service";

/// Business context carried through a gateway checkout session.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckoutMetadata {
    /// Subscription upgrade: subscriber pays the platform for a plan.
    Subscription { user_id: i64, plan_id: i64 },
    /// Service payment: Owner pays, platform keeps a fee, Provider is
    /// credited. Amounts are denormalized so completion needs no re-query.
    Service {
        service_payment_id: ServicePaymentId,
        work_order_id: i64,
        service_request_id: i64,
        owner_id: i64,
        provider_id: i64,
        total_amount: Decimal,
        platform_fee: Decimal,
        provider_amount: Decimal,
    },
}

impl CheckoutMetadata {
    /// Encodes to the gateway metadata map.
    pub fn to_map(&self) -> HashMap<String, String> {
        let mut map = HashMap::new();
        match self {
            Self::Subscription { user_id, plan_id } => {
                map.insert(KEY_USER_ID.to_string(), user_id.to_string());
                map.insert(KEY_PLAN_ID.to_string(), plan_id.to_string());
            }
            Self::Service {
                service_payment_id,
                work_order_id,
                service_request_id,
                owner_id,
                provider_id,
                total_amount,
                platform_fee,
                provider_amount,
            } => {
                map.insert(KEY_PAYMENT_TYPE.to_string(), PAYMENT_TYPE_SERVICE.to_string());
                map.insert(
                    KEY_SERVICE_PAYMENT_ID.to_string(),
                    service_payment_id.to_string(),
                );
                map.insert(KEY_WORK_ORDER_ID.to_string(), work_order_id.to_string());
                map.insert(
                    KEY_SERVICE_REQUEST_ID.to_string(),
                    service_request_id.to_string(),
                );
                map.insert(KEY_OWNER_ID.to_string(), owner_id.to_string());
                map.insert(KEY_PROVIDER_ID.to_string(), provider_id.to_string());
                map.insert(KEY_TOTAL_AMOUNT.to_string(), format_amount(*total_amount));
                map.insert(KEY_PLATFORM_FEE.to_string(), format_amount(*platform_fee));
                map.insert(
                    KEY_PROVIDER_AMOUNT.to_string(),
                    format_amount(*provider_amount),
                );
            }
        }
        map
    }

    /// Decodes from a gateway metadata map. Missing or malformed keys are
    /// terminal failures for the completion protocol.
    pub fn from_map(map: &HashMap<String, String>) -> Result<Self, DomainError> {
        match map.get(KEY_PAYMENT_TYPE).map(String::as_str) {
            Some(PAYMENT_TYPE_SERVICE) => Ok(Self::Service {
                service_payment_id: parse_value(map, KEY_SERVICE_PAYMENT_ID)?,
                work_order_id: parse_value(map, KEY_WORK_ORDER_ID)?,
                service_request_id: parse_value(map, KEY_SERVICE_REQUEST_ID)?,
                owner_id: parse_value(map, KEY_OWNER_ID)?,
                provider_id: parse_value(map, KEY_PROVIDER_ID)?,
                total_amount: parse_value(map, KEY_TOTAL_AMOUNT)?,
                platform_fee: parse_value(map, KEY_PLATFORM_FEE)?,
                provider_amount: parse_value(map, KEY_PROVIDER_AMOUNT)?,
            }),
            Some(other) => Err(DomainError::InvalidMetadata {
                key: KEY_PAYMENT_TYPE.to_string(),
                value: other.to_string(),
            }),
            None => Ok(Self::Subscription {
                user_id: parse_value(map, KEY_USER_ID)?,
                plan_id: parse_value(map, KEY_PLAN_ID)?,
            }),
        }
    }
}

/// Formats a monetary value with exactly two fractional digits.
pub fn format_amount(value: Decimal) -> String {
    format!("{:.2}", value)
}

fn parse_value<T: std::str::FromStr>(
    map: &HashMap<String, String>,
    key: &str,
) -> Result<T, DomainError> {
    let raw = map
        .get(key)
        .ok_or_else(|| DomainError::MissingMetadata(key.to_string()))?;
    raw.parse().map_err(|_| DomainError::InvalidMetadata {
        key: key.to_string(),
        value: raw.clone(),
    })
}
