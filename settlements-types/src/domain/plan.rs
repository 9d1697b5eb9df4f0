//! Subscription plan catalog types.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use super::money::Money;

/// Billing cadence for a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub enum BillingCycle {
    Monthly,
}

impl AsRef<str> for BillingCycle {
    fn as_ref(&self) -> &str {
        match self {
            Self::Monthly => "Monthly",
        }
    }
}

/// Which side of the marketplace a plan is sold to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PlanAudience {
    /// Equipment-capacity plans, bought by Owners.
    Owner,
    /// Client-capacity plans, bought by Providers.
    Provider,
}

/// The id of the last Owner plan in the catalog.
///
/// The catalog is partitioned by an id-range convention inherited from the
/// seeded data: plans with ids <= 3 are Owner (equipment-capacity) plans and
/// ids >= 4 are Provider (client-capacity) plans. The convention is fragile
/// (an explicit audience column would be cleaner) but is preserved for
/// behavioral compatibility; this function is the single place that encodes
/// it.
const LAST_OWNER_PLAN_ID: i64 = 3;

/// Classifies a plan id per the catalog id-range convention.
pub fn plan_audience(plan_id: i64) -> PlanAudience {
    if plan_id <= LAST_OWNER_PLAN_ID {
        PlanAudience::Owner
    } else {
        PlanAudience::Provider
    }
}

/// A subscription plan from the catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Plan {
    pub id: i64,
    pub name: String,
    pub price: Money,
    pub billing_cycle: BillingCycle,
    /// Maximum equipment units, for Owner plans.
    pub max_units: Option<i64>,
    /// Maximum clients, for Provider plans. `None` on a Provider plan means
    /// unlimited.
    pub max_clients: Option<i64>,
    pub features: Vec<String>,
}

impl Plan {
    /// Returns which audience this plan is sold to.
    pub fn audience(&self) -> PlanAudience {
        plan_audience(self.id)
    }
}
