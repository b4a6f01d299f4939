//! Rule-based eligibility filtering of the product catalog.
//!
//! Four ordered stages run over the catalog: the minimum-rate check, category
//! narrowing, special-condition narrowing and count rebalancing into the
//! configured `[floor, ceiling]` window. The engine makes no external calls.

pub mod outcome;
mod stages;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::domain::conditions::EligibilityConditions;
use crate::domain::product::Product;
use crate::errors::DomainError;

pub use outcome::{ExclusionReason, FilterOutcome};

use self::stages::{
    category_stage, rate_stage, rebalance_stage, record_unmatched, special_condition_stage,
    ExclusionLedger,
};

/// Bounds the matched set size. Defaults to `[15, 30]`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RebalancePolicy {
    pub floor: usize,
    pub ceiling: usize,
}

impl RebalancePolicy {
    pub fn new(floor: usize, ceiling: usize) -> Result<Self, DomainError> {
        if floor == 0 || floor > ceiling {
            return Err(DomainError::InvariantViolation(format!(
                "rebalance policy requires 0 < floor <= ceiling (got {floor}..{ceiling})"
            )));
        }
        Ok(Self { floor, ceiling })
    }
}

impl Default for RebalancePolicy {
    fn default() -> Self {
        Self { floor: 15, ceiling: 30 }
    }
}

pub trait EligibilityEngine: Send + Sync {
    fn filter(&self, conditions: &EligibilityConditions, catalog: &[Product]) -> FilterOutcome;
}

#[derive(Clone, Debug, Default)]
pub struct DeterministicEligibilityEngine {
    policy: RebalancePolicy,
}

impl DeterministicEligibilityEngine {
    pub fn new(policy: RebalancePolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> RebalancePolicy {
        self.policy
    }
}

impl EligibilityEngine for DeterministicEligibilityEngine {
    fn filter(&self, conditions: &EligibilityConditions, catalog: &[Product]) -> FilterOutcome {
        let mut ledger = ExclusionLedger::default();

        let survivors = rate_stage(catalog, conditions.min_interest_rate, &mut ledger);
        let after_rate = survivors.len();
        let survivors = category_stage(survivors, &conditions.categories);
        let survivors = special_condition_stage(survivors, &conditions.special_conditions);
        let after_tags = survivors.len();

        let rebalanced = rebalance_stage(survivors, catalog, self.policy);
        record_unmatched(catalog, &rebalanced.products, &mut ledger);

        debug!(
            event_name = "eligibility.filter_completed",
            catalog_size = catalog.len(),
            after_rate,
            after_tags,
            matched = rebalanced.products.len(),
            backfilled = rebalanced.backfilled.len(),
            excluded = ledger.excluded.len(),
            "eligibility filter completed"
        );

        FilterOutcome::new(
            rebalanced.products.into_iter().cloned().collect(),
            ledger.excluded,
            ledger.reasons,
            rebalanced.backfilled,
            conditions.clone(),
        )
    }
}
