//! Checks applied to model-drafted scenarios before they leave the strategy
//! phase. The model proposes allocations; amounts, projections and totals are
//! recomputed here from the deterministic interest math.

use std::collections::HashMap;

use thiserror::Error;
use tracing::warn;

use parkwise_core::domain::conditions::EligibilityConditions;
use parkwise_core::domain::product::{ProductCode, SimpleProduct};
use parkwise_core::domain::scenario::{ScenarioDetails, ScenarioType};
use parkwise_core::errors::DomainError;
use parkwise_core::interest;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GuardrailViolation {
    #[error("{scenario} scenario has no allocation to an eligible product")]
    NoEligibleProducts { scenario: ScenarioType },
    #[error("no {0} scenario was proposed")]
    MissingScenario(ScenarioType),
    #[error("{scenario} scenario allocates {total} won, above the {deposit} won deposit")]
    OverAllocation { scenario: ScenarioType, total: u64, deposit: u64 },
    #[error("{scenario} scenario projection failed: {source}")]
    Projection { scenario: ScenarioType, source: DomainError },
}

impl GuardrailViolation {
    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::NoEligibleProducts { .. } => "scenario_without_eligible_products",
            Self::MissingScenario(_) => "scenario_type_missing",
            Self::OverAllocation { .. } => "allocation_exceeds_deposit",
            Self::Projection { .. } => "projection_failed",
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScenarioGuardrails {
    pub max_distributed_accounts: usize,
}

impl Default for ScenarioGuardrails {
    fn default() -> Self {
        Self { max_distributed_accounts: 5 }
    }
}

impl ScenarioGuardrails {
    pub fn new(max_distributed_accounts: usize) -> Self {
        Self { max_distributed_accounts: max_distributed_accounts.max(1) }
    }

    /// Returns exactly one scenario per type, in `ScenarioType::ALL` order.
    pub fn review(
        &self,
        drafts: Vec<ScenarioDetails>,
        eligible: &[SimpleProduct],
        conditions: &EligibilityConditions,
    ) -> Result<Vec<ScenarioDetails>, GuardrailViolation> {
        let names: HashMap<&ProductCode, &str> =
            eligible.iter().map(|product| (&product.code, product.name.as_str())).collect();

        let mut by_type: HashMap<ScenarioType, ScenarioDetails> = HashMap::new();
        for draft in drafts {
            if by_type.contains_key(&draft.scenario_type) {
                warn!(
                    event_name = "guardrails.duplicate_scenario_dropped",
                    scenario = draft.scenario_type.as_str(),
                    "duplicate scenario dropped"
                );
                continue;
            }
            by_type.insert(draft.scenario_type, draft);
        }

        ScenarioType::ALL
            .iter()
            .map(|scenario_type| {
                let draft = by_type
                    .remove(scenario_type)
                    .ok_or(GuardrailViolation::MissingScenario(*scenario_type))?;
                self.review_one(draft, &names, conditions)
            })
            .collect()
    }

    fn review_one(
        &self,
        mut scenario: ScenarioDetails,
        names: &HashMap<&ProductCode, &str>,
        conditions: &EligibilityConditions,
    ) -> Result<ScenarioDetails, GuardrailViolation> {
        let kind = scenario.scenario_type;

        let proposed = scenario.products.len();
        scenario.products.retain(|line| names.contains_key(&line.product_code));
        if scenario.products.len() < proposed {
            warn!(
                event_name = "guardrails.unknown_products_dropped",
                scenario = kind.as_str(),
                dropped = proposed - scenario.products.len(),
                "allocations to non-eligible products dropped"
            );
        }
        if scenario.products.is_empty() {
            return Err(GuardrailViolation::NoEligibleProducts { scenario: kind });
        }

        let limit = match kind {
            ScenarioType::Single => 1,
            ScenarioType::Distributed => self.max_distributed_accounts,
            ScenarioType::HighYield => usize::MAX,
        };
        scenario.products.truncate(limit);

        for line in &mut scenario.products {
            if let Some(name) = names.get(&line.product_code) {
                line.product_name = (*name).to_owned();
            }
            line.allocated_amount = line.allocated_amount.min(conditions.deposit_amount);
            if line.deposit_months == 0 {
                line.deposit_months = conditions.deposit_months;
            }
            let projection = interest::project(line.allocated_amount, line.interest_rate)
                .map_err(|source| GuardrailViolation::Projection { scenario: kind, source })?;
            line.expected_interest_6m = projection.six_months;
            line.expected_interest_1y = projection.one_year;
            line.expected_interest_3y = projection.three_years;
        }

        scenario.recompute_totals();
        if scenario.total_allocated_amount > conditions.deposit_amount {
            return Err(GuardrailViolation::OverAllocation {
                scenario: kind,
                total: scenario.total_allocated_amount,
                deposit: conditions.deposit_amount,
            });
        }

        if scenario.scenario_name.trim().is_empty() {
            scenario.scenario_name = kind.display_name().to_owned();
        }
        let rate = scenario.condition_achievement_rate;
        scenario.condition_achievement_rate = if rate.is_nan() { 0.0 } else { rate.clamp(0.0, 1.0) };

        Ok(scenario)
    }
}
