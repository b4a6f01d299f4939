use std::fmt;

use serde::{Deserialize, Serialize};

use crate::domain::product::ProductCode;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScenarioType {
    Single,
    Distributed,
    HighYield,
}

impl ScenarioType {
    pub const ALL: [ScenarioType; 3] = [Self::Single, Self::Distributed, Self::HighYield];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Single => "single",
            Self::Distributed => "distributed",
            Self::HighYield => "high_yield",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Single => "Single-account focus",
            Self::Distributed => "Split across accounts",
            Self::HighYield => "Yield-first strategy",
        }
    }
}

impl fmt::Display for ScenarioType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// After-tax interest estimate for one product over the user's deposit term.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductInterestCalculation {
    pub product_code: ProductCode,
    pub product_name: String,
    pub interest: u64,
    #[serde(default)]
    pub calculation_detail: String,
    #[serde(default)]
    pub applied_conditions: Vec<String>,
    #[serde(default)]
    pub feasibility: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductAllocation {
    pub product_code: ProductCode,
    pub product_name: String,
    pub allocated_amount: u64,
    pub interest_rate: f64,
    pub deposit_months: u32,
    #[serde(default)]
    pub conditions_required: Vec<String>,
    #[serde(default)]
    pub expected_interest_6m: u64,
    #[serde(default)]
    pub expected_interest_1y: u64,
    #[serde(default)]
    pub expected_interest_3y: u64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ScenarioDetails {
    pub scenario_type: ScenarioType,
    pub scenario_name: String,
    pub scenario_content: String,
    pub products: Vec<ProductAllocation>,
    #[serde(default)]
    pub total_allocated_amount: u64,
    #[serde(default)]
    pub total_expected_interest_6m: u64,
    #[serde(default)]
    pub total_expected_interest_1y: u64,
    #[serde(default)]
    pub total_expected_interest_3y: u64,
    #[serde(default)]
    pub scenario_summary: String,
    #[serde(default)]
    pub advantages: Vec<String>,
    #[serde(default)]
    pub disadvantages: Vec<String>,
    #[serde(default)]
    pub recommended_for: String,
    #[serde(default)]
    pub condition_achievement_rate: f64,
}

impl ScenarioDetails {
    /// Recomputes the totals from the allocation lines.
    pub fn recompute_totals(&mut self) {
        self.total_allocated_amount = self.products.iter().map(|line| line.allocated_amount).sum();
        self.total_expected_interest_6m =
            self.products.iter().map(|line| line.expected_interest_6m).sum();
        self.total_expected_interest_1y =
            self.products.iter().map(|line| line.expected_interest_1y).sum();
        self.total_expected_interest_3y =
            self.products.iter().map(|line| line.expected_interest_3y).sum();
    }
}
