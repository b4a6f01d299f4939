//! Success and error payloads exchanged between the three phases.
//!
//! Every struct is `#[serde(default)]` so any phase payload deserializes
//! whether or not the phase succeeded.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::conditions::EligibilityConditions;
use crate::domain::product::SimpleProduct;
use crate::domain::question::UserResponse;
use crate::domain::scenario::{ProductInterestCalculation, ScenarioDetails};

pub const ELIGIBILITY_COMPLETED: &str = "eligibility_completed";
pub const ELIGIBILITY_FAILED: &str = "eligibility_failed";
pub const QUESTION_COMPLETED: &str = "question_completed";
pub const QUESTION_FAILED: &str = "question_failed";
pub const STRATEGY_COMPLETED: &str = "strategy_completed";
pub const STRATEGY_FAILED: &str = "strategy_failed";

pub const QUESTION_AGENT: &str = "QuestionAgent";
pub const STRATEGY_AGENT: &str = "StrategyAgent";
pub const COMPARATOR_AGENT: &str = "ComparatorAgent";

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilterSummary {
    pub total_analyzed: usize,
    pub match_count: usize,
    pub excluded_count: usize,
    pub match_rate: f64,
    pub execution_time_secs: Option<f64>,
}

impl FilterSummary {
    pub fn new(match_count: usize, excluded_count: usize) -> Self {
        let total_analyzed = match_count + excluded_count;
        let match_rate = if total_analyzed == 0 {
            0.0
        } else {
            match_count as f64 / total_analyzed as f64 * 100.0
        };
        Self { total_analyzed, match_count, excluded_count, match_rate, execution_time_secs: None }
    }

    pub fn with_execution_time(mut self, seconds: f64) -> Self {
        self.execution_time_secs = Some(seconds);
        self
    }
}

/// Input of the eligibility phase.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EligibilityRequest {
    pub conditions: Option<EligibilityConditions>,
}

impl EligibilityRequest {
    pub fn new(conditions: EligibilityConditions) -> Self {
        Self { conditions: Some(conditions) }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EligibilitySuccessResponse {
    pub success: bool,
    pub error: Option<String>,
    pub result_products: Vec<SimpleProduct>,
    pub filter_summary: FilterSummary,
    pub user_conditions: Option<EligibilityConditions>,
    pub processing_step: String,
    pub next_agent: String,
    pub processed_at: Option<DateTime<Utc>>,
}

impl Default for EligibilitySuccessResponse {
    fn default() -> Self {
        Self {
            success: true,
            error: None,
            result_products: Vec::new(),
            filter_summary: FilterSummary::default(),
            user_conditions: None,
            processing_step: ELIGIBILITY_COMPLETED.to_owned(),
            next_agent: QUESTION_AGENT.to_owned(),
            processed_at: None,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EligibilityErrorResponse {
    pub success: bool,
    pub error: Option<String>,
    pub result_products: Vec<SimpleProduct>,
    pub filter_summary: FilterSummary,
    pub user_conditions: Option<EligibilityConditions>,
    pub processing_step: String,
    pub next_agent: String,
}

impl EligibilityErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { error: Some(message.into()), ..Self::default() }
    }
}

impl Default for EligibilityErrorResponse {
    fn default() -> Self {
        Self {
            success: false,
            error: None,
            result_products: Vec::new(),
            filter_summary: FilterSummary::default(),
            user_conditions: None,
            processing_step: ELIGIBILITY_FAILED.to_owned(),
            next_agent: String::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuestionSuccessResponse {
    pub success: bool,
    pub error: Option<String>,
    pub eligible_products: Vec<SimpleProduct>,
    pub user_responses: Vec<UserResponse>,
    pub response_summary: BTreeMap<String, bool>,
    pub user_conditions: Option<EligibilityConditions>,
    pub processing_step: String,
    pub next_agent: String,
}

impl Default for QuestionSuccessResponse {
    fn default() -> Self {
        Self {
            success: true,
            error: None,
            eligible_products: Vec::new(),
            user_responses: Vec::new(),
            response_summary: BTreeMap::new(),
            user_conditions: None,
            processing_step: QUESTION_COMPLETED.to_owned(),
            next_agent: STRATEGY_AGENT.to_owned(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuestionErrorResponse {
    pub success: bool,
    pub error: Option<String>,
    pub eligible_products: Vec<SimpleProduct>,
    pub user_responses: Vec<UserResponse>,
    pub response_summary: BTreeMap<String, bool>,
    pub processing_step: String,
    pub next_agent: String,
}

impl QuestionErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { error: Some(message.into()), ..Self::default() }
    }
}

impl Default for QuestionErrorResponse {
    fn default() -> Self {
        Self {
            success: false,
            error: None,
            eligible_products: Vec::new(),
            user_responses: Vec::new(),
            response_summary: BTreeMap::new(),
            processing_step: QUESTION_FAILED.to_owned(),
            next_agent: String::new(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategySuccessResponse {
    pub success: bool,
    pub error: Option<String>,
    pub scenarios: Vec<ScenarioDetails>,
    pub user_conditions: Option<EligibilityConditions>,
    pub user_responses: Vec<UserResponse>,
    pub response_summary: BTreeMap<String, bool>,
    pub interest_calculations: Vec<ProductInterestCalculation>,
    pub processing_step: String,
    pub next_agent: String,
}

impl Default for StrategySuccessResponse {
    fn default() -> Self {
        Self {
            success: true,
            error: None,
            scenarios: Vec::new(),
            user_conditions: None,
            user_responses: Vec::new(),
            response_summary: BTreeMap::new(),
            interest_calculations: Vec::new(),
            processing_step: STRATEGY_COMPLETED.to_owned(),
            next_agent: COMPARATOR_AGENT.to_owned(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrategyErrorResponse {
    pub success: bool,
    pub error: Option<String>,
    pub scenarios: Vec<ScenarioDetails>,
    pub user_conditions: Option<EligibilityConditions>,
    pub user_responses: Vec<UserResponse>,
    pub response_summary: BTreeMap<String, bool>,
    pub interest_calculations: Vec<ProductInterestCalculation>,
    pub processing_step: String,
    pub next_agent: String,
}

impl StrategyErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self { error: Some(message.into()), ..Self::default() }
    }

    pub fn message(&self) -> &str {
        self.error.as_deref().unwrap_or_default()
    }
}

impl Default for StrategyErrorResponse {
    fn default() -> Self {
        Self {
            success: false,
            error: None,
            scenarios: Vec::new(),
            user_conditions: None,
            user_responses: Vec::new(),
            response_summary: BTreeMap::new(),
            interest_calculations: Vec::new(),
            processing_step: STRATEGY_FAILED.to_owned(),
            next_agent: String::new(),
        }
    }
}
