use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use parkwise_core::config::PipelineConfig;
use parkwise_core::domain::product::ProductCode;
use parkwise_core::domain::responses::StrategySuccessResponse;
use parkwise_core::domain::scenario::{
    ProductAllocation, ProductInterestCalculation, ScenarioDetails, ScenarioType,
};

use crate::context::ScopedContext;
use crate::guardrails::ScenarioGuardrails;
use crate::llm::{StructuredLlm, StructuredOutput, Validate};
use crate::prompts::PromptLibrary;
use crate::stage::{Stage, StageError};
use crate::stages::interest_calculator::InterestCalculations;

pub const NAME: &str = "strategy_scenario";

#[derive(Debug, Deserialize)]
pub struct AllocationDraft {
    pub product_code: String,
    #[serde(default)]
    pub allocated_amount: u64,
    #[serde(default)]
    pub interest_rate: f64,
    #[serde(default)]
    pub deposit_months: u32,
    #[serde(default)]
    pub conditions_required: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub struct ScenarioDraft {
    pub scenario_type: ScenarioType,
    #[serde(default)]
    pub scenario_name: String,
    #[serde(default)]
    pub scenario_content: String,
    #[serde(default)]
    pub products: Vec<AllocationDraft>,
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

impl ScenarioDraft {
    fn into_details(self) -> ScenarioDetails {
        ScenarioDetails {
            scenario_type: self.scenario_type,
            scenario_name: self.scenario_name,
            scenario_content: self.scenario_content,
            products: self
                .products
                .into_iter()
                .map(|line| ProductAllocation {
                    product_code: ProductCode(line.product_code.trim().to_owned()),
                    product_name: String::new(),
                    allocated_amount: line.allocated_amount,
                    interest_rate: line.interest_rate,
                    deposit_months: line.deposit_months,
                    conditions_required: line.conditions_required,
                    ..ProductAllocation::default()
                })
                .collect(),
            total_allocated_amount: 0,
            total_expected_interest_6m: 0,
            total_expected_interest_1y: 0,
            total_expected_interest_3y: 0,
            scenario_summary: self.scenario_summary,
            advantages: self.advantages,
            disadvantages: self.disadvantages,
            recommended_for: self.recommended_for,
            condition_achievement_rate: self.condition_achievement_rate,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct StrategyScenarioOutput {
    #[serde(default)]
    pub scenarios: Vec<ScenarioDraft>,
}

impl Validate for StrategyScenarioOutput {
    fn validate(&self) -> Result<(), String> {
        if self.scenarios.is_empty() {
            return Err("no scenarios proposed".to_owned());
        }
        if let Some(draft) = self.scenarios.iter().find(|draft| draft.products.is_empty()) {
            return Err(format!("{} scenario has no products", draft.scenario_type));
        }
        Ok(())
    }
}

impl StructuredOutput for StrategyScenarioOutput {
    const FORMAT_INSTRUCTIONS: &'static str = r#"{
  "scenarios": [
    {
      "scenario_type": "single",
      "scenario_name": "Single-account focus",
      "scenario_content": "Keep the whole deposit in the best account.",
      "products": [
        {
          "product_code": "PK-001",
          "allocated_amount": 10000000,
          "interest_rate": 3.3,
          "deposit_months": 12,
          "conditions_required": ["bank_app"]
        }
      ],
      "scenario_summary": "Simple to manage.",
      "advantages": ["one account"],
      "disadvantages": ["bonus rate capped by balance"],
      "recommended_for": "users who prefer simplicity",
      "condition_achievement_rate": 1.0
    }
  ]
}"#;
}

/// Highest estimates first; ties keep their calculation order.
pub fn top_by_interest(
    calculations: &[ProductInterestCalculation],
    limit: usize,
) -> Vec<ProductInterestCalculation> {
    let mut ranked = calculations.to_vec();
    ranked.sort_by(|left, right| right.interest.cmp(&left.interest));
    ranked.truncate(limit);
    ranked
}

/// Drafts the three savings scenarios from the best estimates.
pub struct StrategyScenario {
    llm: StructuredLlm,
    prompts: Arc<PromptLibrary>,
    guardrails: ScenarioGuardrails,
    top_n: usize,
}

impl StrategyScenario {
    pub fn new(llm: StructuredLlm, prompts: Arc<PromptLibrary>, config: &PipelineConfig) -> Self {
        Self {
            llm,
            prompts,
            guardrails: ScenarioGuardrails::new(config.max_distributed_accounts),
            top_n: config.scenario_top_n,
        }
    }
}

#[async_trait]
impl Stage for StrategyScenario {
    type Input = InterestCalculations;
    type Output = StrategySuccessResponse;

    fn name(&self) -> &'static str {
        NAME
    }

    async fn run(
        &self,
        input: InterestCalculations,
        context: &mut ScopedContext,
    ) -> Result<StrategySuccessResponse, StageError> {
        let InterestCalculations { calculations, request } = input;
        let conditions = request
            .user_conditions
            .clone()
            .or_else(|| context.user_conditions().cloned())
            .ok_or_else(|| StageError::invalid(NAME, "user conditions are missing"))?;
        if calculations.is_empty() {
            return Err(StageError::invalid(NAME, "no interest calculations to build scenarios from"));
        }

        let top = top_by_interest(&calculations, self.top_n);
        let prompt = self
            .prompts
            .strategy_scenario(
                &top,
                &conditions,
                &request.user_responses,
                self.guardrails.max_distributed_accounts,
            )
            .map_err(StageError::at(NAME))?;
        let output: StrategyScenarioOutput =
            self.llm.request(&prompt).await.map_err(StageError::at(NAME))?;

        let drafts = output.scenarios.into_iter().map(ScenarioDraft::into_details).collect();
        let scenarios = self
            .guardrails
            .review(drafts, &request.eligible_products, &conditions)
            .map_err(|violation| {
                warn!(
                    event_name = "stage.strategy_scenario.guardrail_rejected",
                    run_id = ?context.run_id(),
                    reason_code = violation.reason_code(),
                    error = %violation,
                    "model scenarios rejected by guardrails"
                );
                StageError::new(NAME, violation)
            })?;

        info!(
            event_name = "stage.strategy_scenario.completed",
            run_id = ?context.run_id(),
            candidates = top.len(),
            scenarios = scenarios.len(),
            "strategy scenarios built"
        );
        Ok(StrategySuccessResponse {
            scenarios,
            user_conditions: Some(conditions),
            user_responses: request.user_responses,
            response_summary: request.response_summary,
            interest_calculations: calculations,
            ..StrategySuccessResponse::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parkwise_core::config::PipelineConfig;
    use parkwise_core::domain::product::ProductCode;
    use parkwise_core::domain::responses::QuestionSuccessResponse;
    use parkwise_core::domain::scenario::{ProductInterestCalculation, ScenarioType};

    use super::{top_by_interest, StrategyScenario};
    use crate::context::ScopedContext;
    use crate::llm::{ScriptedLlmClient, StructuredLlm};
    use crate::prompts::PromptLibrary;
    use crate::stage::{Stage, StageFault};
    use crate::stages::fixtures;
    use crate::stages::interest_calculator::InterestCalculations;

    fn calculation(code: &str, interest: u64) -> ProductInterestCalculation {
        ProductInterestCalculation {
            product_code: ProductCode::from(code),
            product_name: code.to_owned(),
            interest,
            ..ProductInterestCalculation::default()
        }
    }

    fn input() -> InterestCalculations {
        InterestCalculations {
            calculations: vec![
                calculation("PK-001", 200_000),
                calculation("PK-002", 250_000),
                calculation("PK-003", 180_000),
            ],
            request: QuestionSuccessResponse {
                eligible_products: fixtures::summaries(&["PK-001", "PK-002", "PK-003"]),
                user_conditions: Some(fixtures::conditions()),
                ..QuestionSuccessResponse::default()
            },
        }
    }

    fn with_reply(reply: &str) -> (StrategyScenario, Arc<ScriptedLlmClient>) {
        let client = Arc::new(ScriptedLlmClient::replying(reply));
        let stage = StrategyScenario::new(
            StructuredLlm::new(client.clone()),
            Arc::new(PromptLibrary::new().expect("templates")),
            &PipelineConfig { scenario_top_n: 2, ..PipelineConfig::default() },
        );
        (stage, client)
    }

    const THREE_SCENARIOS: &str = r#"{"scenarios": [
        {"scenario_type": "single", "products": [{"product_code": "PK-002", "allocated_amount": 10000000, "interest_rate": 3.0}]},
        {"scenario_type": "distributed", "products": [
            {"product_code": "PK-002", "allocated_amount": 5000000, "interest_rate": 3.0},
            {"product_code": "PK-001", "allocated_amount": 5000000, "interest_rate": 2.5}
        ]},
        {"scenario_type": "high_yield", "products": [{"product_code": "PK-002", "allocated_amount": 10000000, "interest_rate": 3.5}], "condition_achievement_rate": 0.5}
    ]}"#;

    #[test]
    fn ranking_is_descending_and_stable() {
        let ranked = top_by_interest(
            &[calculation("A", 1), calculation("B", 5), calculation("C", 5), calculation("D", 3)],
            3,
        );
        let codes: Vec<&str> = ranked.iter().map(|c| c.product_code.0.as_str()).collect();
        assert_eq!(codes, vec!["B", "C", "D"]);
    }

    #[tokio::test]
    async fn builds_three_reviewed_scenarios() {
        let (stage, client) = with_reply(THREE_SCENARIOS);

        let response = stage.run(input(), &mut ScopedContext::default()).await.expect("scenarios");

        assert!(response.success);
        assert_eq!(response.scenarios.len(), 3);
        assert_eq!(response.scenarios[1].scenario_type, ScenarioType::Distributed);
        assert_eq!(response.scenarios[1].total_allocated_amount, 10_000_000);
        assert_eq!(response.interest_calculations.len(), 3);

        let prompt = &client.prompts().await[0];
        assert!(prompt.contains("1. "));
        assert!(prompt.contains("(PK-002)"));
        assert!(!prompt.contains("(PK-003)"));
    }

    #[tokio::test]
    async fn guardrail_violation_fails_the_stage() {
        let (stage, _) = with_reply(
            r#"{"scenarios": [{"scenario_type": "single", "products": [{"product_code": "PK-001", "allocated_amount": 1}]}]}"#,
        );

        let error = stage.run(input(), &mut ScopedContext::default()).await.expect_err("missing types");

        assert_eq!(error.stage, "strategy_scenario");
        let StageFault::Guardrail(violation) = error.fault else {
            panic!("expected a guardrail fault, got {:?}", error.fault);
        };
        assert_eq!(violation.reason_code(), "scenario_type_missing");
    }
}
