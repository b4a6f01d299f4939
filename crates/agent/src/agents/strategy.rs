use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use parkwise_core::config::PipelineConfig;
use parkwise_core::domain::responses::{
    QuestionSuccessResponse, StrategyErrorResponse, StrategySuccessResponse,
};
use parkwise_core::domain::scenario::ScenarioType;
use parkwise_core::errors::PhaseError;
use parkwise_core::phase::PhaseKind;
use parkwise_db::{ChunkRepository, ProductRepository};

use crate::agents::{into_failure, Agent, PhaseTracker};
use crate::context::{ContextSnapshot, ScopedContext};
use crate::llm::StructuredLlm;
use crate::prompts::PromptLibrary;
use crate::stage::{Stage, Then};
use crate::stages::{strategy_scenario, InterestCalculator, StrategyScenario};

pub const NAME: &str = "StrategyAgent";

pub type StrategyChain = Then<InterestCalculator, StrategyScenario>;

/// Strategy phase: interest estimates and the three savings scenarios.
pub struct StrategyAgent {
    chain: StrategyChain,
    context: Mutex<ScopedContext>,
}

impl StrategyAgent {
    pub fn new(
        llm: StructuredLlm,
        prompts: Arc<PromptLibrary>,
        chunks: Arc<dyn ChunkRepository>,
        products: Arc<dyn ProductRepository>,
        config: &PipelineConfig,
    ) -> Self {
        let chain = InterestCalculator::new(llm.clone(), prompts.clone(), chunks, products, config)
            .then(StrategyScenario::new(llm, prompts, config));
        Self { chain, context: Mutex::default() }
    }

    pub async fn context_snapshot(&self) -> ContextSnapshot {
        self.context.lock().await.snapshot()
    }

    async fn execute(
        &self,
        request: QuestionSuccessResponse,
    ) -> Result<StrategySuccessResponse, PhaseError> {
        let mut phase = PhaseTracker::start(PhaseKind::Strategy)?;
        let request = phase.validated(validate(request))?;

        let mut context = self.context.lock().await;
        context.clear();
        context.set_run_id(Uuid::new_v4());
        context.set_eligible_products(request.eligible_products.clone());
        context.set_user_conditions(request.user_conditions.clone());

        let result = self.chain.run(request, &mut context).await.map_err(PhaseError::from);
        let response = phase.settle(result.and_then(check_scenarios))?;
        info!(
            event_name = "agent.strategy.completed",
            run_id = ?context.run_id(),
            scenarios = response.scenarios.len(),
            calculations = response.interest_calculations.len(),
            "strategy phase completed"
        );
        Ok(response)
    }
}

fn validate(request: QuestionSuccessResponse) -> Result<QuestionSuccessResponse, PhaseError> {
    if !request.success {
        return Err(PhaseError::Validation("clarification phase did not succeed".to_owned()));
    }
    if request.eligible_products.is_empty() {
        return Err(PhaseError::Validation("no eligible products to build a strategy for".to_owned()));
    }
    if request.user_responses.is_empty() {
        return Err(PhaseError::Validation("no user responses to build a strategy from".to_owned()));
    }
    if request.user_conditions.is_none() {
        return Err(PhaseError::Validation("user conditions are missing".to_owned()));
    }
    Ok(request)
}

/// Exactly one scenario of each type.
fn check_scenarios(response: StrategySuccessResponse) -> Result<StrategySuccessResponse, PhaseError> {
    let kinds: BTreeSet<ScenarioType> =
        response.scenarios.iter().map(|scenario| scenario.scenario_type).collect();
    if response.scenarios.len() != ScenarioType::ALL.len() || kinds.len() != ScenarioType::ALL.len() {
        return Err(PhaseError::stage(
            strategy_scenario::NAME,
            format!(
                "expected one scenario of each of the {} types, got {}",
                ScenarioType::ALL.len(),
                response.scenarios.len()
            ),
        ));
    }
    Ok(response)
}

#[async_trait]
impl Agent for StrategyAgent {
    type Input = QuestionSuccessResponse;
    type Success = StrategySuccessResponse;
    type Failure = StrategyErrorResponse;

    fn name(&self) -> &'static str {
        NAME
    }

    fn phase(&self) -> PhaseKind {
        PhaseKind::Strategy
    }

    async fn run(
        &self,
        request: QuestionSuccessResponse,
    ) -> Result<StrategySuccessResponse, StrategyErrorResponse> {
        self.execute(request).await.map_err(|error| into_failure(NAME, error))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parkwise_core::config::PipelineConfig;
    use parkwise_core::domain::responses::{QuestionSuccessResponse, StrategySuccessResponse};

    use super::{check_scenarios, StrategyAgent};
    use crate::agents::Agent;
    use crate::llm::{ScriptedLlmClient, StructuredLlm};
    use crate::prompts::PromptLibrary;
    use crate::stages::fixtures;

    fn agent(client: Arc<ScriptedLlmClient>) -> StrategyAgent {
        StrategyAgent::new(
            StructuredLlm::new(client),
            Arc::new(PromptLibrary::new().expect("templates")),
            fixtures::chunk_repo(),
            fixtures::product_repo(),
            &PipelineConfig::default(),
        )
    }

    #[tokio::test]
    async fn requires_products_responses_and_conditions() {
        let client = Arc::new(ScriptedLlmClient::replying("{}"));
        let agent = agent(client.clone());

        let no_products = agent.run(QuestionSuccessResponse::default()).await.expect_err("empty");
        assert!(no_products.message().contains("no eligible products"));

        let no_responses = QuestionSuccessResponse {
            eligible_products: fixtures::summaries(&["PK-001"]),
            user_conditions: Some(fixtures::conditions()),
            ..QuestionSuccessResponse::default()
        };
        let error = agent.run(no_responses).await.expect_err("no responses");
        assert!(error.message().contains("no user responses"));

        assert_eq!(client.call_count().await, 0);
    }

    #[test]
    fn scenario_count_is_checked() {
        let error = check_scenarios(StrategySuccessResponse::default()).expect_err("no scenarios");
        assert_eq!(
            error.to_string(),
            "stage `strategy_scenario` failed: expected one scenario of each of the 3 types, got 0"
        );
    }
}
