use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::info;
use uuid::Uuid;

use parkwise_core::config::PipelineConfig;
use parkwise_core::domain::conditions::EligibilityConditions;
use parkwise_core::domain::responses::{
    EligibilityErrorResponse, EligibilityRequest, EligibilitySuccessResponse,
};
use parkwise_core::eligibility::{DeterministicEligibilityEngine, EligibilityEngine, RebalancePolicy};
use parkwise_core::errors::{DomainError, PhaseError};
use parkwise_core::phase::PhaseKind;
use parkwise_db::ProductRepository;

use crate::agents::{into_failure, Agent, PhaseTracker};
use crate::context::{ContextSnapshot, ScopedContext};
use crate::stage::Stage;
use crate::stages::EligibilityFilter;

pub const NAME: &str = "EligibilityAgent";

pub struct EligibilityAgent {
    filter: EligibilityFilter,
    context: Mutex<ScopedContext>,
}

impl EligibilityAgent {
    pub fn new(products: Arc<dyn ProductRepository>, engine: Arc<dyn EligibilityEngine>) -> Self {
        Self { filter: EligibilityFilter::new(products, engine), context: Mutex::default() }
    }

    /// Uses the deterministic engine with the configured rebalance window.
    pub fn from_config(
        products: Arc<dyn ProductRepository>,
        config: &PipelineConfig,
    ) -> Result<Self, DomainError> {
        let policy = RebalancePolicy::new(config.rebalance_floor, config.rebalance_ceiling)?;
        Ok(Self::new(products, Arc::new(DeterministicEligibilityEngine::new(policy))))
    }

    pub async fn context_snapshot(&self) -> ContextSnapshot {
        self.context.lock().await.snapshot()
    }

    async fn execute(
        &self,
        request: EligibilityRequest,
    ) -> Result<EligibilitySuccessResponse, PhaseError> {
        let mut phase = PhaseTracker::start(PhaseKind::Eligibility)?;
        let conditions = phase.validated(validate(request))?;

        let mut context = self.context.lock().await;
        context.clear();
        context.set_run_id(Uuid::new_v4());
        context.set_user_conditions(Some(conditions.clone()));

        let started = Instant::now();
        let outcome = phase.finished(self.filter.run(conditions.clone(), &mut context).await)?;
        let elapsed = started.elapsed().as_secs_f64();

        let result_products = outcome.matched_summaries();
        context.set_eligible_products(result_products.clone());
        info!(
            event_name = "agent.eligibility.completed",
            run_id = ?context.run_id(),
            matched = result_products.len(),
            excluded = outcome.excluded().len(),
            elapsed_secs = elapsed,
            "eligibility phase completed"
        );

        Ok(EligibilitySuccessResponse {
            result_products,
            filter_summary: outcome.summary().with_execution_time(elapsed),
            user_conditions: Some(conditions),
            processed_at: Some(outcome.processed_at()),
            ..EligibilitySuccessResponse::default()
        })
    }
}

fn validate(request: EligibilityRequest) -> Result<EligibilityConditions, PhaseError> {
    let conditions = request
        .conditions
        .ok_or_else(|| PhaseError::Validation("user conditions are required".to_owned()))?;
    conditions.validate()?;
    Ok(conditions)
}

#[async_trait]
impl Agent for EligibilityAgent {
    type Input = EligibilityRequest;
    type Success = EligibilitySuccessResponse;
    type Failure = EligibilityErrorResponse;

    fn name(&self) -> &'static str {
        NAME
    }

    fn phase(&self) -> PhaseKind {
        PhaseKind::Eligibility
    }

    async fn run(
        &self,
        request: EligibilityRequest,
    ) -> Result<EligibilitySuccessResponse, EligibilityErrorResponse> {
        self.execute(request).await.map_err(|error| into_failure(NAME, error))
    }
}
