use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, Mutex};
use tracing::info;
use uuid::Uuid;

use parkwise_core::config::PipelineConfig;
use parkwise_core::domain::product::SimpleProduct;
use parkwise_core::domain::responses::{
    EligibilitySuccessResponse, QuestionErrorResponse, QuestionSuccessResponse,
};
use parkwise_core::errors::PhaseError;
use parkwise_core::phase::PhaseKind;
use parkwise_db::ChunkRepository;

use crate::agents::{into_failure, Agent, PhaseTracker};
use crate::context::{ContextSnapshot, ScopedContext};
use crate::llm::StructuredLlm;
use crate::prompts::PromptLibrary;
use crate::retrieval::Retriever;
use crate::stage::{Stage, Then};
use crate::stages::{
    ConditionExtractor, PatternAnalyzer, QuestionGenerator, ResponseFormatter, UserInputStage,
};
use crate::user_input::{input_for_mode, PendingQuestion, UserInputChannel};

pub const NAME: &str = "QuestionAgent";

pub type QuestionChain = Then<
    Then<Then<Then<ConditionExtractor, PatternAnalyzer>, QuestionGenerator>, UserInputStage>,
    ResponseFormatter,
>;

/// Clarification phase: asks which preferential conditions the user can meet.
pub struct QuestionAgent {
    chain: QuestionChain,
    context: Mutex<ScopedContext>,
}

impl QuestionAgent {
    pub fn new(
        llm: StructuredLlm,
        prompts: Arc<PromptLibrary>,
        chunks: Arc<dyn ChunkRepository>,
        retriever: Arc<dyn Retriever>,
        input: Arc<dyn UserInputChannel>,
        config: &PipelineConfig,
    ) -> Self {
        let chain = ConditionExtractor::new(chunks)
            .then(PatternAnalyzer::new(llm.clone(), prompts.clone()))
            .then(QuestionGenerator::new(llm, prompts, retriever, config))
            .then(UserInputStage::new(input))
            .then(ResponseFormatter);
        Self { chain, context: Mutex::default() }
    }

    /// Picks console or channel input from `config.interactive`. The receiver
    /// is returned in channel mode so a front-end can answer the questions.
    pub fn for_mode(
        llm: StructuredLlm,
        prompts: Arc<PromptLibrary>,
        chunks: Arc<dyn ChunkRepository>,
        retriever: Arc<dyn Retriever>,
        config: &PipelineConfig,
    ) -> (Self, Option<mpsc::Receiver<PendingQuestion>>) {
        let (input, receiver) = input_for_mode(config.interactive);
        (Self::new(llm, prompts, chunks, retriever, input, config), receiver)
    }

    pub async fn context_snapshot(&self) -> ContextSnapshot {
        self.context.lock().await.snapshot()
    }

    /// Products held by the run context after the last run.
    pub async fn context_products(&self) -> Vec<SimpleProduct> {
        self.context.lock().await.eligible_products().to_vec()
    }

    async fn execute(
        &self,
        request: EligibilitySuccessResponse,
    ) -> Result<QuestionSuccessResponse, PhaseError> {
        let mut phase = PhaseTracker::start(PhaseKind::Question)?;
        let request = phase.validated(validate(request))?;

        let mut context = self.context.lock().await;
        context.clear();
        context.set_run_id(Uuid::new_v4());
        context.set_eligible_products(request.result_products.clone());
        context.set_user_conditions(request.user_conditions);

        let response = phase.finished(self.chain.run(request.result_products, &mut context).await)?;
        info!(
            event_name = "agent.question.completed",
            run_id = ?context.run_id(),
            products = response.eligible_products.len(),
            responses = response.user_responses.len(),
            "clarification phase completed"
        );
        Ok(response)
    }
}

fn validate(request: EligibilitySuccessResponse) -> Result<EligibilitySuccessResponse, PhaseError> {
    if !request.success {
        return Err(PhaseError::Validation("eligibility phase did not succeed".to_owned()));
    }
    if request.result_products.is_empty() {
        return Err(PhaseError::Validation("no eligible products to ask about".to_owned()));
    }
    Ok(request)
}

#[async_trait]
impl Agent for QuestionAgent {
    type Input = EligibilitySuccessResponse;
    type Success = QuestionSuccessResponse;
    type Failure = QuestionErrorResponse;

    fn name(&self) -> &'static str {
        NAME
    }

    fn phase(&self) -> PhaseKind {
        PhaseKind::Question
    }

    async fn run(
        &self,
        request: EligibilitySuccessResponse,
    ) -> Result<QuestionSuccessResponse, QuestionErrorResponse> {
        self.execute(request).await.map_err(|error| into_failure(NAME, error))
    }
}
