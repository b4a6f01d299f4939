//! The three phases composed end to end.

use std::any::Any;
use std::panic::AssertUnwindSafe;

use futures::FutureExt;
use serde::Serialize;
use tracing::{error, info};

use parkwise_core::domain::conditions::EligibilityConditions;
use parkwise_core::domain::responses::{
    EligibilityRequest, StrategyErrorResponse, StrategySuccessResponse,
};
use parkwise_core::errors::PhaseError;
use parkwise_core::phase::PhaseKind;

use crate::agents::{Agent, PhaseFailure};

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct AgentInfo {
    pub name: &'static str,
    pub phase: PhaseKind,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PipelineInfo {
    pub agents: Vec<AgentInfo>,
}

/// Eligibility, clarification and strategy agents run in sequence. The success
/// type of each agent is the input type of the next.
pub struct Pipeline<E, Q, S> {
    eligibility: E,
    question: Q,
    strategy: S,
}

impl<E, Q, S> Pipeline<E, Q, S>
where
    E: Agent<Input = EligibilityRequest>,
    Q: Agent<Input = E::Success>,
    S: Agent<Input = Q::Success, Success = StrategySuccessResponse>,
{
    pub fn new(eligibility: E, question: Q, strategy: S) -> Self {
        Self { eligibility, question, strategy }
    }

    pub fn info(&self) -> PipelineInfo {
        let agents = [
            (self.eligibility.name(), self.eligibility.phase()),
            (self.question.name(), self.question.phase()),
            (self.strategy.name(), self.strategy.phase()),
        ];
        PipelineInfo {
            agents: agents.into_iter().map(|(name, phase)| AgentInfo { name, phase }).collect(),
        }
    }

    /// Never panics: a panicking agent becomes a composition error.
    pub async fn run(
        &self,
        conditions: EligibilityConditions,
    ) -> Result<StrategySuccessResponse, StrategyErrorResponse> {
        info!(
            event_name = "pipeline.started",
            deposit_amount = conditions.deposit_amount,
            deposit_months = conditions.deposit_months,
            "recommendation pipeline started"
        );

        let result = AssertUnwindSafe(self.run_phases(conditions)).catch_unwind().await;
        match result {
            Ok(Ok(response)) => {
                info!(
                    event_name = "pipeline.completed",
                    scenarios = response.scenarios.len(),
                    "recommendation pipeline completed"
                );
                Ok(response)
            }
            Ok(Err(response)) => Err(response),
            Err(payload) => {
                let fault = PhaseError::Composition(format!(
                    "agent panicked: {}",
                    panic_message(payload.as_ref())
                ));
                error!(event_name = "pipeline.agent_panicked", error = %fault, "agent panicked");
                Err(StrategyErrorResponse::new(fault.to_string()))
            }
        }
    }

    async fn run_phases(
        &self,
        conditions: EligibilityConditions,
    ) -> Result<StrategySuccessResponse, StrategyErrorResponse> {
        let eligible = self
            .eligibility
            .run(EligibilityRequest::new(conditions))
            .await
            .map_err(|failure| phase_failed(self.eligibility.phase(), &failure))?;
        let answered = self
            .question
            .run(eligible)
            .await
            .map_err(|failure| phase_failed(self.question.phase(), &failure))?;
        self.strategy
            .run(answered)
            .await
            .map_err(|failure| phase_failed(self.strategy.phase(), &failure))
    }
}

fn phase_failed<F: PhaseFailure>(phase: PhaseKind, failure: &F) -> StrategyErrorResponse {
    let message = failure.message();
    error!(
        event_name = "pipeline.phase_failed",
        phase = phase.as_str(),
        error = message.as_str(),
        "pipeline stopped"
    );
    StrategyErrorResponse::new(format!("{phase} phase failed: {message}"))
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(message) = payload.downcast_ref::<&str>() {
        *message
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.as_str()
    } else {
        "unknown panic"
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use parkwise_core::domain::conditions::EligibilityConditions;
    use parkwise_core::domain::responses::{
        EligibilityErrorResponse, EligibilityRequest, EligibilitySuccessResponse,
        QuestionErrorResponse, QuestionSuccessResponse, StrategyErrorResponse,
        StrategySuccessResponse, STRATEGY_FAILED,
    };
    use parkwise_core::phase::PhaseKind;

    use super::Pipeline;
    use crate::agents::Agent;

    #[derive(Default)]
    struct Calls {
        eligibility: AtomicUsize,
        question: AtomicUsize,
        strategy: AtomicUsize,
    }

    struct StubEligibility {
        calls: Arc<Calls>,
        fail: bool,
    }

    #[async_trait]
    impl Agent for StubEligibility {
        type Input = EligibilityRequest;
        type Success = EligibilitySuccessResponse;
        type Failure = EligibilityErrorResponse;

        fn name(&self) -> &'static str {
            "StubEligibility"
        }

        fn phase(&self) -> PhaseKind {
            PhaseKind::Eligibility
        }

        async fn run(
            &self,
            request: EligibilityRequest,
        ) -> Result<EligibilitySuccessResponse, EligibilityErrorResponse> {
            self.calls.eligibility.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(EligibilityErrorResponse::new("no products available for analysis"));
            }
            Ok(EligibilitySuccessResponse {
                user_conditions: request.conditions,
                ..EligibilitySuccessResponse::default()
            })
        }
    }

    struct StubQuestion {
        calls: Arc<Calls>,
        panic: bool,
    }

    #[async_trait]
    impl Agent for StubQuestion {
        type Input = EligibilitySuccessResponse;
        type Success = QuestionSuccessResponse;
        type Failure = QuestionErrorResponse;

        fn name(&self) -> &'static str {
            "StubQuestion"
        }

        fn phase(&self) -> PhaseKind {
            PhaseKind::Question
        }

        async fn run(
            &self,
            request: EligibilitySuccessResponse,
        ) -> Result<QuestionSuccessResponse, QuestionErrorResponse> {
            self.calls.question.fetch_add(1, Ordering::SeqCst);
            if self.panic {
                panic!("question stub exploded");
            }
            Ok(QuestionSuccessResponse {
                user_conditions: request.user_conditions,
                ..QuestionSuccessResponse::default()
            })
        }
    }

    struct StubStrategy {
        calls: Arc<Calls>,
    }

    #[async_trait]
    impl Agent for StubStrategy {
        type Input = QuestionSuccessResponse;
        type Success = StrategySuccessResponse;
        type Failure = StrategyErrorResponse;

        fn name(&self) -> &'static str {
            "StubStrategy"
        }

        fn phase(&self) -> PhaseKind {
            PhaseKind::Strategy
        }

        async fn run(
            &self,
            request: QuestionSuccessResponse,
        ) -> Result<StrategySuccessResponse, StrategyErrorResponse> {
            self.calls.strategy.fetch_add(1, Ordering::SeqCst);
            Ok(StrategySuccessResponse {
                user_conditions: request.user_conditions,
                ..StrategySuccessResponse::default()
            })
        }
    }

    fn stubbed(
        fail: bool,
        panic: bool,
    ) -> (Pipeline<StubEligibility, StubQuestion, StubStrategy>, Arc<Calls>) {
        let calls = Arc::new(Calls::default());
        let pipeline = Pipeline::new(
            StubEligibility { calls: calls.clone(), fail },
            StubQuestion { calls: calls.clone(), panic },
            StubStrategy { calls: calls.clone() },
        );
        (pipeline, calls)
    }

    fn conditions() -> EligibilityConditions {
        EligibilityConditions::new(2.0, 10_000_000, 12).expect("conditions")
    }

    #[tokio::test]
    async fn outputs_feed_the_next_phase_unchanged() {
        let (pipeline, calls) = stubbed(false, false);

        let response = pipeline.run(conditions()).await.expect("pipeline");

        assert_eq!(response.user_conditions, Some(conditions()));
        assert_eq!(calls.strategy.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failing_first_phase_short_circuits() {
        let (pipeline, calls) = stubbed(true, false);

        let error = pipeline.run(conditions()).await.expect_err("eligibility fails");

        assert_eq!(
            error.message(),
            "eligibility phase failed: no products available for analysis"
        );
        assert_eq!(error.processing_step, STRATEGY_FAILED);
        assert_eq!(calls.eligibility.load(Ordering::SeqCst), 1);
        assert_eq!(calls.question.load(Ordering::SeqCst), 0);
        assert_eq!(calls.strategy.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn agent_panic_becomes_a_composition_error() {
        let (pipeline, calls) = stubbed(false, true);

        let error = pipeline.run(conditions()).await.expect_err("panic caught");

        assert_eq!(
            error.message(),
            "pipeline composition fault: agent panicked: question stub exploded"
        );
        assert_eq!(calls.strategy.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn info_lists_agents_in_phase_order() {
        let (pipeline, _) = stubbed(false, false);
        let names: Vec<&str> = pipeline.info().agents.iter().map(|agent| agent.name).collect();
        assert_eq!(names, vec!["StubEligibility", "StubQuestion", "StubStrategy"]);
    }
}
