//! Phase controllers.
//!
//! An agent validates its input, runs its stage chain under its own
//! [`ScopedContext`](crate::context::ScopedContext) and turns the result into
//! the phase's success or error response. Agents never retry.

mod eligibility;
mod question;
mod strategy;

use async_trait::async_trait;
use tracing::warn;

use parkwise_core::domain::responses::{
    EligibilityErrorResponse, QuestionErrorResponse, StrategyErrorResponse,
};
use parkwise_core::errors::PhaseError;
use parkwise_core::phase::{PhaseEvent, PhaseKind, PhaseMachine, PhaseState};

use crate::stage::StageError;

pub use eligibility::EligibilityAgent;
pub use question::{QuestionAgent, QuestionChain};
pub use strategy::{StrategyAgent, StrategyChain};

/// Error response of a phase, built from the phase error alone.
pub trait PhaseFailure: Sized {
    fn from_phase_error(error: &PhaseError) -> Self;

    fn message(&self) -> String;
}

impl PhaseFailure for EligibilityErrorResponse {
    fn from_phase_error(error: &PhaseError) -> Self {
        Self::new(error.to_string())
    }

    fn message(&self) -> String {
        self.error.clone().unwrap_or_default()
    }
}

impl PhaseFailure for QuestionErrorResponse {
    fn from_phase_error(error: &PhaseError) -> Self {
        Self::new(error.to_string())
    }

    fn message(&self) -> String {
        self.error.clone().unwrap_or_default()
    }
}

impl PhaseFailure for StrategyErrorResponse {
    fn from_phase_error(error: &PhaseError) -> Self {
        Self::new(error.to_string())
    }

    fn message(&self) -> String {
        StrategyErrorResponse::message(self).to_owned()
    }
}

#[async_trait]
pub trait Agent: Send + Sync {
    type Input: Send;
    type Success: Send;
    type Failure: PhaseFailure + Send;

    fn name(&self) -> &'static str;

    fn phase(&self) -> PhaseKind;

    async fn run(&self, input: Self::Input) -> Result<Self::Success, Self::Failure>;
}

/// Drives the phase state machine of one run.
pub(crate) struct PhaseTracker {
    machine: PhaseMachine,
}

impl PhaseTracker {
    pub(crate) fn start(phase: PhaseKind) -> Result<Self, PhaseError> {
        let mut tracker = Self { machine: PhaseMachine::new(phase) };
        tracker.apply(PhaseEvent::Start)?;
        Ok(tracker)
    }

    /// Records the validation result and passes it through.
    pub(crate) fn validated<T>(&mut self, result: Result<T, PhaseError>) -> Result<T, PhaseError> {
        match result {
            Ok(value) => {
                self.apply(PhaseEvent::InputAccepted)?;
                Ok(value)
            }
            Err(error) => {
                self.apply(PhaseEvent::InputRejected)?;
                Err(error)
            }
        }
    }

    /// Records the chain result and converts its fault.
    pub(crate) fn finished<T>(&mut self, result: Result<T, StageError>) -> Result<T, PhaseError> {
        self.settle(result.map_err(PhaseError::from))
    }

    pub(crate) fn settle<T>(&mut self, result: Result<T, PhaseError>) -> Result<T, PhaseError> {
        match result {
            Ok(value) => {
                self.apply(PhaseEvent::StagesCompleted)?;
                Ok(value)
            }
            Err(error) => {
                self.apply(PhaseEvent::StageFailed)?;
                Err(error)
            }
        }
    }

    pub(crate) fn state(&self) -> PhaseState {
        self.machine.state()
    }

    fn apply(&mut self, event: PhaseEvent) -> Result<(), PhaseError> {
        self.machine
            .apply(event)
            .map(|_| ())
            .map_err(|error| PhaseError::Composition(error.to_string()))
    }
}

/// Logs the phase error and renders it into the phase's error response.
pub(crate) fn into_failure<F: PhaseFailure>(agent: &'static str, error: PhaseError) -> F {
    warn!(
        event_name = "agent.phase_failed",
        agent,
        kind = error.kind(),
        error = %error,
        "phase failed"
    );
    F::from_phase_error(&error)
}

#[cfg(test)]
mod tests {
    use parkwise_core::domain::responses::{
        EligibilityErrorResponse, QuestionErrorResponse, StrategyErrorResponse, QUESTION_FAILED,
    };
    use parkwise_core::errors::PhaseError;
    use parkwise_core::phase::{PhaseKind, PhaseState};

    use super::{PhaseFailure, PhaseTracker};
    use crate::stage::StageError;

    #[test]
    fn failures_embed_the_phase_error_message() {
        let error = PhaseError::Validation("no eligible products".to_owned());

        let question = QuestionErrorResponse::from_phase_error(&error);
        assert_eq!(question.processing_step, QUESTION_FAILED);
        assert_eq!(question.message(), "invalid phase input: no eligible products");

        let eligibility = EligibilityErrorResponse::from_phase_error(&error);
        assert!(!eligibility.success);

        let strategy = StrategyErrorResponse::from_phase_error(&PhaseError::stage("x", "boom"));
        assert_eq!(PhaseFailure::message(&strategy), "stage `x` failed: boom");
    }

    #[test]
    fn tracker_follows_validation_and_chain_results() {
        let mut rejected = PhaseTracker::start(PhaseKind::Question).expect("start");
        let result: Result<(), PhaseError> =
            rejected.validated(Err(PhaseError::Validation("empty".to_owned())));
        assert!(result.is_err());
        assert_eq!(rejected.state(), PhaseState::Failed);

        let mut failed = PhaseTracker::start(PhaseKind::Strategy).expect("start");
        failed.validated(Ok(())).expect("accepted");
        let error = failed
            .finished::<()>(Err(StageError::invalid("interest_calculator", "nothing")))
            .expect_err("stage fault");
        assert_eq!(error.kind(), "stage");
        assert_eq!(failed.state(), PhaseState::Failed);

        let mut succeeded = PhaseTracker::start(PhaseKind::Eligibility).expect("start");
        succeeded.validated(Ok(())).expect("accepted");
        succeeded.finished(Ok::<_, StageError>(1)).expect("completed");
        assert_eq!(succeeded.state(), PhaseState::Succeeded);
    }
}
