use thiserror::Error;
use tracing::debug;

use crate::phase::states::{PhaseEvent, PhaseKind, PhaseState, TransitionOutcome};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PhaseTransitionError {
    #[error("invalid phase transition from {state:?} using event {event:?}")]
    InvalidTransition { state: PhaseState, event: PhaseEvent },
}

/// Lifecycle of one agent run:
/// `Idle -> Validating -> {Failed, Running} -> {Succeeded, Failed}`.
#[derive(Clone, Debug)]
pub struct PhaseMachine {
    phase: PhaseKind,
    state: PhaseState,
    history: Vec<TransitionOutcome>,
}

impl PhaseMachine {
    pub fn new(phase: PhaseKind) -> Self {
        Self { phase, state: PhaseState::Idle, history: Vec::new() }
    }

    pub fn phase(&self) -> PhaseKind {
        self.phase
    }

    pub fn state(&self) -> PhaseState {
        self.state
    }

    pub fn history(&self) -> &[TransitionOutcome] {
        &self.history
    }

    pub fn apply(&mut self, event: PhaseEvent) -> Result<TransitionOutcome, PhaseTransitionError> {
        let to = next_state(self.state, event)?;
        let outcome = TransitionOutcome { phase: self.phase, from: self.state, to, event };
        debug!(
            event_name = "phase.transition_applied",
            phase = self.phase.as_str(),
            from = ?outcome.from,
            to = ?outcome.to,
            trigger = ?event,
            "phase transition applied"
        );
        self.state = to;
        self.history.push(outcome.clone());
        Ok(outcome)
    }
}

fn next_state(current: PhaseState, event: PhaseEvent) -> Result<PhaseState, PhaseTransitionError> {
    use PhaseEvent::{InputAccepted, InputRejected, StageFailed, StagesCompleted, Start};
    use PhaseState::{Failed, Idle, Running, Succeeded, Validating};

    match (current, event) {
        (Idle, Start) => Ok(Validating),
        (Validating, InputAccepted) => Ok(Running),
        (Validating, InputRejected) => Ok(Failed),
        (Running, StagesCompleted) => Ok(Succeeded),
        (Running, StageFailed) => Ok(Failed),
        (state, event) => Err(PhaseTransitionError::InvalidTransition { state, event }),
    }
}

#[cfg(test)]
mod tests {
    use super::{PhaseMachine, PhaseTransitionError};
    use crate::phase::states::{PhaseEvent, PhaseKind, PhaseState};

    #[test]
    fn happy_path_reaches_succeeded() {
        let mut machine = PhaseMachine::new(PhaseKind::Eligibility);

        for event in [PhaseEvent::Start, PhaseEvent::InputAccepted, PhaseEvent::StagesCompleted] {
            machine.apply(event).expect("valid transition");
        }

        assert_eq!(machine.state(), PhaseState::Succeeded);
        assert!(machine.state().is_terminal());
        assert_eq!(machine.history().len(), 3);
    }

    #[test]
    fn rejected_input_fails_without_running() {
        let mut machine = PhaseMachine::new(PhaseKind::Question);
        machine.apply(PhaseEvent::Start).expect("start");
        let outcome = machine.apply(PhaseEvent::InputRejected).expect("reject");

        assert_eq!(outcome.from, PhaseState::Validating);
        assert_eq!(outcome.to, PhaseState::Failed);
        assert!(!machine.history().iter().any(|step| step.to == PhaseState::Running));
    }

    #[test]
    fn terminal_states_accept_no_further_events() {
        let mut machine = PhaseMachine::new(PhaseKind::Strategy);
        machine.apply(PhaseEvent::Start).expect("start");
        machine.apply(PhaseEvent::InputAccepted).expect("accept");
        machine.apply(PhaseEvent::StageFailed).expect("fail");

        let error = machine.apply(PhaseEvent::Start).expect_err("terminal");
        assert_eq!(
            error,
            PhaseTransitionError::InvalidTransition {
                state: PhaseState::Failed,
                event: PhaseEvent::Start,
            }
        );
        assert_eq!(machine.state(), PhaseState::Failed);
    }

    #[test]
    fn stages_cannot_complete_before_validation() {
        let mut machine = PhaseMachine::new(PhaseKind::Eligibility);
        assert!(machine.apply(PhaseEvent::StagesCompleted).is_err());
        assert_eq!(machine.state(), PhaseState::Idle);
    }
}
