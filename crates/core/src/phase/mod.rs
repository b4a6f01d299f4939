pub mod machine;
pub mod states;

pub use machine::{PhaseMachine, PhaseTransitionError};
pub use states::{PhaseEvent, PhaseKind, PhaseState, TransitionOutcome};
