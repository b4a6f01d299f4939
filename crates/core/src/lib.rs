pub mod config;
pub mod domain;
pub mod eligibility;
pub mod errors;
pub mod interest;
pub mod phase;

pub use domain::conditions::{EligibilityConditions, SpecialCondition};
pub use domain::product::{Product, ProductChunk, ProductCode, SimpleProduct};
pub use eligibility::{
    DeterministicEligibilityEngine, EligibilityEngine, ExclusionReason, FilterOutcome,
    RebalancePolicy,
};
pub use errors::{ApplicationError, DomainError, PhaseError};
pub use phase::{PhaseEvent, PhaseKind, PhaseMachine, PhaseState, PhaseTransitionError};
