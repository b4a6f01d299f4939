use thiserror::Error;

use crate::phase::PhaseTransitionError;

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DomainError {
    #[error(transparent)]
    PhaseTransition(#[from] PhaseTransitionError),
    #[error("domain invariant violation: {0}")]
    InvariantViolation(String),
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ApplicationError {
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error("persistence failure: {0}")]
    Persistence(String),
    #[error("integration failure: {0}")]
    Integration(String),
    #[error("configuration failure: {0}")]
    Configuration(String),
}

/// Terminal failure of one pipeline phase. None of these is retried.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum PhaseError {
    #[error("invalid phase input: {0}")]
    Validation(String),
    #[error("stage `{stage}` failed: {message}")]
    Stage { stage: &'static str, message: String },
    #[error("pipeline composition fault: {0}")]
    Composition(String),
}

impl PhaseError {
    pub fn stage(stage: &'static str, message: impl Into<String>) -> Self {
        Self::Stage { stage, message: message.into() }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::Stage { .. } => "stage",
            Self::Composition(_) => "composition",
        }
    }
}

impl From<DomainError> for PhaseError {
    fn from(value: DomainError) -> Self {
        Self::Validation(value.to_string())
    }
}

impl ApplicationError {
    /// Whether an operator can fix this by changing input or configuration.
    pub fn is_user_actionable(&self) -> bool {
        matches!(self, Self::Domain(_) | Self::Configuration(_))
    }
}

#[cfg(test)]
mod tests {
    use crate::errors::{ApplicationError, DomainError, PhaseError};
    use crate::phase::{PhaseEvent, PhaseState, PhaseTransitionError};

    #[test]
    fn stage_error_names_the_stage() {
        let error = PhaseError::stage("interest_calculator", "llm returned no calculations");
        assert_eq!(
            error.to_string(),
            "stage `interest_calculator` failed: llm returned no calculations"
        );
        assert_eq!(error.kind(), "stage");
    }

    #[test]
    fn domain_error_becomes_validation_phase_error() {
        let error = PhaseError::from(DomainError::InvariantViolation("empty".to_owned()));
        assert!(matches!(error, PhaseError::Validation(ref message) if message.contains("empty")));
    }

    #[test]
    fn transition_error_is_a_domain_error() {
        let domain = DomainError::from(PhaseTransitionError::InvalidTransition {
            state: PhaseState::Succeeded,
            event: PhaseEvent::Start,
        });
        let application = ApplicationError::from(domain);

        assert!(application.is_user_actionable());
        assert!(!ApplicationError::Persistence("locked".to_owned()).is_user_actionable());
    }
}
