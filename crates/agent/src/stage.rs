//! Typed stage composition.
//!
//! A stage consumes one value and produces one value. Stages compose with
//! [`Stage::then`], which only type-checks when the output of the first stage
//! is the input of the second. Cross-stage state that does not fit the
//! input/output types travels through the [`ScopedContext`] argument.

use async_trait::async_trait;
use thiserror::Error;

use parkwise_core::errors::{DomainError, PhaseError};
use parkwise_db::RepositoryError;

use crate::context::ScopedContext;
use crate::guardrails::GuardrailViolation;
use crate::llm::LlmFault;
use crate::prompts::PromptError;
use crate::user_input::UserInputError;

#[derive(Debug, Error)]
pub enum StageFault {
    #[error(transparent)]
    Llm(#[from] LlmFault),
    #[error(transparent)]
    Repository(#[from] RepositoryError),
    #[error(transparent)]
    UserInput(#[from] UserInputError),
    #[error(transparent)]
    Prompt(#[from] PromptError),
    #[error(transparent)]
    Domain(#[from] DomainError),
    #[error(transparent)]
    Guardrail(#[from] GuardrailViolation),
    #[error("invalid stage output: {0}")]
    InvalidOutput(String),
}

/// A fault tagged with the stage that raised it.
#[derive(Debug, Error)]
#[error("stage `{stage}` failed: {fault}")]
pub struct StageError {
    pub stage: &'static str,
    #[source]
    pub fault: StageFault,
}

impl StageError {
    pub fn new(stage: &'static str, fault: impl Into<StageFault>) -> Self {
        Self { stage, fault: fault.into() }
    }

    pub fn invalid(stage: &'static str, message: impl Into<String>) -> Self {
        Self { stage, fault: StageFault::InvalidOutput(message.into()) }
    }

    /// Adapter for `map_err`: `repo.fetch_all().await.map_err(StageError::at(NAME))?`.
    pub fn at<E>(stage: &'static str) -> impl Fn(E) -> StageError
    where
        E: Into<StageFault>,
    {
        move |error| StageError::new(stage, error)
    }
}

impl From<StageError> for PhaseError {
    fn from(error: StageError) -> Self {
        PhaseError::Stage { stage: error.stage, message: error.fault.to_string() }
    }
}

#[async_trait]
pub trait Stage: Send + Sync {
    type Input: Send + 'static;
    type Output: Send + 'static;

    fn name(&self) -> &'static str;

    async fn run(
        &self,
        input: Self::Input,
        context: &mut ScopedContext,
    ) -> Result<Self::Output, StageError>;

    fn then<B>(self, next: B) -> Then<Self, B>
    where
        Self: Sized,
        B: Stage<Input = Self::Output>,
    {
        Then { first: self, second: next }
    }
}

/// Runs `first`, then feeds its output to `second`. The first fault stops the chain.
pub struct Then<A, B> {
    first: A,
    second: B,
}

#[async_trait]
impl<A, B> Stage for Then<A, B>
where
    A: Stage,
    B: Stage<Input = A::Output>,
{
    type Input = A::Input;
    type Output = B::Output;

    /// Reports the entry stage of the chain.
    fn name(&self) -> &'static str {
        self.first.name()
    }

    async fn run(
        &self,
        input: Self::Input,
        context: &mut ScopedContext,
    ) -> Result<Self::Output, StageError> {
        let intermediate = self.first.run(input, context).await?;
        self.second.run(intermediate, context).await
    }
}
