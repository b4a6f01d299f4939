//! Agent runtime of the savings recommendation pipeline.
//!
//! Three agents run one after another:
//! 1. **Eligibility** (`agents::EligibilityAgent`): rule-based catalog filter.
//! 2. **Clarification** (`agents::QuestionAgent`): asks which preferential
//!    conditions the user can meet.
//! 3. **Strategy** (`agents::StrategyAgent`): interest estimates and three
//!    savings scenarios.
//!
//! Each agent runs a typed chain of [`stage::Stage`]s over its own
//! [`context::ScopedContext`]. [`pipeline::Pipeline`] composes the agents and
//! turns any failure into a `StrategyErrorResponse`.
//!
//! The language model only drafts text and structured proposals. Eligibility,
//! interest math and scenario totals stay deterministic (`parkwise_core`), and
//! every scenario passes [`guardrails::ScenarioGuardrails`].

pub mod agents;
pub mod context;
pub mod guardrails;
pub mod llm;
pub mod pipeline;
pub mod prompts;
pub mod retrieval;
pub mod stage;
pub mod stages;
pub mod user_input;

pub use agents::{Agent, EligibilityAgent, PhaseFailure, QuestionAgent, StrategyAgent};
pub use context::{ContextSnapshot, ScopedContext};
pub use pipeline::{Pipeline, PipelineInfo};
pub use stage::{Stage, StageError, StageFault};

/// The pipeline wired with the shipped agents.
pub type RecommendationPipeline = Pipeline<EligibilityAgent, QuestionAgent, StrategyAgent>;
