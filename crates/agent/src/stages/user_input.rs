use std::sync::Arc;

use async_trait::async_trait;
use tracing::{info, warn};

use parkwise_core::domain::question::{ResponseLog, UserQuestion, UserResponse};

use crate::context::ScopedContext;
use crate::stage::{Stage, StageError, StageFault};
use crate::user_input::{UserInputChannel, UserInputError};

pub const NAME: &str = "user_input";

/// Asks every question in order and records the answers.
pub struct UserInputStage {
    channel: Arc<dyn UserInputChannel>,
}

impl UserInputStage {
    pub fn new(channel: Arc<dyn UserInputChannel>) -> Self {
        Self { channel }
    }
}

#[async_trait]
impl Stage for UserInputStage {
    type Input = Vec<UserQuestion>;
    type Output = ResponseLog;

    fn name(&self) -> &'static str {
        NAME
    }

    async fn run(
        &self,
        questions: Vec<UserQuestion>,
        context: &mut ScopedContext,
    ) -> Result<ResponseLog, StageError> {
        if questions.is_empty() {
            return Err(StageError::invalid(NAME, "no questions to ask"));
        }

        let asked = questions.len();
        let mut log = ResponseLog::default();
        for question in questions {
            match self.channel.ask(&question).await {
                Ok((raw, answer)) => log.push(UserResponse::new(question, answer, Some(raw))),
                // The front-end went away; keep what was answered.
                Err(UserInputError::Closed) if !log.is_empty() => {
                    warn!(
                        event_name = "stage.user_input.closed_early",
                        run_id = ?context.run_id(),
                        answered = log.len(),
                        asked,
                        "input channel closed before all questions were answered"
                    );
                    break;
                }
                Err(UserInputError::Closed) => {
                    return Err(StageError::new(NAME, StageFault::UserInput(UserInputError::Closed)));
                }
                Err(error) => warn!(
                    event_name = "stage.user_input.question_skipped",
                    run_id = ?context.run_id(),
                    question_id = question.id.as_str(),
                    error = %error,
                    "question skipped"
                ),
            }
        }

        if log.is_empty() {
            return Err(StageError::invalid(NAME, "no answers were collected"));
        }

        info!(
            event_name = "stage.user_input.completed",
            run_id = ?context.run_id(),
            asked,
            answered = log.len(),
            "clarification answers collected"
        );
        Ok(log)
    }
}
