use async_trait::async_trait;
use tracing::info;

use parkwise_core::domain::question::ResponseLog;
use parkwise_core::domain::responses::QuestionSuccessResponse;

use crate::context::ScopedContext;
use crate::stage::{Stage, StageError};

pub const NAME: &str = "response_formatter";

/// Packs the answers together with the products and conditions held in the
/// run context.
#[derive(Clone, Copy, Debug, Default)]
pub struct ResponseFormatter;

#[async_trait]
impl Stage for ResponseFormatter {
    type Input = ResponseLog;
    type Output = QuestionSuccessResponse;

    fn name(&self) -> &'static str {
        NAME
    }

    async fn run(
        &self,
        log: ResponseLog,
        context: &mut ScopedContext,
    ) -> Result<QuestionSuccessResponse, StageError> {
        if context.eligible_products().is_empty() {
            return Err(StageError::invalid(NAME, "run context holds no eligible products"));
        }

        let response_summary = log.summary();
        let response = QuestionSuccessResponse {
            eligible_products: context.eligible_products().to_vec(),
            user_responses: log.into_responses(),
            response_summary,
            user_conditions: context.user_conditions().cloned(),
            ..QuestionSuccessResponse::default()
        };

        info!(
            event_name = "stage.response_formatter.completed",
            run_id = ?context.run_id(),
            products = response.eligible_products.len(),
            responses = response.user_responses.len(),
            "clarification response formatted"
        );
        Ok(response)
    }
}
