use std::sync::Arc;

use clap::{Args, ValueEnum};
use parkwise_agent::llm::{HttpLlmClient, LlmClient, StructuredLlm};
use parkwise_agent::prompts::PromptLibrary;
use parkwise_agent::retrieval::LexicalRetriever;
use parkwise_agent::{EligibilityAgent, QuestionAgent, RecommendationPipeline, StrategyAgent};
use parkwise_core::config::{AppConfig, LoadOptions};
use parkwise_core::domain::conditions::EligibilityConditions;
use parkwise_core::domain::responses::StrategySuccessResponse;
use tracing::{info, warn};

use crate::commands::filter::{invalid_conditions, ConditionArgs};
use crate::commands::{load_config, runtime, Catalog, CommandResult, Failure};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum AutoAnswer {
    Yes,
    No,
}

impl AutoAnswer {
    /// Answer used when questions go to the channel instead of the console.
    /// Without `--answer` every question is declined.
    fn for_channel(answer: Option<Self>) -> Self {
        answer.unwrap_or_else(|| {
            warn!(
                event_name = "cli.recommend.answer_defaulted",
                reply = Self::No.reply(),
                "pipeline.interactive is false and --answer was not given; declining every question"
            );
            Self::No
        })
    }

    fn reply(self) -> &'static str {
        match self {
            Self::Yes => "y",
            Self::No => "n",
        }
    }
}

#[derive(Debug, Clone, Args)]
pub struct RecommendArgs {
    #[command(flatten)]
    pub conditions: ConditionArgs,
    #[arg(
        long,
        value_enum,
        help = "Answer every clarification question automatically instead of prompting"
    )]
    pub answer: Option<AutoAnswer>,
}

/// Runs the full pipeline against the configured model endpoint.
pub fn run(options: LoadOptions, args: &RecommendArgs) -> CommandResult {
    let result = load_config(options).and_then(|mut config| {
        if args.answer.is_some() {
            config.pipeline.interactive = false;
        }
        let conditions = args.conditions.conditions().map_err(invalid_conditions)?;
        let client = HttpLlmClient::from_config(&config.llm)
            .map_err(|error| ("llm_config", error.to_string(), 2u8))?;
        info!(
            event_name = "cli.recommend.llm_ready",
            endpoint = client.endpoint(),
            model = client.model_name(),
            "model endpoint configured"
        );

        runtime()?.block_on(async {
            let catalog = Catalog::open(&config, args.conditions.demo).await?;
            let outcome =
                recommend(&config, &catalog, Arc::new(client), conditions, args.answer).await;
            catalog.close().await;
            outcome
        })
    });

    match result {
        Ok(response) => {
            let message = format!(
                "{} scenarios from {} interest estimates",
                response.scenarios.len(),
                response.interest_calculations.len()
            );
            CommandResult::success_with("recommend", message, &response)
        }
        Err(failure) => CommandResult::from_failure("recommend", failure),
    }
}

pub(crate) async fn recommend(
    config: &AppConfig,
    catalog: &Catalog,
    client: Arc<dyn LlmClient>,
    conditions: EligibilityConditions,
    answer: Option<AutoAnswer>,
) -> Result<StrategySuccessResponse, Failure> {
    let llm = StructuredLlm::new(client);
    let prompts = PromptLibrary::new()
        .map_err(|error| ("prompt_templates", error.to_string(), 1u8))
        .map(Arc::new)?;
    let retriever = Arc::new(LexicalRetriever::new(catalog.chunks.clone()));

    let eligibility = EligibilityAgent::from_config(catalog.products.clone(), &config.pipeline)
        .map_err(|error| ("config_validation", error.to_string(), 2u8))?;
    let (question, pending) = QuestionAgent::for_mode(
        llm.clone(),
        prompts.clone(),
        catalog.chunks.clone(),
        retriever,
        &config.pipeline,
    );
    let strategy = StrategyAgent::new(
        llm,
        prompts,
        catalog.chunks.clone(),
        catalog.products.clone(),
        &config.pipeline,
    );

    let answerer = pending.map(|mut questions| {
        let reply = AutoAnswer::for_channel(answer).reply();
        tokio::spawn(async move {
            while let Some(pending) = questions.recv().await {
                info!(
                    event_name = "cli.recommend.auto_answer",
                    question_id = pending.question.id.as_str(),
                    reply,
                    "answered clarification question"
                );
                pending.answer(reply);
            }
        })
    });

    let pipeline = RecommendationPipeline::new(eligibility, question, strategy);
    let outcome = pipeline.run(conditions).await.map_err(|error| {
        let message = error.message().to_string();
        ("pipeline", message, 6u8)
    });

    drop(pipeline);
    if let Some(answerer) = answerer {
        answerer.abort();
    }
    outcome
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parkwise_agent::llm::ScriptedLlmClient;
    use parkwise_core::config::AppConfig;
    use parkwise_core::domain::conditions::EligibilityConditions;

    use super::{recommend, AutoAnswer};
    use crate::commands::Catalog;

    #[tokio::test]
    async fn unparseable_model_output_fails_in_the_question_phase() {
        let mut config = AppConfig::default();
        config.pipeline.interactive = false;
        let catalog = Catalog::open(&config, true).await.expect("demo catalog");
        let client = Arc::new(ScriptedLlmClient::replying("not json"));
        let conditions = EligibilityConditions::new(2.0, 10_000_000, 12).expect("conditions");

        let (class, message, code) =
            recommend(&config, &catalog, client.clone(), conditions, Some(AutoAnswer::Yes))
                .await
                .expect_err("model output rejected");

        assert_eq!(class, "pipeline");
        assert_eq!(code, 6);
        assert!(message.starts_with("question phase failed:"), "{message}");
        assert_eq!(client.call_count().await, 1);
    }

    #[test]
    fn channel_answers_default_to_declining() {
        assert_eq!(AutoAnswer::for_channel(None), AutoAnswer::No);
        assert_eq!(AutoAnswer::for_channel(Some(AutoAnswer::Yes)), AutoAnswer::Yes);
        assert_eq!(AutoAnswer::for_channel(None).reply(), "n");
    }

    #[tokio::test]
    async fn invalid_deposit_never_calls_the_model() {
        let config = AppConfig::default();
        let catalog = Catalog::open(&config, true).await.expect("demo catalog");
        let client = Arc::new(ScriptedLlmClient::replying("{}"));
        let conditions =
            EligibilityConditions { deposit_months: 12, ..EligibilityConditions::default() };

        let (class, message, _) = recommend(&config, &catalog, client.clone(), conditions, None)
            .await
            .expect_err("zero deposit");

        assert_eq!(class, "pipeline");
        assert!(message.starts_with("eligibility phase failed:"), "{message}");
        assert_eq!(client.call_count().await, 0);
    }
}
