use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{info, warn};

use parkwise_core::config::PipelineConfig;
use parkwise_core::domain::conditions::SpecialCondition;
use parkwise_core::domain::question::UserQuestion;

use crate::context::ScopedContext;
use crate::llm::{StructuredLlm, StructuredOutput, Validate};
use crate::prompts::PromptLibrary;
use crate::retrieval::Retriever;
use crate::stage::{Stage, StageError};
use crate::stages::pattern_analyzer::{AnalysisPattern, PatternAnalysis, PATTERN_CATEGORIES};

pub const NAME: &str = "question_generator";

pub const NO_CONTEXT_PLACEHOLDER: &str = "No matching examples were retrieved.";

#[derive(Debug, Deserialize)]
pub struct GeneratedQuestion {
    pub id: String,
    pub category: String,
    pub question: String,
    #[serde(default)]
    pub impact: String,
}

#[derive(Debug, Deserialize)]
pub struct GeneratedQuestions {
    pub questions: Vec<GeneratedQuestion>,
    #[serde(default)]
    pub estimated_time: String,
}

impl Validate for GeneratedQuestions {
    fn validate(&self) -> Result<(), String> {
        if self.questions.is_empty() {
            return Err("no questions generated".to_owned());
        }
        for question in &self.questions {
            if question.id.trim().is_empty() || question.question.trim().is_empty() {
                return Err("every question needs an id and a question text".to_owned());
            }
        }
        Ok(())
    }
}

impl StructuredOutput for GeneratedQuestions {
    const FORMAT_INSTRUCTIONS: &'static str = r#"{
  "questions": [
    {
      "id": "q1",
      "category": "pref_app_usage",
      "question": "Can you log in to the bank's mobile app at least once a month?",
      "impact": "Most digital banks require this for the bonus rate."
    }
  ],
  "estimated_time": "2-3 minutes"
}"#;
}

/// Pattern name, then condition tag, else `online`.
pub fn map_category(name: &str) -> SpecialCondition {
    let name = name.trim();
    PATTERN_CATEGORIES
        .iter()
        .find(|(pattern, _)| *pattern == name)
        .map(|(_, condition)| *condition)
        .or_else(|| name.parse().ok())
        .unwrap_or(SpecialCondition::Online)
}

pub struct QuestionGenerator {
    llm: StructuredLlm,
    prompts: Arc<PromptLibrary>,
    retriever: Arc<dyn Retriever>,
    top_k: usize,
    context_limit: usize,
    question_limit: usize,
}

impl QuestionGenerator {
    pub fn new(
        llm: StructuredLlm,
        prompts: Arc<PromptLibrary>,
        retriever: Arc<dyn Retriever>,
        config: &PipelineConfig,
    ) -> Self {
        Self {
            llm,
            prompts,
            retriever,
            top_k: config.retrieval_top_k,
            context_limit: config.retrieval_context_limit,
            question_limit: config.question_limit,
        }
    }

    /// One line per retrieved chunk across all queries, capped. Failed queries
    /// are skipped.
    pub async fn retrieval_context(&self, queries: &[String]) -> String {
        let mut lines = Vec::new();
        for query in queries {
            match self.retriever.search(query, self.top_k).await {
                Ok(hits) => lines.extend(hits.into_iter().map(|hit| {
                    format!("[{}] {} (score: {:.2})", hit.product_name, hit.text, hit.score)
                })),
                Err(error) => warn!(
                    event_name = "retrieval.query_failed",
                    query = query.as_str(),
                    error = %error,
                    "retrieval query failed; skipping"
                ),
            }
        }

        lines.truncate(self.context_limit);
        if lines.is_empty() {
            NO_CONTEXT_PLACEHOLDER.to_owned()
        } else {
            lines.join("\n")
        }
    }
}

fn affected_banks(patterns: &[AnalysisPattern]) -> Vec<String> {
    let banks: BTreeSet<&str> = patterns
        .iter()
        .flat_map(|pattern| pattern.affected_banks.iter().map(String::as_str))
        .collect();
    banks.into_iter().map(str::to_owned).collect()
}

#[async_trait]
impl Stage for QuestionGenerator {
    type Input = PatternAnalysis;
    type Output = Vec<UserQuestion>;

    fn name(&self) -> &'static str {
        NAME
    }

    async fn run(
        &self,
        analysis: PatternAnalysis,
        context: &mut ScopedContext,
    ) -> Result<Vec<UserQuestion>, StageError> {
        if analysis.rag_queries.is_empty() {
            return Err(StageError::invalid(NAME, "no retrieval queries to ground the questions"));
        }

        let rag_context = self.retrieval_context(&analysis.rag_queries).await;
        let banks = affected_banks(&analysis.patterns);
        let preferential: Vec<AnalysisPattern> =
            analysis.patterns.into_iter().filter(AnalysisPattern::is_preferential).collect();

        let prompt = self
            .prompts
            .question_generation(&preferential, &rag_context, &banks, self.question_limit)
            .map_err(StageError::at(NAME))?;
        let generated: GeneratedQuestions =
            self.llm.request(&prompt).await.map_err(StageError::at(NAME))?;

        let questions: Vec<UserQuestion> = generated
            .questions
            .into_iter()
            .take(self.question_limit)
            .map(|question| UserQuestion {
                category: map_category(&question.category),
                id: question.id.trim().to_owned(),
                question: question.question.trim().to_owned(),
                impact: question.impact,
            })
            .collect();

        info!(
            event_name = "stage.question_generator.completed",
            run_id = ?context.run_id(),
            questions = questions.len(),
            estimated_time = generated.estimated_time.as_str(),
            "clarification questions generated"
        );
        Ok(questions)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use parkwise_core::config::PipelineConfig;
    use parkwise_core::domain::conditions::SpecialCondition;
    use parkwise_db::RepositoryError;

    use super::{map_category, QuestionGenerator, NO_CONTEXT_PLACEHOLDER};
    use crate::context::ScopedContext;
    use crate::llm::{ScriptedLlmClient, StructuredLlm};
    use crate::prompts::PromptLibrary;
    use crate::retrieval::{LexicalRetriever, RetrievedChunk, Retriever};
    use crate::stage::Stage;
    use crate::stages::fixtures;
    use crate::stages::pattern_analyzer::PatternAnalysis;

    struct Repeating;

    #[async_trait]
    impl Retriever for Repeating {
        async fn search(&self, query: &str, k: usize) -> Result<Vec<RetrievedChunk>, RepositoryError> {
            if query == "broken" {
                return Err(RepositoryError::Decode("index offline".to_owned()));
            }
            Ok((0..k)
                .map(|index| RetrievedChunk {
                    text: format!("{query} #{index}"),
                    product_name: "Bank".to_owned(),
                    score: 0.5,
                })
                .collect())
        }
    }

    fn generator(client: ScriptedLlmClient, retriever: Arc<dyn Retriever>) -> QuestionGenerator {
        QuestionGenerator::new(
            StructuredLlm::new(Arc::new(client)),
            Arc::new(PromptLibrary::new().expect("templates")),
            retriever,
            &PipelineConfig { question_limit: 2, ..PipelineConfig::default() },
        )
    }

    #[test]
    fn categories_map_from_pattern_names_then_tags_then_default() {
        assert_eq!(map_category("pref_card_spending"), SpecialCondition::UsingCard);
        assert_eq!(map_category("bank_app"), SpecialCondition::BankApp);
        assert_eq!(map_category("something else"), SpecialCondition::Online);
    }

    #[tokio::test]
    async fn retrieval_context_is_capped_and_skips_failed_queries() {
        let stage = generator(ScriptedLlmClient::replying("{}"), Arc::new(Repeating));
        let queries: Vec<String> =
            ["a", "broken", "b", "c", "d"].iter().map(|query| (*query).to_owned()).collect();

        let context = stage.retrieval_context(&queries).await;

        let lines: Vec<&str> = context.lines().collect();
        assert_eq!(lines.len(), 30);
        assert_eq!(lines[0], "[Bank] a #0 (score: 0.50)");
        assert!(!context.contains("broken"));
    }

    #[tokio::test]
    async fn empty_retrieval_uses_placeholder() {
        let stage = generator(
            ScriptedLlmClient::replying("{}"),
            Arc::new(LexicalRetriever::new(fixtures::chunk_repo())),
        );
        let context = stage.retrieval_context(&["zzzz qqqq".to_owned()]).await;
        assert_eq!(context, NO_CONTEXT_PLACEHOLDER);
    }

    #[tokio::test]
    async fn questions_are_mapped_trimmed_and_limited() {
        let client = ScriptedLlmClient::replying(
            r#"{"questions": [
                {"id": "q1", "category": "pref_app_usage", "question": " Use the app monthly? ", "impact": "+0.5%p"},
                {"id": "q2", "category": "unknown_pattern", "question": "Agree to marketing?", "impact": ""},
                {"id": "q3", "category": "using_card", "question": "Spend 300k on the card?", "impact": ""}
            ], "estimated_time": "2 minutes"}"#,
        );
        let stage = generator(client, Arc::new(LexicalRetriever::new(fixtures::chunk_repo())));
        let analysis = PatternAnalysis {
            patterns: Vec::new(),
            rag_queries: vec!["bank app".to_owned()],
            used_fallback_queries: false,
        };

        let questions = stage.run(analysis, &mut ScopedContext::default()).await.expect("run");

        assert_eq!(questions.len(), 2);
        assert_eq!(questions[0].category, SpecialCondition::BankApp);
        assert_eq!(questions[0].question, "Use the app monthly?");
        assert_eq!(questions[1].category, SpecialCondition::Online);
    }

    #[tokio::test]
    async fn missing_queries_fail_before_calling_the_model() {
        let client = Arc::new(ScriptedLlmClient::replying("{}"));
        let stage = QuestionGenerator::new(
            StructuredLlm::new(client.clone()),
            Arc::new(PromptLibrary::new().expect("templates")),
            Arc::new(LexicalRetriever::new(fixtures::chunk_repo())),
            &PipelineConfig::default(),
        );

        let error = stage
            .run(PatternAnalysis::default(), &mut ScopedContext::default())
            .await
            .expect_err("no queries");

        assert_eq!(error.stage, "question_generator");
        assert_eq!(client.call_count().await, 0);
    }
}
