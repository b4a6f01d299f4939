use std::collections::BTreeSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use parkwise_core::domain::conditions::SpecialCondition;
use parkwise_core::domain::product::ChunkType;

use crate::context::ScopedContext;
use crate::llm::{StructuredLlm, StructuredOutput, Validate};
use crate::prompts::PromptLibrary;
use crate::stage::{Stage, StageError};
use crate::stages::condition_extractor::ExtractedConditions;

pub const NAME: &str = "pattern_analyzer";

pub const PREFERENTIAL_CONDITION: &str = "preferential_condition";

/// Pattern names the model is asked to use, and the condition each one checks.
pub const PATTERN_CATEGORIES: [(&str, SpecialCondition); 6] = [
    ("pref_new_customer", SpecialCondition::FirstBanking),
    ("pref_app_usage", SpecialCondition::BankApp),
    ("pref_salary_transfer", SpecialCondition::UsingSalaryAccount),
    ("pref_auto_transfer", SpecialCondition::UsingUtilityBill),
    ("pref_card_spending", SpecialCondition::UsingCard),
    ("pref_marketing_consent", SpecialCondition::Online),
];

/// Used when the model proposes no retrieval queries.
pub const FALLBACK_QUERIES: [&str; 5] = [
    "base rate preferential rate",
    "preferential condition marketing consent",
    "preferential condition mobile app usage",
    "preferential condition card spending",
    "parking account rate conditions",
];

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisPattern {
    pub pattern_name: String,
    pub pattern_type: String,
    #[serde(default)]
    pub frequency: u32,
    #[serde(default)]
    pub affected_banks: Vec<String>,
    #[serde(default)]
    pub standard_keyword: String,
}

impl AnalysisPattern {
    pub fn is_preferential(&self) -> bool {
        self.pattern_type == PREFERENTIAL_CONDITION
    }
}

#[derive(Debug, Deserialize)]
pub struct PatternAnalysisOutput {
    #[serde(default)]
    pub patterns: Vec<AnalysisPattern>,
    #[serde(default)]
    pub rag_queries: Vec<String>,
}

impl Validate for PatternAnalysisOutput {
    fn validate(&self) -> Result<(), String> {
        for pattern in &self.patterns {
            if pattern.pattern_name.trim().is_empty() || pattern.pattern_type.trim().is_empty() {
                return Err("every pattern needs a pattern_name and a pattern_type".to_owned());
            }
        }
        Ok(())
    }
}

impl StructuredOutput for PatternAnalysisOutput {
    const FORMAT_INSTRUCTIONS: &'static str = r#"{
  "patterns": [
    {
      "pattern_name": "pref_app_usage",
      "pattern_type": "preferential_condition",
      "frequency": 3,
      "affected_banks": ["Kakao"],
      "standard_keyword": "mobile app"
    }
  ],
  "rag_queries": ["preferential condition mobile app usage"]
}"#;
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct PatternAnalysis {
    pub patterns: Vec<AnalysisPattern>,
    pub rag_queries: Vec<String>,
    pub used_fallback_queries: bool,
}

pub struct PatternAnalyzer {
    llm: StructuredLlm,
    prompts: Arc<PromptLibrary>,
}

impl PatternAnalyzer {
    pub fn new(llm: StructuredLlm, prompts: Arc<PromptLibrary>) -> Self {
        Self { llm, prompts }
    }
}

struct AnalysisTexts {
    rate_info: Vec<String>,
    preferential: Vec<String>,
    banks: Vec<String>,
}

fn analysis_texts(extracted: &ExtractedConditions) -> AnalysisTexts {
    let mut rate_info = Vec::new();
    let mut preferential = Vec::new();
    let mut banks = BTreeSet::new();

    for product in &extracted.products {
        banks.insert(product.bank_name().to_owned());
        for chunk in &product.chunks {
            let text = format!("[{}] {}", product.product_name, chunk.content);
            match chunk.chunk_type {
                ChunkType::BasicRateInfo => rate_info.push(text),
                ChunkType::PreferentialDetails => preferential.push(text),
                ChunkType::ProductGuide | ChunkType::Other => {}
            }
        }
    }

    AnalysisTexts { rate_info, preferential, banks: banks.into_iter().collect() }
}

#[async_trait]
impl Stage for PatternAnalyzer {
    type Input = ExtractedConditions;
    type Output = PatternAnalysis;

    fn name(&self) -> &'static str {
        NAME
    }

    async fn run(
        &self,
        extracted: ExtractedConditions,
        context: &mut ScopedContext,
    ) -> Result<PatternAnalysis, StageError> {
        if extracted.products.is_empty() {
            return Err(StageError::invalid(NAME, "no preferential condition data to analyse"));
        }

        let texts = analysis_texts(&extracted);
        let prompt = self
            .prompts
            .pattern_analysis(&texts.rate_info, &texts.preferential, &texts.banks)
            .map_err(StageError::at(NAME))?;
        let output: PatternAnalysisOutput =
            self.llm.request(&prompt).await.map_err(StageError::at(NAME))?;

        let mut rag_queries: Vec<String> = output
            .rag_queries
            .into_iter()
            .map(|query| query.trim().to_owned())
            .filter(|query| !query.is_empty())
            .collect();
        let used_fallback_queries = rag_queries.is_empty();
        if used_fallback_queries {
            warn!(
                event_name = "stage.pattern_analyzer.fallback_queries",
                run_id = ?context.run_id(),
                "model proposed no retrieval queries; using defaults"
            );
            rag_queries = FALLBACK_QUERIES.iter().map(|query| (*query).to_owned()).collect();
        }

        info!(
            event_name = "stage.pattern_analyzer.completed",
            run_id = ?context.run_id(),
            patterns = output.patterns.len(),
            queries = rag_queries.len(),
            "preferential patterns analysed"
        );
        Ok(PatternAnalysis { patterns: output.patterns, rag_queries, used_fallback_queries })
    }
}
