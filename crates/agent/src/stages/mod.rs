//! Concrete stages of the three phases.
//!
//! Eligibility: `EligibilityFilter`.
//! Clarification: `ConditionExtractor -> PatternAnalyzer -> QuestionGenerator
//! -> UserInputStage -> ResponseFormatter`.
//! Strategy: `InterestCalculator -> StrategyScenario`.

pub mod condition_extractor;
pub mod eligibility_filter;
pub mod interest_calculator;
pub mod pattern_analyzer;
pub mod question_generator;
pub mod response_formatter;
pub mod strategy_scenario;
pub mod user_input;

pub use condition_extractor::{ConditionExtractor, ExtractedConditions};
pub use eligibility_filter::EligibilityFilter;
pub use interest_calculator::{InterestCalculations, InterestCalculator};
pub use pattern_analyzer::{AnalysisPattern, PatternAnalysis, PatternAnalyzer};
pub use question_generator::QuestionGenerator;
pub use response_formatter::ResponseFormatter;
pub use strategy_scenario::StrategyScenario;
pub use user_input::UserInputStage;

#[cfg(test)]
pub(crate) mod fixtures {
    use std::sync::Arc;

    use parkwise_core::domain::conditions::EligibilityConditions;
    use parkwise_core::domain::product::{Product, SimpleProduct};
    use parkwise_db::{DemoCatalog, InMemoryChunkRepository, InMemoryProductRepository};

    pub fn catalog() -> Vec<Product> {
        DemoCatalog::products().expect("demo catalog")
    }

    pub fn summaries(codes: &[&str]) -> Vec<SimpleProduct> {
        let catalog = catalog();
        codes
            .iter()
            .filter_map(|code| catalog.iter().find(|product| product.code.0 == *code))
            .map(Product::summary)
            .collect()
    }

    pub fn product_repo() -> Arc<InMemoryProductRepository> {
        Arc::new(InMemoryProductRepository::with_products(catalog()))
    }

    pub fn chunk_repo() -> Arc<InMemoryChunkRepository> {
        Arc::new(InMemoryChunkRepository::with_chunks(DemoCatalog::chunks()))
    }

    pub fn conditions() -> EligibilityConditions {
        EligibilityConditions::new(2.0, 10_000_000, 12).expect("conditions")
    }
}
