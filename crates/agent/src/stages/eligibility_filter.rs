use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use parkwise_core::domain::conditions::EligibilityConditions;
use parkwise_core::eligibility::{EligibilityEngine, FilterOutcome};
use parkwise_db::ProductRepository;

use crate::context::ScopedContext;
use crate::stage::{Stage, StageError};

pub const NAME: &str = "eligibility_filter";

pub const EMPTY_CATALOG: &str = "no products available for analysis";

/// Loads the catalog and runs the eligibility engine over it.
pub struct EligibilityFilter {
    products: Arc<dyn ProductRepository>,
    engine: Arc<dyn EligibilityEngine>,
}

impl EligibilityFilter {
    pub fn new(products: Arc<dyn ProductRepository>, engine: Arc<dyn EligibilityEngine>) -> Self {
        Self { products, engine }
    }
}

#[async_trait]
impl Stage for EligibilityFilter {
    type Input = EligibilityConditions;
    type Output = FilterOutcome;

    fn name(&self) -> &'static str {
        NAME
    }

    async fn run(
        &self,
        conditions: EligibilityConditions,
        context: &mut ScopedContext,
    ) -> Result<FilterOutcome, StageError> {
        let catalog = self.products.fetch_all().await.map_err(StageError::at(NAME))?;
        if catalog.is_empty() {
            return Err(StageError::invalid(NAME, EMPTY_CATALOG));
        }

        let outcome = self.engine.filter(&conditions, &catalog);
        info!(
            event_name = "stage.eligibility_filter.completed",
            run_id = ?context.run_id(),
            catalog = catalog.len(),
            matched = outcome.matched().len(),
            backfilled = outcome.backfilled_codes().len(),
            "eligibility filter applied"
        );
        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use parkwise_core::eligibility::DeterministicEligibilityEngine;
    use parkwise_db::InMemoryProductRepository;

    use super::{EligibilityFilter, EMPTY_CATALOG};
    use crate::context::ScopedContext;
    use crate::stage::{Stage, StageFault};
    use crate::stages::fixtures;

    #[tokio::test]
    async fn filters_the_demo_catalog_into_the_rebalance_window() {
        let stage = EligibilityFilter::new(
            fixtures::product_repo(),
            Arc::new(DeterministicEligibilityEngine::default()),
        );

        let outcome = stage
            .run(fixtures::conditions(), &mut ScopedContext::default())
            .await
            .expect("filter");

        assert!((15..=30).contains(&outcome.matched().len()));
        assert_eq!(outcome.conditions(), &fixtures::conditions());
    }

    #[tokio::test]
    async fn empty_catalog_fails_the_stage() {
        let stage = EligibilityFilter::new(
            Arc::new(InMemoryProductRepository::default()),
            Arc::new(DeterministicEligibilityEngine::default()),
        );

        let error = stage
            .run(fixtures::conditions(), &mut ScopedContext::default())
            .await
            .expect_err("empty catalog");

        assert!(matches!(error.fault, StageFault::InvalidOutput(ref message) if message == EMPTY_CATALOG));
    }
}
