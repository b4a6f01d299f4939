use std::sync::Arc;

use async_trait::async_trait;
use tracing::info;

use parkwise_core::domain::product::{ChunkType, ProductCode, ProductDetail, SimpleProduct};
use parkwise_db::ChunkRepository;

use crate::context::ScopedContext;
use crate::stage::{Stage, StageError};

pub const NAME: &str = "condition_extractor";

/// Rate and preferential chunks of the eligible products, grouped per product.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ExtractedConditions {
    pub products: Vec<ProductDetail>,
    pub total_chunks: usize,
}

pub struct ConditionExtractor {
    chunks: Arc<dyn ChunkRepository>,
}

impl ConditionExtractor {
    pub fn new(chunks: Arc<dyn ChunkRepository>) -> Self {
        Self { chunks }
    }
}

#[async_trait]
impl Stage for ConditionExtractor {
    type Input = Vec<SimpleProduct>;
    type Output = ExtractedConditions;

    fn name(&self) -> &'static str {
        NAME
    }

    async fn run(
        &self,
        products: Vec<SimpleProduct>,
        context: &mut ScopedContext,
    ) -> Result<ExtractedConditions, StageError> {
        if products.is_empty() {
            return Err(StageError::invalid(NAME, "no eligible products to extract conditions for"));
        }

        let codes: Vec<ProductCode> = products.into_iter().map(|product| product.code).collect();
        let chunks = self
            .chunks
            .fetch_for_products(&codes, &ChunkType::rate_and_preferential())
            .await
            .map_err(StageError::at(NAME))?;
        if chunks.is_empty() {
            return Err(StageError::invalid(
                NAME,
                "no rate or preferential chunks stored for the eligible products",
            ));
        }

        let total_chunks = chunks.len();
        let products = ProductDetail::group(chunks);
        info!(
            event_name = "stage.condition_extractor.completed",
            run_id = ?context.run_id(),
            requested_products = codes.len(),
            products = products.len(),
            chunks = total_chunks,
            "rate and preferential chunks extracted"
        );
        Ok(ExtractedConditions { products, total_chunks })
    }
}
