use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::{debug, info, warn};

use parkwise_core::config::PipelineConfig;
use parkwise_core::domain::conditions::EligibilityConditions;
use parkwise_core::domain::product::{ChunkType, Product, ProductCode, ProductDetail, SimpleProduct};
use parkwise_core::domain::responses::QuestionSuccessResponse;
use parkwise_core::domain::scenario::ProductInterestCalculation;
use parkwise_core::interest::after_tax_interest;
use parkwise_db::{ChunkRepository, ProductRepository};

use crate::context::ScopedContext;
use crate::llm::{StructuredLlm, StructuredOutput, Validate};
use crate::prompts::PromptLibrary;
use crate::stage::{Stage, StageError};

pub const NAME: &str = "interest_calculator";

pub const FALLBACK_FEASIBILITY: &str = "base_rate_only";

/// Per-product interest estimates, carried together with the clarification
/// response they were computed for.
#[derive(Clone, Debug, PartialEq)]
pub struct InterestCalculations {
    pub calculations: Vec<ProductInterestCalculation>,
    pub request: QuestionSuccessResponse,
}

#[derive(Debug, Deserialize)]
pub struct CalculatedInterest {
    pub product_code: String,
    #[serde(default)]
    pub product_name: String,
    pub interest: f64,
    #[serde(default)]
    pub calculation_detail: String,
    #[serde(default)]
    pub applied_conditions: Vec<String>,
    #[serde(default)]
    pub feasibility: String,
}

#[derive(Debug, Deserialize)]
pub struct InterestCalculationOutput {
    #[serde(default)]
    pub calculations: Vec<CalculatedInterest>,
}

impl Validate for InterestCalculationOutput {
    fn validate(&self) -> Result<(), String> {
        for calculation in &self.calculations {
            if calculation.product_code.trim().is_empty() {
                return Err("every calculation needs a product_code".to_owned());
            }
            if !calculation.interest.is_finite() || calculation.interest < 0.0 {
                return Err(format!(
                    "interest for `{}` must be a non-negative amount",
                    calculation.product_code
                ));
            }
        }
        Ok(())
    }
}

impl StructuredOutput for InterestCalculationOutput {
    const FORMAT_INSTRUCTIONS: &'static str = r#"{
  "calculations": [
    {
      "product_code": "PK-001",
      "product_name": "Example Parking Account",
      "interest": 283442,
      "calculation_detail": "3.3% for 12 months, compounded monthly, after 15.4% tax",
      "applied_conditions": ["bank_app"],
      "feasibility": "high"
    }
  ]
}"#;
}

/// Estimates after-tax interest for every eligible product, a few products per
/// model call. Products the model skips fall back to the base rate.
pub struct InterestCalculator {
    llm: StructuredLlm,
    prompts: Arc<PromptLibrary>,
    chunks: Arc<dyn ChunkRepository>,
    products: Arc<dyn ProductRepository>,
    batch_size: usize,
}

impl InterestCalculator {
    pub fn new(
        llm: StructuredLlm,
        prompts: Arc<PromptLibrary>,
        chunks: Arc<dyn ChunkRepository>,
        products: Arc<dyn ProductRepository>,
        config: &PipelineConfig,
    ) -> Self {
        Self { llm, prompts, chunks, products, batch_size: config.interest_batch_size.max(1) }
    }

    async fn calculate_batch(
        &self,
        details: &[ProductDetail],
        conditions: &EligibilityConditions,
        met_conditions: &[String],
        context: &ScopedContext,
    ) -> Result<Vec<CalculatedInterest>, StageError> {
        let prompt = self
            .prompts
            .interest_calculation(details, conditions, met_conditions)
            .map_err(StageError::at(NAME))?;
        match self.llm.request::<InterestCalculationOutput>(&prompt).await {
            Ok(output) => Ok(output.calculations),
            Err(fault) => {
                warn!(
                    event_name = "stage.interest_calculator.batch_failed",
                    run_id = ?context.run_id(),
                    products = details.len(),
                    error = %fault,
                    "interest batch failed; using base rates"
                );
                Ok(Vec::new())
            }
        }
    }
}

/// Conditions the user said yes to, as `category: question` lines.
fn met_conditions(request: &QuestionSuccessResponse) -> Vec<String> {
    request
        .user_responses
        .iter()
        .filter(|response| response.answer)
        .map(|response| format!("{}: {}", response.question.category, response.question.question))
        .collect()
}

fn base_rate_calculation(
    product: &Product,
    conditions: &EligibilityConditions,
) -> Result<ProductInterestCalculation, StageError> {
    let interest =
        after_tax_interest(conditions.deposit_amount, product.base_rate, conditions.deposit_months)
            .map_err(StageError::at(NAME))?;
    Ok(ProductInterestCalculation {
        product_code: product.code.clone(),
        product_name: product.name.clone(),
        interest,
        calculation_detail: format!(
            "base rate {:.2}% compounded monthly for {} months, after 15.4% tax",
            product.base_rate, conditions.deposit_months
        ),
        applied_conditions: Vec::new(),
        feasibility: FALLBACK_FEASIBILITY.to_owned(),
    })
}

fn from_model(calculation: CalculatedInterest, product: &SimpleProduct) -> ProductInterestCalculation {
    let product_name = if calculation.product_name.trim().is_empty() {
        product.name.clone()
    } else {
        calculation.product_name
    };
    ProductInterestCalculation {
        product_code: product.code.clone(),
        product_name,
        interest: calculation.interest.round() as u64,
        calculation_detail: calculation.calculation_detail,
        applied_conditions: calculation.applied_conditions,
        feasibility: calculation.feasibility,
    }
}

#[async_trait]
impl Stage for InterestCalculator {
    type Input = QuestionSuccessResponse;
    type Output = InterestCalculations;

    fn name(&self) -> &'static str {
        NAME
    }

    async fn run(
        &self,
        request: QuestionSuccessResponse,
        context: &mut ScopedContext,
    ) -> Result<InterestCalculations, StageError> {
        let conditions = request
            .user_conditions
            .clone()
            .or_else(|| context.user_conditions().cloned())
            .ok_or_else(|| StageError::invalid(NAME, "user conditions are missing"))?;
        if request.eligible_products.is_empty() {
            return Err(StageError::invalid(NAME, "no eligible products to calculate interest for"));
        }

        let catalog: HashMap<ProductCode, Product> = self
            .products
            .fetch_all()
            .await
            .map_err(StageError::at(NAME))?
            .into_iter()
            .map(|product| (product.code.clone(), product))
            .collect();
        let met = met_conditions(&request);

        let mut calculations = Vec::with_capacity(request.eligible_products.len());
        let mut fallbacks = 0_usize;
        for batch in request.eligible_products.chunks(self.batch_size) {
            let codes: Vec<ProductCode> = batch.iter().map(|product| product.code.clone()).collect();
            let chunks = self
                .chunks
                .fetch_for_products(&codes, &ChunkType::rate_and_preferential())
                .await
                .map_err(StageError::at(NAME))?;
            let details = ProductDetail::group(chunks);

            let mut answered: HashMap<String, CalculatedInterest> = HashMap::new();
            if !details.is_empty() {
                for calculation in self.calculate_batch(&details, &conditions, &met, context).await? {
                    let code = calculation.product_code.trim().to_owned();
                    answered.entry(code).or_insert(calculation);
                }
            }

            for product in batch {
                if let Some(calculation) = answered.remove(&product.code.0) {
                    calculations.push(from_model(calculation, product));
                    continue;
                }
                match catalog.get(&product.code) {
                    Some(entry) => {
                        fallbacks += 1;
                        calculations.push(base_rate_calculation(entry, &conditions)?);
                    }
                    None => warn!(
                        event_name = "stage.interest_calculator.product_unknown",
                        run_id = ?context.run_id(),
                        product_code = %product.code,
                        "product missing from catalog; skipped"
                    ),
                }
            }
            if !answered.is_empty() {
                debug!(
                    event_name = "stage.interest_calculator.extra_calculations_dropped",
                    run_id = ?context.run_id(),
                    dropped = answered.len(),
                    "model returned calculations for products outside the batch"
                );
            }
        }

        if calculations.is_empty() {
            return Err(StageError::invalid(NAME, "no interest could be calculated"));
        }

        info!(
            event_name = "stage.interest_calculator.completed",
            run_id = ?context.run_id(),
            products = calculations.len(),
            fallbacks,
            "interest calculated"
        );
        Ok(InterestCalculations { calculations, request })
    }
}
