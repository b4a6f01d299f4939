//! Tera templates for the four model calls.

use tera::{Context, Tera};
use thiserror::Error;

use parkwise_core::domain::conditions::EligibilityConditions;
use parkwise_core::domain::product::ProductDetail;
use parkwise_core::domain::question::UserResponse;
use parkwise_core::domain::scenario::ProductInterestCalculation;

use crate::stages::pattern_analyzer::{AnalysisPattern, PATTERN_CATEGORIES};

pub const PATTERN_ANALYSIS: &str = "pattern_analysis";
pub const QUESTION_GENERATION: &str = "question_generation";
pub const INTEREST_CALCULATION: &str = "interest_calculation";
pub const STRATEGY_SCENARIO: &str = "strategy_scenario";

const PATTERN_ANALYSIS_TEMPLATE: &str = r#"You are analysing the rate and preferential terms of savings ("parking") accounts.

Banks: {{ bank_names | join(sep=", ") }}

Rate information:
{% for text in rate_info_texts %}- {{ text }}
{% endfor %}
Preferential conditions:
{% for text in preferential_texts %}- {{ text }}
{% endfor %}
Tasks:
1. Group recurring rate structures (pattern_type "rate_info") and preferential conditions (pattern_type "preferential_condition").
2. Name preferential patterns with one of: {{ pattern_names | join(sep=", ") }}.
3. Count how many products use each pattern and list the banks involved.
4. Write short search queries that would find further examples of each preferential pattern."#;

const QUESTION_GENERATION_TEMPLATE: &str = r#"Write yes/no questions that tell us which preferential conditions the user can meet.

Preferential patterns found in the eligible products:
{% for pattern in patterns %}- {{ pattern.pattern_name }} (used by {{ pattern.frequency }} products: {{ pattern.affected_banks | join(sep=", ") }}; keyword: {{ pattern.standard_keyword }})
{% endfor %}
Banks involved: {% if affected_banks %}{{ affected_banks | join(sep=", ") }}{% else %}none listed{% endif %}

Retrieved examples:
{{ rag_context }}

Rules:
- At most {{ question_limit }} questions, ids q1, q2, ...
- One condition per question, answerable with yes or no.
- Set category to the pattern name the question checks.
- Explain in impact how the answer changes the achievable rate."#;

const INTEREST_CALCULATION_TEMPLATE: &str = r#"Calculate the after-tax interest the user earns in each savings account below.

User:
- deposit: {{ deposit_amount }} won
- term: {{ deposit_months }} months
- preferential conditions the user can meet: {% if met_conditions %}{{ met_conditions | join(sep="; ") }}{% else %}none{% endif %}

Products:
{% for product in products %}
product: {{ product.product_name }}
code: {{ product.product_code }}
{% for chunk in product.chunks %}{% if chunk.chunk_type == "basic_rate_info" %}rate info{% else %}preferential terms{% endif %}: {{ chunk.content }}
{% endfor %}---
{% endfor %}
Method:
1. Interest is paid monthly and compounds: principal * (1 + annual_rate / 12)^months - principal.
2. Apply only the preferential conditions the user can meet; otherwise use the base rate.
3. Split tiered rates by balance band before compounding.
4. Deduct 15.4% tax from the gross interest and report whole won.
Example: 10,000,000 won at 3.3% for 12 months is 335,037 won gross and 283,442 won after tax."#;

const STRATEGY_SCENARIO_TEMPLATE: &str = r#"Design three savings strategies from the interest estimates below.

User:
- deposit: {{ deposit_amount }} won
- term: {{ deposit_months }} months

Preferential conditions:
{% for response in responses %}- {{ response.question }}: {% if response.answer %}can meet{% else %}cannot meet{% endif %}
{% endfor %}
Top products by estimated interest:
{% for calculation in calculations %}{{ loop.index }}. {{ calculation.product_name }} ({{ calculation.product_code }})
   interest over the term: {{ calculation.interest }} won
   detail: {{ calculation.calculation_detail }}
   conditions applied: {{ calculation.applied_conditions | join(sep=", ") }}
{% endfor %}
Return exactly three scenarios, one of each scenario_type:
- "single": the whole deposit in the one best account.
- "distributed": the deposit split across at most {{ max_accounts }} accounts to capture balance-capped bonus rates.
- "high_yield": the highest total interest, even if it needs more conditions.
Use only the product codes listed above. Allocations must not exceed the deposit in total.
condition_achievement_rate is the share of required conditions the user can meet, between 0 and 1."#;

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("prompt template failure: {0}")]
    Template(#[from] tera::Error),
}

pub struct PromptLibrary {
    tera: Tera,
}

impl PromptLibrary {
    pub fn new() -> Result<Self, PromptError> {
        let mut tera = Tera::default();
        tera.add_raw_templates(vec![
            (PATTERN_ANALYSIS, PATTERN_ANALYSIS_TEMPLATE),
            (QUESTION_GENERATION, QUESTION_GENERATION_TEMPLATE),
            (INTEREST_CALCULATION, INTEREST_CALCULATION_TEMPLATE),
            (STRATEGY_SCENARIO, STRATEGY_SCENARIO_TEMPLATE),
        ])?;
        Ok(Self { tera })
    }

    pub fn pattern_analysis(
        &self,
        rate_info_texts: &[String],
        preferential_texts: &[String],
        bank_names: &[String],
    ) -> Result<String, PromptError> {
        let mut context = Context::new();
        context.insert("rate_info_texts", rate_info_texts);
        context.insert("preferential_texts", preferential_texts);
        context.insert("bank_names", bank_names);
        let pattern_names: Vec<&str> = PATTERN_CATEGORIES.iter().map(|(name, _)| *name).collect();
        context.insert("pattern_names", &pattern_names);
        Ok(self.tera.render(PATTERN_ANALYSIS, &context)?)
    }

    pub fn question_generation(
        &self,
        patterns: &[AnalysisPattern],
        rag_context: &str,
        affected_banks: &[String],
        question_limit: usize,
    ) -> Result<String, PromptError> {
        let mut context = Context::new();
        context.insert("patterns", patterns);
        context.insert("rag_context", rag_context);
        context.insert("affected_banks", affected_banks);
        context.insert("question_limit", &question_limit);
        Ok(self.tera.render(QUESTION_GENERATION, &context)?)
    }

    pub fn interest_calculation(
        &self,
        products: &[ProductDetail],
        conditions: &EligibilityConditions,
        met_conditions: &[String],
    ) -> Result<String, PromptError> {
        let mut context = Context::new();
        context.insert("products", products);
        context.insert("deposit_amount", &conditions.deposit_amount);
        context.insert("deposit_months", &conditions.deposit_months);
        context.insert("met_conditions", met_conditions);
        Ok(self.tera.render(INTEREST_CALCULATION, &context)?)
    }

    pub fn strategy_scenario(
        &self,
        calculations: &[ProductInterestCalculation],
        conditions: &EligibilityConditions,
        responses: &[UserResponse],
        max_accounts: usize,
    ) -> Result<String, PromptError> {
        let mut context = Context::new();
        context.insert("calculations", calculations);
        context.insert("deposit_amount", &conditions.deposit_amount);
        context.insert("deposit_months", &conditions.deposit_months);
        context.insert("responses", responses);
        context.insert("max_accounts", &max_accounts);
        Ok(self.tera.render(STRATEGY_SCENARIO, &context)?)
    }
}
