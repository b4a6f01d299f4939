use serde::Serialize;
use uuid::Uuid;

use parkwise_core::domain::conditions::EligibilityConditions;
use parkwise_core::domain::product::SimpleProduct;

/// Per-run state shared by the stages of one agent.
///
/// Each field is set and cleared independently. Reads return the latest value
/// or an empty default.
#[derive(Clone, Debug, Default)]
pub struct ScopedContext {
    run_id: Option<Uuid>,
    eligible_products: Vec<SimpleProduct>,
    user_conditions: Option<EligibilityConditions>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextStatus {
    Active,
    Empty,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ContextSnapshot {
    pub run_id: Option<Uuid>,
    pub product_count: usize,
    pub has_conditions: bool,
    pub status: ContextStatus,
}

impl ScopedContext {
    pub fn set_run_id(&mut self, run_id: Uuid) {
        self.run_id = Some(run_id);
    }

    pub fn run_id(&self) -> Option<Uuid> {
        self.run_id
    }

    pub fn set_eligible_products(&mut self, products: Vec<SimpleProduct>) {
        self.eligible_products = products;
    }

    pub fn eligible_products(&self) -> &[SimpleProduct] {
        &self.eligible_products
    }

    pub fn clear_eligible_products(&mut self) {
        self.eligible_products.clear();
    }

    pub fn set_user_conditions(&mut self, conditions: Option<EligibilityConditions>) {
        self.user_conditions = conditions;
    }

    pub fn user_conditions(&self) -> Option<&EligibilityConditions> {
        self.user_conditions.as_ref()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn snapshot(&self) -> ContextSnapshot {
        let active = self.run_id.is_some()
            || !self.eligible_products.is_empty()
            || self.user_conditions.is_some();
        ContextSnapshot {
            run_id: self.run_id,
            product_count: self.eligible_products.len(),
            has_conditions: self.user_conditions.is_some(),
            status: if active { ContextStatus::Active } else { ContextStatus::Empty },
        }
    }
}
