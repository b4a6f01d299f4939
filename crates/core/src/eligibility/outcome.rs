use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::conditions::EligibilityConditions;
use crate::domain::product::{Product, ProductCode, SimpleProduct};
use crate::domain::responses::FilterSummary;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExclusionReason {
    MinimumRateNotMet,
    CategoryOrSpecialConditionMismatch,
}

impl ExclusionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MinimumRateNotMet => "minimum rate not met",
            Self::CategoryOrSpecialConditionMismatch => "category or special-condition mismatch",
        }
    }
}

impl fmt::Display for ExclusionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one eligibility filter run.
///
/// A product excluded by the rate stage keeps its entry in `excluded` even
/// when rebalancing later backfills it into `matched`, so `matched` and
/// `excluded` can overlap on backfilled codes.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilterOutcome {
    matched: Vec<Product>,
    excluded: Vec<Product>,
    exclusion_reasons: BTreeMap<ProductCode, ExclusionReason>,
    backfilled_codes: Vec<ProductCode>,
    conditions: EligibilityConditions,
    processed_at: DateTime<Utc>,
}

impl FilterOutcome {
    pub(crate) fn new(
        matched: Vec<Product>,
        excluded: Vec<Product>,
        exclusion_reasons: BTreeMap<ProductCode, ExclusionReason>,
        backfilled_codes: Vec<ProductCode>,
        conditions: EligibilityConditions,
    ) -> Self {
        Self {
            matched,
            excluded,
            exclusion_reasons,
            backfilled_codes,
            conditions,
            processed_at: Utc::now(),
        }
    }

    pub fn matched(&self) -> &[Product] {
        &self.matched
    }

    pub fn excluded(&self) -> &[Product] {
        &self.excluded
    }

    pub fn exclusion_reasons(&self) -> &BTreeMap<ProductCode, ExclusionReason> {
        &self.exclusion_reasons
    }

    pub fn reason_for(&self, code: &ProductCode) -> Option<ExclusionReason> {
        self.exclusion_reasons.get(code).copied()
    }

    pub fn backfilled_codes(&self) -> &[ProductCode] {
        &self.backfilled_codes
    }

    pub fn is_backfilled(&self, code: &ProductCode) -> bool {
        self.backfilled_codes.contains(code)
    }

    pub fn conditions(&self) -> &EligibilityConditions {
        &self.conditions
    }

    pub fn processed_at(&self) -> DateTime<Utc> {
        self.processed_at
    }

    pub fn matched_summaries(&self) -> Vec<SimpleProduct> {
        self.matched.iter().map(Product::summary).collect()
    }

    pub fn summary(&self) -> FilterSummary {
        FilterSummary::new(self.matched.len(), self.excluded.len())
    }
}
