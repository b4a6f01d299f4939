use std::collections::{BTreeMap, BTreeSet};

use crate::domain::conditions::SpecialCondition;
use crate::domain::product::{Product, ProductCode};
use crate::eligibility::outcome::ExclusionReason;
use crate::eligibility::RebalancePolicy;

/// Exclusion bookkeeping shared by the filter stages. The first reason
/// recorded for a code wins.
#[derive(Debug, Default)]
pub(crate) struct ExclusionLedger {
    pub(crate) excluded: Vec<Product>,
    pub(crate) reasons: BTreeMap<ProductCode, ExclusionReason>,
}

impl ExclusionLedger {
    fn record(&mut self, product: &Product, reason: ExclusionReason) {
        self.excluded.push(product.clone());
        self.reasons.entry(product.code.clone()).or_insert(reason);
    }
}

pub(crate) fn rate_stage<'a>(
    catalog: &'a [Product],
    min_interest_rate: f64,
    ledger: &mut ExclusionLedger,
) -> Vec<&'a Product> {
    let mut survivors = Vec::with_capacity(catalog.len());
    for product in catalog {
        if product.best_rate() >= min_interest_rate {
            survivors.push(product);
        } else {
            ledger.record(product, ExclusionReason::MinimumRateNotMet);
        }
    }
    survivors
}

/// Narrows once per required category; every tag must be present.
pub(crate) fn category_stage<'a>(
    mut survivors: Vec<&'a Product>,
    categories: &BTreeSet<String>,
) -> Vec<&'a Product> {
    for category in categories {
        survivors.retain(|product| product.has_category(category));
    }
    survivors
}

pub(crate) fn special_condition_stage<'a>(
    mut survivors: Vec<&'a Product>,
    conditions: &BTreeSet<SpecialCondition>,
) -> Vec<&'a Product> {
    for condition in conditions {
        survivors.retain(|product| product.offers(*condition));
    }
    survivors
}

pub(crate) struct Rebalanced<'a> {
    pub(crate) products: Vec<&'a Product>,
    pub(crate) backfilled: Vec<ProductCode>,
}

pub(crate) fn rebalance_stage<'a>(
    mut survivors: Vec<&'a Product>,
    catalog: &'a [Product],
    policy: RebalancePolicy,
) -> Rebalanced<'a> {
    sort_by_top_rate(&mut survivors);

    if survivors.len() > policy.ceiling {
        survivors.truncate(policy.ceiling);
        return Rebalanced { products: survivors, backfilled: Vec::new() };
    }

    let mut backfilled = Vec::new();
    if survivors.len() < policy.floor {
        let needed = policy.floor - survivors.len();
        let mut included: BTreeSet<&ProductCode> =
            survivors.iter().map(|&product| &product.code).collect();

        let mut remaining: Vec<&Product> =
            catalog.iter().filter(|product| !included.contains(&product.code)).collect();
        sort_by_top_rate(&mut remaining);

        for product in remaining {
            if backfilled.len() == needed {
                break;
            }
            if included.insert(&product.code) {
                backfilled.push(product.code.clone());
                survivors.push(product);
            }
        }
    }

    Rebalanced { products: survivors, backfilled }
}

/// Every catalog product left out of the final list that has no reason yet.
pub(crate) fn record_unmatched(
    catalog: &[Product],
    matched: &[&Product],
    ledger: &mut ExclusionLedger,
) {
    let matched_codes: BTreeSet<&ProductCode> = matched.iter().map(|product| &product.code).collect();
    for product in catalog {
        if !matched_codes.contains(&product.code) && !ledger.reasons.contains_key(&product.code) {
            ledger.record(product, ExclusionReason::CategoryOrSpecialConditionMismatch);
        }
    }
}

/// Stable, descending by top rate.
fn sort_by_top_rate(products: &mut [&Product]) {
    products.sort_by(|left, right| right.top_rate.total_cmp(&left.top_rate));
}
