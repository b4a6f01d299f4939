use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpecialCondition {
    FirstBanking,
    BankApp,
    Online,
    UsingSalaryAccount,
    UsingUtilityBill,
    UsingCard,
}

impl SpecialCondition {
    pub const ALL: [SpecialCondition; 6] = [
        Self::FirstBanking,
        Self::BankApp,
        Self::Online,
        Self::UsingSalaryAccount,
        Self::UsingUtilityBill,
        Self::UsingCard,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FirstBanking => "first_banking",
            Self::BankApp => "bank_app",
            Self::Online => "online",
            Self::UsingSalaryAccount => "using_salary_account",
            Self::UsingUtilityBill => "using_utility_bill",
            Self::UsingCard => "using_card",
        }
    }
}

impl fmt::Display for SpecialCondition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SpecialCondition {
    type Err = DomainError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let normalized = value.trim().to_ascii_lowercase();
        Self::ALL.into_iter().find(|condition| condition.as_str() == normalized).ok_or_else(|| {
            DomainError::InvariantViolation(format!(
                "unknown special condition `{normalized}` (expected one of first_banking|bank_app|online|using_salary_account|using_utility_bill|using_card)"
            ))
        })
    }
}

/// User-supplied filter and deposit parameters. Built once and passed by value
/// through every phase.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EligibilityConditions {
    pub min_interest_rate: f64,
    pub categories: BTreeSet<String>,
    pub special_conditions: BTreeSet<SpecialCondition>,
    pub deposit_amount: u64,
    pub deposit_months: u32,
}

impl EligibilityConditions {
    pub fn new(
        min_interest_rate: f64,
        deposit_amount: u64,
        deposit_months: u32,
    ) -> Result<Self, DomainError> {
        let conditions = Self {
            min_interest_rate,
            categories: BTreeSet::new(),
            special_conditions: BTreeSet::new(),
            deposit_amount,
            deposit_months,
        };
        conditions.validate()?;
        Ok(conditions)
    }

    pub fn with_categories<I, S>(mut self, categories: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.categories = categories
            .into_iter()
            .map(Into::into)
            .map(|category: String| category.trim().to_owned())
            .filter(|category| !category.is_empty())
            .collect();
        self
    }

    pub fn with_special_conditions<I>(mut self, conditions: I) -> Self
    where
        I: IntoIterator<Item = SpecialCondition>,
    {
        self.special_conditions = conditions.into_iter().collect();
        self
    }

    pub fn validate(&self) -> Result<(), DomainError> {
        if !self.min_interest_rate.is_finite() || self.min_interest_rate < 0.0 {
            return Err(DomainError::InvariantViolation(format!(
                "min_interest_rate must be a finite non-negative percentage, got {}",
                self.min_interest_rate
            )));
        }
        if self.deposit_amount == 0 {
            return Err(DomainError::InvariantViolation(
                "deposit_amount must be greater than zero".to_owned(),
            ));
        }
        if self.deposit_months == 0 {
            return Err(DomainError::InvariantViolation(
                "deposit_months must be greater than zero".to_owned(),
            ));
        }
        Ok(())
    }

    pub fn has_tag_constraints(&self) -> bool {
        !self.categories.is_empty() || !self.special_conditions.is_empty()
    }
}
