//! Deterministic after-tax interest for monthly-compounding deposits.
//!
//! Gross interest is `P * (1 + r / 12)^m - P` with `r` the annual rate as a
//! fraction. Interest income is taxed at 15.4%.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, MathematicalOps, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::errors::DomainError;

/// 15.4% withholding on interest income.
pub const INTEREST_TAX_RATE: Decimal = Decimal::from_parts(154, 0, 0, false, 3);

pub const HORIZON_6M: u32 = 6;
pub const HORIZON_1Y: u32 = 12;
pub const HORIZON_3Y: u32 = 36;

const MONTHS_PER_YEAR: Decimal = Decimal::from_parts(12, 0, 0, false, 0);
const PERCENT: Decimal = Decimal::from_parts(100, 0, 0, false, 0);

/// After-tax interest at the standard reporting horizons, in won.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InterestProjection {
    pub six_months: u64,
    pub one_year: u64,
    pub three_years: u64,
}

pub fn gross_interest(
    principal: u64,
    annual_rate_pct: f64,
    months: u32,
) -> Result<Decimal, DomainError> {
    let rate = percent_to_fraction(annual_rate_pct)?;
    let principal = Decimal::from(principal);
    let monthly_factor = Decimal::ONE + rate / MONTHS_PER_YEAR;
    let grown = monthly_factor
        .checked_powi(i64::from(months))
        .and_then(|factor| factor.checked_mul(principal))
        .ok_or_else(|| {
            DomainError::InvariantViolation(format!(
                "interest overflow for principal {principal} over {months} months"
            ))
        })?;
    Ok(grown - principal)
}

pub fn after_tax(gross: Decimal) -> Decimal {
    gross * (Decimal::ONE - INTEREST_TAX_RATE)
}

/// After-tax interest rounded to the nearest won.
pub fn after_tax_interest(
    principal: u64,
    annual_rate_pct: f64,
    months: u32,
) -> Result<u64, DomainError> {
    let net = after_tax(gross_interest(principal, annual_rate_pct, months)?);
    to_won(net)
}

pub fn project(principal: u64, annual_rate_pct: f64) -> Result<InterestProjection, DomainError> {
    Ok(InterestProjection {
        six_months: after_tax_interest(principal, annual_rate_pct, HORIZON_6M)?,
        one_year: after_tax_interest(principal, annual_rate_pct, HORIZON_1Y)?,
        three_years: after_tax_interest(principal, annual_rate_pct, HORIZON_3Y)?,
    })
}

fn percent_to_fraction(annual_rate_pct: f64) -> Result<Decimal, DomainError> {
    if !annual_rate_pct.is_finite() || annual_rate_pct < 0.0 {
        return Err(DomainError::InvariantViolation(format!(
            "annual rate must be a finite non-negative percentage, got {annual_rate_pct}"
        )));
    }
    let rate = Decimal::from_f64(annual_rate_pct).ok_or_else(|| {
        DomainError::InvariantViolation(format!(
            "annual rate {annual_rate_pct} is not representable"
        ))
    })?;
    Ok(rate / PERCENT)
}

fn to_won(amount: Decimal) -> Result<u64, DomainError> {
    amount
        .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
        .to_u64()
        .ok_or_else(|| {
            DomainError::InvariantViolation(format!("interest {amount} does not fit in won"))
        })
}
