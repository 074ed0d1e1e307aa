//! Money accrual: investment returns and loan repayable amounts
//!
//! Inputs and outputs are `f64` currency amounts; the arithmetic runs in
//! [`Decimal`] so a half-cent result rounds up even when its binary
//! approximation sits just below the midpoint.

use rust_decimal::{Decimal, RoundingStrategy};
use std::str::FromStr;

use crate::config::AccrualMethod;
use crate::error::{Field, ValidationError};
use crate::rates::{validate_duration, validate_principal};

/// Shortest decimal that round-trips to `value`: 50.51 becomes exactly 50.51
fn parse_decimal(value: f64) -> Option<Decimal> {
    if !value.is_finite() {
        return None;
    }
    Decimal::from_str(&value.to_string()).ok()
}

fn to_decimal(value: f64, field: Field) -> Result<Decimal, ValidationError> {
    parse_decimal(value)
        .ok_or_else(|| ValidationError::new(field, format!("{} is not representable", value)))
}

/// Cents as the nearest `f64`
fn cents(value: Decimal) -> f64 {
    let rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.mantissa() as f64 / 10f64.powi(rounded.scale() as i32)
}

fn to_currency(value: Option<Decimal>) -> Result<f64, ValidationError> {
    value
        .map(cents)
        .ok_or_else(|| ValidationError::new(Field::Amount, "amount out of range"))
}

/// Round to cents, half away from zero. Unrepresentable input is returned unchanged.
pub fn round_currency(amount: f64) -> f64 {
    parse_decimal(amount).map(cents).unwrap_or(amount)
}

/// Sum of currency amounts, rounded to cents
pub fn sum_currency<I: IntoIterator<Item = f64>>(amounts: I) -> f64 {
    let total = amounts
        .into_iter()
        .filter_map(parse_decimal)
        .fold(Decimal::ZERO, |acc, d| acc.saturating_add(d));
    cents(total)
}

fn validate_rate(rate_pct: f64) -> Result<(), ValidationError> {
    if rate_pct.is_finite() && rate_pct >= 0.0 {
        Ok(())
    } else {
        Err(ValidationError::new(
            Field::Rate,
            format!("{} is not a valid percentage", rate_pct),
        ))
    }
}

fn accrue(
    principal: f64,
    rate_pct: f64,
    months: u32,
    method: AccrualMethod,
) -> Result<f64, ValidationError> {
    let principal = to_decimal(principal, Field::Principal)?;
    let rate = to_decimal(rate_pct, Field::Rate)?;
    to_currency(method.accrue(principal, rate, months))
}

/// Value at maturity, applied once over the whole term and rounded to cents.
/// The same figure is frozen into the withdrawal amount.
pub fn expected_return(
    principal: f64,
    rate_pct: f64,
    duration_months: u32,
    method: AccrualMethod,
) -> Result<f64, ValidationError> {
    validate_principal(principal)?;
    validate_rate(rate_pct)?;
    validate_duration(duration_months)?;
    accrue(principal, rate_pct, duration_months, method)
}

/// Value accrued after `elapsed_months` of the term (capped at the term)
pub fn accrued_value(
    principal: f64,
    rate_pct: f64,
    duration_months: u32,
    elapsed_months: u32,
    method: AccrualMethod,
) -> Result<f64, ValidationError> {
    validate_principal(principal)?;
    validate_rate(rate_pct)?;
    validate_duration(duration_months)?;
    accrue(principal, rate_pct, elapsed_months.min(duration_months), method)
}

/// Loans accrue a single flat period: principal x (1 + rate)
pub fn repayment_expected_amount(principal: f64, rate_pct: f64) -> Result<f64, ValidationError> {
    validate_principal(principal)?;
    validate_rate(rate_pct)?;
    accrue(principal, rate_pct, 1, AccrualMethod::SinglePeriod)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn test_expected_return_compounds_monthly_rate() {
        let value = expected_return(100.0, 10.0, 6, AccrualMethod::Compound).unwrap();
        assert_abs_diff_eq!(value, 177.16, epsilon = 1e-9);

        let value = expected_return(250.0, 15.0, 9, AccrualMethod::Compound).unwrap();
        assert_abs_diff_eq!(value, 879.47, epsilon = 1e-9);
    }

    #[test]
    fn test_expected_return_single_period() {
        let value = expected_return(250.0, 15.0, 9, AccrualMethod::SinglePeriod).unwrap();
        assert_abs_diff_eq!(value, 287.5, epsilon = 1e-9);
    }

    #[test]
    fn test_rounding_is_not_truncation() {
        // 100 x 1.08^3 = 125.9712
        let value = expected_return(100.0, 8.0, 3, AccrualMethod::Compound).unwrap();
        assert_abs_diff_eq!(value, 125.97, epsilon = 1e-9);

        // 50 x 1.12^7 = 110.5340...
        let value = expected_return(50.0, 12.0, 7, AccrualMethod::Compound).unwrap();
        assert_abs_diff_eq!(value, 110.53, epsilon = 1e-9);

        assert_abs_diff_eq!(round_currency(10.456), 10.46, epsilon = 1e-9);
        assert_abs_diff_eq!(round_currency(10.454), 10.45, epsilon = 1e-9);
    }

    #[test]
    fn test_half_cent_rounds_away_from_zero() {
        // 450.50 x 1.17 = 527.085, stored in binary just below the midpoint
        assert_eq!(repayment_expected_amount(450.50, 17.0).unwrap(), 527.09);
        // 50.50 x 1.17 = 59.085
        assert_eq!(repayment_expected_amount(50.50, 17.0).unwrap(), 59.09);
        // 40.50 x 1.25 = 50.625
        assert_eq!(repayment_expected_amount(40.50, 25.0).unwrap(), 50.63);
        // 112.5 x 1.08 = 121.5 exactly, nothing to round
        assert_eq!(expected_return(112.5, 8.0, 1, AccrualMethod::Compound).unwrap(), 121.5);
        // 30.25 x 1.10 = 33.275
        assert_eq!(expected_return(30.25, 10.0, 1, AccrualMethod::Compound).unwrap(), 33.28);

        assert_eq!(round_currency(1.005), 1.01);
        assert_eq!(round_currency(2.675), 2.68);
        assert_eq!(round_currency(-2.675), -2.68);
    }

    #[test]
    fn test_cent_grid_matches_integer_rounding() {
        // Every principal in cents against exact integer half-up rounding
        for principal_cents in 2_800u64..200_000 {
            let principal = principal_cents as f64 / 100.0;
            for rate in [17u64, 20, 25] {
                // cents x (100 + rate) / 100, rounded half up in integers
                let scaled = principal_cents * (100 + rate);
                let expected = ((scaled + 50) / 100) as f64 / 100.0;
                let got = repayment_expected_amount(principal, rate as f64).unwrap();
                assert_eq!(got, expected, "principal {} rate {}", principal, rate);
            }
        }
    }

    #[test]
    fn test_sum_currency() {
        assert_eq!(sum_currency([0.1, 0.2]), 0.3);
        assert_eq!(sum_currency([296.07, 180.0, 527.09]), 1003.16);
        assert_eq!(sum_currency(Vec::new()), 0.0);
    }

    #[test]
    fn test_expected_return_validation() {
        let err = expected_return(0.0, 10.0, 6, AccrualMethod::Compound).unwrap_err();
        assert_eq!(err.field, Field::Principal);

        let err = expected_return(100.0, -1.0, 6, AccrualMethod::Compound).unwrap_err();
        assert_eq!(err.field, Field::Rate);

        let err = expected_return(100.0, 10.0, 13, AccrualMethod::Compound).unwrap_err();
        assert_eq!(err.field, Field::DurationMonths);
    }

    #[test]
    fn test_accrued_value_caps_at_term() {
        let partial = accrued_value(100.0, 10.0, 6, 2, AccrualMethod::Compound).unwrap();
        assert_abs_diff_eq!(partial, 121.0, epsilon = 1e-9);

        let capped = accrued_value(100.0, 10.0, 6, 40, AccrualMethod::Compound).unwrap();
        let full = expected_return(100.0, 10.0, 6, AccrualMethod::Compound).unwrap();
        assert_abs_diff_eq!(capped, full, epsilon = 1e-9);
    }

    #[test]
    fn test_repayment_is_single_period() {
        let repayable = |principal, rate| repayment_expected_amount(principal, rate).unwrap();
        assert_abs_diff_eq!(repayable(150.0, 20.0), 180.0, epsilon = 1e-9);
        assert_abs_diff_eq!(repayable(99.99, 25.0), 124.99, epsilon = 1e-9);
        assert!(repayment_expected_amount(-10.0, 20.0).is_err());
    }

    #[test]
    fn test_idempotent() {
        let a = expected_return(137.5, 12.0, 5, AccrualMethod::Compound).unwrap();
        let b = expected_return(137.5, 12.0, 5, AccrualMethod::Compound).unwrap();
        assert_eq!(a.to_bits(), b.to_bits());
    }
}
