use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, MathematicalOps};
use rust_decimal_macros::dec;

use crate::error::IntrinsicError;
use crate::IntrinsicResult;

const ROOT_TOLERANCE: Decimal = dec!(0.000000000000000001);
const MAX_ROOT_ITERATIONS: u32 = 100;

/// Compound annual growth rate from a series ordered oldest to newest.
///
/// CAGR = (last / first)^(1 / periods) - 1. Only the endpoints are used;
/// `periods` is supplied separately because the series need not be annual.
pub fn compute_cagr(values: &[Decimal], periods: u32) -> IntrinsicResult<Decimal> {
    if values.len() < 2 {
        return Err(IntrinsicError::InsufficientData(
            "CAGR requires at least two values".into(),
        ));
    }
    let start = values[0];
    let end = values[values.len() - 1];
    cagr_from_endpoints(start, end, periods)
}

/// CAGR between two values `periods` apart.
pub fn cagr_from_endpoints(start: Decimal, end: Decimal, periods: u32) -> IntrinsicResult<Decimal> {
    if start <= Decimal::ZERO {
        return Err(IntrinsicError::InsufficientData(format!(
            "CAGR start value must be positive (got {start})"
        )));
    }
    if periods == 0 {
        return Err(IntrinsicError::InvalidInput {
            field: "periods".into(),
            reason: "Number of periods must be > 0".into(),
        });
    }
    if end < Decimal::ZERO {
        return Err(IntrinsicError::FinancialImpossibility(format!(
            "CAGR undefined for a negative ending value ({end})"
        )));
    }
    if end.is_zero() {
        return Ok(-Decimal::ONE);
    }

    let ratio = end.checked_div(start).ok_or_else(|| {
        IntrinsicError::FinancialImpossibility(format!(
            "CAGR growth ratio {end} / {start} exceeds decimal range"
        ))
    })?;
    Ok(nth_root(ratio, periods)? - Decimal::ONE)
}

fn root_overflow(ratio: Decimal, n: u32) -> IntrinsicError {
    IntrinsicError::FinancialImpossibility(format!(
        "{n}-th root of {ratio} overflowed decimal range"
    ))
}

/// Positive n-th root by Newton's method, avoiding `powd()`.
///
/// Seeded from the f64 root so x^(n-1) stays near ratio^((n-1)/n) and the
/// iteration only polishes the last digits. Powers go through
/// `checked_powu`, so each step costs O(log n) multiplications.
fn nth_root(ratio: Decimal, n: u32) -> IntrinsicResult<Decimal> {
    if n == 1 {
        return Ok(ratio);
    }
    let n_dec = Decimal::from(n);
    let mut x = ratio
        .to_f64()
        .map(|r| r.powf(1.0 / n as f64))
        .and_then(Decimal::from_f64)
        .unwrap_or(Decimal::ONE);

    for _ in 0..MAX_ROOT_ITERATIONS {
        let x_pow_nm1 = x
            .checked_powu(u64::from(n - 1))
            .ok_or_else(|| root_overflow(ratio, n))?;
        let x_pow_n = x_pow_nm1
            .checked_mul(x)
            .ok_or_else(|| root_overflow(ratio, n))?;

        let denom = n_dec
            .checked_mul(x_pow_nm1)
            .ok_or_else(|| root_overflow(ratio, n))?;
        if denom.is_zero() {
            break;
        }

        let step = x_pow_n
            .checked_sub(ratio)
            .and_then(|diff| diff.checked_div(denom))
            .ok_or_else(|| root_overflow(ratio, n))?;
        x = x.checked_sub(step).ok_or_else(|| root_overflow(ratio, n))?;

        if x <= Decimal::ZERO {
            x = dec!(0.000001);
        }
        if step.abs() < ROOT_TOLERANCE {
            break;
        }
    }

    Ok(x)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cagr_ten_percent() {
        let values = vec![dec!(1000), dec!(1100), dec!(1210), dec!(1331)];
        let cagr = compute_cagr(&values, 3).unwrap();
        assert!((cagr - dec!(0.10)).abs() < dec!(0.0000001), "got {cagr}");
    }

    #[test]
    fn test_cagr_uses_endpoints_only() {
        let values = vec![dec!(100), dec!(5), dec!(400)];
        let cagr = compute_cagr(&values, 2).unwrap();
        // sqrt(4) - 1 = 1.0
        assert!((cagr - Decimal::ONE).abs() < dec!(0.0000001));
    }

    #[test]
    fn test_cagr_decline() {
        let cagr = cagr_from_endpoints(dec!(1000), dec!(810), 2).unwrap();
        assert!((cagr - dec!(-0.10)).abs() < dec!(0.0000001), "got {cagr}");
    }

    #[test]
    fn test_cagr_single_period() {
        let cagr = cagr_from_endpoints(dec!(200), dec!(250), 1).unwrap();
        assert_eq!(cagr, dec!(0.25));
    }

    #[test]
    fn test_cagr_long_horizon_large_ratio() {
        let cagr = cagr_from_endpoints(dec!(1), dec!(1000000), 40).unwrap();
        // 10^(6/40) - 1 = 10^0.15 - 1 ≈ 0.412538
        assert!((cagr - dec!(0.412538)).abs() < dec!(0.00001), "got {cagr}");
    }

    #[test]
    fn test_cagr_ratio_beyond_decimal_range_is_error() {
        let result = cagr_from_endpoints(dec!(0.0001), dec!(10000000000000000000000000), 5);
        assert!(
            matches!(result, Err(IntrinsicError::FinancialImpossibility(_))),
            "got {result:?}"
        );
    }

    #[test]
    fn test_cagr_many_periods_stays_fast() {
        // 1.1^(1/1e6) - 1 ≈ 9.531e-8
        let cagr = cagr_from_endpoints(dec!(100), dec!(110), 1_000_000).unwrap();
        assert!((cagr - dec!(0.0000000953)).abs() < dec!(0.000000001), "got {cagr}");
    }

    #[test]
    fn test_cagr_requires_two_values() {
        let result = compute_cagr(&[dec!(100)], 1);
        assert!(matches!(result, Err(IntrinsicError::InsufficientData(_))));
    }

    #[test]
    fn test_cagr_non_positive_start() {
        let result = compute_cagr(&[dec!(0), dec!(100)], 1);
        assert!(matches!(result, Err(IntrinsicError::InsufficientData(_))));
        let result = compute_cagr(&[dec!(-5), dec!(100)], 1);
        assert!(matches!(result, Err(IntrinsicError::InsufficientData(_))));
    }

    #[test]
    fn test_cagr_zero_periods() {
        let result = compute_cagr(&[dec!(100), dec!(120)], 0);
        assert!(matches!(result, Err(IntrinsicError::InvalidInput { .. })));
    }

    #[test]
    fn test_cagr_to_zero_is_total_loss() {
        let cagr = cagr_from_endpoints(dec!(100), Decimal::ZERO, 3).unwrap();
        assert_eq!(cagr, dec!(-1));
    }
}
