use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::IntrinsicError;
use crate::forecast::{build_forecast, AssumptionSet, ForecastTable, FreeCashFlows};
use crate::types::{with_metadata, ComputationOutput, Money, Precision, Rate};
use crate::IntrinsicResult;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Discount rate and perpetual growth for one valuation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiscountingParameters {
    /// Weighted average cost of capital (discount rate)
    pub wacc: Rate,
    /// Perpetual growth rate beyond the explicit horizon
    pub terminal_g: Rate,
}

/// Present value of an FCFF stream together with its discount factors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscountedCashFlows {
    pub present_value: Money,
    /// (1 + wacc)^i for i = 1..N
    pub discount_factors: Vec<Rate>,
}

/// Components of a single DCF valuation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DcfBreakdown {
    /// Sum of present values of explicit-period FCFFs
    pub pv_of_fcff: Money,
    /// Gordon growth terminal value at year N
    pub terminal_value: Money,
    /// Terminal value discounted by (1 + wacc)^N
    pub pv_of_terminal: Money,
    /// PV(FCFFs) + PV(TV)
    pub enterprise_value: Money,
    /// PV(TV) / EV (zero when EV is zero)
    pub terminal_value_pct: Rate,
    pub discount_factors: Vec<Rate>,
}

/// Input for a one-shot forecast-and-value run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DcfInput {
    pub assumptions: AssumptionSet,
    pub discounting: DiscountingParameters,
}

/// Output of [`run_dcf`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DcfOutput {
    pub forecast: ForecastTable,
    #[serde(flatten)]
    pub valuation: DcfBreakdown,
    pub wacc_used: Rate,
    pub terminal_growth_used: Rate,
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Discount FCFF for years 1..N at a constant WACC.
pub fn discount_cash_flows(fcfs: &[Money], wacc: Rate) -> DiscountedCashFlows {
    let base = 1.0 + wacc;
    let discount_factors: Vec<Rate> = (1..=fcfs.len()).map(|i| base.powi(i as i32)).collect();
    let present_value = fcfs
        .iter()
        .zip(&discount_factors)
        // A zero flow contributes nothing even if the factor degenerates
        .map(|(cf, df)| if *cf == 0.0 { 0.0 } else { cf / df })
        .sum();
    DiscountedCashFlows {
        present_value,
        discount_factors,
    }
}

/// Gordon growth terminal value: FCFF_N * (1 + g) / (wacc - g).
pub fn terminal_value_gordon(fcff_last: Money, wacc: Rate, g: Rate) -> IntrinsicResult<Money> {
    if wacc.is_nan() || g.is_nan() || wacc <= g {
        return Err(IntrinsicError::InvalidDiscounting {
            wacc,
            terminal_growth: g,
        });
    }
    Ok(fcff_last * (1.0 + g) / (wacc - g))
}

/// Value a forecast and report each component.
pub fn value_forecast<F: FreeCashFlows + ?Sized>(
    forecast: &F,
    wacc: Rate,
    terminal_g: Rate,
) -> IntrinsicResult<DcfBreakdown> {
    let fcfs = forecast.free_cash_flows()?;
    let fcff_last = *fcfs.last().ok_or_else(|| {
        IntrinsicError::InsufficientData("Forecast has no years to value".into())
    })?;

    let discounted = discount_cash_flows(&fcfs, wacc);
    let terminal_value = terminal_value_gordon(fcff_last, wacc, terminal_g)?;

    let n = fcfs.len() as i32;
    let pv_of_terminal = terminal_value / (1.0 + wacc).powi(n);
    let enterprise_value = discounted.present_value + pv_of_terminal;

    let terminal_value_pct = if enterprise_value == 0.0 {
        0.0
    } else {
        pv_of_terminal / enterprise_value
    };

    Ok(DcfBreakdown {
        pv_of_fcff: discounted.present_value,
        terminal_value,
        pv_of_terminal,
        enterprise_value,
        terminal_value_pct,
        discount_factors: discounted.discount_factors,
    })
}

/// Enterprise value = PV of FCFF stream + PV of Gordon terminal value.
pub fn compute_dcf_value<F: FreeCashFlows + ?Sized>(
    forecast: &F,
    wacc: Rate,
    terminal_g: Rate,
) -> IntrinsicResult<Money> {
    value_forecast(forecast, wacc, terminal_g).map(|b| b.enterprise_value)
}

/// Build the forecast for `input.assumptions` and value it.
pub fn run_dcf(input: &DcfInput) -> IntrinsicResult<ComputationOutput<DcfOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    if input.assumptions.years == 0 {
        return Err(IntrinsicError::InvalidInput {
            field: "years".into(),
            reason: "Forecast horizon must be at least 1 year".into(),
        });
    }
    if input.assumptions.last_revenue <= 0.0 {
        warnings.push(format!(
            "Last revenue ({}) is not positive; growth compounding is not meaningful",
            input.assumptions.last_revenue
        ));
    }

    let DiscountingParameters { wacc, terminal_g } = input.discounting;
    let forecast = build_forecast(&input.assumptions);
    let valuation = value_forecast(&forecast, wacc, terminal_g)?;

    if valuation.terminal_value_pct > 0.75 {
        warnings.push(format!(
            "Terminal value represents {:.1}% of enterprise value; consider extending the explicit forecast period",
            valuation.terminal_value_pct * 100.0
        ));
    }
    if valuation.enterprise_value <= 0.0 {
        warnings.push("Enterprise value is not positive".into());
    }

    let output = DcfOutput {
        forecast,
        valuation,
        wacc_used: wacc,
        terminal_growth_used: terminal_g,
    };

    let elapsed = start.elapsed().as_micros() as u64;

    Ok(with_metadata(
        "FCFF DCF with Gordon growth terminal value",
        input,
        warnings,
        elapsed,
        Precision::Ieee754F64,
        output,
    ))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::ForecastFrame;

    fn sample_input() -> DcfInput {
        DcfInput {
            assumptions: AssumptionSet {
                last_revenue: 28_000.0,
                growth: 0.08,
                ebitda_margin: 0.34,
                capex_pct: 0.06,
                dep_pct: 0.05,
                wc_pct: 0.01,
                tax_rate: 0.21,
                years: 5,
                start_year: None,
            },
            discounting: DiscountingParameters {
                wacc: 0.075,
                terminal_g: 0.025,
            },
        }
    }

    #[test]
    fn test_discount_known_stream() {
        let d = discount_cash_flows(&[110.0, 121.0], 0.10);
        // 110/1.1 + 121/1.21 = 100 + 100
        assert!((d.present_value - 200.0).abs() < 1e-9);
        assert_eq!(d.discount_factors.len(), 2);
        assert!((d.discount_factors[1] - 1.21).abs() < 1e-12);
    }

    #[test]
    fn test_discount_zero_stream_is_zero() {
        for wacc in [-0.5, 0.0, 0.075, 3.0] {
            let d = discount_cash_flows(&[0.0; 6], wacc);
            assert_eq!(d.present_value, 0.0);
        }
    }

    #[test]
    fn test_discount_empty_stream() {
        let d = discount_cash_flows(&[], 0.08);
        assert_eq!(d.present_value, 0.0);
        assert!(d.discount_factors.is_empty());
    }

    #[test]
    fn test_gordon_terminal_value() {
        // 100 * 1.02 / (0.10 - 0.02) = 1275
        let tv = terminal_value_gordon(100.0, 0.10, 0.02).unwrap();
        assert!((tv - 1275.0).abs() < 1e-9);
    }

    #[test]
    fn test_gordon_rejects_growth_at_or_above_wacc() {
        assert!(matches!(
            terminal_value_gordon(100.0, 0.05, 0.05),
            Err(IntrinsicError::InvalidDiscounting { .. })
        ));
        assert!(matches!(
            terminal_value_gordon(100.0, 0.03, 0.05),
            Err(IntrinsicError::InvalidDiscounting { .. })
        ));
        assert!(terminal_value_gordon(100.0, f64::NAN, 0.02).is_err());
    }

    #[test]
    fn test_breakdown_sums_to_ev() {
        let forecast = build_forecast(&sample_input().assumptions);
        let b = value_forecast(&forecast, 0.075, 0.025).unwrap();
        assert!((b.pv_of_fcff + b.pv_of_terminal - b.enterprise_value).abs() < 1e-6);
        assert!(b.terminal_value_pct > 0.0 && b.terminal_value_pct < 1.0);
        assert!(b.enterprise_value.is_finite() && b.enterprise_value > 0.0);
    }

    #[test]
    fn test_value_frame_missing_fcff() {
        let frame = ForecastFrame::new(vec!["1".into()])
            .with_column("Revenue", vec![100.0])
            .unwrap();
        let result = compute_dcf_value(&frame, 0.08, 0.02);
        assert!(matches!(result, Err(IntrinsicError::MissingColumn { .. })));
    }

    #[test]
    fn test_value_frame_matches_table() {
        let forecast = build_forecast(&sample_input().assumptions);
        let from_table = compute_dcf_value(&forecast, 0.075, 0.025).unwrap();
        let from_frame = compute_dcf_value(&forecast.to_frame(), 0.075, 0.025).unwrap();
        assert_eq!(from_table, from_frame);
    }

    #[test]
    fn test_value_empty_forecast_rejected() {
        let empty: &[f64] = &[];
        let result = compute_dcf_value(empty, 0.08, 0.02);
        assert!(matches!(result, Err(IntrinsicError::InsufficientData(_))));
    }

    #[test]
    fn test_single_year_hand_calculation() {
        // FCFF 100, wacc 10%, g 0%: PV = 100/1.1, TV = 1000, PV(TV) = 1000/1.1
        let ev = compute_dcf_value(&[100.0][..], 0.10, 0.0).unwrap();
        assert!((ev - 1100.0 / 1.1).abs() < 1e-9);
    }

    #[test]
    fn test_run_dcf_envelope() {
        let out = run_dcf(&sample_input()).unwrap();
        assert_eq!(out.result.forecast.len(), 5);
        assert_eq!(out.metadata.precision, "ieee754_f64");
        assert!(out.result.valuation.enterprise_value > 0.0);
        // Terminal value dominates a 5-year horizon at these rates
        assert!(out.warnings.iter().any(|w| w.contains("Terminal value")));
    }

    #[test]
    fn test_run_dcf_zero_years_rejected() {
        let mut input = sample_input();
        input.assumptions.years = 0;
        assert!(run_dcf(&input).is_err());
    }

    #[test]
    fn test_run_dcf_invalid_discounting_propagates() {
        let mut input = sample_input();
        input.discounting.terminal_g = 0.09;
        assert!(matches!(
            run_dcf(&input),
            Err(IntrinsicError::InvalidDiscounting { .. })
        ));
    }
}
