use serde::{Deserialize, Serialize};

use crate::types::{ForecastPeriod, Money, Rate};

use super::table::{ForecastRow, ForecastTable};

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Point-in-time operating assumptions for one forecast build.
///
/// Every ratio is a fraction of the same year's revenue. No validation is
/// performed: degenerate inputs produce degenerate but defined tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssumptionSet {
    /// Last reported (year 0) revenue; growth compounds from this anchor
    pub last_revenue: Money,
    /// Constant annual revenue growth rate (may be negative)
    pub growth: Rate,
    /// EBITDA as a fraction of revenue
    pub ebitda_margin: Rate,
    /// Capital expenditure as a fraction of revenue
    pub capex_pct: Rate,
    /// Depreciation as a fraction of revenue
    pub dep_pct: Rate,
    /// Change in working capital as a fraction of revenue
    pub wc_pct: Rate,
    /// Tax rate on EBIT
    pub tax_rate: Rate,
    /// Explicit forecast horizon in years
    #[serde(default = "default_years")]
    pub years: u32,
    /// Last reported calendar year, used only to label rows
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_year: Option<i32>,
}

pub(crate) fn default_years() -> u32 {
    5
}

// ---------------------------------------------------------------------------
// Public API
// ---------------------------------------------------------------------------

/// Revenue for years 1..=years: `last_value * (1 + growth)^i`.
///
/// Each year is computed from the anchor rather than from the previous year.
pub fn project_revenue(last_value: Money, growth: Rate, years: u32) -> Vec<Money> {
    let factor = 1.0 + growth;
    (1..=years)
        .map(|i| last_value * factor.powi(i as i32))
        .collect()
}

/// Adjusted margin: `base_margin + delta`.
pub fn project_margin(base_margin: Rate, delta: Rate) -> Rate {
    base_margin + delta
}

/// Build a deterministic forecast table.
///
/// EBITDA = Revenue * margin, EBIT = EBITDA - D&A, NOPAT = EBIT * (1 - t),
/// FCFF = NOPAT + D&A - Capex - dWC.
pub fn build_forecast(assumptions: &AssumptionSet) -> ForecastTable {
    let revenues = project_revenue(
        assumptions.last_revenue,
        assumptions.growth,
        assumptions.years,
    );

    let rows = revenues
        .into_iter()
        .zip(1u32..)
        .map(|(revenue, index)| {
            let ebitda = revenue * assumptions.ebitda_margin;
            let depreciation = revenue * assumptions.dep_pct;
            let ebit = ebitda - depreciation;
            let nopat = ebit * (1.0 - assumptions.tax_rate);
            let capex = revenue * assumptions.capex_pct;
            let delta_working_capital = revenue * assumptions.wc_pct;
            let fcff = nopat + depreciation - capex - delta_working_capital;

            ForecastRow {
                period: ForecastPeriod::new(index, assumptions.start_year),
                revenue,
                ebitda,
                depreciation,
                ebit,
                nopat,
                capex,
                delta_working_capital,
                fcff,
            }
        })
        .collect();

    ForecastTable::from_rows(rows)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
