use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::IntrinsicError;
use crate::types::{with_metadata, ComputationOutput, Precision};
use crate::IntrinsicResult;

/// Pre-tax cost of debt assumed when none is supplied.
pub const DEFAULT_COST_OF_DEBT: Decimal = dec!(0.035);

/// Marginal tax rate assumed when none is supplied.
pub const DEFAULT_TAX_RATE: Decimal = dec!(0.21);

/// Input parameters for Weighted Average Cost of Capital calculation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaccInput {
    /// Levered equity beta
    pub beta: Decimal,
    /// Risk-free rate (e.g. 10-year government bond yield)
    pub risk_free_rate: Decimal,
    /// Expected market return
    pub market_return: Decimal,
    /// Market value of debt (currency units, not a weight)
    pub market_debt: Decimal,
    /// Market value of equity (currency units, not a weight)
    pub market_equity: Decimal,
    /// Pre-tax cost of debt; defaults to 3.5%
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_of_debt: Option<Decimal>,
    /// Marginal tax rate for the debt tax shield; defaults to 21%
    #[serde(default = "default_tax_rate")]
    pub tax_rate: Decimal,
}

fn default_tax_rate() -> Decimal {
    DEFAULT_TAX_RATE
}

/// Output of the WACC calculation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaccOutput {
    pub wacc: Decimal,
    /// CAPM cost of equity: rf + beta * (rm - rf)
    pub cost_of_equity: Decimal,
    pub equity_risk_premium: Decimal,
    pub cost_of_debt_pretax: Decimal,
    pub after_tax_cost_of_debt: Decimal,
    pub debt_weight: Decimal,
    pub equity_weight: Decimal,
}

/// Calculate WACC from CAPM and market-value capital weights.
///
/// Ke = rf + beta * (rm - rf)
/// Wd = D / (D + E), We = E / (D + E)
/// WACC = We * Ke + Wd * Kd * (1 - t)
pub fn calculate_wacc(input: &WaccInput) -> IntrinsicResult<ComputationOutput<WaccOutput>> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let total = input.market_debt + input.market_equity;
    if total <= Decimal::ZERO {
        return Err(IntrinsicError::InvalidWeights { total });
    }
    if input.tax_rate < Decimal::ZERO || input.tax_rate > Decimal::ONE {
        return Err(IntrinsicError::InvalidInput {
            field: "tax_rate".into(),
            reason: "Tax rate must be between 0 and 1".into(),
        });
    }
    if input.market_debt < Decimal::ZERO || input.market_equity < Decimal::ZERO {
        warnings.push(format!(
            "Negative market value in capital structure (debt {}, equity {}); weights fall outside [0, 1]",
            input.market_debt, input.market_equity
        ));
    }

    let equity_risk_premium = input.market_return - input.risk_free_rate;
    let cost_of_equity = input.risk_free_rate + input.beta * equity_risk_premium;

    let cost_of_debt = input.cost_of_debt.unwrap_or(DEFAULT_COST_OF_DEBT);
    let after_tax_cost_of_debt = cost_of_debt * (Decimal::ONE - input.tax_rate);

    let debt_weight = input.market_debt / total;
    let equity_weight = input.market_equity / total;

    let wacc = equity_weight * cost_of_equity + debt_weight * after_tax_cost_of_debt;

    // --- Reasonableness warnings ---
    if input.beta > dec!(3.0) {
        warnings.push(format!(
            "High beta ({}): verify market data; betas above 3.0 are unusual",
            input.beta
        ));
    }
    if equity_risk_premium < Decimal::ZERO {
        warnings.push(format!(
            "Market return is below the risk-free rate (ERP {equity_risk_premium})"
        ));
    }
    if wacc > dec!(0.20) {
        warnings.push(format!(
            "WACC of {wacc} exceeds 20%; appropriate for high-risk situations only"
        ));
    }

    let output = WaccOutput {
        wacc,
        cost_of_equity,
        equity_risk_premium,
        cost_of_debt_pretax: cost_of_debt,
        after_tax_cost_of_debt,
        debt_weight,
        equity_weight,
    };

    let elapsed = start.elapsed().as_micros() as u64;

    Ok(with_metadata(
        "WACC via CAPM with market-value weights",
        input,
        warnings,
        elapsed,
        Precision::RustDecimal128bit,
        output,
    ))
}

/// Positional convenience form of [`calculate_wacc`] returning only the rate.
pub fn wacc_calc(
    beta: Decimal,
    rf: Decimal,
    rm: Decimal,
    market_debt: Decimal,
    market_equity: Decimal,
    cost_of_debt: Option<Decimal>,
    tax_rate: Decimal,
) -> IntrinsicResult<Decimal> {
    let input = WaccInput {
        beta,
        risk_free_rate: rf,
        market_return: rm,
        market_debt,
        market_equity,
        cost_of_debt,
        tax_rate,
    };
    calculate_wacc(&input).map(|out| out.result.wacc)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
