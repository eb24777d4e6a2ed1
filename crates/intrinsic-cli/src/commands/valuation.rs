use clap::Args;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::{json, Value};
use std::time::Instant;

use intrinsic_core::monte_carlo::DiscountingSpec;
use intrinsic_core::valuation::dcf::{self, DcfInput, DiscountingParameters};
use intrinsic_core::valuation::wacc::{self, WaccInput};
use intrinsic_core::{with_metadata, Precision};

use super::forecast::AssumptionFlags;
use crate::input;

/// Arguments for a DCF valuation
#[derive(Args)]
pub struct ValueArgs {
    #[command(flatten)]
    pub assumptions: AssumptionFlags,

    /// Discount rate; defaults to the simulation's mean WACC (7.5%)
    #[arg(long, allow_negative_numbers = true)]
    pub wacc: Option<f64>,

    /// Perpetual growth rate; defaults to 2.5%
    #[arg(long, allow_negative_numbers = true)]
    pub terminal_growth: Option<f64>,

    /// Value a previously exported forecast CSV instead of building one
    #[arg(long, conflicts_with = "input")]
    pub forecast_csv: Option<String>,

    /// Path to a JSON/YAML DCF input (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,
}

/// Arguments for WACC calculation
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct WaccArgs {
    /// Levered equity beta
    #[arg(long)]
    pub beta: Option<Decimal>,

    /// Risk-free rate (e.g. 0.042 for 4.2%)
    #[arg(long)]
    pub risk_free_rate: Option<Decimal>,

    /// Expected market return
    #[arg(long)]
    pub market_return: Option<Decimal>,

    /// Market value of debt
    #[arg(long)]
    pub market_debt: Option<Decimal>,

    /// Market value of equity
    #[arg(long)]
    pub market_equity: Option<Decimal>,

    /// Pre-tax cost of debt (default 3.5%)
    #[arg(long)]
    pub cost_of_debt: Option<Decimal>,

    /// Marginal tax rate (default 21%)
    #[arg(long)]
    pub tax_rate: Option<Decimal>,

    /// Path to JSON/YAML input file (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,
}

fn discounting_from(args: &ValueArgs) -> DiscountingParameters {
    let defaults = DiscountingSpec::default();
    DiscountingParameters {
        wacc: args.wacc.unwrap_or(defaults.wacc.mean),
        terminal_g: args.terminal_growth.unwrap_or(defaults.terminal_growth.mean),
    }
}

pub fn run_value(args: ValueArgs) -> Result<Value, Box<dyn std::error::Error>> {
    if let Some(ref path) = args.forecast_csv {
        let start = Instant::now();
        let frame = input::forecast_csv::read_forecast_csv(path)?;
        let DiscountingParameters { wacc, terminal_g } = discounting_from(&args);
        let breakdown = dcf::value_forecast(&frame, wacc, terminal_g)?;

        let mut warnings = Vec::new();
        if breakdown.terminal_value_pct > 0.75 {
            warnings.push(format!(
                "Terminal value represents {:.1}% of enterprise value",
                breakdown.terminal_value_pct * 100.0
            ));
        }
        let output = with_metadata(
            "FCFF DCF of a reloaded forecast with Gordon growth terminal value",
            &json!({ "forecast_csv": path, "wacc": wacc, "terminal_growth": terminal_g }),
            warnings,
            start.elapsed().as_micros() as u64,
            Precision::Ieee754F64,
            breakdown,
        );
        return Ok(serde_json::to_value(output)?);
    }

    let dcf_input: DcfInput = match input::read_typed(args.input.as_deref())? {
        Some(d) => d,
        None => DcfInput {
            assumptions: args.assumptions.to_assumptions()?,
            discounting: discounting_from(&args),
        },
    };

    let result = dcf::run_dcf(&dcf_input)?;
    Ok(serde_json::to_value(result)?)
}

pub fn run_wacc(args: WaccArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let wacc_input: WaccInput = match input::read_typed(args.input.as_deref())? {
        Some(w) => w,
        None => WaccInput {
            beta: args.beta.unwrap_or(dec!(1.0)),
            risk_free_rate: args
                .risk_free_rate
                .ok_or("--risk-free-rate is required (or provide --input)")?,
            market_return: args
                .market_return
                .ok_or("--market-return is required (or provide --input)")?,
            market_debt: args
                .market_debt
                .ok_or("--market-debt is required (or provide --input)")?,
            market_equity: args
                .market_equity
                .ok_or("--market-equity is required (or provide --input)")?,
            cost_of_debt: args.cost_of_debt,
            tax_rate: args.tax_rate.unwrap_or(wacc::DEFAULT_TAX_RATE),
        },
    };

    let result = wacc::calculate_wacc(&wacc_input)?;
    Ok(serde_json::to_value(result)?)
}
