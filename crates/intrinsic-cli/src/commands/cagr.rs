use clap::Args;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Instant;

use intrinsic_core::forecast::compute_cagr;
use intrinsic_core::{with_metadata, Precision};

use crate::input;

/// Arguments for compound annual growth rate
#[derive(Args)]
#[command(allow_hyphen_values = true)]
pub struct CagrArgs {
    /// Comma-separated series, oldest first (e.g. 100,112,130)
    #[arg(long, value_delimiter = ',')]
    pub values: Vec<Decimal>,

    /// Compounding periods between first and last value (default: len - 1)
    #[arg(long)]
    pub periods: Option<u32>,

    /// Path to JSON/YAML input file with `values` and optional `periods`
    #[arg(long)]
    pub input: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
struct CagrInput {
    values: Vec<Decimal>,
    #[serde(default)]
    periods: Option<u32>,
}

#[derive(Debug, Serialize)]
struct CagrOutput {
    cagr: Decimal,
    periods: u32,
    first: Decimal,
    last: Decimal,
}

pub fn run_cagr(args: CagrArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let cagr_input: CagrInput = match input::read_typed(args.input.as_deref())? {
        Some(c) => c,
        None if args.values.is_empty() => {
            return Err("--values is required (or provide --input)".into())
        }
        None => CagrInput {
            values: args.values,
            periods: args.periods,
        },
    };

    let periods = cagr_input
        .periods
        .unwrap_or_else(|| cagr_input.values.len().saturating_sub(1) as u32);
    let cagr = compute_cagr(&cagr_input.values, periods)?;

    let output = CagrOutput {
        cagr,
        periods,
        first: cagr_input.values.first().copied().unwrap_or_default(),
        last: cagr_input.values.last().copied().unwrap_or_default(),
    };
    let result = with_metadata(
        "Compound annual growth rate (Newton n-th root)",
        &cagr_input,
        Vec::new(),
        start.elapsed().as_micros() as u64,
        Precision::RustDecimal128bit,
        output,
    );
    Ok(serde_json::to_value(result)?)
}
