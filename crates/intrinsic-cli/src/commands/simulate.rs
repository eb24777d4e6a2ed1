use clap::Args;
use serde::Serialize;
use serde_json::{json, Value};
use std::time::Instant;
use tracing::warn;

use intrinsic_core::monte_carlo::{
    build_histogram, per_share_values, run_monte_carlo_valuation, summarize, AssumptionSigmas,
    DiscountingSpec, DistributionSummary, HistogramBin, McValuationInput, SimulationConfig,
};
use intrinsic_core::{with_metadata, Precision};

use super::forecast::AssumptionFlags;
use crate::input;
use crate::store::{self, SavedRun};

/// Arguments for a Monte Carlo valuation run
#[derive(Args)]
pub struct SimulateArgs {
    #[command(flatten)]
    pub assumptions: AssumptionFlags,

    /// Path to a JSON/YAML simulation config (distribution, trial and share
    /// flags below still override it when given)
    #[arg(long)]
    pub input: Option<String>,

    /// Number of trials (default 10000)
    #[arg(long)]
    pub trials: Option<u32>,

    /// Random seed for a reproducible run
    #[arg(long)]
    pub seed: Option<u64>,

    /// Standard deviation of the growth rate (default 0)
    #[arg(long)]
    pub growth_sigma: Option<f64>,

    /// Standard deviation of the EBITDA margin (default 0)
    #[arg(long)]
    pub margin_sigma: Option<f64>,

    /// Standard deviation of the capex ratio (default 0)
    #[arg(long)]
    pub capex_sigma: Option<f64>,

    /// Standard deviation of the depreciation ratio (default 0)
    #[arg(long)]
    pub dep_sigma: Option<f64>,

    /// Standard deviation of the working-capital ratio (default 0)
    #[arg(long)]
    pub wc_sigma: Option<f64>,

    /// Standard deviation of the tax rate (default 0)
    #[arg(long)]
    pub tax_sigma: Option<f64>,

    /// Mean WACC (default 0.075)
    #[arg(long)]
    pub wacc_mean: Option<f64>,

    /// WACC standard deviation (default 0.015)
    #[arg(long)]
    pub wacc_sigma: Option<f64>,

    /// Mean terminal growth (default 0.025)
    #[arg(long, allow_negative_numbers = true)]
    pub tg_mean: Option<f64>,

    /// Terminal growth standard deviation (default 0.005)
    #[arg(long)]
    pub tg_sigma: Option<f64>,

    /// Shares outstanding for per-share statistics
    #[arg(long)]
    pub shares: Option<f64>,

    /// Market price per share for the probability-above-market statistic
    #[arg(long)]
    pub market_price: Option<f64>,

    /// Attach an equal-width histogram with this many bins
    #[arg(long)]
    pub bins: Option<usize>,

    /// Percentile at which histogram values are clipped
    #[arg(long, default_value = "99")]
    pub clip_percentile: f64,

    /// Write the raw distribution and run metadata to this JSON file
    #[arg(long)]
    pub save: Option<String>,
}

/// Arguments for recomputing statistics from a saved run
#[derive(Args)]
pub struct SummarizeArgs {
    /// Path to a run written by `simulate --save`
    #[arg(long)]
    pub input: String,

    /// Shares outstanding (defaults to the value stored with the run)
    #[arg(long)]
    pub shares: Option<f64>,

    /// Market price per share (defaults to the value stored with the run)
    #[arg(long)]
    pub market_price: Option<f64>,

    /// Attach an equal-width histogram with this many bins
    #[arg(long)]
    pub bins: Option<usize>,

    /// Percentile at which histogram values are clipped
    #[arg(long, default_value = "99")]
    pub clip_percentile: f64,
}

#[derive(Debug, Serialize)]
struct SavedRunSummary {
    completed_trials: u32,
    valid_trials: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    seed: Option<u64>,
    generated_at: String,
    summary: DistributionSummary,
    #[serde(skip_serializing_if = "Option::is_none")]
    histogram: Option<Vec<HistogramBin>>,
}

fn config_from_flags(args: &SimulateArgs) -> Result<SimulationConfig, Box<dyn std::error::Error>> {
    let base = args.assumptions.to_assumptions()?;
    let years = base.years;
    let mut config = SimulationConfig::new(
        args.trials.unwrap_or(10_000),
        base,
        AssumptionSigmas::default(),
        DiscountingSpec::default(),
        years,
    );
    apply_distribution_flags(args, &mut config);
    Ok(config)
}

/// Overwrites the sampled distributions with any flag given on the command line.
fn apply_distribution_flags(args: &SimulateArgs, config: &mut SimulationConfig) {
    let sigma = &mut config.sigma;
    let sigma_flags = [
        (&mut sigma.growth, args.growth_sigma),
        (&mut sigma.ebitda_margin, args.margin_sigma),
        (&mut sigma.capex_pct, args.capex_sigma),
        (&mut sigma.dep_pct, args.dep_sigma),
        (&mut sigma.wc_pct, args.wc_sigma),
        (&mut sigma.tax_rate, args.tax_sigma),
    ];
    for (field, flag) in sigma_flags {
        if let Some(v) = flag {
            *field = v;
        }
    }

    let disc = &mut config.discounting;
    let disc_flags = [
        (&mut disc.wacc.mean, args.wacc_mean),
        (&mut disc.wacc.sigma, args.wacc_sigma),
        (&mut disc.terminal_growth.mean, args.tg_mean),
        (&mut disc.terminal_growth.sigma, args.tg_sigma),
    ];
    for (field, flag) in disc_flags {
        if let Some(v) = flag {
            *field = v;
        }
    }
}

/// Histogram of per-share values when a share count is known, else of EVs.
fn histogram_for(
    values: &[f64],
    shares: Option<f64>,
    bins: Option<usize>,
    clip_percentile: f64,
) -> Result<Option<Vec<HistogramBin>>, Box<dyn std::error::Error>> {
    match bins {
        Some(b) if values.iter().any(|v| v.is_finite()) => {
            let binned = match shares {
                Some(s) => per_share_values(values, s)?,
                None => values.to_vec(),
            };
            Ok(Some(build_histogram(&binned, b, Some(clip_percentile))?))
        }
        Some(_) => {
            warn!("no valid trials; histogram skipped");
            Ok(None)
        }
        None => Ok(None),
    }
}

pub fn run_simulate(args: SimulateArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let mut mc_input: McValuationInput = match input::read_typed(args.input.as_deref())? {
        Some(i) => i,
        None => McValuationInput {
            config: config_from_flags(&args)?,
            shares_outstanding: None,
            market_price: None,
        },
    };
    apply_distribution_flags(&args, &mut mc_input.config);
    if let Some(n) = args.trials {
        mc_input.config.n_trials = n;
    }
    if let Some(seed) = args.seed {
        mc_input.config.seed = Some(seed);
    }
    if args.shares.is_some() {
        mc_input.shares_outstanding = args.shares;
    }
    if args.market_price.is_some() {
        mc_input.market_price = args.market_price;
    }

    let run = run_monte_carlo_valuation(&mc_input)?;

    if let Some(ref path) = args.save {
        store::save_run(path, &SavedRun::from_run(&mc_input, &run))?;
    }

    let histogram = histogram_for(
        &run.distribution.values(),
        mc_input.shares_outstanding,
        args.bins,
        args.clip_percentile,
    )?;
    let mut value = serde_json::to_value(&run.output)?;
    if let (Some(h), Some(result)) = (
        histogram,
        value.get_mut("result").and_then(Value::as_object_mut),
    ) {
        result.insert("histogram".into(), serde_json::to_value(h)?);
    }
    Ok(value)
}

pub fn run_summarize(args: SummarizeArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let start = Instant::now();
    let saved = store::load_run(&args.input)?;
    let params = &saved.metadata.parameters;
    let shares = args.shares.or(params.shares_outstanding);
    let market_price = args.market_price.or(params.market_price);

    let values = saved.values();
    let summary = summarize(&values, shares, market_price)?;
    let histogram = histogram_for(&values, shares, args.bins, args.clip_percentile)?;

    let mut warnings = Vec::new();
    if saved.metadata.cancelled {
        warnings.push(format!(
            "Saved run was cancelled after {} of {} trials",
            saved.metadata.completed_trials, saved.metadata.requested_trials
        ));
    }
    if summary.invalid_count > 0 {
        warnings.push(format!(
            "{} of {} trials produced no value",
            summary.invalid_count,
            values.len()
        ));
    }

    let result = SavedRunSummary {
        completed_trials: saved.metadata.completed_trials,
        valid_trials: summary.valid_count,
        seed: saved.metadata.seed,
        generated_at: saved.metadata.generated_at.to_rfc3339(),
        summary,
        histogram,
    };
    let output = with_metadata(
        "Distribution statistics recomputed from a saved Monte Carlo run",
        &json!({
            "input": args.input,
            "shares_outstanding": shares,
            "market_price": market_price,
        }),
        warnings,
        start.elapsed().as_micros() as u64,
        Precision::Ieee754F64,
        result,
    );
    Ok(serde_json::to_value(output)?)
}
