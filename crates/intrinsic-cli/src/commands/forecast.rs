use clap::Args;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::Path;
use tracing::info;

use intrinsic_core::forecast::{
    build_forecast, build_scenario_set, AssumptionSet, Scenario, ScenarioAdjustments,
};

use crate::input;
use crate::output::csv_out;

/// Operating assumptions supplied as individual flags
#[derive(Args, Debug, Clone)]
pub struct AssumptionFlags {
    /// Last reported revenue (year 0)
    #[arg(long)]
    pub last_revenue: Option<f64>,

    /// Annual revenue growth rate (e.g. 0.08 for 8%)
    #[arg(long, allow_negative_numbers = true)]
    pub growth: Option<f64>,

    /// EBITDA margin as a fraction of revenue
    #[arg(long, allow_negative_numbers = true)]
    pub ebitda_margin: Option<f64>,

    /// Capex as a fraction of revenue
    #[arg(long)]
    pub capex_pct: Option<f64>,

    /// Depreciation as a fraction of revenue
    #[arg(long)]
    pub dep_pct: Option<f64>,

    /// Change in working capital as a fraction of revenue
    #[arg(long)]
    pub wc_pct: Option<f64>,

    /// Tax rate on EBIT
    #[arg(long)]
    pub tax_rate: Option<f64>,

    /// Forecast horizon in years
    #[arg(long, default_value = "5")]
    pub years: u32,

    /// Last reported calendar year, for row labels
    #[arg(long)]
    pub start_year: Option<i32>,
}

impl AssumptionFlags {
    pub fn to_assumptions(&self) -> Result<AssumptionSet, Box<dyn std::error::Error>> {
        Ok(AssumptionSet {
            last_revenue: self
                .last_revenue
                .ok_or("--last-revenue is required (or provide --input)")?,
            growth: self.growth.ok_or("--growth is required (or provide --input)")?,
            ebitda_margin: self
                .ebitda_margin
                .ok_or("--ebitda-margin is required (or provide --input)")?,
            capex_pct: self
                .capex_pct
                .ok_or("--capex-pct is required (or provide --input)")?,
            dep_pct: self.dep_pct.ok_or("--dep-pct is required (or provide --input)")?,
            wc_pct: self.wc_pct.ok_or("--wc-pct is required (or provide --input)")?,
            tax_rate: self
                .tax_rate
                .ok_or("--tax-rate is required (or provide --input)")?,
            years: self.years,
            start_year: self.start_year,
        })
    }
}

/// Arguments for a single deterministic forecast
#[derive(Args)]
pub struct ForecastArgs {
    #[command(flatten)]
    pub assumptions: AssumptionFlags,

    /// Path to a JSON/YAML assumption set (overrides individual flags)
    #[arg(long)]
    pub input: Option<String>,

    /// Also write the forecast to this CSV file
    #[arg(long)]
    pub csv: Option<String>,
}

/// Arguments for Base/Bull/Bear scenario forecasts
#[derive(Args)]
pub struct ScenariosArgs {
    #[command(flatten)]
    pub assumptions: AssumptionFlags,

    /// Path to a JSON/YAML base assumption set with optional `adjustments`
    #[arg(long)]
    pub input: Option<String>,

    /// Write forecast_base.csv, forecast_bull.csv and forecast_bear.csv here
    #[arg(long)]
    pub csv_dir: Option<String>,
}

/// Base assumptions plus per-scenario overrides.
#[derive(Debug, Serialize, Deserialize)]
struct ScenarioInput {
    #[serde(flatten)]
    base: AssumptionSet,
    #[serde(default)]
    adjustments: ScenarioAdjustments,
}

pub fn run_forecast(args: ForecastArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let assumptions: AssumptionSet = match input::read_typed(args.input.as_deref())? {
        Some(a) => a,
        None => args.assumptions.to_assumptions()?,
    };

    let table = build_forecast(&assumptions);
    if let Some(ref path) = args.csv {
        csv_out::write_forecast_csv(Path::new(path), &table)?;
        info!(path = %path, "wrote forecast csv");
    }
    Ok(serde_json::to_value(table)?)
}

pub fn run_scenarios(args: ScenariosArgs) -> Result<Value, Box<dyn std::error::Error>> {
    let scenario_input: ScenarioInput = match input::read_typed(args.input.as_deref())? {
        Some(s) => s,
        None => ScenarioInput {
            base: args.assumptions.to_assumptions()?,
            adjustments: ScenarioAdjustments::default(),
        },
    };

    let set = build_scenario_set(&scenario_input.base, &scenario_input.adjustments);
    if let Some(ref dir) = args.csv_dir {
        let dir = Path::new(dir);
        std::fs::create_dir_all(dir)
            .map_err(|e| format!("Failed to create '{}': {}", dir.display(), e))?;
        for scenario in Scenario::ALL {
            let path = dir.join(format!(
                "forecast_{}.csv",
                scenario.to_string().to_lowercase()
            ));
            csv_out::write_forecast_csv(&path, set.get(scenario))?;
            info!(scenario = %scenario, path = %path.display(), "wrote scenario csv");
        }
    }
    Ok(serde_json::to_value(set)?)
}
