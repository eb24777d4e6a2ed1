mod commands;
mod input;
mod logging;
mod output;
mod store;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use colored::Colorize;
use std::process;

use commands::cagr::CagrArgs;
use commands::forecast::{ForecastArgs, ScenariosArgs};
use commands::simulate::{SimulateArgs, SummarizeArgs};
use commands::valuation::{ValueArgs, WaccArgs};

/// DCF forecasting, valuation and Monte Carlo simulation
#[derive(Parser)]
#[command(
    name = "intrinsic",
    version,
    about = "DCF forecasting, valuation and Monte Carlo simulation",
    long_about = "Build deterministic multi-year FCFF forecasts under Base/Bull/Bear \
                  scenarios, value them with a Gordon-growth DCF, and quantify \
                  valuation uncertainty with seeded Monte Carlo trials."
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output format
    #[arg(long, default_value = "json", global = true)]
    output: OutputFormat,

    /// Increase log verbosity (-v info, -vv debug); INTRINSIC_LOG overrides
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a deterministic forecast table
    Forecast(ForecastArgs),
    /// Build Base, Bull and Bear forecasts
    Scenarios(ScenariosArgs),
    /// Value a forecast with a Gordon-growth DCF
    Value(ValueArgs),
    /// Calculate WACC from CAPM and market-value weights
    Wacc(WaccArgs),
    /// Compound annual growth rate of a series
    Cagr(CagrArgs),
    /// Run a Monte Carlo enterprise-value simulation
    Simulate(SimulateArgs),
    /// Recompute statistics from a saved simulation run
    Summarize(SummarizeArgs),
    /// Print version information
    Version,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Csv,
    Minimal,
}

fn main() {
    let cli = Cli::parse();
    logging::init_tracing(cli.verbose);

    let result: Result<serde_json::Value, Box<dyn std::error::Error>> = match cli.command {
        Commands::Forecast(args) => commands::forecast::run_forecast(args),
        Commands::Scenarios(args) => commands::forecast::run_scenarios(args),
        Commands::Value(args) => commands::valuation::run_value(args),
        Commands::Wacc(args) => commands::valuation::run_wacc(args),
        Commands::Cagr(args) => commands::cagr::run_cagr(args),
        Commands::Simulate(args) => commands::simulate::run_simulate(args),
        Commands::Summarize(args) => commands::simulate::run_summarize(args),
        Commands::Version => {
            println!("intrinsic {}", env!("CARGO_PKG_VERSION"));
            return;
        }
    };

    match result {
        Ok(value) => {
            output::format_output(&cli.output, &value);
            process::exit(0);
        }
        Err(e) => {
            eprintln!("{}: {}", "error".red().bold(), e);
            process::exit(1);
        }
    }
}
