pub mod sampling;
pub mod simulation;
pub mod statistics;

pub use sampling::{AssumptionSigmas, DiscountingSpec, NormalSpec, SampledInputs, TrialSampler};
pub use simulation::{
    run_monte_carlo_valuation, run_trial, simulate, CancelToken, FailureBreakdown,
    McValuationInput, McValuationRun, MonteCarloDriver, SimulationConfig, SimulationReport,
    TrialFailure, TrialOutcome, ValueDistribution,
};
pub use statistics::{
    build_histogram, per_share_values, summarize, DistributionSummary, HistogramBin,
    PerShareSummary, Percentiles,
};
