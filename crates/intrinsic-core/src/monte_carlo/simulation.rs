use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, info_span};

use crate::error::IntrinsicError;
use crate::forecast::{build_forecast, AssumptionSet};
use crate::types::{with_metadata, ComputationOutput, Money, Precision};
use crate::valuation::dcf::compute_dcf_value;
use crate::IntrinsicResult;

use super::sampling::{AssumptionSigmas, DiscountingSpec, TrialSampler};
use super::statistics::{summarize, DistributionSummary};

const PROGRESS_INTERVAL: usize = 1_000;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Everything one Monte Carlo run needs.
///
/// `base.years` is the forecast horizon for every trial; `base.last_revenue`
/// is never perturbed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationConfig {
    /// Number of independent trials
    #[serde(default = "default_trials")]
    pub n_trials: u32,
    /// Seed for reproducibility; a fresh entropy seed is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// Base operating assumptions (the mean of each sampled field)
    pub base: AssumptionSet,
    /// Standard deviations of the operating assumptions
    #[serde(default)]
    pub sigma: AssumptionSigmas,
    /// Distributions for WACC and terminal growth
    #[serde(default)]
    pub discounting: DiscountingSpec,
}

fn default_trials() -> u32 {
    10_000
}

impl SimulationConfig {
    pub fn new(
        n_trials: u32,
        base: AssumptionSet,
        sigma: AssumptionSigmas,
        discounting: DiscountingSpec,
        years: u32,
    ) -> Self {
        Self {
            n_trials,
            seed: None,
            base: AssumptionSet { years, ..base },
            sigma,
            discounting,
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Reject configurations that cannot produce a run.
    pub fn validate(&self) -> IntrinsicResult<TrialSampler> {
        if self.n_trials == 0 {
            return Err(IntrinsicError::InvalidInput {
                field: "n_trials".into(),
                reason: "Must be at least 1".into(),
            });
        }
        if self.base.years == 0 {
            return Err(IntrinsicError::InvalidInput {
                field: "years".into(),
                reason: "Forecast horizon must be at least 1 year".into(),
            });
        }
        TrialSampler::new(&self.base, &self.sigma, &self.discounting)
    }
}

// ---------------------------------------------------------------------------
// Cancellation
// ---------------------------------------------------------------------------

/// Cooperative cancellation flag, checked once per trial boundary.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// Trial outcomes
// ---------------------------------------------------------------------------

/// Why a trial produced no value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TrialFailure {
    /// Sampled `wacc <= terminal_g`
    InvalidDiscounting,
    /// Forecast lacked an FCFF column
    MissingColumn,
    /// Valuation overflowed or produced NaN
    NonFiniteValue,
    Other,
}

impl From<&IntrinsicError> for TrialFailure {
    fn from(e: &IntrinsicError) -> Self {
        match e {
            IntrinsicError::InvalidDiscounting { .. } => TrialFailure::InvalidDiscounting,
            IntrinsicError::MissingColumn { .. } => TrialFailure::MissingColumn,
            _ => TrialFailure::Other,
        }
    }
}

/// Result of one trial.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TrialOutcome {
    Valued { enterprise_value: Money },
    Failed { failure: TrialFailure },
}

impl TrialOutcome {
    /// The enterprise value, or NaN for a failed trial.
    pub fn value_or_nan(&self) -> Money {
        match self {
            TrialOutcome::Valued { enterprise_value } => *enterprise_value,
            TrialOutcome::Failed { .. } => f64::NAN,
        }
    }

    pub fn is_valid(&self) -> bool {
        matches!(self, TrialOutcome::Valued { .. })
    }
}

/// Count of failed trials per cause.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailureBreakdown {
    pub invalid_discounting: u32,
    pub missing_column: u32,
    pub non_finite_value: u32,
    pub other: u32,
}

impl FailureBreakdown {
    pub fn total(&self) -> u32 {
        self.invalid_discounting + self.missing_column + self.non_finite_value + self.other
    }
}

/// One outcome per executed trial, in execution order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValueDistribution {
    pub requested_trials: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    /// True when the run stopped early on a cancel request
    pub cancelled: bool,
    pub outcomes: Vec<TrialOutcome>,
}

impl ValueDistribution {
    pub fn len(&self) -> usize {
        self.outcomes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.outcomes.is_empty()
    }

    /// Flat array with NaN for failed trials.
    pub fn values(&self) -> Vec<Money> {
        self.outcomes.iter().map(TrialOutcome::value_or_nan).collect()
    }

    /// Enterprise values of successful trials only.
    pub fn valid_values(&self) -> Vec<Money> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                TrialOutcome::Valued { enterprise_value } => Some(*enterprise_value),
                TrialOutcome::Failed { .. } => None,
            })
            .collect()
    }

    pub fn valid_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_valid()).count()
    }

    pub fn failed_count(&self) -> usize {
        self.len() - self.valid_count()
    }

    pub fn failure_breakdown(&self) -> FailureBreakdown {
        let mut breakdown = FailureBreakdown::default();
        for o in &self.outcomes {
            if let TrialOutcome::Failed { failure } = o {
                match failure {
                    TrialFailure::InvalidDiscounting => breakdown.invalid_discounting += 1,
                    TrialFailure::MissingColumn => breakdown.missing_column += 1,
                    TrialFailure::NonFiniteValue => breakdown.non_finite_value += 1,
                    TrialFailure::Other => breakdown.other += 1,
                }
            }
        }
        breakdown
    }
}

// ---------------------------------------------------------------------------
// Driver
// ---------------------------------------------------------------------------

/// Run a single trial against its own generator seeded from `trial_seed`.
///
/// Pure in (sampler, seed): the same pair always yields the same outcome,
/// which lets trials be farmed out and merged in any order.
pub fn run_trial(sampler: &TrialSampler, trial_seed: u64) -> TrialOutcome {
    let mut rng = StdRng::seed_from_u64(trial_seed);
    let sampled = sampler.draw(&mut rng);
    let forecast = build_forecast(&sampled.assumptions);

    match compute_dcf_value(
        &forecast,
        sampled.discounting.wacc,
        sampled.discounting.terminal_g,
    ) {
        Ok(ev) if ev.is_finite() => TrialOutcome::Valued {
            enterprise_value: ev,
        },
        Ok(_) => TrialOutcome::Failed {
            failure: TrialFailure::NonFiniteValue,
        },
        Err(e) => TrialOutcome::Failed {
            failure: TrialFailure::from(&e),
        },
    }
}

/// Owns one run's random generator and drives its trials sequentially.
pub struct MonteCarloDriver<R = StdRng> {
    config: SimulationConfig,
    sampler: TrialSampler,
    rng: R,
    cancel: Option<CancelToken>,
}

impl MonteCarloDriver<StdRng> {
    /// Seed from `config.seed`, or from OS entropy when unset.
    pub fn new(config: SimulationConfig) -> IntrinsicResult<Self> {
        let rng = match config.seed {
            Some(s) => StdRng::seed_from_u64(s),
            None => StdRng::from_entropy(),
        };
        Self::with_rng(config, rng)
    }
}

impl<R: Rng> MonteCarloDriver<R> {
    /// Use a caller-supplied generator (ignores `config.seed`).
    pub fn with_rng(config: SimulationConfig, rng: R) -> IntrinsicResult<Self> {
        let sampler = config.validate()?;
        Ok(Self {
            config,
            sampler,
            rng,
            cancel: None,
        })
    }

    pub fn with_cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn config(&self) -> &SimulationConfig {
        &self.config
    }

    /// Execute every trial. Per-trial failures become sentinel outcomes.
    pub fn run(&mut self) -> ValueDistribution {
        let n = self.config.n_trials as usize;
        let span = info_span!("monte_carlo", trials = n, seed = ?self.config.seed);
        let _guard = span.enter();

        let mut outcomes = Vec::with_capacity(n);
        let mut cancelled = false;

        for i in 0..n {
            if self.cancel.as_ref().is_some_and(CancelToken::is_cancelled) {
                cancelled = true;
                break;
            }
            let trial_seed: u64 = self.rng.gen();
            let outcome = run_trial(&self.sampler, trial_seed);
            if let TrialOutcome::Failed { failure } = outcome {
                debug!(trial = i, trial_seed, ?failure, "trial produced no value");
            }
            outcomes.push(outcome);

            if i > 0 && i % PROGRESS_INTERVAL == 0 {
                debug!(completed = i, "monte carlo progress");
            }
        }

        let distribution = ValueDistribution {
            requested_trials: self.config.n_trials,
            seed: self.config.seed,
            cancelled,
            outcomes,
        };

        info!(
            requested = n,
            completed = distribution.len(),
            valid = distribution.valid_count(),
            failed = distribution.failed_count(),
            cancelled,
            "monte carlo run finished"
        );

        distribution
    }
}

/// Validate `config` and run it to completion.
pub fn simulate(config: &SimulationConfig) -> IntrinsicResult<ValueDistribution> {
    Ok(MonteCarloDriver::new(config.clone())?.run())
}

// ---------------------------------------------------------------------------
// Enveloped run with summary statistics
// ---------------------------------------------------------------------------

/// Input for [`run_monte_carlo_valuation`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McValuationInput {
    #[serde(flatten)]
    pub config: SimulationConfig,
    /// Share count for per-share conversion
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub shares_outstanding: Option<f64>,
    /// Market price per share for the probability-above-market statistic
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub market_price: Option<f64>,
}

/// Counts and statistics of a finished run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationReport {
    pub requested_trials: u32,
    pub completed_trials: u32,
    pub valid_trials: u32,
    pub failed_trials: u32,
    pub failures: FailureBreakdown,
    pub cancelled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    pub generated_at: DateTime<Utc>,
    /// Absent when no trial produced a value
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<DistributionSummary>,
}

impl SimulationReport {
    pub fn from_distribution(
        distribution: &ValueDistribution,
        shares_outstanding: Option<f64>,
        market_price: Option<f64>,
    ) -> IntrinsicResult<Self> {
        let summary = if distribution.valid_count() == 0 {
            None
        } else {
            Some(summarize(
                &distribution.values(),
                shares_outstanding,
                market_price,
            )?)
        };
        Ok(Self {
            requested_trials: distribution.requested_trials,
            completed_trials: distribution.len() as u32,
            valid_trials: distribution.valid_count() as u32,
            failed_trials: distribution.failed_count() as u32,
            failures: distribution.failure_breakdown(),
            cancelled: distribution.cancelled,
            seed: distribution.seed,
            generated_at: Utc::now(),
            summary,
        })
    }
}

/// A finished run: the raw distribution plus its enveloped report.
#[derive(Debug, Clone)]
pub struct McValuationRun {
    pub distribution: ValueDistribution,
    pub output: ComputationOutput<SimulationReport>,
}

/// Run a Monte Carlo DCF valuation and summarise the resulting distribution.
pub fn run_monte_carlo_valuation(input: &McValuationInput) -> IntrinsicResult<McValuationRun> {
    let start = Instant::now();
    let mut warnings: Vec<String> = Vec::new();

    let distribution = simulate(&input.config)?;
    let report = SimulationReport::from_distribution(
        &distribution,
        input.shares_outstanding,
        input.market_price,
    )?;

    if report.failed_trials > 0 {
        warnings.push(format!(
            "{} of {} trials produced no value (invalid discounting: {}, non-finite: {}, other: {})",
            report.failed_trials,
            report.completed_trials,
            report.failures.invalid_discounting,
            report.failures.non_finite_value,
            report.failures.other + report.failures.missing_column,
        ));
    }
    if report.summary.is_none() {
        warnings.push("No valid trials; summary statistics unavailable".into());
    }

    let elapsed = start.elapsed().as_micros() as u64;
    let output = with_metadata(
        "Monte Carlo FCFF DCF (independent normal inputs)",
        input,
        warnings,
        elapsed,
        Precision::Ieee754F64,
        report,
    );

    Ok(McValuationRun {
        distribution,
        output,
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::monte_carlo::sampling::NormalSpec;

    const SEED: u64 = 42;

    fn base() -> AssumptionSet {
        AssumptionSet {
            last_revenue: 28_000.0,
            growth: 0.08,
            ebitda_margin: 0.34,
            capex_pct: 0.06,
            dep_pct: 0.05,
            wc_pct: 0.01,
            tax_rate: 0.21,
            years: 5,
            start_year: None,
        }
    }

    fn small_sigmas() -> AssumptionSigmas {
        AssumptionSigmas {
            growth: 0.02,
            ebitda_margin: 0.03,
            capex_pct: 0.01,
            dep_pct: 0.005,
            wc_pct: 0.005,
            tax_rate: 0.02,
        }
    }

    fn config(n: u32) -> SimulationConfig {
        SimulationConfig::new(n, base(), small_sigmas(), DiscountingSpec::default(), 5)
            .with_seed(SEED)
    }

    #[test]
    fn test_run_produces_one_outcome_per_trial() {
        let dist = simulate(&config(500)).unwrap();
        assert_eq!(dist.len(), 500);
        assert_eq!(dist.valid_count() + dist.failed_count(), 500);
        assert!(!dist.cancelled);
    }

    #[test]
    fn test_seeded_runs_are_reproducible() {
        let a = simulate(&config(200)).unwrap();
        let b = simulate(&config(200)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_different_seeds_differ() {
        let a = simulate(&config(50)).unwrap();
        let b = simulate(&config(50).with_seed(SEED + 1)).unwrap();
        assert_ne!(a.values(), b.values());
    }

    #[test]
    fn test_zero_trials_rejected() {
        assert!(simulate(&config(0)).is_err());
    }

    #[test]
    fn test_zero_years_rejected() {
        let mut cfg = config(10);
        cfg.base.years = 0;
        assert!(matches!(
            simulate(&cfg),
            Err(IntrinsicError::InvalidInput { .. })
        ));
    }

    #[test]
    fn test_invalid_discounting_becomes_sentinel() {
        // terminal growth always above wacc
        let cfg = SimulationConfig::new(
            20,
            base(),
            AssumptionSigmas::zero(),
            DiscountingSpec::fixed(0.05, 0.06),
            5,
        );
        let dist = simulate(&cfg).unwrap();
        assert_eq!(dist.len(), 20);
        assert_eq!(dist.valid_count(), 0);
        assert_eq!(dist.failure_breakdown().invalid_discounting, 20);
        assert!(dist.values().iter().all(|v| v.is_nan()));
    }

    #[test]
    fn test_run_trial_is_pure_in_seed() {
        let sampler = config(1).validate().unwrap();
        assert_eq!(run_trial(&sampler, 99), run_trial(&sampler, 99));
    }

    #[test]
    fn test_cancel_before_start_yields_empty_run() {
        let token = CancelToken::new();
        token.cancel();
        let mut driver = MonteCarloDriver::new(config(1_000))
            .unwrap()
            .with_cancel_token(token);
        let dist = driver.run();
        assert!(dist.cancelled);
        assert!(dist.is_empty());
        assert_eq!(dist.requested_trials, 1_000);
    }

    #[test]
    fn test_uncancelled_token_runs_to_completion() {
        let mut driver = MonteCarloDriver::new(config(100))
            .unwrap()
            .with_cancel_token(CancelToken::new());
        let dist = driver.run();
        assert!(!dist.cancelled);
        assert_eq!(dist.len(), 100);
    }

    #[test]
    fn test_caller_supplied_rng() {
        let rng = StdRng::seed_from_u64(5);
        let mut driver = MonteCarloDriver::with_rng(config(30), rng).unwrap();
        assert_eq!(driver.run().len(), 30);
    }

    #[test]
    fn test_outcome_serialization_tags() {
        let ok = serde_json::to_value(TrialOutcome::Valued {
            enterprise_value: 1.5,
        })
        .unwrap();
        assert_eq!(ok["status"], "valued");
        let failed = serde_json::to_value(TrialOutcome::Failed {
            failure: TrialFailure::InvalidDiscounting,
        })
        .unwrap();
        assert_eq!(failed["failure"], "invalid_discounting");
    }

    #[test]
    fn test_enveloped_run_reports_counts() {
        let input = McValuationInput {
            config: config(1_000),
            shares_outstanding: Some(388_150_000.0),
            market_price: Some(0.0),
        };
        let run = run_monte_carlo_valuation(&input).unwrap();
        let report = &run.output.result;
        assert_eq!(report.completed_trials, 1_000);
        assert_eq!(report.valid_trials + report.failed_trials, 1_000);
        assert_eq!(report.failures.total(), report.failed_trials);
        let summary = report.summary.as_ref().unwrap();
        assert!(summary.percentiles.p5 <= summary.percentiles.p95);
        assert_eq!(run.distribution.len(), 1_000);
    }

    #[test]
    fn test_enveloped_run_with_no_valid_trials() {
        let input = McValuationInput {
            config: SimulationConfig::new(
                10,
                base(),
                AssumptionSigmas::zero(),
                DiscountingSpec {
                    wacc: NormalSpec::fixed(0.02),
                    terminal_growth: NormalSpec::fixed(0.03),
                },
                5,
            ),
            shares_outstanding: None,
            market_price: None,
        };
        let run = run_monte_carlo_valuation(&input).unwrap();
        assert!(run.output.result.summary.is_none());
        assert!(run.output.warnings.iter().any(|w| w.contains("No valid trials")));
    }

    #[test]
    fn test_config_deserializes_with_defaults() {
        let cfg: SimulationConfig = serde_json::from_str(
            r#"{"base":{"last_revenue":100,"growth":0.05,"ebitda_margin":0.3,
                "capex_pct":0.05,"dep_pct":0.04,"wc_pct":0.01,"tax_rate":0.2}}"#,
        )
        .unwrap();
        assert_eq!(cfg.n_trials, 10_000);
        assert_eq!(cfg.base.years, 5);
        assert_eq!(cfg.sigma, AssumptionSigmas::zero());
        assert_eq!(cfg.discounting, DiscountingSpec::default());
    }

    #[test]
    fn test_config_missing_base_rejected() {
        let result: Result<SimulationConfig, _> = serde_json::from_str(r#"{"n_trials":10}"#);
        assert!(result.is_err());
    }
}
