use rand::Rng;
use serde::{Deserialize, Serialize};
use statrs::distribution::Normal;

use crate::error::IntrinsicError;
use crate::forecast::AssumptionSet;
use crate::types::{Money, Rate};
use crate::valuation::dcf::DiscountingParameters;
use crate::IntrinsicResult;

// ---------------------------------------------------------------------------
// Safety clamps applied to every sampled trial
// ---------------------------------------------------------------------------

pub const MIN_EBITDA_MARGIN: Rate = -0.5;
pub const MIN_WACC: Rate = 0.001;

// ---------------------------------------------------------------------------
// Configuration types
// ---------------------------------------------------------------------------

/// A normally distributed input. `sigma = 0` holds it fixed at `mean`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalSpec {
    pub mean: f64,
    #[serde(default)]
    pub sigma: f64,
}

impl NormalSpec {
    pub const fn new(mean: f64, sigma: f64) -> Self {
        Self { mean, sigma }
    }

    pub const fn fixed(mean: f64) -> Self {
        Self { mean, sigma: 0.0 }
    }
}

/// Standard deviations for the perturbable operating assumptions.
///
/// Any field left out is held at its base value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct AssumptionSigmas {
    #[serde(default)]
    pub growth: f64,
    #[serde(default)]
    pub ebitda_margin: f64,
    #[serde(default)]
    pub capex_pct: f64,
    #[serde(default)]
    pub dep_pct: f64,
    #[serde(default)]
    pub wc_pct: f64,
    #[serde(default)]
    pub tax_rate: f64,
}

impl AssumptionSigmas {
    pub fn zero() -> Self {
        Self::default()
    }
}

/// Distributions for the discounting parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DiscountingSpec {
    #[serde(default = "default_wacc")]
    pub wacc: NormalSpec,
    #[serde(default = "default_terminal_growth")]
    pub terminal_growth: NormalSpec,
}

fn default_wacc() -> NormalSpec {
    NormalSpec::new(0.075, 0.015)
}

fn default_terminal_growth() -> NormalSpec {
    NormalSpec::new(0.025, 0.005)
}

impl Default for DiscountingSpec {
    fn default() -> Self {
        Self {
            wacc: default_wacc(),
            terminal_growth: default_terminal_growth(),
        }
    }
}

impl DiscountingSpec {
    /// Hold both rates fixed.
    pub fn fixed(wacc: Rate, terminal_growth: Rate) -> Self {
        Self {
            wacc: NormalSpec::fixed(wacc),
            terminal_growth: NormalSpec::fixed(terminal_growth),
        }
    }
}

// ---------------------------------------------------------------------------
// Sampling
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
enum FieldSampler {
    Fixed(f64),
    Normal(Normal),
}

impl FieldSampler {
    fn new(field: &str, spec: NormalSpec) -> IntrinsicResult<Self> {
        if !spec.mean.is_finite() {
            return Err(IntrinsicError::InvalidInput {
                field: field.into(),
                reason: format!("Base value must be finite (got {})", spec.mean),
            });
        }
        if !spec.sigma.is_finite() || spec.sigma < 0.0 {
            return Err(IntrinsicError::InvalidInput {
                field: field.into(),
                reason: format!(
                    "Standard deviation must be finite and non-negative (got {})",
                    spec.sigma
                ),
            });
        }
        if spec.sigma == 0.0 {
            return Ok(FieldSampler::Fixed(spec.mean));
        }
        Normal::new(spec.mean, spec.sigma)
            .map(FieldSampler::Normal)
            .map_err(|e| IntrinsicError::InvalidInput {
                field: field.into(),
                reason: format!("Invalid Normal parameters: {e}"),
            })
    }

    fn draw<R: Rng>(&self, rng: &mut R) -> f64 {
        match self {
            FieldSampler::Fixed(v) => *v,
            FieldSampler::Normal(n) => rng.sample(n),
        }
    }
}

/// One trial's sampled inputs, after clamping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SampledInputs {
    pub assumptions: AssumptionSet,
    pub discounting: DiscountingParameters,
}

/// Validated per-field samplers for one simulation configuration.
#[derive(Debug, Clone)]
pub struct TrialSampler {
    last_revenue: Money,
    years: u32,
    start_year: Option<i32>,
    growth: FieldSampler,
    ebitda_margin: FieldSampler,
    capex_pct: FieldSampler,
    dep_pct: FieldSampler,
    wc_pct: FieldSampler,
    tax_rate: FieldSampler,
    wacc: FieldSampler,
    terminal_growth: FieldSampler,
}

impl TrialSampler {
    pub fn new(
        base: &AssumptionSet,
        sigma: &AssumptionSigmas,
        discounting: &DiscountingSpec,
    ) -> IntrinsicResult<Self> {
        if !base.last_revenue.is_finite() {
            return Err(IntrinsicError::InvalidInput {
                field: "last_revenue".into(),
                reason: "Last revenue must be finite".into(),
            });
        }
        Ok(Self {
            last_revenue: base.last_revenue,
            years: base.years,
            start_year: base.start_year,
            growth: FieldSampler::new("growth", NormalSpec::new(base.growth, sigma.growth))?,
            ebitda_margin: FieldSampler::new(
                "ebitda_margin",
                NormalSpec::new(base.ebitda_margin, sigma.ebitda_margin),
            )?,
            capex_pct: FieldSampler::new(
                "capex_pct",
                NormalSpec::new(base.capex_pct, sigma.capex_pct),
            )?,
            dep_pct: FieldSampler::new("dep_pct", NormalSpec::new(base.dep_pct, sigma.dep_pct))?,
            wc_pct: FieldSampler::new("wc_pct", NormalSpec::new(base.wc_pct, sigma.wc_pct))?,
            tax_rate: FieldSampler::new(
                "tax_rate",
                NormalSpec::new(base.tax_rate, sigma.tax_rate),
            )?,
            wacc: FieldSampler::new("wacc", discounting.wacc)?,
            terminal_growth: FieldSampler::new("terminal_growth", discounting.terminal_growth)?,
        })
    }

    /// Draw every field independently, then apply the safety clamps.
    ///
    /// `terminal_g` is left unclamped, so `wacc > terminal_g`
    /// is not guaranteed.
    pub fn draw<R: Rng>(&self, rng: &mut R) -> SampledInputs {
        let growth = self.growth.draw(rng);
        let ebitda_margin = self.ebitda_margin.draw(rng);
        let capex_pct = self.capex_pct.draw(rng);
        let dep_pct = self.dep_pct.draw(rng);
        let wc_pct = self.wc_pct.draw(rng);
        let tax_rate = self.tax_rate.draw(rng);
        let wacc = self.wacc.draw(rng);
        let terminal_g = self.terminal_growth.draw(rng);

        SampledInputs {
            assumptions: AssumptionSet {
                last_revenue: self.last_revenue,
                growth,
                ebitda_margin: ebitda_margin.max(MIN_EBITDA_MARGIN),
                capex_pct: capex_pct.max(0.0),
                dep_pct: dep_pct.max(0.0),
                wc_pct: wc_pct.max(0.0),
                tax_rate: tax_rate.clamp(0.0, 1.0),
                years: self.years,
                start_year: self.start_year,
            },
            discounting: DiscountingParameters {
                wacc: wacc.max(MIN_WACC),
                terminal_g,
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn base() -> AssumptionSet {
        AssumptionSet {
            last_revenue: 1000.0,
            growth: 0.05,
            ebitda_margin: 0.30,
            capex_pct: 0.05,
            dep_pct: 0.04,
            wc_pct: 0.01,
            tax_rate: 0.25,
            years: 5,
            start_year: None,
        }
    }

    #[test]
    fn test_zero_sigma_is_constant() {
        let sampler = TrialSampler::new(
            &base(),
            &AssumptionSigmas::zero(),
            &DiscountingSpec::fixed(0.08, 0.02),
        )
        .unwrap();
        let mut rng = StdRng::seed_from_u64(7);
        let first = sampler.draw(&mut rng);
        for _ in 0..50 {
            assert_eq!(sampler.draw(&mut rng), first);
        }
        assert_eq!(first.assumptions, base());
        assert_eq!(first.discounting.wacc, 0.08);
    }

    #[test]
    fn test_clamps_hold_under_wide_sigmas() {
        let sigma = AssumptionSigmas {
            growth: 0.5,
            ebitda_margin: 2.0,
            capex_pct: 1.0,
            dep_pct: 1.0,
            wc_pct: 1.0,
            tax_rate: 2.0,
        };
        let disc = DiscountingSpec {
            wacc: NormalSpec::new(0.05, 1.0),
            terminal_growth: NormalSpec::new(0.02, 1.0),
        };
        let sampler = TrialSampler::new(&base(), &sigma, &disc).unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..2_000 {
            let s = sampler.draw(&mut rng);
            assert!(s.assumptions.ebitda_margin >= MIN_EBITDA_MARGIN);
            assert!(s.assumptions.capex_pct >= 0.0);
            assert!(s.assumptions.dep_pct >= 0.0);
            assert!(s.assumptions.wc_pct >= 0.0);
            assert!((0.0..=1.0).contains(&s.assumptions.tax_rate));
            assert!(s.discounting.wacc >= MIN_WACC);
            assert_eq!(s.assumptions.last_revenue, 1000.0);
        }
    }

    #[test]
    fn test_terminal_growth_is_not_clamped() {
        let disc = DiscountingSpec {
            wacc: NormalSpec::fixed(0.05),
            terminal_growth: NormalSpec::new(0.0, 1.0),
        };
        let sampler = TrialSampler::new(&base(), &AssumptionSigmas::zero(), &disc).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        let draws: Vec<f64> = (0..500)
            .map(|_| sampler.draw(&mut rng).discounting.terminal_g)
            .collect();
        assert!(draws.iter().any(|g| *g > 0.05));
        assert!(draws.iter().any(|g| *g < -0.5));
    }

    #[test]
    fn test_negative_sigma_rejected() {
        let sigma = AssumptionSigmas {
            growth: -0.01,
            ..AssumptionSigmas::zero()
        };
        let result = TrialSampler::new(&base(), &sigma, &DiscountingSpec::default());
        assert!(matches!(result, Err(IntrinsicError::InvalidInput { .. })));
    }

    #[test]
    fn test_non_finite_base_rejected() {
        let mut b = base();
        b.growth = f64::NAN;
        let result = TrialSampler::new(&b, &AssumptionSigmas::zero(), &DiscountingSpec::default());
        assert!(result.is_err());
    }

    #[test]
    fn test_default_discounting_spec() {
        let spec: DiscountingSpec = serde_json::from_str("{}").unwrap();
        assert_eq!(spec.wacc, NormalSpec::new(0.075, 0.015));
        assert_eq!(spec.terminal_growth, NormalSpec::new(0.025, 0.005));
    }
}
