use serde::{Deserialize, Serialize};

use crate::error::IntrinsicError;
use crate::types::Money;
use crate::IntrinsicResult;

/// Fraction of the distribution averaged for the tail-risk statistic.
pub const CVAR_TAIL: f64 = 0.05;

/// Percentile summary of a value distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Percentiles {
    pub p5: f64,
    pub p25: f64,
    pub p50: f64,
    pub p75: f64,
    pub p95: f64,
}

impl Percentiles {
    /// `sorted` must be non-empty and ascending.
    pub fn from_sorted(sorted: &[f64]) -> Self {
        Self {
            p5: percentile_sorted(sorted, 5.0),
            p25: percentile_sorted(sorted, 25.0),
            p50: percentile_sorted(sorted, 50.0),
            p75: percentile_sorted(sorted, 75.0),
            p95: percentile_sorted(sorted, 95.0),
        }
    }
}

/// One equal-width histogram bin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramBin {
    pub lower: f64,
    pub upper: f64,
    pub count: u32,
    pub frequency: f64,
}

/// Per-share view of the distribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerShareSummary {
    pub shares_outstanding: f64,
    pub mean: f64,
    pub median: f64,
    pub percentiles: Percentiles,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub market_price: Option<f64>,
    /// Fraction of per-share values strictly above `market_price`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub probability_above_market: Option<f64>,
}

/// Descriptive statistics over the valid trials of a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistributionSummary {
    pub valid_count: usize,
    pub invalid_count: usize,
    pub mean: f64,
    /// Population standard deviation
    pub std_dev: f64,
    pub min: f64,
    pub max: f64,
    pub percentiles: Percentiles,
    /// Mean of the lowest 5% of values
    pub cvar_5: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub per_share: Option<PerShareSummary>,
}

/// Linear-interpolation percentile of a sorted slice, `p` in [0, 100].
pub fn percentile_sorted(sorted: &[f64], p: f64) -> f64 {
    match sorted.len() {
        0 => f64::NAN,
        1 => sorted[0],
        len => {
            let rank = (p / 100.0).clamp(0.0, 1.0) * (len - 1) as f64;
            let lower = rank.floor() as usize;
            let upper = rank.ceil() as usize;
            if lower == upper {
                sorted[lower]
            } else {
                let frac = rank - lower as f64;
                sorted[lower] * (1.0 - frac) + sorted[upper] * frac
            }
        }
    }
}

/// Finite entries only, in their original order.
pub fn valid_values(values: &[f64]) -> Vec<f64> {
    values.iter().copied().filter(|v| v.is_finite()).collect()
}

fn sorted_valid(values: &[f64]) -> Vec<f64> {
    let mut v = valid_values(values);
    v.sort_by(f64::total_cmp);
    v
}

fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Mean of the lowest `max(1, floor(tail * n))` finite values.
pub fn cvar(values: &[f64], tail: f64) -> IntrinsicResult<f64> {
    if !(tail > 0.0 && tail <= 1.0) {
        return Err(IntrinsicError::InvalidInput {
            field: "tail".into(),
            reason: "Must be in (0, 1]".into(),
        });
    }
    let sorted = sorted_valid(values);
    if sorted.is_empty() {
        return Err(IntrinsicError::InsufficientData(
            "No valid values for CVaR".into(),
        ));
    }
    let k = ((tail * sorted.len() as f64).floor() as usize).max(1);
    Ok(mean(&sorted[..k]))
}

/// Divide every value by the share count. Sentinels stay NaN.
pub fn per_share_values(values: &[Money], shares_outstanding: f64) -> IntrinsicResult<Vec<f64>> {
    if !(shares_outstanding.is_finite() && shares_outstanding > 0.0) {
        return Err(IntrinsicError::InvalidInput {
            field: "shares_outstanding".into(),
            reason: "Must be positive".into(),
        });
    }
    Ok(values.iter().map(|v| v / shares_outstanding).collect())
}

/// Fraction of finite values strictly greater than `threshold`.
pub fn probability_above(values: &[f64], threshold: f64) -> IntrinsicResult<f64> {
    let valid = valid_values(values);
    if valid.is_empty() {
        return Err(IntrinsicError::InsufficientData(
            "No valid values to compare against threshold".into(),
        ));
    }
    let above = valid.iter().filter(|v| **v > threshold).count();
    Ok(above as f64 / valid.len() as f64)
}

/// Summarise a raw distribution (NaN sentinels allowed).
pub fn summarize(
    values: &[f64],
    shares_outstanding: Option<f64>,
    market_price: Option<f64>,
) -> IntrinsicResult<DistributionSummary> {
    let sorted = sorted_valid(values);
    let n = sorted.len();
    if n == 0 {
        return Err(IntrinsicError::InsufficientData(
            "Distribution contains no valid values".into(),
        ));
    }

    let mu = mean(&sorted);
    let variance = sorted.iter().map(|v| (v - mu).powi(2)).sum::<f64>() / n as f64;

    let per_share = match shares_outstanding {
        Some(shares) => {
            let ps = per_share_values(&sorted, shares)?;
            let probability_above_market = match market_price {
                Some(price) => Some(probability_above(&ps, price)?),
                None => None,
            };
            Some(PerShareSummary {
                shares_outstanding: shares,
                mean: mean(&ps),
                median: percentile_sorted(&ps, 50.0),
                percentiles: Percentiles::from_sorted(&ps),
                market_price,
                probability_above_market,
            })
        }
        None => None,
    };

    Ok(DistributionSummary {
        valid_count: n,
        invalid_count: values.len() - n,
        mean: mu,
        std_dev: variance.sqrt(),
        min: sorted[0],
        max: sorted[n - 1],
        percentiles: Percentiles::from_sorted(&sorted),
        cvar_5: cvar(&sorted, CVAR_TAIL)?,
        per_share,
    })
}

/// Equal-width histogram of the finite values.
///
/// With `clip_percentile`, values above that percentile are pulled down to
/// it so a long right tail does not flatten the chart.
pub fn build_histogram(
    values: &[f64],
    bins: usize,
    clip_percentile: Option<f64>,
) -> IntrinsicResult<Vec<HistogramBin>> {
    if bins == 0 {
        return Err(IntrinsicError::InvalidInput {
            field: "bins".into(),
            reason: "Must be at least 1".into(),
        });
    }
    let mut sorted = sorted_valid(values);
    if sorted.is_empty() {
        return Err(IntrinsicError::InsufficientData(
            "No valid values to bin".into(),
        ));
    }
    if let Some(p) = clip_percentile {
        let clip = percentile_sorted(&sorted, p);
        for v in &mut sorted {
            *v = v.min(clip);
        }
    }

    let min_val = sorted[0];
    let max_val = sorted[sorted.len() - 1];
    let n = sorted.len() as f64;

    if (max_val - min_val).abs() < f64::EPSILON {
        return Ok(vec![HistogramBin {
            lower: min_val,
            upper: max_val,
            count: sorted.len() as u32,
            frequency: 1.0,
        }]);
    }

    let width = (max_val - min_val) / bins as f64;
    let mut out: Vec<HistogramBin> = (0..bins)
        .map(|i| HistogramBin {
            lower: min_val + i as f64 * width,
            upper: if i == bins - 1 {
                max_val
            } else {
                min_val + (i + 1) as f64 * width
            },
            count: 0,
            frequency: 0.0,
        })
        .collect();

    for v in &sorted {
        let idx = (((v - min_val) / width).floor() as usize).min(bins - 1);
        out[idx].count += 1;
    }
    for bin in &mut out {
        bin.frequency = bin.count as f64 / n;
    }
    Ok(out)
}
