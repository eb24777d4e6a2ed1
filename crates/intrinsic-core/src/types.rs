use serde::{Deserialize, Serialize};

/// Currency amounts in the forecast, valuation and simulation engine.
pub type Money = f64;

/// Rates expressed as fractions (0.05 = 5%). Never as percentages.
pub type Rate = f64;

/// A single forecast year.
///
/// `index` is the relative year (1 = first forecast year). `year` carries the
/// absolute calendar year when the forecast was anchored to a start year.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForecastPeriod {
    pub index: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub year: Option<i32>,
}

impl ForecastPeriod {
    pub fn new(index: u32, start_year: Option<i32>) -> Self {
        Self {
            index,
            year: start_year.map(|y| y + index as i32),
        }
    }

    /// Row label: the calendar year if anchored, otherwise the relative index.
    pub fn label(&self) -> String {
        match self.year {
            Some(y) => y.to_string(),
            None => self.index.to_string(),
        }
    }
}

/// Numeric representation a computation was carried out in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Precision {
    Ieee754F64,
    RustDecimal128bit,
}

impl Precision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Precision::Ieee754F64 => "ieee754_f64",
            Precision::RustDecimal128bit => "rust_decimal_128bit",
        }
    }
}

/// Standard computation output envelope
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationOutput<T: Serialize> {
    pub result: T,
    pub methodology: String,
    pub assumptions: serde_json::Value,
    pub warnings: Vec<String>,
    pub metadata: ComputationMetadata,
}

/// Metadata for every computation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputationMetadata {
    pub version: String,
    pub computation_time_us: u64,
    pub precision: String,
}

/// Helper to wrap computation results with metadata
pub fn with_metadata<T: Serialize>(
    methodology: &str,
    assumptions: &impl Serialize,
    warnings: Vec<String>,
    elapsed_us: u64,
    precision: Precision,
    result: T,
) -> ComputationOutput<T> {
    ComputationOutput {
        result,
        methodology: methodology.to_string(),
        assumptions: serde_json::to_value(assumptions).unwrap_or_default(),
        warnings,
        metadata: ComputationMetadata {
            version: env!("CARGO_PKG_VERSION").to_string(),
            computation_time_us: elapsed_us,
            precision: precision.as_str().to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_period_label_relative() {
        let p = ForecastPeriod::new(3, None);
        assert_eq!(p.label(), "3");
        assert!(p.year.is_none());
    }

    #[test]
    fn test_period_label_anchored() {
        let p = ForecastPeriod::new(1, Some(2024));
        assert_eq!(p.year, Some(2025));
        assert_eq!(p.label(), "2025");
    }

    #[test]
    fn test_metadata_precision_label() {
        let out = with_metadata("test", &(), Vec::new(), 0, Precision::Ieee754F64, 1.0_f64);
        assert_eq!(out.metadata.precision, "ieee754_f64");
    }
}
