use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::IntrinsicError;
use crate::types::{ForecastPeriod, Money};
use crate::IntrinsicResult;

// ---------------------------------------------------------------------------
// Line items
// ---------------------------------------------------------------------------

/// The eight computed columns of a forecast table, in display order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum LineItem {
    Revenue,
    Ebitda,
    Depreciation,
    Ebit,
    Nopat,
    Capex,
    DeltaWorkingCapital,
    Fcff,
}

impl LineItem {
    pub const ALL: [LineItem; 8] = [
        LineItem::Revenue,
        LineItem::Ebitda,
        LineItem::Depreciation,
        LineItem::Ebit,
        LineItem::Nopat,
        LineItem::Capex,
        LineItem::DeltaWorkingCapital,
        LineItem::Fcff,
    ];

    /// Column header used in tables and CSV exports.
    pub fn column_name(&self) -> &'static str {
        match self {
            LineItem::Revenue => "Revenue",
            LineItem::Ebitda => "EBITDA",
            LineItem::Depreciation => "Depreciation",
            LineItem::Ebit => "EBIT",
            LineItem::Nopat => "NOPAT",
            LineItem::Capex => "Capex",
            LineItem::DeltaWorkingCapital => "ΔWorkingCapital",
            LineItem::Fcff => "FCFF",
        }
    }

    fn value_in(&self, row: &ForecastRow) -> Money {
        match self {
            LineItem::Revenue => row.revenue,
            LineItem::Ebitda => row.ebitda,
            LineItem::Depreciation => row.depreciation,
            LineItem::Ebit => row.ebit,
            LineItem::Nopat => row.nopat,
            LineItem::Capex => row.capex,
            LineItem::DeltaWorkingCapital => row.delta_working_capital,
            LineItem::Fcff => row.fcff,
        }
    }
}

impl fmt::Display for LineItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column_name())
    }
}

impl FromStr for LineItem {
    type Err = IntrinsicError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        LineItem::ALL
            .iter()
            .copied()
            .find(|item| item.column_name() == trimmed)
            // Plain-ASCII alias for the working-capital header
            .or(match trimmed {
                "DeltaWorkingCapital" | "WorkingCapital" => Some(LineItem::DeltaWorkingCapital),
                _ => None,
            })
            .ok_or_else(|| IntrinsicError::InvalidInput {
                field: "line_item".into(),
                reason: format!("Unknown forecast column '{trimmed}'"),
            })
    }
}

// ---------------------------------------------------------------------------
// Typed forecast table
// ---------------------------------------------------------------------------

/// One forecast year.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRow {
    #[serde(flatten)]
    pub period: ForecastPeriod,
    #[serde(rename = "Revenue")]
    pub revenue: Money,
    #[serde(rename = "EBITDA")]
    pub ebitda: Money,
    #[serde(rename = "Depreciation")]
    pub depreciation: Money,
    #[serde(rename = "EBIT")]
    pub ebit: Money,
    #[serde(rename = "NOPAT")]
    pub nopat: Money,
    #[serde(rename = "Capex")]
    pub capex: Money,
    #[serde(rename = "ΔWorkingCapital")]
    pub delta_working_capital: Money,
    #[serde(rename = "FCFF")]
    pub fcff: Money,
}

/// Chronologically ordered forecast, year 1 first. Immutable once built.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastTable {
    rows: Vec<ForecastRow>,
}

impl ForecastTable {
    pub(crate) fn from_rows(rows: Vec<ForecastRow>) -> Self {
        Self { rows }
    }

    pub fn rows(&self) -> &[ForecastRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn last(&self) -> Option<&ForecastRow> {
        self.rows.last()
    }

    /// Extract one column in row order.
    pub fn column(&self, item: LineItem) -> Vec<Money> {
        self.rows.iter().map(|r| item.value_in(r)).collect()
    }

    /// Row labels (calendar years when anchored, else 1..N).
    pub fn labels(&self) -> Vec<String> {
        self.rows.iter().map(|r| r.period.label()).collect()
    }

    /// Column-oriented copy keyed by the display column names.
    pub fn to_frame(&self) -> ForecastFrame {
        ForecastFrame {
            labels: self.labels(),
            columns: LineItem::ALL
                .iter()
                .map(|item| (item.column_name().to_string(), self.column(*item)))
                .collect(),
        }
    }
}

// ---------------------------------------------------------------------------
// Label-keyed frame
// ---------------------------------------------------------------------------

/// A loosely-typed forecast: row labels plus named numeric columns.
///
/// This is the shape a forecast takes after a round trip through an external
/// table (e.g. a CSV with the year as row label). Unlike [`ForecastTable`] it
/// may lack any column, including `FCFF`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ForecastFrame {
    labels: Vec<String>,
    columns: Vec<(String, Vec<Money>)>,
}

impl ForecastFrame {
    pub fn new(labels: Vec<String>) -> Self {
        Self {
            labels,
            columns: Vec::new(),
        }
    }

    /// Add (or replace) a column. Its length must match the row labels.
    pub fn with_column(mut self, name: &str, values: Vec<Money>) -> IntrinsicResult<Self> {
        if values.len() != self.labels.len() {
            return Err(IntrinsicError::InvalidInput {
                field: format!("column:{name}"),
                reason: format!(
                    "Column has {} values but the frame has {} rows",
                    values.len(),
                    self.labels.len()
                ),
            });
        }
        let name = name.trim().to_string();
        match self.columns.iter_mut().find(|(n, _)| *n == name) {
            Some((_, existing)) => *existing = values,
            None => self.columns.push((name, values)),
        }
        Ok(self)
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn column(&self, name: &str) -> Option<&[Money]> {
        self.columns
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_slice())
    }

    pub fn column_names(&self) -> impl Iterator<Item = &str> {
        self.columns.iter().map(|(n, _)| n.as_str())
    }
}

// ---------------------------------------------------------------------------
// FCFF extraction
// ---------------------------------------------------------------------------

/// Anything that can yield an ordered FCFF stream for years 1..N.
pub trait FreeCashFlows {
    fn free_cash_flows(&self) -> IntrinsicResult<Vec<Money>>;
}

impl FreeCashFlows for ForecastTable {
    fn free_cash_flows(&self) -> IntrinsicResult<Vec<Money>> {
        Ok(self.column(LineItem::Fcff))
    }
}

impl FreeCashFlows for ForecastFrame {
    fn free_cash_flows(&self) -> IntrinsicResult<Vec<Money>> {
        let name = LineItem::Fcff.column_name();
        self.column(name)
            .map(|v| v.to_vec())
            .ok_or_else(|| IntrinsicError::MissingColumn {
                column: name.to_string(),
            })
    }
}

impl FreeCashFlows for [Money] {
    fn free_cash_flows(&self) -> IntrinsicResult<Vec<Money>> {
        Ok(self.to_vec())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_frame() -> ForecastFrame {
        ForecastFrame::new(vec!["2025".into(), "2026".into()])
            .with_column("Revenue", vec![100.0, 110.0])
            .unwrap()
    }

    #[test]
    fn test_line_item_round_trip_names() {
        for item in LineItem::ALL {
            let parsed: LineItem = item.column_name().parse().unwrap();
            assert_eq!(parsed, item);
        }
    }

    #[test]
    fn test_line_item_ascii_alias() {
        let parsed: LineItem = "DeltaWorkingCapital".parse().unwrap();
        assert_eq!(parsed, LineItem::DeltaWorkingCapital);
        assert!("Dividends".parse::<LineItem>().is_err());
    }

    #[test]
    fn test_frame_missing_fcff() {
        let frame = sample_frame();
        match frame.free_cash_flows() {
            Err(IntrinsicError::MissingColumn { column }) => assert_eq!(column, "FCFF"),
            other => panic!("Expected MissingColumn, got {other:?}"),
        }
    }

    #[test]
    fn test_frame_with_fcff() {
        let frame = sample_frame().with_column("FCFF", vec![10.0, 12.0]).unwrap();
        assert_eq!(frame.free_cash_flows().unwrap(), vec![10.0, 12.0]);
        assert_eq!(frame.column_names().collect::<Vec<_>>(), vec!["Revenue", "FCFF"]);
    }

    #[test]
    fn test_frame_column_length_mismatch() {
        let result = sample_frame().with_column("FCFF", vec![1.0]);
        assert!(result.is_err());
    }

    #[test]
    fn test_frame_replaces_existing_column() {
        let frame = sample_frame().with_column("Revenue", vec![1.0, 2.0]).unwrap();
        assert_eq!(frame.column("Revenue").unwrap(), &[1.0, 2.0]);
        assert_eq!(frame.column_names().count(), 1);
    }
}
