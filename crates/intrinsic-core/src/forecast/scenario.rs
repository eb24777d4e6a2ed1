use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::Rate;

use super::builder::{build_forecast, project_margin, AssumptionSet};
use super::table::ForecastTable;

/// Named deterministic scenarios.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Scenario {
    Base,
    Bull,
    Bear,
}

impl Scenario {
    pub const ALL: [Scenario; 3] = [Scenario::Base, Scenario::Bull, Scenario::Bear];
}

impl fmt::Display for Scenario {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Scenario::Base => "Base",
            Scenario::Bull => "Bull",
            Scenario::Bear => "Bear",
        };
        f.write_str(s)
    }
}

/// Multiplicative/additive tweaks applied to a base assumption set.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScenarioAdjustment {
    /// Scales the base growth rate
    #[serde(default = "one")]
    pub growth_mul: Rate,
    /// Added to the base EBITDA margin
    #[serde(default)]
    pub margin_delta: Rate,
    /// Scales the base capex ratio
    #[serde(default = "one")]
    pub capex_mul: Rate,
}

fn one() -> Rate {
    1.0
}

impl Default for ScenarioAdjustment {
    fn default() -> Self {
        Self::IDENTITY
    }
}

impl ScenarioAdjustment {
    pub const IDENTITY: ScenarioAdjustment = ScenarioAdjustment {
        growth_mul: 1.0,
        margin_delta: 0.0,
        capex_mul: 1.0,
    };

    /// Derive the adjusted assumption set.
    ///
    /// `capex_pct` scales the base set's own capex ratio.
    pub fn apply(&self, base: &AssumptionSet) -> AssumptionSet {
        AssumptionSet {
            growth: base.growth * self.growth_mul,
            ebitda_margin: project_margin(base.ebitda_margin, self.margin_delta),
            capex_pct: base.capex_pct * self.capex_mul,
            ..base.clone()
        }
    }
}

/// Adjustments for the three named scenarios.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioAdjustments {
    #[serde(default)]
    pub base: ScenarioAdjustment,
    #[serde(default = "default_bull")]
    pub bull: ScenarioAdjustment,
    #[serde(default = "default_bear")]
    pub bear: ScenarioAdjustment,
}

fn default_bull() -> ScenarioAdjustment {
    ScenarioAdjustment {
        growth_mul: 1.25,
        margin_delta: 0.02,
        capex_mul: 0.9,
    }
}

fn default_bear() -> ScenarioAdjustment {
    ScenarioAdjustment {
        growth_mul: 0.5,
        margin_delta: -0.03,
        capex_mul: 1.15,
    }
}

impl Default for ScenarioAdjustments {
    fn default() -> Self {
        Self {
            base: ScenarioAdjustment::IDENTITY,
            bull: default_bull(),
            bear: default_bear(),
        }
    }
}

impl ScenarioAdjustments {
    pub fn get(&self, scenario: Scenario) -> &ScenarioAdjustment {
        match scenario {
            Scenario::Base => &self.base,
            Scenario::Bull => &self.bull,
            Scenario::Bear => &self.bear,
        }
    }
}

/// One forecast per named scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioSet {
    pub base: ForecastTable,
    pub bull: ForecastTable,
    pub bear: ForecastTable,
}

impl ScenarioSet {
    pub fn get(&self, scenario: Scenario) -> &ForecastTable {
        match scenario {
            Scenario::Base => &self.base,
            Scenario::Bull => &self.bull,
            Scenario::Bear => &self.bear,
        }
    }
}

/// Build a forecast from a base assumption set and one adjustment.
pub fn build_scenario_from_base(
    base: &AssumptionSet,
    adjustment: &ScenarioAdjustment,
) -> ForecastTable {
    build_forecast(&adjustment.apply(base))
}

/// Build Base, Bull and Bear forecasts from one base assumption set.
pub fn build_scenario_set(base: &AssumptionSet, adjustments: &ScenarioAdjustments) -> ScenarioSet {
    ScenarioSet {
        base: build_scenario_from_base(base, &adjustments.base),
        bull: build_scenario_from_base(base, &adjustments.bull),
        bear: build_scenario_from_base(base, &adjustments.bear),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::forecast::table::LineItem;

    fn base() -> AssumptionSet {
        AssumptionSet {
            last_revenue: 1000.0,
            growth: 0.08,
            ebitda_margin: 0.30,
            capex_pct: 0.04,
            dep_pct: 0.03,
            wc_pct: 0.01,
            tax_rate: 0.25,
            years: 5,
            start_year: Some(2024),
        }
    }

    #[test]
    fn test_identity_adjustment_preserves_base() {
        let adjusted = ScenarioAdjustment::IDENTITY.apply(&base());
        assert_eq!(adjusted, base());
    }

    #[test]
    fn test_capex_scales_base_ratio() {
        let adj = ScenarioAdjustment {
            growth_mul: 1.0,
            margin_delta: 0.0,
            capex_mul: 1.5,
        };
        let adjusted = adj.apply(&base());
        // 0.04 * 1.5, not 0.06 * 1.5
        assert!((adjusted.capex_pct - 0.06).abs() < 1e-12);
    }

    #[test]
    fn test_growth_and_margin_adjustment() {
        let adj = ScenarioAdjustment {
            growth_mul: 0.5,
            margin_delta: -0.05,
            capex_mul: 1.0,
        };
        let adjusted = adj.apply(&base());
        assert!((adjusted.growth - 0.04).abs() < 1e-12);
        assert!((adjusted.ebitda_margin - 0.25).abs() < 1e-12);
        assert_eq!(adjusted.dep_pct, base().dep_pct);
        assert_eq!(adjusted.start_year, Some(2024));
    }

    #[test]
    fn test_scenario_set_ordering_of_revenue() {
        let set = build_scenario_set(&base(), &ScenarioAdjustments::default());
        let last = |s: Scenario| *set.get(s).column(LineItem::Revenue).last().unwrap();
        assert!(last(Scenario::Bull) > last(Scenario::Base));
        assert!(last(Scenario::Base) > last(Scenario::Bear));
    }

    #[test]
    fn test_base_scenario_equals_plain_forecast() {
        let set = build_scenario_set(&base(), &ScenarioAdjustments::default());
        assert_eq!(set.base, build_forecast(&base()));
    }

    #[test]
    fn test_partial_adjustment_deserializes_with_defaults() {
        let adj: ScenarioAdjustment = serde_json::from_str(r#"{"growth_mul":1.2}"#).unwrap();
        assert_eq!(adj.margin_delta, 0.0);
        assert_eq!(adj.capex_mul, 1.0);
    }
}
