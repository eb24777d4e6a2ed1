pub mod builder;
pub mod growth;
pub mod scenario;
pub mod table;

pub use builder::{build_forecast, project_margin, project_revenue, AssumptionSet};
pub use growth::{cagr_from_endpoints, compute_cagr};
pub use scenario::{
    build_scenario_from_base, build_scenario_set, Scenario, ScenarioAdjustment,
    ScenarioAdjustments, ScenarioSet,
};
pub use table::{ForecastFrame, ForecastRow, ForecastTable, FreeCashFlows, LineItem};
