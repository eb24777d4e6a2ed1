use intrinsic_core::forecast::{
    build_forecast, build_scenario_set, compute_cagr, project_revenue, AssumptionSet,
    ForecastFrame, FreeCashFlows, LineItem, Scenario, ScenarioAdjustments,
};
use intrinsic_core::IntrinsicError;
use pretty_assertions::assert_eq;
use rust_decimal_macros::dec;

fn sample_assumptions() -> AssumptionSet {
    AssumptionSet {
        last_revenue: 28_000.0,
        growth: 0.08,
        ebitda_margin: 0.34,
        capex_pct: 0.06,
        dep_pct: 0.05,
        wc_pct: 0.01,
        tax_rate: 0.21,
        years: 5,
        start_year: Some(2024),
    }
}

fn close(a: f64, b: f64) -> bool {
    (a - b).abs() <= 1e-9 * b.abs().max(1.0)
}

// ===========================================================================
// Forecast builder
// ===========================================================================

#[test]
fn test_forecast_has_one_row_per_year() {
    let table = build_forecast(&sample_assumptions());
    assert_eq!(table.len(), 5);
    assert_eq!(
        table.labels(),
        vec!["2025", "2026", "2027", "2028", "2029"]
    );
}

#[test]
fn test_forecast_revenue_matches_projection() {
    let a = sample_assumptions();
    let table = build_forecast(&a);
    let projected = project_revenue(a.last_revenue, a.growth, a.years);
    assert_eq!(table.column(LineItem::Revenue), projected);
}

#[test]
fn test_forecast_year_five_revenue() {
    let table = build_forecast(&sample_assumptions());
    let last = table.last().unwrap();
    // 28000 * 1.08^5
    assert!(close(last.revenue, 41_141.186_150_4));
}

#[test]
fn test_forecast_serializes_with_column_names() {
    let table = build_forecast(&sample_assumptions());
    let json = serde_json::to_value(&table).unwrap();
    let first = &json["rows"][0];
    for item in LineItem::ALL {
        assert!(
            first.get(item.column_name()).is_some(),
            "missing column {}",
            item.column_name()
        );
    }
}

#[test]
fn test_frame_round_trip_preserves_fcff() {
    let table = build_forecast(&sample_assumptions());
    let frame = table.to_frame();
    assert_eq!(frame.len(), 5);
    assert_eq!(
        frame.free_cash_flows().unwrap(),
        table.free_cash_flows().unwrap()
    );
}

#[test]
fn test_frame_without_fcff_reports_missing_column() {
    let frame = ForecastFrame::new(vec!["1".into(), "2".into()])
        .with_column("Revenue", vec![1.0, 2.0])
        .unwrap();
    match frame.free_cash_flows() {
        Err(IntrinsicError::MissingColumn { column }) => assert_eq!(column, "FCFF"),
        other => panic!("expected MissingColumn, got {other:?}"),
    }
}

// ===========================================================================
// Scenarios
// ===========================================================================

#[test]
fn test_scenarios_order_by_growth() {
    let set = build_scenario_set(&sample_assumptions(), &ScenarioAdjustments::default());
    let rev = |s: Scenario| set.get(s).last().unwrap().revenue;
    assert!(rev(Scenario::Bull) > rev(Scenario::Base));
    assert!(rev(Scenario::Base) > rev(Scenario::Bear));
}

#[test]
fn test_base_scenario_equals_plain_forecast() {
    let a = sample_assumptions();
    let set = build_scenario_set(&a, &ScenarioAdjustments::default());
    assert_eq!(set.get(Scenario::Base), &build_forecast(&a));
}

#[test]
fn test_bull_capex_scales_base_ratio() {
    let mut a = sample_assumptions();
    a.capex_pct = 0.10;
    let set = build_scenario_set(&a, &ScenarioAdjustments::default());
    let row = &set.get(Scenario::Bull).rows()[0];
    assert!(close(row.capex, row.revenue * 0.10 * 0.9));
}

// ===========================================================================
// CAGR
// ===========================================================================

#[test]
fn test_cagr_doubling_over_one_period() {
    let cagr = compute_cagr(&[dec!(100), dec!(200)], 1).unwrap();
    assert!((cagr - dec!(1)).abs() < dec!(0.0000001));
}

#[test]
fn test_cagr_single_value_is_insufficient() {
    assert!(matches!(
        compute_cagr(&[dec!(100)], 1),
        Err(IntrinsicError::InsufficientData(_))
    ));
}

#[test]
fn test_cagr_non_positive_start_is_insufficient() {
    assert!(matches!(
        compute_cagr(&[dec!(0), dec!(100)], 3),
        Err(IntrinsicError::InsufficientData(_))
    ));
}
