pub mod dcf;
pub mod wacc;

pub use dcf::{
    compute_dcf_value, discount_cash_flows, run_dcf, terminal_value_gordon, value_forecast,
    DcfBreakdown, DcfInput, DcfOutput, DiscountedCashFlows, DiscountingParameters,
};
pub use wacc::{calculate_wacc, wacc_calc, WaccInput, WaccOutput};
