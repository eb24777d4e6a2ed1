pub mod cagr;
pub mod forecast;
pub mod simulate;
pub mod valuation;
