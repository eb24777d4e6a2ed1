pub mod error;
pub mod forecast;
pub mod types;

#[cfg(feature = "valuation")]
pub mod valuation;

#[cfg(feature = "monte_carlo")]
pub mod monte_carlo;

pub use error::IntrinsicError;
pub use types::*;

/// Standard result type for all intrinsic operations
pub type IntrinsicResult<T> = Result<T, IntrinsicError>;
