use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum IntrinsicError {
    #[error("Invalid input: {field} — {reason}")]
    InvalidInput { field: String, reason: String },

    #[error("Missing column: forecast has no '{column}' column")]
    MissingColumn { column: String },

    #[error("Invalid discounting: WACC ({wacc}) must exceed terminal growth ({terminal_growth})")]
    InvalidDiscounting { wacc: f64, terminal_growth: f64 },

    #[error("Invalid capital weights: market debt + market equity must be positive (got {total})")]
    InvalidWeights { total: Decimal },

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Financial impossibility: {0}")]
    FinancialImpossibility(String),

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for IntrinsicError {
    fn from(e: serde_json::Error) -> Self {
        IntrinsicError::SerializationError(e.to_string())
    }
}
