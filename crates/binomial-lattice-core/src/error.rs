use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LatticeError {
    #[error("Invalid parameter: {field} — {reason}")]
    InvalidParameter { field: String, reason: String },

    #[error("Arithmetic degeneracy: risk-neutral probability {probability} lies outside [0, 1]")]
    ArithmeticDegeneracy { probability: Decimal },

    #[error("Numeric range exceeded in {context}")]
    NumericRange { context: String },

    #[error("Serialization error: {0}")]
    SerializationError(String),
}

impl From<serde_json::Error> for LatticeError {
    fn from(e: serde_json::Error) -> Self {
        LatticeError::SerializationError(e.to_string())
    }
}
