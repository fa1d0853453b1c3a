//! Error types for exact swap arithmetic

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MathError {
    /// A rational was constructed with a zero denominator
    #[error("Zero denominator in {context}")]
    ZeroDenominator { context: String },

    /// An integer string could not be parsed in the given radix
    #[error("Malformed integer '{value}' (radix {radix})")]
    MalformedInteger { value: String, radix: u32 },

    /// A decimal string could not be parsed
    #[error("Malformed decimal '{0}'")]
    MalformedDecimal(String),

    /// The pool cannot satisfy the requested trade
    #[error("Insufficient liquidity: requested {requested}, available {available}")]
    InsufficientLiquidity { requested: String, available: String },

    /// An amount that must be strictly positive was not
    #[error("Amount must be positive in {context}, got {value}")]
    NonPositiveAmount { context: String, value: String },

    /// A fee rate or slippage tolerance outside `[0, 1)`
    #[error("Invalid {name}: {value} (expected 0 <= value < 1)")]
    InvalidRate { name: &'static str, value: String },

    /// A value does not fit the target integer width
    #[error("Amount {value} does not fit in {target}")]
    AmountOverflow { value: String, target: &'static str },
}

impl MathError {
    pub fn zero_denominator(context: &str) -> Self {
        MathError::ZeroDenominator {
            context: context.to_string(),
        }
    }

    pub fn non_positive(context: &str, value: impl ToString) -> Self {
        MathError::NonPositiveAmount {
            context: context.to_string(),
            value: value.to_string(),
        }
    }
}

pub type MathResult<T> = Result<T, MathError>;
