//! Error types for the swapper service

use raydium_swap_math::MathError;
use thiserror::Error;

use crate::ledger::LedgerError;

#[derive(Error, Debug)]
pub enum SwapError {
    #[error("Failed to load pool dataset: {0}")]
    Load(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Wallet error: {0}")]
    Wallet(String),

    #[error("No pool found for tokens {token_a} / {token_b}")]
    PoolNotFound { token_a: String, token_b: String },

    #[error("Insufficient liquidity: {0}")]
    InsufficientLiquidity(String),

    #[error("Estimated fee {estimated} lamports exceeds budget of {budget} lamports")]
    FeeBudgetExceeded { estimated: u64, budget: u64 },

    #[error("Transaction is {size} bytes, limit is {limit}")]
    TransactionTooLarge { size: usize, limit: usize },

    #[error("Transaction assembly error: {0}")]
    Transaction(String),

    #[error("Submission failed after {attempts} attempt(s): {source}")]
    SubmissionFailed {
        attempts: u32,
        #[source]
        source: LedgerError,
    },

    #[error("Ledger error: {0}")]
    Ledger(#[from] LedgerError),

    #[error("Arithmetic error: {0}")]
    Arithmetic(MathError),

    #[error("Report error: {0}")]
    Report(String),
}

impl SwapError {
    /// Errors that make the process unable to start at all
    pub fn is_fatal_at_startup(&self) -> bool {
        matches!(
            self,
            SwapError::Load(_) | SwapError::Config(_) | SwapError::Wallet(_)
        )
    }
}

impl From<MathError> for SwapError {
    fn from(err: MathError) -> Self {
        match err {
            MathError::InsufficientLiquidity { .. } => {
                SwapError::InsufficientLiquidity(err.to_string())
            }
            other => SwapError::Arithmetic(other),
        }
    }
}

impl From<std::io::Error> for SwapError {
    fn from(err: std::io::Error) -> Self {
        SwapError::Report(err.to_string())
    }
}

impl From<serde_json::Error> for SwapError {
    fn from(err: serde_json::Error) -> Self {
        SwapError::Report(err.to_string())
    }
}

pub type SwapResult<T> = Result<T, SwapError>;
