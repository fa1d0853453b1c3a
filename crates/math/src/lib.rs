/// Exact arithmetic for constant-product AMM swaps
///
/// This crate provides the rational amount type and the curve functions used
/// by the swapper to quote trades without any floating-point intermediate.

pub mod constant_product;
pub mod error;
pub mod rational;

// Re-export commonly used items
pub use constant_product::*;
pub use error::{MathError, MathResult};
pub use rational::{pow10, RationalAmount};
