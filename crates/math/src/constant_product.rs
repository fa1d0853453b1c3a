/// Constant-product curve math (`x * y = k`)
///
/// All amounts are raw on-chain units held as exact rationals. Results are
/// never rounded here; callers round to whole units where the ledger needs it.

use crate::error::{MathError, MathResult};
use crate::rational::RationalAmount;

/// Pool reserves oriented along the direction of a trade
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CurveReserves {
    /// Reserve of the token being sold into the pool
    pub reserve_in: RationalAmount,
    /// Reserve of the token being bought from the pool
    pub reserve_out: RationalAmount,
}

impl CurveReserves {
    pub fn new(reserve_in: RationalAmount, reserve_out: RationalAmount) -> MathResult<Self> {
        if !reserve_in.is_positive() {
            return Err(MathError::non_positive("reserve_in", &reserve_in));
        }
        if !reserve_out.is_positive() {
            return Err(MathError::non_positive("reserve_out", &reserve_out));
        }
        Ok(Self {
            reserve_in,
            reserve_out,
        })
    }

    pub fn from_raw(reserve_in: u64, reserve_out: u64) -> MathResult<Self> {
        Self::new(reserve_in.into(), reserve_out.into())
    }

    /// Marginal price before the trade: `reserve_out / reserve_in`
    pub fn spot_price(&self) -> MathResult<RationalAmount> {
        self.reserve_out.checked_div(&self.reserve_in)
    }
}

// ============================================================================
// Swap Amounts
// ============================================================================

/// Output for an exact input: `in' * R_out / (R_in + in')` with `in' = in * (1 - fee)`
pub fn amount_out_for_exact_in(
    reserves: &CurveReserves,
    amount_in: &RationalAmount,
    fee_rate: &RationalAmount,
) -> MathResult<RationalAmount> {
    validate_rate("fee rate", fee_rate)?;
    if !amount_in.is_positive() {
        return Err(MathError::non_positive("amount_in", amount_in));
    }

    let effective_in = amount_in * &(&RationalAmount::one() - fee_rate);
    let numerator = &effective_in * &reserves.reserve_out;
    let denominator = &reserves.reserve_in + &effective_in;
    numerator.checked_div(&denominator)
}

/// Input required for an exact output, solving the same curve backward
pub fn amount_in_for_exact_out(
    reserves: &CurveReserves,
    amount_out: &RationalAmount,
    fee_rate: &RationalAmount,
) -> MathResult<RationalAmount> {
    validate_rate("fee rate", fee_rate)?;
    if !amount_out.is_positive() {
        return Err(MathError::non_positive("amount_out", amount_out));
    }
    if amount_out >= &reserves.reserve_out {
        return Err(MathError::InsufficientLiquidity {
            requested: amount_out.to_string(),
            available: reserves.reserve_out.to_string(),
        });
    }

    let remaining = &reserves.reserve_out - amount_out;
    let effective_in = (&reserves.reserve_in * amount_out).checked_div(&remaining)?;
    effective_in.checked_div(&(&RationalAmount::one() - fee_rate))
}

/// Fee charged on the input leg
pub fn fee_on_input(amount_in: &RationalAmount, fee_rate: &RationalAmount) -> MathResult<RationalAmount> {
    validate_rate("fee rate", fee_rate)?;
    Ok(amount_in * fee_rate)
}

// ============================================================================
// Price and Slippage
// ============================================================================

/// Relative deviation of the execution price from the pre-trade price
pub fn price_impact(
    current_price: &RationalAmount,
    execution_price: &RationalAmount,
) -> MathResult<RationalAmount> {
    (execution_price - current_price).checked_div(current_price)
}

/// Lowest acceptable output under a slippage tolerance
pub fn apply_slippage_down(
    amount: &RationalAmount,
    tolerance: &RationalAmount,
) -> MathResult<RationalAmount> {
    validate_rate("slippage tolerance", tolerance)?;
    Ok(amount * &(&RationalAmount::one() - tolerance))
}

/// Highest acceptable input under a slippage tolerance
pub fn apply_slippage_up(
    amount: &RationalAmount,
    tolerance: &RationalAmount,
) -> MathResult<RationalAmount> {
    validate_rate("slippage tolerance", tolerance)?;
    Ok(amount * &(&RationalAmount::one() + tolerance))
}

/// Rate from basis points (`25` -> `25/10000`)
pub fn rate_from_bps(bps: u32) -> RationalAmount {
    RationalAmount::from_integer(bps)
        .checked_div(&RationalAmount::from_integer(10_000))
        .unwrap_or_else(|_| RationalAmount::zero())
}

fn validate_rate(name: &'static str, rate: &RationalAmount) -> MathResult<()> {
    if rate.is_negative() || rate >= &RationalAmount::one() {
        return Err(MathError::InvalidRate {
            name,
            value: rate.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn raydium_fee() -> RationalAmount {
        RationalAmount::new(25, 10_000).unwrap()
    }

    #[test]
    fn test_exact_in_reference_pool() {
        // 10 * 2000 * 0.9975 / (1000 + 10 * 0.9975)
        let reserves = CurveReserves::from_raw(1000, 2000).unwrap();
        let out = amount_out_for_exact_in(&reserves, &10u64.into(), &raydium_fee()).unwrap();
        assert_eq!(out, RationalAmount::new(798_000, 40_399).unwrap());
        assert!((out.to_decimal() - 19.752964).abs() < 1e-6);
    }

    #[test]
    fn test_exact_out_inverts_exact_in() {
        let reserves = CurveReserves::from_raw(1000, 2000).unwrap();
        let target = RationalAmount::new(798_000, 40_399).unwrap();
        let amount_in = amount_in_for_exact_out(&reserves, &target, &raydium_fee()).unwrap();
        assert_eq!(amount_in, RationalAmount::from_integer(10));
    }

    #[test]
    fn test_exact_out_beyond_reserves() {
        let reserves = CurveReserves::from_raw(1000, 2000).unwrap();
        let result = amount_in_for_exact_out(&reserves, &2000u64.into(), &raydium_fee());
        assert!(matches!(result, Err(MathError::InsufficientLiquidity { .. })));
    }

    #[test]
    fn test_rejects_bad_inputs() {
        assert!(CurveReserves::from_raw(0, 10).is_err());
        let reserves = CurveReserves::from_raw(10, 10).unwrap();
        assert!(amount_out_for_exact_in(&reserves, &RationalAmount::zero(), &raydium_fee()).is_err());
        assert!(amount_out_for_exact_in(&reserves, &1u64.into(), &RationalAmount::one()).is_err());
        assert!(apply_slippage_down(&1u64.into(), &RationalAmount::from_integer(-1)).is_err());
    }

    #[test]
    fn test_price_impact_is_relative_gap() {
        let reserves = CurveReserves::from_raw(1000, 2000).unwrap();
        let current = reserves.spot_price().unwrap();
        let amount_in = RationalAmount::from_integer(10);
        let out = amount_out_for_exact_in(&reserves, &amount_in, &raydium_fee()).unwrap();
        let execution = out.checked_div(&amount_in).unwrap();
        let impact = price_impact(&current, &execution).unwrap();

        let rebuilt = &current * &(&RationalAmount::one() + &impact);
        assert_eq!(rebuilt, execution);
        assert!(impact.is_negative());
    }

    #[test]
    fn test_rate_from_bps() {
        assert_eq!(rate_from_bps(25), raydium_fee());
        assert_eq!(rate_from_bps(0), RationalAmount::zero());
    }

    proptest! {
        #[test]
        fn prop_fee_strictly_reduces_output(
            reserve_in in 1u64..1_000_000_000_000,
            reserve_out in 1u64..1_000_000_000_000,
            amount_in in 1u64..1_000_000_000,
        ) {
            let reserves = CurveReserves::from_raw(reserve_in, reserve_out).unwrap();
            let amount_in = RationalAmount::from(amount_in);
            let out = amount_out_for_exact_in(&reserves, &amount_in, &raydium_fee()).unwrap();
            let naive = (&amount_in * &reserves.reserve_out)
                .checked_div(&reserves.reserve_in)
                .unwrap();

            prop_assert!(out.is_positive());
            prop_assert!(out < naive);
            prop_assert!(out < reserves.reserve_out);
        }

        #[test]
        fn prop_slippage_never_raises_minimum(
            amount in 1u64..u64::MAX,
            bps in 0u32..10_000,
        ) {
            let amount = RationalAmount::from(amount);
            let tolerance = rate_from_bps(bps);
            let minimum = apply_slippage_down(&amount, &tolerance).unwrap();

            prop_assert!(minimum <= amount);
            prop_assert_eq!(minimum == amount, bps == 0);
        }
    }
}
