/// Exact rational amounts
///
/// Every value produced by the curve math is kept as a numerator/denominator
/// pair of arbitrary-precision integers. Conversion to `f64` happens only at
/// the reporting boundary through [`RationalAmount::to_decimal`].

use std::cmp::Ordering;
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};
use std::str::FromStr;

use num::{BigInt, BigRational, Integer};
use num_traits::{One, Signed, ToPrimitive, Zero};

use crate::error::{MathError, MathResult};

/// Exact ratio of two big integers, always kept in lowest terms
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct RationalAmount {
    value: BigRational,
}

// ============================================================================
// Construction
// ============================================================================

impl RationalAmount {
    /// Build from a numerator/denominator pair
    pub fn new(numerator: impl Into<BigInt>, denominator: impl Into<BigInt>) -> MathResult<Self> {
        let numerator = numerator.into();
        let denominator = denominator.into();
        if denominator.is_zero() {
            return Err(MathError::ZeroDenominator {
                context: format!("{}/0", numerator),
            });
        }
        Ok(Self {
            value: BigRational::new(numerator, denominator),
        })
    }

    /// Build from hex-encoded integers, optionally `0x`-prefixed and signed
    pub fn from_hex(numerator: &str, denominator: &str) -> MathResult<Self> {
        Self::new(parse_hex(numerator)?, parse_hex(denominator)?)
    }

    pub fn from_integer(value: impl Into<BigInt>) -> Self {
        Self {
            value: BigRational::from_integer(value.into()),
        }
    }

    /// Parse a plain decimal literal such as `0.125` or `-3` exactly
    pub fn from_decimal_str(input: &str) -> MathResult<Self> {
        let trimmed = input.trim();
        let malformed = || MathError::MalformedDecimal(input.to_string());

        let (negative, digits) = match trimmed.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
        };
        let (whole, fraction) = match digits.split_once('.') {
            Some((whole, fraction)) => (whole, fraction),
            None => (digits, ""),
        };
        if whole.is_empty() && fraction.is_empty() {
            return Err(malformed());
        }
        if !whole.chars().chain(fraction.chars()).all(|c| c.is_ascii_digit()) {
            return Err(malformed());
        }

        let mut numerator = BigInt::zero();
        for c in whole.chars().chain(fraction.chars()) {
            numerator = numerator * 10u32 + BigInt::from(c as u32 - '0' as u32);
        }
        if negative {
            numerator = -numerator;
        }
        Self::new(numerator, pow10(fraction.len() as u32))
    }

    /// Interpret an on-chain integer amount with the given token decimals
    pub fn from_raw_units(raw: u64, decimals: u8) -> Self {
        Self {
            value: BigRational::new(BigInt::from(raw), pow10(decimals as u32)),
        }
    }

    pub fn zero() -> Self {
        Self::from_integer(0)
    }

    pub fn one() -> Self {
        Self::from_integer(1)
    }
}

// ============================================================================
// Accessors and Conversions
// ============================================================================

impl RationalAmount {
    pub fn numerator(&self) -> &BigInt {
        self.value.numer()
    }

    pub fn denominator(&self) -> &BigInt {
        self.value.denom()
    }

    /// Nearest `f64`. Display and reporting only.
    pub fn to_decimal(&self) -> f64 {
        self.value.to_f64().unwrap_or(f64::NAN)
    }

    /// Exact decimal string truncated (toward negative infinity) to `places`
    pub fn to_decimal_string(&self, places: u32) -> String {
        let scale = pow10(places);
        let scaled = (self.value.clone() * BigRational::from_integer(scale.clone())).floor();
        let scaled = scaled.to_integer();
        let negative = scaled.is_negative();
        let (whole, fraction) = scaled.abs().div_rem(&scale);
        let sign = if negative { "-" } else { "" };
        if places == 0 {
            return format!("{}{}", sign, whole);
        }
        format!(
            "{}{}.{:0>width$}",
            sign,
            whole,
            fraction,
            width = places as usize
        )
    }

    pub fn is_zero(&self) -> bool {
        self.value.is_zero()
    }

    pub fn is_positive(&self) -> bool {
        self.value.is_positive()
    }

    pub fn is_negative(&self) -> bool {
        self.value.is_negative()
    }

    pub fn abs(&self) -> Self {
        Self {
            value: self.value.abs(),
        }
    }

    pub fn floor(&self) -> BigInt {
        self.value.floor().to_integer()
    }

    pub fn ceil(&self) -> BigInt {
        self.value.ceil().to_integer()
    }

    /// Division that reports a zero divisor instead of panicking
    pub fn checked_div(&self, divisor: &Self) -> MathResult<Self> {
        if divisor.is_zero() {
            return Err(MathError::zero_denominator(&format!("{} / 0", self)));
        }
        Ok(Self {
            value: &self.value / &divisor.value,
        })
    }

    /// Round down to the nearest representable on-chain unit
    pub fn floor_to_units(&self, decimals: u8) -> Self {
        let scale = pow10(decimals as u32);
        let raw = (self.value.clone() * BigRational::from_integer(scale.clone())).floor();
        Self {
            value: raw / BigRational::from_integer(scale),
        }
    }

    /// Round up to the nearest representable on-chain unit
    pub fn ceil_to_units(&self, decimals: u8) -> Self {
        let scale = pow10(decimals as u32);
        let raw = (self.value.clone() * BigRational::from_integer(scale.clone())).ceil();
        Self {
            value: raw / BigRational::from_integer(scale),
        }
    }

    /// `floor(self * 10^decimals)` as a `u64`
    pub fn to_raw_units_floor(&self, decimals: u8) -> MathResult<u64> {
        let scaled = self * &Self::from_integer(pow10(decimals as u32));
        to_u64(scaled.floor())
    }

    /// `ceil(self * 10^decimals)` as a `u64`
    pub fn to_raw_units_ceil(&self, decimals: u8) -> MathResult<u64> {
        let scaled = self * &Self::from_integer(pow10(decimals as u32));
        to_u64(scaled.ceil())
    }
}

// ============================================================================
// Operators
// ============================================================================

impl<'a> Add<&'a RationalAmount> for &'a RationalAmount {
    type Output = RationalAmount;

    fn add(self, rhs: &'a RationalAmount) -> RationalAmount {
        RationalAmount {
            value: &self.value + &rhs.value,
        }
    }
}

impl<'a> Sub<&'a RationalAmount> for &'a RationalAmount {
    type Output = RationalAmount;

    fn sub(self, rhs: &'a RationalAmount) -> RationalAmount {
        RationalAmount {
            value: &self.value - &rhs.value,
        }
    }
}

impl<'a> Mul<&'a RationalAmount> for &'a RationalAmount {
    type Output = RationalAmount;

    fn mul(self, rhs: &'a RationalAmount) -> RationalAmount {
        RationalAmount {
            value: &self.value * &rhs.value,
        }
    }
}

impl Add for RationalAmount {
    type Output = RationalAmount;

    fn add(self, rhs: RationalAmount) -> RationalAmount {
        &self + &rhs
    }
}

impl Sub for RationalAmount {
    type Output = RationalAmount;

    fn sub(self, rhs: RationalAmount) -> RationalAmount {
        &self - &rhs
    }
}

impl Mul for RationalAmount {
    type Output = RationalAmount;

    fn mul(self, rhs: RationalAmount) -> RationalAmount {
        &self * &rhs
    }
}

impl Neg for RationalAmount {
    type Output = RationalAmount;

    fn neg(self) -> RationalAmount {
        RationalAmount { value: -self.value }
    }
}

impl PartialOrd for RationalAmount {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RationalAmount {
    fn cmp(&self, other: &Self) -> Ordering {
        self.value.cmp(&other.value)
    }
}

impl From<u64> for RationalAmount {
    fn from(value: u64) -> Self {
        Self::from_integer(value)
    }
}

impl FromStr for RationalAmount {
    type Err = MathError;

    fn from_str(s: &str) -> MathResult<Self> {
        Self::from_decimal_str(s)
    }
}

impl fmt::Display for RationalAmount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.value.denom().is_one() {
            write!(f, "{}", self.value.numer())
        } else {
            write!(f, "{}/{}", self.value.numer(), self.value.denom())
        }
    }
}

// ============================================================================
// Helpers
// ============================================================================

/// `10^exp` as a big integer
pub fn pow10(exp: u32) -> BigInt {
    BigInt::from(10u32).pow(exp)
}

fn parse_hex(input: &str) -> MathResult<BigInt> {
    let malformed = || MathError::MalformedInteger {
        value: input.to_string(),
        radix: 16,
    };
    let trimmed = input.trim();
    let (negative, body) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed),
    };
    let body = body
        .strip_prefix("0x")
        .or_else(|| body.strip_prefix("0X"))
        .unwrap_or(body);
    if body.is_empty() {
        return Err(malformed());
    }
    let magnitude = BigInt::parse_bytes(body.as_bytes(), 16).ok_or_else(malformed)?;
    Ok(if negative { -magnitude } else { magnitude })
}

fn to_u64(value: BigInt) -> MathResult<u64> {
    value.to_u64().ok_or_else(|| MathError::AmountOverflow {
        value: value.to_string(),
        target: "u64",
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_denominator_rejected() {
        assert!(matches!(
            RationalAmount::new(5, 0),
            Err(MathError::ZeroDenominator { .. })
        ));
        assert!(RationalAmount::from_hex("0x5", "0x0").is_err());
    }

    #[test]
    fn test_hex_parsing() {
        let value = RationalAmount::from_hex("0x1f4", "3e8").unwrap();
        assert_eq!(value, RationalAmount::new(1, 2).unwrap());

        let negative = RationalAmount::from_hex("-0xa", "0x4").unwrap();
        assert_eq!(negative, RationalAmount::new(-5, 2).unwrap());

        assert!(matches!(
            RationalAmount::from_hex("0xzz", "1"),
            Err(MathError::MalformedInteger { radix: 16, .. })
        ));
        assert!(RationalAmount::from_hex("0x", "1").is_err());
    }

    #[test]
    fn test_to_decimal_is_stable() {
        let value = RationalAmount::from_hex("c2d46c", "1f").unwrap();
        let first = value.to_decimal();
        let second = value.to_decimal();
        assert_eq!(first, second);
        assert_eq!(value, RationalAmount::from_hex("c2d46c", "1f").unwrap());
        assert!((first - 12768364.0 / 31.0).abs() < 1e-6);
    }

    #[test]
    fn test_decimal_parsing() {
        assert_eq!(
            RationalAmount::from_decimal_str("0.125").unwrap(),
            RationalAmount::new(1, 8).unwrap()
        );
        assert_eq!(
            RationalAmount::from_decimal_str("-3").unwrap(),
            RationalAmount::from_integer(-3)
        );
        assert_eq!(
            RationalAmount::from_decimal_str(".5").unwrap(),
            RationalAmount::new(1, 2).unwrap()
        );
        assert!(RationalAmount::from_decimal_str("").is_err());
        assert!(RationalAmount::from_decimal_str("1.2.3").is_err());
        assert!(RationalAmount::from_decimal_str("abc").is_err());
    }

    #[test]
    fn test_raw_unit_rounding() {
        let value = RationalAmount::new(10, 3).unwrap(); // 3.333...
        assert_eq!(value.to_raw_units_floor(2).unwrap(), 333);
        assert_eq!(value.to_raw_units_ceil(2).unwrap(), 334);
        assert_eq!(value.floor_to_units(2), RationalAmount::new(333, 100).unwrap());
        assert_eq!(value.ceil_to_units(2), RationalAmount::new(334, 100).unwrap());

        let too_big = RationalAmount::from_integer(BigInt::from(u64::MAX) + 1);
        assert!(matches!(
            too_big.to_raw_units_floor(0),
            Err(MathError::AmountOverflow { .. })
        ));
    }

    #[test]
    fn test_decimal_string() {
        let value = RationalAmount::new(798000, 40399).unwrap();
        assert_eq!(value.to_decimal_string(4), "19.7529");
        assert_eq!(RationalAmount::new(-1, 4).unwrap().to_decimal_string(1), "-0.3");
        assert_eq!(RationalAmount::from_integer(7).to_decimal_string(0), "7");
    }

    #[test]
    fn test_checked_div() {
        let a = RationalAmount::new(3, 4).unwrap();
        let b = RationalAmount::new(3, 8).unwrap();
        assert_eq!(a.checked_div(&b).unwrap(), RationalAmount::from_integer(2));
        assert!(a.checked_div(&RationalAmount::zero()).is_err());
    }
}
