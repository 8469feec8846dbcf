//! Checked non-negative decimal numeric type backed by bigdecimal.
//!
//! Every quantity the tree tracks (liquidity, borrowed principal, fee rates,
//! fee accumulators) is non-negative by construction. Arithmetic that would
//! produce a negative value fails instead of clamping, so sign violations
//! surface as errors rather than silent corruption.

use bigdecimal::{BigDecimal, RoundingMode, Zero};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, AddAssign, Mul};
use std::str::FromStr;
use thiserror::Error;

/// Failures surfaced by the checked decimal arithmetic.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DecimalError {
    #[error("arithmetic produced a negative result")]
    NegativeResult,
    #[error("division by zero")]
    DivisionByZero,
    #[error("invalid decimal literal: {0}")]
    InvalidLiteral(String),
}

/// Non-negative arbitrary-precision decimal.
///
/// Addition and multiplication cannot leave the non-negative domain and are
/// exposed as operators. Subtraction and division are fallible and exposed as
/// checked methods.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UnsignedDecimal(BigDecimal);

impl UnsignedDecimal {
    /// The additive identity (0).
    pub fn zero() -> Self {
        UnsignedDecimal(BigDecimal::zero())
    }

    pub fn from_u64(value: u64) -> Self {
        UnsignedDecimal(BigDecimal::from(value))
    }

    /// Parse from a string losslessly. Scientific notation is accepted.
    ///
    /// # Errors
    /// Fails on malformed literals and on negative values.
    pub fn from_str_canonical(s: &str) -> Result<Self, DecimalError> {
        let value =
            BigDecimal::from_str(s).map_err(|_| DecimalError::InvalidLiteral(s.to_string()))?;
        if value < BigDecimal::zero() {
            return Err(DecimalError::NegativeResult);
        }
        Ok(UnsignedDecimal(value))
    }

    /// The Q64 fixed-point scale (`2^64`) used by the global fee-rate
    /// accumulators: rate deltas are "real rate times 2^64", so earnings
    /// computations divide by this constant to recover token amounts.
    pub fn q64() -> Self {
        let half = BigDecimal::from(1u64 << 32);
        UnsignedDecimal(&half * &half)
    }

    pub fn is_zero(&self) -> bool {
        self.0.is_zero()
    }

    /// Subtraction that fails instead of going negative.
    pub fn checked_sub(&self, rhs: &Self) -> Result<Self, DecimalError> {
        let out = &self.0 - &rhs.0;
        if out < BigDecimal::zero() {
            return Err(DecimalError::NegativeResult);
        }
        Ok(UnsignedDecimal(out))
    }

    /// Division keeping at most `precision` significant digits.
    pub fn div_with_prec(&self, rhs: &Self, precision: u64) -> Result<Self, DecimalError> {
        if rhs.0.is_zero() {
            return Err(DecimalError::DivisionByZero);
        }
        Ok(UnsignedDecimal((&self.0 / &rhs.0).with_prec(precision)))
    }

    /// Integer part (rounding toward zero). Used by the truncating fee mode
    /// that mirrors integer-only division in the on-chain twin.
    pub fn trunc(&self) -> Self {
        UnsignedDecimal(self.0.with_scale_round(0, RoundingMode::Down))
    }

    /// Format without exponent notation or trailing zeros.
    pub fn to_canonical_string(&self) -> String {
        format!("{}", self.0.normalized())
    }
}

impl fmt::Display for UnsignedDecimal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_canonical_string())
    }
}

impl FromStr for UnsignedDecimal {
    type Err = DecimalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_str_canonical(s)
    }
}

impl From<u64> for UnsignedDecimal {
    fn from(value: u64) -> Self {
        Self::from_u64(value)
    }
}

impl Add for &UnsignedDecimal {
    type Output = UnsignedDecimal;

    fn add(self, rhs: &UnsignedDecimal) -> UnsignedDecimal {
        UnsignedDecimal(&self.0 + &rhs.0)
    }
}

impl Add for UnsignedDecimal {
    type Output = UnsignedDecimal;

    fn add(self, rhs: UnsignedDecimal) -> UnsignedDecimal {
        UnsignedDecimal(self.0 + rhs.0)
    }
}

impl AddAssign<&UnsignedDecimal> for UnsignedDecimal {
    fn add_assign(&mut self, rhs: &UnsignedDecimal) {
        self.0 += &rhs.0;
    }
}

impl Mul for &UnsignedDecimal {
    type Output = UnsignedDecimal;

    fn mul(self, rhs: &UnsignedDecimal) -> UnsignedDecimal {
        UnsignedDecimal(&self.0 * &rhs.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> UnsignedDecimal {
        UnsignedDecimal::from_str_canonical(s).unwrap()
    }

    #[test]
    fn rejects_negative_literals() {
        assert_eq!(
            UnsignedDecimal::from_str_canonical("-1"),
            Err(DecimalError::NegativeResult)
        );
    }

    #[test]
    fn checked_sub_fails_below_zero() {
        assert_eq!(d("5").checked_sub(&d("6")), Err(DecimalError::NegativeResult));
        assert_eq!(d("5").checked_sub(&d("5")).unwrap(), UnsignedDecimal::zero());
    }

    #[test]
    fn q64_is_two_to_the_sixty_fourth() {
        assert_eq!(UnsignedDecimal::q64(), d("18446744073709551616"));
    }

    #[test]
    fn trunc_drops_fractional_part() {
        assert_eq!(d("3.999").trunc(), d("3"));
        assert_eq!(d("42").trunc(), d("42"));
    }

    #[test]
    fn division_honors_precision_ceiling() {
        let third = d("1").div_with_prec(&d("3"), 5).unwrap();
        assert_eq!(third, d("0.33333"));
    }

    #[test]
    fn scientific_notation_parses() {
        assert_eq!(d("832e18"), d("832000000000000000000"));
    }
}
