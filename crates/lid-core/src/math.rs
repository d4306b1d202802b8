//! Checked integer arithmetic for presale accounting.
//!
//! All helpers return [`ArithmeticError`] instead of wrapping. Products that
//! can exceed `u128` (token supply × `ONE`, shares × token pool) go through a
//! 256-bit intermediate in [`mul_div`].

use primitive_types::U256;

use crate::constants::BPS_PRECISION;
use crate::error::ArithmeticError;

/// Compute `a * b / denominator` with a 256-bit intermediate, rounding down.
pub fn mul_div(a: u128, b: u128, denominator: u128) -> Result<u128, ArithmeticError> {
    if denominator == 0 {
        return Err(ArithmeticError::DivisionByZero);
    }
    let product = U256::from(a)
        .checked_mul(U256::from(b))
        .ok_or(ArithmeticError::Overflow)?;
    let quotient = product / U256::from(denominator);
    if quotient > U256::from(u128::MAX) {
        return Err(ArithmeticError::Overflow);
    }
    Ok(quotient.as_u128())
}

/// `amount * bps / 10_000`, rounding down.
pub fn apply_bps(amount: u128, bps: u64) -> Result<u128, ArithmeticError> {
    amount
        .checked_mul(bps as u128)
        .map(|v| v / BPS_PRECISION as u128)
        .ok_or(ArithmeticError::Overflow)
}

/// `amount * (10_000 + bonus_bps) / 10_000`: an amount inflated by a bonus.
pub fn with_bonus(amount: u128, bonus_bps: u64) -> Result<u128, ArithmeticError> {
    let factor = BPS_PRECISION
        .checked_add(bonus_bps)
        .ok_or(ArithmeticError::Overflow)?;
    apply_bps(amount, factor)
}

pub fn checked_add(a: u128, b: u128) -> Result<u128, ArithmeticError> {
    a.checked_add(b).ok_or(ArithmeticError::Overflow)
}

pub fn checked_sub(a: u128, b: u128) -> Result<u128, ArithmeticError> {
    a.checked_sub(b).ok_or(ArithmeticError::Underflow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::ONE;
    use proptest::prelude::*;

    #[test]
    fn mul_div_exceeds_u128_intermediate() {
        // 430M tokens * ONE overflows u128 before the division.
        let supply = 430_000_000 * ONE;
        let shares = 1_040 * ONE;
        assert!(supply.checked_mul(ONE).is_none());
        let r = mul_div(supply, ONE, shares).unwrap();
        assert_eq!(r, 413_461_538_461_538_461_538_461);
    }

    #[test]
    fn mul_div_rejects_zero_denominator() {
        assert_eq!(mul_div(1, 1, 0), Err(ArithmeticError::DivisionByZero));
    }

    #[test]
    fn mul_div_rejects_oversized_quotient() {
        assert_eq!(mul_div(u128::MAX, 2, 1), Err(ArithmeticError::Overflow));
    }

    #[test]
    fn apply_bps_basic() {
        assert_eq!(apply_bps(10_000, 7_500).unwrap(), 7_500);
        assert_eq!(apply_bps(ONE, 250).unwrap(), ONE / 40);
        assert_eq!(apply_bps(3, 5_000).unwrap(), 1);
    }

    #[test]
    fn apply_bps_overflow() {
        assert_eq!(apply_bps(u128::MAX, 2), Err(ArithmeticError::Overflow));
    }

    #[test]
    fn with_bonus_matches_manual() {
        assert_eq!(with_bonus(ONE, 3_500).unwrap(), ONE * 13_500 / 10_000);
        assert_eq!(with_bonus(ONE, 0).unwrap(), ONE);
    }

    #[test]
    fn checked_helpers() {
        assert_eq!(checked_add(u128::MAX, 1), Err(ArithmeticError::Overflow));
        assert_eq!(checked_sub(0, 1), Err(ArithmeticError::Underflow));
        assert_eq!(checked_sub(5, 3).unwrap(), 2);
    }

    proptest! {
        #[test]
        fn mul_div_matches_u128_when_it_fits(a in 0u128..u64::MAX as u128, b in 0u128..u64::MAX as u128, d in 1u128..u64::MAX as u128) {
            prop_assert_eq!(mul_div(a, b, d).unwrap(), a * b / d);
        }

        #[test]
        fn apply_bps_never_exceeds_amount(amount in 0u128..(u64::MAX as u128), bps in 0u64..=10_000) {
            prop_assert!(apply_bps(amount, bps).unwrap() <= amount);
        }
    }
}
