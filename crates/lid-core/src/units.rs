//! Conversion between decimal strings and 18-decimal integer amounts.
//!
//! Config files and scenarios state amounts in whole units ("20", "0.5");
//! the engine works in the smallest unit.

use crate::constants::{DECIMALS, ONE};
use crate::error::ConfigError;

/// Parse a decimal string such as `"1.25"` into the smallest unit.
///
/// At most [`DECIMALS`] fractional digits are accepted; a leading sign,
/// exponent or empty string is rejected.
pub fn parse_units(s: &str) -> Result<u128, ConfigError> {
    let s = s.trim();
    let invalid = || ConfigError::InvalidAmount(s.to_string());
    if s.is_empty() {
        return Err(invalid());
    }

    let (whole, frac) = match s.split_once('.') {
        Some((w, f)) => (w, f),
        None => (s, ""),
    };
    if whole.is_empty() && frac.is_empty() {
        return Err(invalid());
    }
    if !whole.chars().all(|c| c.is_ascii_digit()) || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid());
    }
    if frac.len() > DECIMALS as usize {
        return Err(invalid());
    }

    let whole: u128 = if whole.is_empty() {
        0
    } else {
        whole.parse().map_err(|_| invalid())?
    };
    let frac_value: u128 = if frac.is_empty() {
        0
    } else {
        let padded = format!("{frac:0<width$}", width = DECIMALS as usize);
        padded.parse().map_err(|_| invalid())?
    };

    whole
        .checked_mul(ONE)
        .and_then(|w| w.checked_add(frac_value))
        .ok_or_else(invalid)
}

/// Render a smallest-unit amount as a decimal string, trimming trailing zeros.
pub fn format_units(amount: u128) -> String {
    let whole = amount / ONE;
    let frac = amount % ONE;
    if frac == 0 {
        return whole.to_string();
    }
    let frac = format!("{frac:0>width$}", width = DECIMALS as usize);
    format!("{whole}.{}", frac.trim_end_matches('0'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_whole_and_fraction() {
        assert_eq!(parse_units("20").unwrap(), 20 * ONE);
        assert_eq!(parse_units("0.01").unwrap(), ONE / 100);
        assert_eq!(parse_units("1.5").unwrap(), ONE + ONE / 2);
        assert_eq!(parse_units(".5").unwrap(), ONE / 2);
        assert_eq!(parse_units("3.").unwrap(), 3 * ONE);
        assert_eq!(parse_units("0.000000000000000001").unwrap(), 1);
    }

    #[test]
    fn parse_rejects_garbage() {
        for bad in ["", ".", "-1", "1e18", "1.2.3", "abc", "0.0000000000000000001"] {
            assert!(parse_units(bad).is_err(), "{bad:?} should be rejected");
        }
    }

    #[test]
    fn parse_rejects_overflow() {
        assert!(parse_units(&u128::MAX.to_string()).is_err());
    }

    #[test]
    fn format_trims_zeros() {
        assert_eq!(format_units(20 * ONE), "20");
        assert_eq!(format_units(ONE / 100), "0.01");
        assert_eq!(format_units(ONE + ONE / 4), "1.25");
        assert_eq!(format_units(1), "0.000000000000000001");
    }
}
