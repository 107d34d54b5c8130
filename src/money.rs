//! Money arithmetic helpers.
//!
//! All amounts in the system are decimal values in major units (dollars,
//! naira). Conversion to minor units (cents, kobo) happens exactly once, at
//! the gateway boundary on the way out, and the reverse conversion exactly
//! once on the way in from a webhook payload.

use bigdecimal::{BigDecimal, ToPrimitive};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MoneyError {
    #[error("amount {0} has sub-minor-unit precision")]
    SubMinorPrecision(BigDecimal),
    #[error("amount {0} does not fit in minor units")]
    Overflow(BigDecimal),
}

/// Converts a major-unit amount to minor units (x100). Amounts with more
/// than two decimal places are rejected rather than silently rounded.
pub fn to_minor_units(amount: &BigDecimal) -> Result<i64, MoneyError> {
    let scaled = amount * BigDecimal::from(100);
    let truncated = scaled.with_scale(0);
    if truncated != scaled {
        return Err(MoneyError::SubMinorPrecision(amount.clone()));
    }
    truncated
        .to_i64()
        .ok_or_else(|| MoneyError::Overflow(amount.clone()))
}

/// Converts a minor-unit amount back to major units (/100), exactly.
pub fn to_major_units(minor: i64) -> BigDecimal {
    (BigDecimal::from(minor) / BigDecimal::from(100)).with_scale(2)
}

/// Counselor earnings for a session: price minus the platform fee, kept at
/// two decimal places.
pub fn amount_earned(price: &BigDecimal, fee_rate: &BigDecimal) -> BigDecimal {
    let fee = (price * fee_rate).with_scale(2);
    (price - fee).with_scale(2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> BigDecimal {
        BigDecimal::from_str(s).unwrap()
    }

    #[test]
    fn test_minor_unit_round_trip() {
        for raw in ["1", "100", "25000.50"] {
            let amount = dec(raw);
            let minor = to_minor_units(&amount).unwrap();
            let back = to_major_units(minor);
            assert_eq!(to_minor_units(&back).unwrap(), minor, "round trip for {}", raw);
        }
    }

    #[test]
    fn test_ngn_to_kobo() {
        assert_eq!(to_minor_units(&dec("5000")).unwrap(), 500_000);
        assert_eq!(to_major_units(500_000), dec("5000.00"));
    }

    #[test]
    fn test_sub_cent_precision_rejected() {
        let err = to_minor_units(&dec("10.001"));
        assert!(matches!(err, Err(MoneyError::SubMinorPrecision(_))));
    }

    #[test]
    fn test_amount_earned_after_platform_fee() {
        let rate = dec("0.10");
        assert_eq!(amount_earned(&dec("100"), &rate), dec("90.00"));
        assert_eq!(amount_earned(&dec("5000"), &rate), dec("4500.00"));
        assert_eq!(amount_earned(&dec("25000.50"), &rate), dec("22500.45"));
    }

    #[test]
    fn test_zero_fee_rate_passes_full_price() {
        assert_eq!(amount_earned(&dec("80"), &dec("0")), dec("80.00"));
    }
}
