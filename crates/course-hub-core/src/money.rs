//! Money handling.
//!
//! Prices are stored as decimals in major units with two decimal places.
//! The payment provider works in minor units (kopecks, cents), so amounts
//! cross that boundary through [`to_minor_units`] and [`from_minor_units`].

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::error::{DomainError, Result};

/// Number of decimal places kept for prices.
pub const PRICE_SCALE: u32 = 2;

/// Maximum number of significant digits a price may carry.
pub const PRICE_MAX_DIGITS: u32 = 10;

/// Validate a course price and normalize it to two decimal places.
///
/// # Errors
///
/// Returns `DomainError::Validation` if the price is negative, has more than
/// two decimal places or exceeds ten digits.
pub fn validate_price(price: Decimal) -> Result<Decimal> {
    if price.is_sign_negative() && !price.is_zero() {
        return Err(DomainError::validation("price", "must not be negative"));
    }

    if price.normalize().scale() > PRICE_SCALE {
        return Err(DomainError::validation(
            "price",
            "must have at most 2 decimal places",
        ));
    }

    let mut scaled = price;
    scaled.rescale(PRICE_SCALE);
    if scaled.mantissa().unsigned_abs() >= 10u128.pow(PRICE_MAX_DIGITS) {
        return Err(DomainError::validation(
            "price",
            "must have at most 10 digits",
        ));
    }

    Ok(scaled)
}

/// Convert a major-unit amount to provider minor units, truncating any
/// fraction below one minor unit.
///
/// # Errors
///
/// Returns `DomainError::AmountOutOfRange` if the result does not fit in `i64`.
pub fn to_minor_units(amount: Decimal) -> Result<i64> {
    (amount * Decimal::ONE_HUNDRED)
        .trunc()
        .to_i64()
        .ok_or_else(|| DomainError::AmountOutOfRange(amount.to_string()))
}

/// Convert provider minor units back to a major-unit decimal.
#[must_use]
pub fn from_minor_units(minor: i64) -> Decimal {
    Decimal::new(minor, PRICE_SCALE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use claims::{assert_err, assert_ok};

    #[test]
    fn hundred_roubles_round_trips_through_kopecks() {
        let amount = Decimal::new(10000, 2);
        let minor = to_minor_units(amount).unwrap();
        assert_eq!(minor, 10000);
        assert_eq!(from_minor_units(minor), amount);
        assert_eq!(from_minor_units(minor).to_string(), "100.00");
    }

    #[test]
    fn sub_kopeck_fractions_are_truncated() {
        assert_eq!(to_minor_units(Decimal::new(19999, 3)).unwrap(), 1999);
    }

    #[test]
    fn validate_price_rescales_to_two_places() {
        let price = validate_price(Decimal::new(5, 0)).unwrap();
        assert_eq!(price.to_string(), "5.00");
    }

    #[test]
    fn validate_price_rejects_bad_values() {
        assert_err!(validate_price(Decimal::new(-1, 0)));
        assert_err!(validate_price(Decimal::new(1001, 3)));
        assert_err!(validate_price(Decimal::new(10_000_000_000, 2) * Decimal::ONE_HUNDRED));
        assert_ok!(validate_price(Decimal::new(9_999_999_999, 2)));
        assert_ok!(validate_price(Decimal::ZERO));
    }
}
