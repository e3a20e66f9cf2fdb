//! Conversion between `Decimal` amounts and stored minor units.
//!
//! Amounts are persisted as integer hundredths so the running balance never drifts.

use crate::errors::{Error, Result};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;

/// Decimal places kept in storage.
pub const MINOR_UNIT_SCALE: u32 = 2;

/// Converts a decimal amount to minor units, rejecting sub-cent precision and values that
/// do not fit in an `i64`.
pub fn to_minor_units(amount: Decimal) -> Result<i64> {
    if amount.normalize().scale() > MINOR_UNIT_SCALE {
        return Err(Error::invalid_argument(format!(
            "amount {amount} has more than {MINOR_UNIT_SCALE} decimal places"
        )));
    }
    amount
        .checked_mul(Decimal::ONE_HUNDRED)
        .and_then(|minor| minor.to_i64())
        .ok_or_else(|| Error::invalid_argument(format!("amount {amount} is out of range")))
}

/// Converts stored minor units back to a decimal amount.
#[must_use]
pub fn from_minor_units(minor: i64) -> Decimal {
    Decimal::new(minor, MINOR_UNIT_SCALE)
}
