//! Decimal truncation shared by budget sizing and position quantisation.
//!
//! Truncation always rounds toward zero. Values are routed through
//! [`rust_decimal::Decimal`] so that `1.15` truncated to two places stays `1.15`
//! instead of collapsing to `1.14` through binary scaling.

use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use rust_decimal::{Decimal, RoundingStrategy};

use crate::domain::error::PairtraderError;

fn truncate_decimal(value: f64, decimals: u32) -> Option<Decimal> {
    Decimal::from_f64(value).map(|d| d.round_dp_with_strategy(decimals, RoundingStrategy::ToZero))
}

pub(crate) fn decimal_to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(f64::NAN)
}

/// Truncate `value` toward zero to `decimals` decimal places.
///
/// Non-finite inputs are returned unchanged. Magnitudes outside the decimal range
/// fall back to power-of-ten scaling.
pub fn truncate(value: f64, decimals: u32) -> f64 {
    if !value.is_finite() {
        return value;
    }
    match truncate_decimal(value, decimals).and_then(|d| d.to_f64()) {
        Some(v) => v,
        None => {
            let factor = 10f64.powi(decimals as i32);
            (value * factor).trunc() / factor
        }
    }
}

/// Truncate `value` to `decimals` places and return it as an integer count of
/// `10^-decimals` units, e.g. `to_units(1.2349, 3) == 1234`.
pub fn to_units(value: f64, decimals: u32) -> Result<i64, PairtraderError> {
    if !value.is_finite() {
        return Err(PairtraderError::invalid(
            "value",
            format!("{value} cannot be quantised"),
        ));
    }
    let mut truncated = truncate_decimal(value, decimals).ok_or_else(|| {
        PairtraderError::invalid("value", format!("{value} is out of decimal range"))
    })?;
    truncated.rescale(decimals);
    i64::try_from(truncated.mantissa()).map_err(|_| {
        PairtraderError::invalid("value", format!("{value} overflows an integer quantity"))
    })
}
