//! Conversions between the legacy signed storage representation used in
//! MassLynx binary records and the true unsigned domain values.
//!
//! The format's writer stored unsigned quantities (scan counts, packed
//! masses) in two's-complement fields one width class too narrow, letting
//! large values wrap negative. These helpers reproduce that wraparound
//! exactly in both directions.

use thiserror::Error;

const TWO_POW_32: i64 = 1 << 32;
const TWO_POW_16: i32 = 1 << 16;

#[derive(Debug, Error, PartialEq, Eq)]
#[error("{0} is outside the unsigned 16-bit domain")]
pub struct Unsigned16RangeError(pub i32);

/// Convert an unsigned magnitude back to the wrapped `i32` the format stores.
///
/// Values above `i32::MAX` wrap negative rather than saturating.
#[inline]
pub fn int32_from_unsigned(value: i64) -> i32 {
    if value <= i32::MAX as i64 {
        value as i32
    } else {
        (value - TWO_POW_32) as i32
    }
}

/// Recover the unsigned magnitude from a wrapped `i32` storage field.
#[inline]
pub fn int32_to_unsigned(value: i32) -> i64 {
    if value < 0 {
        value as i64 + TWO_POW_32
    } else {
        value as i64
    }
}

/// Convert an unsigned magnitude to the wrapped `i16` the format stores.
///
/// Unlike the 32-bit direction, out-of-domain inputs are rejected.
#[inline]
pub fn int16_from_unsigned(value: i32) -> Result<i16, Unsigned16RangeError> {
    if !(0..TWO_POW_16).contains(&value) {
        Err(Unsigned16RangeError(value))
    } else if value <= i16::MAX as i32 {
        Ok(value as i16)
    } else {
        Ok((value - TWO_POW_16) as i16)
    }
}

/// Recover the unsigned magnitude from a wrapped `i16` storage field.
#[inline]
pub fn int16_to_unsigned(value: i16) -> i32 {
    if value < 0 {
        value as i32 + TWO_POW_16
    } else {
        value as i32
    }
}
