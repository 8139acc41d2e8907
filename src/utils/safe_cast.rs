//! Checked conversions between `OpenCV`'s `i32` sizes and Rust indices

use crate::{Error, Result};

/// Convert an array dimension to an `OpenCV` size
///
/// # Errors
///
/// Returns an error if the value exceeds `i32::MAX`
pub fn usize_to_i32(value: usize) -> Result<i32> {
    i32::try_from(value).map_err(|_| Error::InvalidInput(format!("Dimension {value} exceeds i32::MAX")))
}

/// Convert an `OpenCV` size to an array dimension
///
/// # Errors
///
/// Returns an error if the value is negative
pub fn i32_to_usize(value: i32) -> Result<usize> {
    usize::try_from(value).map_err(|_| Error::InvalidInput(format!("Negative dimension {value}")))
}

/// Round a float coordinate toward zero into `[lo, hi]`; non-finite values
/// map to the lower bound
#[must_use]
#[allow(clippy::cast_precision_loss, clippy::cast_possible_truncation)]
pub fn f32_to_i32_clamp(value: f32, lo: i32, hi: i32) -> i32 {
    let (lo, hi) = (lo.min(hi), lo.max(hi));
    if value.is_nan() || value.is_infinite() {
        return lo;
    }
    (value.clamp(lo as f32, hi as f32) as i32).clamp(lo, hi)
}
