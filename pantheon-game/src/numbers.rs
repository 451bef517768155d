//! Numeric guards shared by every stage that touches money or probability.

use num_traits::cast::cast;

/// Replace non-finite values with zero.
#[must_use]
pub fn finite_or_zero(value: f64) -> f64 {
    if value.is_finite() { value } else { 0.0 }
}

/// Clamp a monetary amount to be finite and non-negative.
#[must_use]
pub fn non_negative(value: f64) -> f64 {
    finite_or_zero(value).max(0.0)
}

/// Clamp a probability into `[0, 1]`, mapping NaN to zero.
#[must_use]
pub fn probability(value: f64) -> f64 {
    finite_or_zero(value).clamp(0.0, 1.0)
}

/// Clamp a value so it never falls below `floor`.
#[must_use]
pub fn floored(value: f64, floor: f64) -> f64 {
    if value.is_nan() {
        return floor;
    }
    value.max(floor)
}

/// Convert a count into `f64`, allowing precision loss in a single location.
#[must_use]
pub fn count_to_f64(value: usize) -> f64 {
    cast::<usize, f64>(value).unwrap_or(0.0)
}

/// Convert a `u32` into `f64`.
#[must_use]
pub fn u32_to_f64(value: u32) -> f64 {
    f64::from(value)
}

/// Map a unit-interval draw onto an index in `0..len`.
///
/// Values at or above 1.0 map to the last index; an empty range yields 0.
#[must_use]
pub fn unit_to_index(unit: f64, len: usize) -> usize {
    if len == 0 {
        return 0;
    }
    let scaled = (probability(unit) * count_to_f64(len)).floor();
    cast::<f64, usize>(scaled).unwrap_or(0).min(len - 1)
}
