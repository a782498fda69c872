//! Floating point functions that also work on `no_std` targets.
//!
//! Equivalent to the methods of `f64` with the same names.

#[inline]
pub(crate) fn sqrt(x: f64) -> f64 {
    libm::sqrt(x)
}

#[inline]
pub(crate) fn floor(x: f64) -> f64 {
    libm::floor(x)
}

#[inline]
pub(crate) fn atan2(y: f64, x: f64) -> f64 {
    libm::atan2(y, x)
}

#[inline]
pub(crate) fn sin(x: f64) -> f64 {
    libm::sin(x)
}

#[inline]
pub(crate) fn cos(x: f64) -> f64 {
    libm::cos(x)
}

/// Round to the nearest integer, halves towards positive infinity.
#[inline]
pub(crate) fn round_half_up(x: f64) -> f64 {
    libm::floor(x + 0.5)
}

/// Whether `x` lies within `tolerance` of zero.
#[inline]
pub(crate) fn fuzzy_is_null(x: f64, tolerance: f64) -> bool {
    libm::fabs(x) <= tolerance
}
