#![allow(clippy::missing_errors_doc, clippy::missing_panics_doc)]

pub mod fs;

/// Integer division rounding towards positive infinity.
#[must_use]
#[inline]
pub fn div_ceil(value: usize, divisor: usize) -> usize {
    if divisor == 0 {
        return 0;
    }
    (value + divisor - 1) / divisor
}
