//! Power-of-two value scaling with round-half-up.

use super::MAX_STORED;

/// Divide `x` by `2^shift`, rounding halves up.
///
/// Same result as `((x >> (shift - 1)) + 1) >> 1`, but cannot overflow for
/// `x` near `u32::MAX`.
pub const fn round_down(x: u32, shift: u8) -> u32 {
    if shift == 0 {
        return x;
    }
    if shift > 32 {
        return 0;
    }
    let half = x >> (shift - 1);
    (half >> 1) + (half & 1)
}

/// Smallest extra shift that brings `x` into the 16-bit range.
pub const fn shift_to_fit(x: u32) -> u8 {
    let mut shift = 0;
    while round_down(x, shift) > MAX_STORED {
        shift += 1;
    }
    shift
}

/// Narrow a value that has already been brought into range.
pub fn narrow(x: u32) -> u16 {
    u16::try_from(x).unwrap_or(u16::MAX)
}
