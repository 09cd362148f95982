//! One-byte battery voltage encoding.
//!
//! A byte `y` stands for `1650 + 10 * y` millivolts, which spans 1.65 V to
//! 4.2 V in 10 mV steps.

/// Voltage represented by a zero byte.
pub const OFFSET_MV: u16 = 1650;

/// Millivolts per encoding step.
pub const STEP_MV: u16 = 10;

/// Compress an absolute reading, saturating at both ends of the range.
pub fn compress(millivolts: u16) -> u8 {
    let steps = millivolts.saturating_sub(OFFSET_MV) / STEP_MV;
    u8::try_from(steps).unwrap_or(u8::MAX)
}

/// Expand a stored byte back into millivolts.
pub const fn decompress(byte: u8) -> u16 {
    OFFSET_MV + byte as u16 * STEP_MV
}
