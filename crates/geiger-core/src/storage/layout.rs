//! NVRAM address map of the persistent log.
//!
//! ```text
//! 0   .. 12   device settings (not owned by the log)
//! 12  .. 14   log id            u16
//! 14          resolution        u8
//! 15          scaling           u8
//! 16  .. 496  counts            240 x u16
//! 496 .. 508  voltages          12 x u8
//! ```

use super::{PERSISTENT_CAPACITY, PERSISTENT_VOLTAGE_CAPACITY};

/// Total size of the NVRAM part.
pub const NVRAM_SIZE: usize = 512;

/// First byte owned by the log.
pub const LOG_BASE: u16 = 12;

/// Log id word.
pub const ADDR_ID: u16 = LOG_BASE;
/// Resolution exponent byte.
pub const ADDR_RESOLUTION: u16 = LOG_BASE + 2;
/// Scaling exponent byte.
pub const ADDR_SCALING: u16 = LOG_BASE + 3;
/// First count entry.
pub const ADDR_COUNTS: u16 = LOG_BASE + 4;
/// First compressed voltage byte.
pub const ADDR_VOLTAGES: u16 = ADDR_COUNTS + 2 * PERSISTENT_CAPACITY as u16;

/// One past the last byte owned by the log.
pub const LOG_END: u16 = ADDR_VOLTAGES + PERSISTENT_VOLTAGE_CAPACITY as u16;

const _: () = assert!(LOG_END as usize <= NVRAM_SIZE);

/// Address of count entry `index`.
pub const fn count_addr(index: usize) -> u16 {
    ADDR_COUNTS + 2 * index as u16
}

/// Address of voltage byte `index`.
pub const fn voltage_addr(index: usize) -> u16 {
    ADDR_VOLTAGES + index as u16
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_matches_device_map() {
        assert_eq!(ADDR_COUNTS, 16);
        assert_eq!(ADDR_VOLTAGES, 496);
        assert_eq!(LOG_END, 508);
        assert_eq!(count_addr(239), 494);
    }
}
