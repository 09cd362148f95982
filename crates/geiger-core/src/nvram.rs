//! Byte-addressable non-volatile memory access.
//!
//! The log only ever talks to NVRAM through [`Nvram`]. On the device this is
//! backed by the EEPROM controller; on desktop hosts [`RamNvram`] keeps the
//! whole image in an array.

use thiserror_no_std::Error;

/// Value of a word read back from an erased (never programmed) part.
pub const ERASED_WORD: u16 = 0xFFFF;

/// Error types for NVRAM access
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum NvramError {
    /// Address lies outside the device
    #[error("Address {address} is outside of the {size}-byte NVRAM")]
    AddressOutOfRange {
        /// The offending address
        address: u16,
        /// Size of the device in bytes
        size: usize,
    },
}

/// Result type for NVRAM operations
pub type NvramResult<T> = Result<T, NvramError>;

/// Read/update access to a linear NVRAM address range.
///
/// `update_*` must behave like the AVR `eeprom_update_*` family: writing a
/// value identical to the stored one is allowed to skip the physical write.
/// The log relies on this to avoid wearing cells it rewrites unchanged.
///
/// Words are stored little-endian.
pub trait Nvram {
    /// Read a single byte.
    fn read_byte(&self, address: u16) -> NvramResult<u8>;

    /// Write a single byte, skipping the write if it is already stored.
    fn update_byte(&mut self, address: u16, value: u8) -> NvramResult<()>;

    /// Read a 16-bit word.
    fn read_word(&self, address: u16) -> NvramResult<u16> {
        let low = self.read_byte(address)?;
        let high = self.read_byte(address.wrapping_add(1))?;
        Ok(u16::from_le_bytes([low, high]))
    }

    /// Write a 16-bit word, one byte at a time.
    fn update_word(&mut self, address: u16, value: u16) -> NvramResult<()> {
        let [low, high] = value.to_le_bytes();
        self.update_byte(address, low)?;
        self.update_byte(address.wrapping_add(1), high)
    }
}

impl<T: Nvram + ?Sized> Nvram for &mut T {
    fn read_byte(&self, address: u16) -> NvramResult<u8> {
        (**self).read_byte(address)
    }

    fn update_byte(&mut self, address: u16, value: u8) -> NvramResult<()> {
        (**self).update_byte(address, value)
    }
}

/// In-memory NVRAM image.
///
/// Counts the physical writes it performs so callers can check how much a
/// sequence of operations would wear a real part.
#[derive(Debug, Clone)]
pub struct RamNvram<const SIZE: usize> {
    cells: [u8; SIZE],
    writes: usize,
}

impl<const SIZE: usize> Default for RamNvram<SIZE> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const SIZE: usize> RamNvram<SIZE> {
    /// Create a zero-filled image.
    pub const fn new() -> Self {
        Self {
            cells: [0; SIZE],
            writes: 0,
        }
    }

    /// Create an image in the state of a factory-fresh part (all ones).
    pub const fn erased() -> Self {
        Self {
            cells: [0xFF; SIZE],
            writes: 0,
        }
    }

    /// Wrap an existing image, e.g. one loaded from disk.
    pub const fn from_image(cells: [u8; SIZE]) -> Self {
        Self { cells, writes: 0 }
    }

    /// Raw image contents.
    pub fn image(&self) -> &[u8; SIZE] {
        &self.cells
    }

    /// Number of bytes physically written since creation.
    pub fn writes(&self) -> usize {
        self.writes
    }

    fn index(address: u16) -> NvramResult<usize> {
        let index = address as usize;
        if index < SIZE {
            Ok(index)
        } else {
            Err(NvramError::AddressOutOfRange {
                address,
                size: SIZE,
            })
        }
    }
}

impl<const SIZE: usize> Nvram for RamNvram<SIZE> {
    fn read_byte(&self, address: u16) -> NvramResult<u8> {
        Ok(self.cells[Self::index(address)?])
    }

    fn update_byte(&mut self, address: u16, value: u8) -> NvramResult<()> {
        let index = Self::index(address)?;
        if self.cells[index] != value {
            self.cells[index] = value;
            self.writes += 1;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_word_is_little_endian() {
        let mut nv = RamNvram::<8>::new();
        nv.update_word(2, 0x1234).unwrap();

        assert_eq!(nv.read_byte(2).unwrap(), 0x34);
        assert_eq!(nv.read_byte(3).unwrap(), 0x12);
        assert_eq!(nv.read_word(2).unwrap(), 0x1234);
    }

    #[test]
    fn test_identical_update_is_not_a_write() {
        let mut nv = RamNvram::<8>::new();
        nv.update_word(0, 0x00AB).unwrap();
        assert_eq!(nv.writes(), 1, "high byte was already zero");

        nv.update_word(0, 0x00AB).unwrap();
        nv.update_byte(5, 0).unwrap();
        assert_eq!(nv.writes(), 1);
    }

    #[test]
    fn test_out_of_range_is_reported() {
        let mut nv = RamNvram::<4>::erased();
        assert_eq!(
            nv.read_word(3),
            Err(NvramError::AddressOutOfRange { address: 4, size: 4 })
        );
        assert!(nv.update_byte(4, 1).is_err());
        assert_eq!(nv.read_byte(0).unwrap(), 0xFF);
    }
}
