//! Two-tier dose log.
//!
//! ## Tiers
//!
//! - **Staging log**: RAM only, [`STAGING_CAPACITY`] raw samples at full
//!   resolution (20 minutes at one sample every 30 seconds). Lost on reboot.
//! - **Persistent log**: NVRAM, [`PERSISTENT_CAPACITY`] 16-bit entries. Each
//!   time it fills, adjacent entries are merged pairwise and the time covered
//!   by one entry doubles, so the log never runs out of room.
//!
//! Staging absorbs the first samples after boot so a short power cycle does
//! not clobber the long-running NVRAM log. The first time staging would
//! overflow, its contents migrate into NVRAM under the staging id and all
//! later samples go straight to the persistent log until the next reset.
//!
//! ## Value encoding
//!
//! A stored count `x` stands for `x * 2^scaling` pulses over
//! `15 * 2^resolution` seconds. `scaling` grows only when a value would not
//! fit in 16 bits. Voltages are compressed to one byte, see [`voltage`].

pub mod layout;
pub mod scaling;
pub mod voltage;

mod compaction;
mod export;
mod logger;
mod migration;
mod persistent;
mod staging;

pub use export::LogSink;
pub use logger::*;
pub use persistent::PersistentLog;
pub use staging::StagingLog;

use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

use crate::nvram::NvramError;
use crate::report::ReportError;

/// Number of raw samples kept in the staging log (40 x 30 s = 20 minutes).
pub const STAGING_CAPACITY: usize = 40;

/// Number of 16-bit entries in the persistent log.
pub const PERSISTENT_CAPACITY: usize = 240;

/// Count samples per voltage sample.
pub const VOLTAGE_SUBSAMPLE: usize = 20;

/// Voltage bytes kept alongside the staging log.
pub const STAGING_VOLTAGE_CAPACITY: usize = STAGING_CAPACITY / VOLTAGE_SUBSAMPLE;

/// Voltage bytes kept alongside the persistent log.
pub const PERSISTENT_VOLTAGE_CAPACITY: usize = PERSISTENT_CAPACITY / VOLTAGE_SUBSAMPLE;

/// Resolution of a freshly started log: 15 * 2^1 = 30 seconds per entry.
pub const INITIAL_RESOLUTION: u8 = 1;

/// Seconds covered by one entry at resolution zero.
pub const RESOLUTION_UNIT_SECS: u32 = 15;

/// Length of one ingest period in seconds.
pub const BASE_PERIOD_SECS: u32 = RESOLUTION_UNIT_SECS << INITIAL_RESOLUTION;

/// Largest value a stored count may take.
pub const MAX_STORED: u32 = u16::MAX as u32;

/// Error types for log operations
#[derive(Debug, Error)]
pub enum LogError {
    /// The NVRAM backend rejected an access
    #[error("NVRAM access failed: {0}")]
    Nvram(#[from] NvramError),

    /// A dump could not be turned into a snapshot
    #[error("Report error: {0}")]
    Report(#[from] ReportError),
}

/// Result type for log operations
pub type LogResult<T> = Result<T, LogError>;

/// Selects one of the two logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogKind {
    /// The RAM staging log
    Staging,
    /// The NVRAM persistent log
    Persistent,
}

/// Metadata describing one log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LogInfo {
    /// Log serial number, increasing with every new log
    pub id: u16,
    /// One entry covers `15 * 2^resolution` seconds
    pub resolution: u8,
    /// True value of an entry is `stored * 2^scaling`
    pub scaling: u8,
    /// Number of entries in use
    pub length: u16,
}

impl LogInfo {
    /// Metadata for an empty log at full resolution.
    pub const fn empty(id: u16) -> Self {
        Self {
            id,
            resolution: INITIAL_RESOLUTION,
            scaling: 0,
            length: 0,
        }
    }

    /// Seconds covered by a single entry.
    pub fn entry_secs(&self) -> u32 {
        RESOLUTION_UNIT_SECS
            .checked_shl(self.resolution as u32)
            .unwrap_or(u32::MAX)
    }

    /// Number of voltage bytes that accompany the count entries.
    pub fn voltage_length(&self) -> u16 {
        self.length / VOLTAGE_SUBSAMPLE as u16
    }
}

/// Id for the log that follows `id`.
///
/// Skips [`ERASED_WORD`](crate::nvram::ERASED_WORD) so a persisted id can
/// never be mistaken for an unprogrammed part.
pub fn next_log_id(id: u16) -> u16 {
    match id.wrapping_add(1) {
        crate::nvram::ERASED_WORD => 0,
        next => next,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capacities_divide_evenly() {
        assert_eq!(STAGING_CAPACITY % VOLTAGE_SUBSAMPLE, 0);
        assert_eq!(PERSISTENT_CAPACITY % (2 * VOLTAGE_SUBSAMPLE), 0);
        assert_eq!(PERSISTENT_VOLTAGE_CAPACITY, 12);
    }

    #[test]
    fn test_entry_secs() {
        assert_eq!(LogInfo::empty(0).entry_secs(), BASE_PERIOD_SECS);
        let info = LogInfo {
            resolution: 4,
            ..LogInfo::empty(0)
        };
        assert_eq!(info.entry_secs(), 240);
    }

    #[test]
    fn test_next_log_id_skips_erased_marker() {
        assert_eq!(next_log_id(7), 8);
        assert_eq!(next_log_id(0xFFFE), 0);
        assert_eq!(next_log_id(0xFFFF), 0);
    }
}
