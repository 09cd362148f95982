use log::{debug, info, warn};

use super::layout::{
    ADDR_ID, ADDR_RESOLUTION, ADDR_SCALING, LOG_BASE, LOG_END, count_addr, voltage_addr,
};
use super::scaling::{narrow, round_down, shift_to_fit};
use super::{
    INITIAL_RESOLUTION, LogInfo, LogResult, MAX_STORED, PERSISTENT_CAPACITY,
    PERSISTENT_VOLTAGE_CAPACITY, VOLTAGE_SUBSAMPLE,
};
use crate::nvram::{ERASED_WORD, Nvram};

/// The long-running log kept in NVRAM.
///
/// Incoming samples are summed in RAM until [`flush_amount`](Self::flush_amount)
/// of them have arrived, then committed as a single 16-bit entry. When the
/// entry array fills up it is compacted in place (see `compaction.rs`).
///
/// Only the header (id, resolution, scaling) and the entry arrays live in
/// NVRAM. The length is recovered at boot by scanning for the last non-zero
/// entry, since unused entries are always kept at zero.
pub struct PersistentLog<N: Nvram> {
    pub(super) nvram: N,
    pub(super) info: LogInfo,
    /// Sum of the samples waiting for the next commit
    pub(super) count_accum: u32,
    /// Number of samples in `count_accum`
    pub(super) count_samples: u32,
    /// Sum of the compressed voltages waiting for the next voltage byte
    pub(super) voltage_accum: u32,
    /// Number of samples in `voltage_accum`
    pub(super) voltage_samples: u32,
}

impl<N: Nvram> PersistentLog<N> {
    /// Read the log back from NVRAM.
    ///
    /// A part that reads back as all ones has never been programmed; its log
    /// region is zeroed and an empty log is started.
    pub fn load(nvram: N) -> LogResult<Self> {
        let mut log = Self {
            nvram,
            info: LogInfo::default(),
            count_accum: 0,
            count_samples: 0,
            voltage_accum: 0,
            voltage_samples: 0,
        };

        if log.nvram.read_word(ADDR_ID)? == ERASED_WORD {
            warn!("NVRAM log region reads back erased, initializing an empty log");
            log.erase()?;
        }

        log.info.id = log.nvram.read_word(ADDR_ID)?;
        log.info.resolution = log.nvram.read_byte(ADDR_RESOLUTION)?;
        if log.info.resolution < INITIAL_RESOLUTION {
            log.info.resolution = INITIAL_RESOLUTION;
            log.nvram.update_byte(ADDR_RESOLUTION, INITIAL_RESOLUTION)?;
        }
        log.info.scaling = log.nvram.read_byte(ADDR_SCALING)?;
        log.info.length = log.stored_length()?;

        info!(
            "Loaded persistent log {}: {} entries, resolution {}, scaling {}",
            log.info.id, log.info.length, log.info.resolution, log.info.scaling
        );
        Ok(log)
    }

    pub fn info(&self) -> LogInfo {
        self.info
    }

    pub fn nvram(&self) -> &N {
        &self.nvram
    }

    pub fn into_nvram(self) -> N {
        self.nvram
    }

    /// Number of ingested samples summed into one entry.
    ///
    /// Derived from the resolution, so it doubles with every compaction:
    /// `flush_amount == 2^(resolution - INITIAL_RESOLUTION)`.
    pub fn flush_amount(&self) -> u32 {
        let doublings = self.info.resolution.saturating_sub(INITIAL_RESOLUTION);
        1u32.checked_shl(doublings as u32).unwrap_or(u32::MAX)
    }

    /// Number of ingested samples averaged into one voltage byte.
    pub fn voltage_flush_amount(&self) -> u32 {
        self.flush_amount().saturating_mul(VOLTAGE_SUBSAMPLE as u32)
    }

    /// Stored (still scaled) count entry.
    pub fn read_count(&self, index: usize) -> LogResult<u16> {
        Ok(self.nvram.read_word(count_addr(index))?)
    }

    /// Stored compressed voltage byte.
    pub fn read_voltage(&self, index: usize) -> LogResult<u8> {
        Ok(self.nvram.read_byte(voltage_addr(index))?)
    }

    /// Accumulate one base-period sample, committing an entry once enough
    /// samples have arrived.
    pub fn append(&mut self, count: u32, voltage: u8) -> LogResult<()> {
        self.count_accum = self.count_accum.saturating_add(count);
        self.count_samples += 1;
        self.voltage_accum += voltage as u32;
        self.voltage_samples += 1;

        if self.count_samples < self.flush_amount() {
            return Ok(());
        }
        debug_assert_eq!(self.count_samples, self.flush_amount());

        let sum = core::mem::take(&mut self.count_accum);
        self.count_samples = 0;
        let value = self.fit_to_scale(sum)?;

        let index = self.info.length as usize;
        self.write_count(index, value)?;
        debug!("Committed entry {} = {} (sum {})", index, value, sum);

        if (index + 1) % VOLTAGE_SUBSAMPLE == 0 {
            debug_assert!(self.voltage_samples <= self.voltage_flush_amount());
            let mean = self.voltage_accum / self.voltage_samples.max(1);
            self.write_voltage(index / VOLTAGE_SUBSAMPLE, mean as u8)?;
            self.voltage_accum = 0;
            self.voltage_samples = 0;
        }

        self.info.length += 1;
        if self.info.length as usize == PERSISTENT_CAPACITY {
            self.compact()?;
        }
        Ok(())
    }

    /// Wipe the log and start over under `id`.
    pub fn clear(&mut self, id: u16) -> LogResult<()> {
        self.info = LogInfo::empty(id);
        self.store_header()?;
        for index in 0..PERSISTENT_CAPACITY {
            self.write_count(index, 0)?;
        }
        for index in 0..PERSISTENT_VOLTAGE_CAPACITY {
            self.write_voltage(index, 0)?;
        }
        self.count_accum = 0;
        self.count_samples = 0;
        self.voltage_accum = 0;
        self.voltage_samples = 0;
        Ok(())
    }

    /// Apply the log scaling to a fresh sum, growing the scaling (and
    /// rescaling every stored entry) if the result still needs more than
    /// 16 bits.
    fn fit_to_scale(&mut self, sum: u32) -> LogResult<u16> {
        let scaled = round_down(sum, self.info.scaling);
        if scaled <= MAX_STORED {
            return Ok(narrow(scaled));
        }

        let extra = shift_to_fit(scaled);
        warn!(
            "Sum {} overflows 16 bits at scaling {}, rescaling log by {}",
            sum, self.info.scaling, extra
        );
        for index in 0..self.info.length as usize {
            let stored = self.read_count(index)? as u32;
            self.write_count(index, narrow(round_down(stored, extra)))?;
        }
        self.info.scaling = self.info.scaling.saturating_add(extra);
        self.nvram.update_byte(ADDR_SCALING, self.info.scaling)?;

        Ok(narrow(round_down(scaled, extra)))
    }

    pub(super) fn write_count(&mut self, index: usize, value: u16) -> LogResult<()> {
        Ok(self.nvram.update_word(count_addr(index), value)?)
    }

    pub(super) fn write_voltage(&mut self, index: usize, value: u8) -> LogResult<()> {
        Ok(self.nvram.update_byte(voltage_addr(index), value)?)
    }

    pub(super) fn store_header(&mut self) -> LogResult<()> {
        self.nvram.update_word(ADDR_ID, self.info.id)?;
        self.nvram.update_byte(ADDR_RESOLUTION, self.info.resolution)?;
        self.nvram.update_byte(ADDR_SCALING, self.info.scaling)?;
        Ok(())
    }

    fn erase(&mut self) -> LogResult<()> {
        for address in LOG_BASE..LOG_END {
            self.nvram.update_byte(address, 0)?;
        }
        Ok(())
    }

    fn stored_length(&self) -> LogResult<u16> {
        for index in (0..PERSISTENT_CAPACITY).rev() {
            if self.read_count(index)? != 0 {
                return Ok(index as u16 + 1);
            }
        }
        Ok(0)
    }
}
