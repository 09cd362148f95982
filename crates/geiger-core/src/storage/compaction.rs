//! In-place halving of a full persistent log.
//!
//! Adjacent entries are merged pairwise into the lower half of the array and
//! the upper half is zeroed, so each entry afterwards covers twice the time.
//! Counts are additive and merge by summing; voltages are intensive and merge
//! by averaging. Merging pair `i` only reads indices `2i` and `2i + 1`, which
//! are never below `i`, so the array can be rewritten front to back.

use log::info;

use super::persistent::PersistentLog;
use super::scaling::{narrow, round_down, shift_to_fit};
use super::{LogResult, PERSISTENT_CAPACITY, PERSISTENT_VOLTAGE_CAPACITY};
use crate::nvram::Nvram;

impl<N: Nvram> PersistentLog<N> {
    pub(super) fn compact(&mut self) -> LogResult<()> {
        let pairs = PERSISTENT_CAPACITY / 2;

        let mut max_sum = 0;
        for pair in 0..pairs {
            max_sum = max_sum.max(self.pair_sum(pair)?);
        }
        let extra = shift_to_fit(max_sum);

        for pair in 0..pairs {
            let sum = self.pair_sum(pair)?;
            self.write_count(pair, narrow(round_down(sum, extra)))?;
        }
        for index in pairs..PERSISTENT_CAPACITY {
            self.write_count(index, 0)?;
        }

        let voltage_pairs = PERSISTENT_VOLTAGE_CAPACITY / 2;
        for pair in 0..voltage_pairs {
            let first = self.read_voltage(2 * pair)? as u16;
            let second = self.read_voltage(2 * pair + 1)? as u16;
            self.write_voltage(pair, ((first + second) / 2) as u8)?;
        }
        for index in voltage_pairs..PERSISTENT_VOLTAGE_CAPACITY {
            self.write_voltage(index, 0)?;
        }

        self.info.scaling = self.info.scaling.saturating_add(extra);
        self.info.resolution = self.info.resolution.saturating_add(1);
        self.info.length = pairs as u16;
        self.store_header()?;

        info!(
            "Compacted persistent log {}: resolution {}, scaling {}, flushing every {} samples",
            self.info.id,
            self.info.resolution,
            self.info.scaling,
            self.flush_amount()
        );
        Ok(())
    }

    fn pair_sum(&self, pair: usize) -> LogResult<u32> {
        let first = self.read_count(2 * pair)? as u32;
        let second = self.read_count(2 * pair + 1)? as u32;
        Ok(first + second)
    }
}
