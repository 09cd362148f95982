use log::info;

use super::persistent::PersistentLog;
use super::scaling::{narrow, round_down, shift_to_fit};
use super::staging::StagingLog;
use super::{LogInfo, LogResult, PERSISTENT_CAPACITY, PERSISTENT_VOLTAGE_CAPACITY};
use crate::nvram::Nvram;

impl<N: Nvram> PersistentLog<N> {
    /// Replace the NVRAM log with the contents of a full staging log.
    ///
    /// The staging id, resolution and length are taken over as-is; the only
    /// transformation is the single shift needed to fit the largest staged
    /// value into 16 bits. Voltage accumulated since the last staged voltage
    /// byte carries over, so the next voltage byte still averages a full group.
    pub(super) fn absorb(&mut self, staging: &StagingLog) -> LogResult<()> {
        let counts = staging.counts();
        let max = counts.iter().copied().max().unwrap_or(0);
        let shift = shift_to_fit(max);

        for index in 0..PERSISTENT_CAPACITY {
            let value = counts
                .get(index)
                .map_or(0, |&count| narrow(round_down(count, shift)));
            self.write_count(index, value)?;
        }

        let voltages = staging.voltages();
        for index in 0..PERSISTENT_VOLTAGE_CAPACITY {
            self.write_voltage(index, voltages.get(index).copied().unwrap_or(0))?;
        }

        self.info = LogInfo {
            scaling: shift,
            ..staging.info()
        };
        self.store_header()?;

        let (voltage_accum, voltage_samples) = staging.pending_voltage();
        self.voltage_accum = voltage_accum;
        self.voltage_samples = voltage_samples;
        self.count_accum = 0;
        self.count_samples = 0;

        info!(
            "Migrated staging log {} into NVRAM: {} entries, scaling {}",
            self.info.id, self.info.length, self.info.scaling
        );
        Ok(())
    }
}
