use heapless::Vec;

use super::{LogInfo, STAGING_CAPACITY, STAGING_VOLTAGE_CAPACITY, VOLTAGE_SUBSAMPLE};

/// RAM-resident log holding the most recent samples at full resolution.
///
/// Counts are kept raw (not scaled), so a single period may exceed 16 bits;
/// scaling is only chosen when the buffer migrates to NVRAM.
#[derive(Debug, Clone)]
pub struct StagingLog {
    info: LogInfo,
    counts: Vec<u32, STAGING_CAPACITY>,
    /// One mean per completed group of counts; only the first
    /// `counts.len() / VOLTAGE_SUBSAMPLE` slots are in use
    voltages: [u8; STAGING_VOLTAGE_CAPACITY],
    voltage_accum: u32,
}

impl StagingLog {
    /// Create an empty staging log.
    pub fn new(id: u16) -> Self {
        Self {
            info: LogInfo::empty(id),
            counts: Vec::new(),
            voltages: [0; STAGING_VOLTAGE_CAPACITY],
            voltage_accum: 0,
        }
    }

    pub fn info(&self) -> LogInfo {
        self.info
    }

    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    pub fn voltages(&self) -> &[u8] {
        &self.voltages[..self.counts.len() / VOLTAGE_SUBSAMPLE]
    }

    pub fn is_full(&self) -> bool {
        self.counts.is_full()
    }

    /// Voltage total of the samples not yet folded into a voltage byte,
    /// together with how many samples it covers.
    pub fn pending_voltage(&self) -> (u32, u32) {
        let samples = self.counts.len() % VOLTAGE_SUBSAMPLE;
        (self.voltage_accum, samples as u32)
    }

    /// Append one sample.
    ///
    /// Returns `false`, leaving the log untouched, when it is already full.
    pub fn push(&mut self, count: u32, voltage: u8) -> bool {
        if self.counts.push(count).is_err() {
            return false;
        }
        self.info.length = self.counts.len() as u16;
        self.voltage_accum += voltage as u32;

        let len = self.counts.len();
        if len % VOLTAGE_SUBSAMPLE == 0 {
            let mean = self.voltage_accum / VOLTAGE_SUBSAMPLE as u32;
            self.voltages[len / VOLTAGE_SUBSAMPLE - 1] = mean as u8;
            self.voltage_accum = 0;
        }
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_until_full() {
        let mut log = StagingLog::new(3);
        for i in 0..STAGING_CAPACITY as u32 {
            assert!(log.push(i, 100));
        }

        assert!(log.is_full());
        assert!(!log.push(999, 100));
        assert_eq!(log.info().length as usize, STAGING_CAPACITY);
        assert_eq!(log.counts()[39], 39);
        assert_eq!(log.info().id, 3);
    }

    #[test]
    fn test_voltage_mean_per_group() {
        let mut log = StagingLog::new(0);
        for i in 0..VOLTAGE_SUBSAMPLE {
            log.push(1, if i % 2 == 0 { 100 } else { 110 });
        }
        assert_eq!(log.voltages(), &[105]);

        for _ in 0..5 {
            log.push(1, 50);
        }
        assert_eq!(log.voltages().len(), 1);
        assert_eq!(log.pending_voltage(), (250, 5));
    }

    #[test]
    fn test_one_voltage_per_completed_group() {
        let mut log = StagingLog::new(0);
        for _ in 0..STAGING_CAPACITY - 1 {
            log.push(1, 90);
        }
        assert_eq!(log.voltages(), &[90]);

        // (19 * 90 + 109) / 20 truncates to 90.
        log.push(1, 109);
        assert_eq!(log.voltages(), &[90, 90]);
        assert_eq!(log.voltages().len(), STAGING_VOLTAGE_CAPACITY);
        assert!(!log.push(1, 200));
        assert_eq!(log.voltages().len(), STAGING_VOLTAGE_CAPACITY);
    }

    #[test]
    fn test_raw_counts_are_not_scaled() {
        let mut log = StagingLog::new(0);
        log.push(200_000, 0);
        assert_eq!(log.counts(), &[200_000]);
        assert_eq!(log.info().scaling, 0);
    }
}
