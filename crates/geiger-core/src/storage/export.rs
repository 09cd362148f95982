use super::{DoseLogger, LogKind, LogResult};
use crate::nvram::Nvram;
use crate::report::{LogSnapshot, SnapshotSink};

/// Receiver for a streamed log dump.
///
/// [`DoseLogger::fetch`] calls [`value`](Self::value) for every number and
/// [`line_break`](Self::line_break) after each group:
///
/// ```text
/// id, resolution, scaling, length    <line break>
/// count 1, count 2, ..., count n     <line break>
/// voltage 1, ..., voltage n / 20     <line break>
/// ```
///
/// Counts are raw stored values (multiply by `2^scaling`), voltages are raw
/// compressed bytes.
pub trait LogSink {
    fn value(&mut self, value: u32);
    fn line_break(&mut self);
}

impl<N: Nvram> DoseLogger<N> {
    /// Stream one log into `sink`. Never modifies either log.
    pub fn fetch<S: LogSink + ?Sized>(&self, kind: LogKind, sink: &mut S) -> LogResult<()> {
        let info = self.info(kind);
        sink.value(info.id as u32);
        sink.value(info.resolution as u32);
        sink.value(info.scaling as u32);
        sink.value(info.length as u32);
        sink.line_break();

        let voltage_length = info.voltage_length() as usize;
        match kind {
            LogKind::Staging => {
                for &count in self.staging.counts() {
                    sink.value(count);
                }
                sink.line_break();
                for &voltage in self.staging.voltages().iter().take(voltage_length) {
                    sink.value(voltage as u32);
                }
            }
            LogKind::Persistent => {
                for index in 0..info.length as usize {
                    sink.value(self.persistent.read_count(index)? as u32);
                }
                sink.line_break();
                for index in 0..voltage_length {
                    sink.value(self.persistent.read_voltage(index)? as u32);
                }
            }
        }
        sink.line_break();
        Ok(())
    }

    /// Copy one log into an owned, fixed-capacity snapshot.
    pub fn snapshot(&self, kind: LogKind) -> LogResult<LogSnapshot> {
        let mut sink = SnapshotSink::default();
        self.fetch(kind, &mut sink)?;
        Ok(sink.finish()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::nvram::RamNvram;
    use crate::storage::layout::NVRAM_SIZE;

    /// Records the call sequence as text, `|` marking line breaks.
    #[derive(Default)]
    struct Recorder(std::string::String);

    impl LogSink for Recorder {
        fn value(&mut self, value: u32) {
            self.0.push_str(&std::format!("{} ", value));
        }

        fn line_break(&mut self) {
            self.0.push('|');
        }
    }

    #[test]
    fn test_fetch_call_sequence() {
        let mut logger = DoseLogger::boot(RamNvram::<NVRAM_SIZE>::new()).unwrap();
        logger.ingest(7, 3036).unwrap();
        logger.ingest(8, 3036).unwrap();

        let mut recorder = Recorder::default();
        logger.fetch(LogKind::Staging, &mut recorder).unwrap();
        assert_eq!(recorder.0, "1 1 0 2 |7 8 ||");

        let mut recorder = Recorder::default();
        logger.fetch(LogKind::Persistent, &mut recorder).unwrap();
        assert_eq!(recorder.0, "0 1 0 0 |||");
    }

    #[test]
    fn test_fetch_is_read_only() {
        let mut logger = DoseLogger::boot(RamNvram::<NVRAM_SIZE>::new()).unwrap();
        for _ in 0..60 {
            logger.ingest(3, 3100).unwrap();
        }
        let writes = logger.nvram().writes();
        let before = logger.info(LogKind::Persistent);

        let mut recorder = Recorder::default();
        logger.fetch(LogKind::Persistent, &mut recorder).unwrap();
        logger.fetch(LogKind::Staging, &mut recorder).unwrap();

        assert_eq!(logger.nvram().writes(), writes);
        assert_eq!(logger.info(LogKind::Persistent), before);
    }
}
