use log::info;

use super::persistent::PersistentLog;
use super::staging::StagingLog;
use super::{LogInfo, LogKind, LogResult, next_log_id, voltage};
use crate::nvram::Nvram;
use crate::report::StatusReport;

/// Which log new samples currently go to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoggerState {
    /// Samples fill the staging log; the NVRAM log still holds an older log
    StagingActive,
    /// Staging has migrated into NVRAM and stays dormant until a reset
    Merged,
}

/// Owner of the staging and persistent logs.
///
/// Call [`ingest`](Self::ingest) once per base period with the pulses counted
/// in that period. Every mutating operation takes `&mut self`, so ingestion
/// (including a migration or compaction it triggers) always runs to
/// completion before anything else can observe or change the logs.
///
/// ## Usage
///
/// ```rust
/// use geiger_core::storage::layout::NVRAM_SIZE;
/// use geiger_core::{DoseLogger, LogKind, RamNvram};
///
/// let mut logger = DoseLogger::boot(RamNvram::<NVRAM_SIZE>::erased())?;
/// logger.ingest(12, 3036)?;
/// assert_eq!(logger.info(LogKind::Staging).length, 1);
/// # Ok::<(), geiger_core::LogError>(())
/// ```
pub struct DoseLogger<N: Nvram> {
    pub(super) persistent: PersistentLog<N>,
    pub(super) staging: StagingLog,
}

impl<N: Nvram> DoseLogger<N> {
    /// Load the persistent log and open a new staging log after it.
    pub fn boot(nvram: N) -> LogResult<Self> {
        let persistent = PersistentLog::load(nvram)?;
        let staging = StagingLog::new(next_log_id(persistent.info().id));
        info!(
            "Staging log {} opened in front of persistent log {}",
            staging.info().id,
            persistent.info().id
        );
        Ok(Self {
            persistent,
            staging,
        })
    }

    pub fn state(&self) -> LoggerState {
        if self.staging.info().id == self.persistent.info().id {
            LoggerState::Merged
        } else {
            LoggerState::StagingActive
        }
    }

    /// Record one base period worth of pulses and the battery voltage in
    /// millivolts.
    pub fn ingest(&mut self, counts: u32, battery_mv: u16) -> LogResult<()> {
        let voltage = voltage::compress(battery_mv);
        match self.state() {
            LoggerState::StagingActive => {
                if self.staging.push(counts, voltage) {
                    return Ok(());
                }
                self.persistent.absorb(&self.staging)?;
                self.persistent.append(counts, voltage)
            }
            LoggerState::Merged => self.persistent.append(counts, voltage),
        }
    }

    pub fn info(&self, kind: LogKind) -> LogInfo {
        match kind {
            LogKind::Staging => self.staging.info(),
            LogKind::Persistent => self.persistent.info(),
        }
    }

    /// Empty both logs and start a new staging log.
    ///
    /// The persistent log takes over the newest id handed out so far, so the
    /// fresh staging log gets an id neither log has used before.
    pub fn reset_all(&mut self) -> LogResult<()> {
        let latest = self.staging.info().id;
        self.persistent.clear(latest)?;
        self.staging = StagingLog::new(next_log_id(latest));
        info!(
            "Logs cleared, staging log {} opened in front of persistent log {}",
            self.staging.info().id,
            latest
        );
        Ok(())
    }

    /// Summary line for the host `STATUS` command.
    pub fn status(&self, battery_mv: u16, uptime_secs: u32) -> StatusReport {
        let persistent = self.persistent.info();
        let staging = self.staging.info();
        StatusReport {
            battery_mv,
            uptime_secs,
            persistent_id: persistent.id,
            persistent_length: persistent.length,
            persistent_resolution: persistent.resolution,
            staging_id: staging.id,
            staging_length: staging.length,
        }
    }

    pub fn staging(&self) -> &StagingLog {
        &self.staging
    }

    pub fn persistent(&self) -> &PersistentLog<N> {
        &self.persistent
    }

    pub fn nvram(&self) -> &N {
        self.persistent.nvram()
    }

    /// Shut down, handing back the NVRAM backend.
    pub fn into_nvram(self) -> N {
        self.persistent.into_nvram()
    }
}
