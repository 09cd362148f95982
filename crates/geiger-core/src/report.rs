//! Host-facing report formats.
//!
//! A dumped log travels to the PC as three text lines:
//!
//! ```text
//! 15,1,0,23
//! 10,8,11,13,10,9,12,14,11,8,8,10,12,7,9,10,11,13,14,10,11,9,9
//! 138
//! ```
//!
//! The first line is `id,resolution,scaling,length`, the second the stored
//! counts and the third the compressed voltage bytes (one per 20 counts).
//! The third line and its newline are always present, even when empty.
//!
//! [`ReportWriter`] renders this format straight from a
//! [`fetch`](crate::DoseLogger::fetch) stream. [`LogSnapshot`] holds a whole
//! dump in fixed-capacity storage; it parses the text format back, decodes
//! stored values into physical units and has a compact postcard encoding.

use core::fmt::{self, Display, Write};

use heapless::Vec;
use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

use crate::storage::voltage;
use crate::storage::{LogInfo, LogSink, PERSISTENT_CAPACITY, PERSISTENT_VOLTAGE_CAPACITY};

/// Error types for report parsing and encoding
#[derive(Debug, Error)]
pub enum ReportError {
    /// A required line is absent
    #[error("Missing {section} line")]
    MissingLine {
        /// Which of the three lines is missing
        section: &'static str,
    },

    /// A field is not a decimal number
    #[error("Invalid number in {section} line")]
    InvalidNumber {
        /// Line containing the bad field
        section: &'static str,
    },

    /// The header does not have exactly four fields
    #[error("Header must be id,resolution,scaling,length")]
    MalformedHeader,

    /// A number does not fit its field
    #[error("Value {value} out of range for {field}")]
    OutOfRange {
        /// Field name
        field: &'static str,
        /// Offending value
        value: u32,
    },

    /// More values than a log can hold
    #[error("Capacity exceeded (max: {max})")]
    CapacityExceeded {
        /// Capacity of the overflowing array
        max: usize,
    },

    /// The header length disagrees with the number of counts
    #[error("Header declares {declared} samples but {found} follow")]
    LengthMismatch {
        /// Length from the header
        declared: u16,
        /// Number of counts present
        found: usize,
    },

    /// The voltage line does not have `length / 20` entries
    #[error("Expected {expected} voltage samples, found {found}")]
    VoltageLengthMismatch {
        /// Derived from the header length
        expected: u16,
        /// Number of voltages present
        found: usize,
    },

    /// Values after the third line break
    #[error("Unexpected data after the voltage line")]
    TrailingData,

    /// Binary encoding failed
    #[error("Binary encoding failed: {0}")]
    Encoding(postcard::Error),
}

/// Result type for report operations
pub type ReportResult<T> = Result<T, ReportError>;

/// [`LogSink`] that renders the comma-separated text report.
///
/// Formatting errors are latched; [`finish`](Self::finish) reports the first.
pub struct ReportWriter<W: Write> {
    out: W,
    line_start: bool,
    result: fmt::Result,
}

impl<W: Write> ReportWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            line_start: true,
            result: Ok(()),
        }
    }

    /// Hand back the output, or the first formatting error.
    pub fn finish(self) -> Result<W, fmt::Error> {
        self.result.map(|()| self.out)
    }
}

impl<W: Write> LogSink for ReportWriter<W> {
    fn value(&mut self, value: u32) {
        if self.result.is_err() {
            return;
        }
        let separator = if self.line_start { "" } else { "," };
        self.result = write!(self.out, "{}{}", separator, value);
        self.line_start = false;
    }

    fn line_break(&mut self) {
        if self.result.is_err() {
            return;
        }
        self.result = self.out.write_char('\n');
        self.line_start = true;
    }
}

/// A complete dump of one log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogSnapshot {
    info: LogInfo,
    counts: Vec<u32, PERSISTENT_CAPACITY>,
    voltages: Vec<u8, PERSISTENT_VOLTAGE_CAPACITY>,
}

impl LogSnapshot {
    /// Parse the three-line text report.
    pub fn parse(text: &str) -> ReportResult<Self> {
        let mut sink = SnapshotSink::default();
        let mut lines = text.lines();
        for section in ["header", "counts", "voltages"] {
            let line = lines.next().ok_or(ReportError::MissingLine { section })?;
            for field in line.split(',').map(str::trim).filter(|f| !f.is_empty()) {
                let value = field
                    .parse::<u32>()
                    .map_err(|_| ReportError::InvalidNumber { section })?;
                sink.value(value);
            }
            sink.line_break();
        }
        if lines.any(|line| !line.trim().is_empty()) {
            return Err(ReportError::TrailingData);
        }
        sink.finish()
    }

    pub fn info(&self) -> LogInfo {
        self.info
    }

    /// Stored counts, still scaled.
    pub fn counts(&self) -> &[u32] {
        &self.counts
    }

    /// Compressed voltage bytes.
    pub fn voltages(&self) -> &[u8] {
        &self.voltages
    }

    /// Pulses per entry, with the scaling undone.
    pub fn decoded_counts(&self) -> impl Iterator<Item = u64> + '_ {
        let scaling = self.info.scaling as u32;
        self.counts
            .iter()
            .map(move |&count| (count as u64).checked_shl(scaling).unwrap_or(u64::MAX))
    }

    /// Battery voltages in millivolts.
    pub fn voltages_mv(&self) -> impl Iterator<Item = u16> + '_ {
        self.voltages.iter().map(|&byte| voltage::decompress(byte))
    }

    /// Total pulses recorded over the whole log.
    pub fn total_counts(&self) -> u64 {
        self.decoded_counts().fold(0, u64::saturating_add)
    }

    /// Seconds covered by the log.
    pub fn duration_secs(&self) -> u64 {
        self.info.length as u64 * self.info.entry_secs() as u64
    }

    /// Average pulses per minute over the whole log, rounded.
    pub fn mean_cpm(&self) -> Option<u64> {
        let duration = self.duration_secs();
        if duration == 0 {
            return None;
        }
        Some((self.total_counts().saturating_mul(60) + duration / 2) / duration)
    }

    /// Stream the snapshot into a sink in the same order as a live fetch.
    pub fn replay<S: LogSink + ?Sized>(&self, sink: &mut S) {
        sink.value(self.info.id as u32);
        sink.value(self.info.resolution as u32);
        sink.value(self.info.scaling as u32);
        sink.value(self.info.length as u32);
        sink.line_break();
        for &count in &self.counts {
            sink.value(count);
        }
        sink.line_break();
        for &byte in &self.voltages {
            sink.value(byte as u32);
        }
        sink.line_break();
    }

    /// Serialize into `buf` with postcard, returning the used prefix.
    pub fn encode<'a>(&self, buf: &'a mut [u8]) -> ReportResult<&'a mut [u8]> {
        postcard::to_slice(self, buf).map_err(ReportError::Encoding)
    }

    /// Deserialize a postcard encoding produced by [`encode`](Self::encode).
    pub fn decode(bytes: &[u8]) -> ReportResult<Self> {
        let snapshot: Self = postcard::from_bytes(bytes).map_err(ReportError::Encoding)?;
        snapshot.validate()?;
        Ok(snapshot)
    }

    fn validate(&self) -> ReportResult<()> {
        if self.counts.len() != self.info.length as usize {
            return Err(ReportError::LengthMismatch {
                declared: self.info.length,
                found: self.counts.len(),
            });
        }
        if self.voltages.len() != self.info.voltage_length() as usize {
            return Err(ReportError::VoltageLengthMismatch {
                expected: self.info.voltage_length(),
                found: self.voltages.len(),
            });
        }
        Ok(())
    }
}

impl Display for LogSnapshot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut writer = ReportWriter::new(f);
        self.replay(&mut writer);
        writer.finish().map(|_| ())
    }
}

/// Collects a fetch stream into a [`LogSnapshot`].
#[derive(Default)]
pub(crate) struct SnapshotSink {
    header: Vec<u32, 4>,
    counts: Vec<u32, PERSISTENT_CAPACITY>,
    voltages: Vec<u8, PERSISTENT_VOLTAGE_CAPACITY>,
    line: usize,
    error: Option<ReportError>,
}

impl SnapshotSink {
    pub(crate) fn finish(self) -> ReportResult<LogSnapshot> {
        if let Some(error) = self.error {
            return Err(error);
        }
        let &[id, resolution, scaling, length] = self.header.as_slice() else {
            return Err(ReportError::MalformedHeader);
        };
        let info = LogInfo {
            id: narrow_field(id, "id")?,
            resolution: narrow_field(resolution, "resolution")?,
            scaling: narrow_field(scaling, "scaling")?,
            length: narrow_field(length, "length")?,
        };
        let snapshot = LogSnapshot {
            info,
            counts: self.counts,
            voltages: self.voltages,
        };
        snapshot.validate()?;
        Ok(snapshot)
    }

    fn record(&mut self, error: ReportError) {
        if self.error.is_none() {
            self.error = Some(error);
        }
    }
}

impl LogSink for SnapshotSink {
    fn value(&mut self, value: u32) {
        let error = match self.line {
            0 => self
                .header
                .push(value)
                .err()
                .map(|_| ReportError::MalformedHeader),
            1 => self
                .counts
                .push(value)
                .err()
                .map(|_| ReportError::CapacityExceeded {
                    max: PERSISTENT_CAPACITY,
                }),
            2 => match u8::try_from(value) {
                Ok(byte) => self
                    .voltages
                    .push(byte)
                    .err()
                    .map(|_| ReportError::CapacityExceeded {
                        max: PERSISTENT_VOLTAGE_CAPACITY,
                    }),
                Err(_) => Some(ReportError::OutOfRange {
                    field: "voltage",
                    value,
                }),
            },
            _ => Some(ReportError::TrailingData),
        };
        if let Some(error) = error {
            self.record(error);
        }
    }

    fn line_break(&mut self) {
        self.line += 1;
    }
}

fn narrow_field<T: TryFrom<u32>>(value: u32, field: &'static str) -> ReportResult<T> {
    T::try_from(value).map_err(|_| ReportError::OutOfRange { field, value })
}

/// Device summary returned by the `STATUS` command.
///
/// Rendered as `voltage,uptime,persistent id,persistent length,persistent
/// resolution,staging id,staging length`, e.g. `3036,10,1,125,4,1,40`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusReport {
    /// Current battery voltage in millivolts
    pub battery_mv: u16,
    /// Seconds since the last reset
    pub uptime_secs: u32,
    pub persistent_id: u16,
    pub persistent_length: u16,
    pub persistent_resolution: u8,
    /// Equal to `persistent_id` once staging has migrated
    pub staging_id: u16,
    pub staging_length: u16,
}

impl Display for StatusReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{},{},{},{}",
            self.battery_mv,
            self.uptime_secs,
            self.persistent_id,
            self.persistent_length,
            self.persistent_resolution,
            self.staging_id,
            self.staging_length
        )
    }
}
