//! Hardware-independent dose logging core for the geiger counter firmware
//!
//! This crate keeps an unbounded radiation time series inside a few hundred
//! bytes of NVRAM. Recent samples are staged in RAM at full resolution; once
//! the staging buffer overflows they migrate into the NVRAM log, which halves
//! its own time resolution every time it fills up.
//!
//! It is `#![no_std]` and allocation-free so it compiles on the 8-bit target
//! as well as on desktop hosts (for the simulator and tests).

#![cfg_attr(not(test), no_std)]

pub mod nvram;
pub mod report;
pub mod storage;

pub use nvram::{Nvram, NvramError, RamNvram};
pub use report::{LogSnapshot, ReportError, ReportWriter, StatusReport};
pub use storage::{DoseLogger, LogError, LogInfo, LogKind, LogSink, LoggerState};
