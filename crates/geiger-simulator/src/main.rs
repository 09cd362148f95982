//! Desktop dry-run simulator for the geiger counter dose log.
//!
//! Drives `geiger-core` with synthetic pulse counts so long logging runs
//! (migration, compaction, rescaling) can be watched without hardware. The
//! NVRAM image lives in a file and survives between runs, just like the
//! EEPROM on the device.
//!
//! # Usage
//!
//! ```text
//! geiger-simulator [IMAGE] [--rad <uSv/h>] [--battery <mV>]
//! ```
//!
//! # Commands
//!
//! Upper-case commands answer the way the device does over its serial link.
//!
//! | Command                      | Action                                  |
//! |------------------------------|-----------------------------------------|
//! | `HELO`                       | Print hello message                     |
//! | `STATUS`                     | Print device status                     |
//! | `RSLOG`                      | Dump the staging (RAM) log              |
//! | `REELOG`                     | Dump the persistent (NVRAM) log         |
//! | `CLOG`                       | Clear all logs                          |
//! | `addsamples <n>`             | Ingest `n` thirty-second samples        |
//! | `setrad <x> [uSv\|mSv\|Sv]`  | Set the simulated dose rate per hour    |
//! | `reboot`                     | Power cycle, losing the staging log     |
//! | `help`                       | Print this table                        |
//! | `exit`                       | Save the image and quit                 |
//!
//! Set `RUST_LOG=info` (or `debug`) to watch the logger work.

use std::fmt;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use clap::Parser;
use log::{error, info};
use thiserror_no_std::Error;

use geiger_core::storage::BASE_PERIOD_SECS;
use geiger_core::storage::layout::NVRAM_SIZE;
use geiger_core::{DoseLogger, LogError, LogKind, RamNvram, ReportWriter};

type Nv = RamNvram<NVRAM_SIZE>;

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

/// Firmware revision reported by `HELO`.
const FIRMWARE_REVISION: &str = "331";

/// Pulses per 30 s period per uSv/h for an SBM-20 tube.
const COUNTS_PER_PERIOD_PER_USV_H: f64 = 175.4 / 2.0;

const USAGE: &str = "\
Device commands (case sensitive):
    HELO (void) - Print hello message
    STATUS (void) - Print device status
    RSLOG (void) - Read SRAM log
    REELOG (void) - Read EEPROM log
    CLOG (void) - Clear all logs

Simulator commands:
    help, exit, reboot, addsamples <count>, setrad <radiation> [uSv|mSv|Sv]";

/// Simulator settings, overridable from the command line.
#[derive(Parser, Debug, Clone)]
#[command(name = "geiger-simulator", version, about)]
struct SimulatorConfig {
    /// File holding the NVRAM image between runs
    #[arg(default_value = "eeprom.bin")]
    image_path: PathBuf,

    /// Starting dose rate in uSv/h
    #[arg(long = "rad", default_value_t = 0.14)]
    radiation_usv_h: f64,

    /// Battery voltage the mock hovers around, in millivolts
    #[arg(long = "battery", default_value_t = 3015)]
    battery_mv: u16,
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
enum SimError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("NVRAM image is {found} bytes, expected {expected}")]
    ImageSize { found: usize, expected: usize },

    #[error("{0}")]
    Log(#[from] LogError),

    #[error("Failed to format report: {0}")]
    Format(#[from] fmt::Error),
}

// ---------------------------------------------------------------------------
// Mock data generation
// ---------------------------------------------------------------------------

/// Generates pulse counts and battery readings that vary over time.
///
/// Counts follow the configured dose rate with a slow sinusoidal wobble.
/// Fractions carry over between periods so the long-run mean is exact.
struct MockCountGenerator {
    radiation_usv_h: f64,
    battery_mv: u16,
    /// Simulated seconds since the generator started
    elapsed_secs: f64,
    carry: f64,
}

impl MockCountGenerator {
    fn new(config: &SimulatorConfig) -> Self {
        Self {
            radiation_usv_h: config.radiation_usv_h,
            battery_mv: config.battery_mv,
            elapsed_secs: 0.0,
            carry: 0.0,
        }
    }

    /// Advance one base period and return the pulses counted in it.
    fn next_counts(&mut self) -> u32 {
        self.elapsed_secs += BASE_PERIOD_SECS as f64;
        let t = self.elapsed_secs;

        let mean = self.radiation_usv_h * COUNTS_PER_PERIOD_PER_USV_H;
        let wobble = 1.0 + 0.2 * (t / 600.0).sin() + 0.1 * (t / 97.0).cos();
        self.carry += (mean * wobble).max(0.0);

        let whole = self.carry.floor();
        self.carry -= whole;
        whole.min(u32::MAX as f64) as u32
    }

    /// Battery voltage in millivolts, drifting slowly around the baseline.
    fn battery_mv(&self) -> u16 {
        let t = self.elapsed_secs;
        let drift = 20.0 * (t / 3600.0).sin() + 3.0 * (t / 45.0).cos();
        (self.battery_mv as f64 + drift).clamp(0.0, u16::MAX as f64) as u16
    }
}

// ---------------------------------------------------------------------------
// Device
// ---------------------------------------------------------------------------

/// The simulated device: logger, mock sensors and uptime.
struct Device {
    logger: DoseLogger<Nv>,
    generator: MockCountGenerator,
    uptime_secs: u32,
    image_path: PathBuf,
}

impl Device {
    fn power_on(config: &SimulatorConfig) -> Result<Self, SimError> {
        let nvram = load_image(&config.image_path)?;
        Ok(Self {
            logger: DoseLogger::boot(nvram)?,
            generator: MockCountGenerator::new(config),
            uptime_secs: 0,
            image_path: config.image_path.clone(),
        })
    }

    fn add_samples(&mut self, n: u32) -> Result<(), SimError> {
        for _ in 0..n {
            let counts = self.generator.next_counts();
            self.logger.ingest(counts, self.generator.battery_mv())?;
            self.uptime_secs = self.uptime_secs.saturating_add(BASE_PERIOD_SECS);
        }
        self.save()
    }

    fn reboot(&mut self) -> Result<(), SimError> {
        self.save()?;
        let nvram = load_image(&self.image_path)?;
        self.logger = DoseLogger::boot(nvram)?;
        self.uptime_secs = 0;
        Ok(())
    }

    fn save(&self) -> Result<(), SimError> {
        std::fs::write(&self.image_path, self.logger.nvram().image())?;
        Ok(())
    }

    /// Answer an upper-case device command.
    fn command(&mut self, line: &str, out: &mut impl Write) -> Result<(), SimError> {
        match line {
            "HELO" => writeln!(out, "O HAI,{},42", FIRMWARE_REVISION)?,
            "STATUS" => {
                let status = self
                    .logger
                    .status(self.generator.battery_mv(), self.uptime_secs);
                writeln!(out, "{}", status)?;
            }
            "RSLOG" => write!(out, "{}", self.dump(LogKind::Staging)?)?,
            "REELOG" => write!(out, "{}", self.dump(LogKind::Persistent)?)?,
            "CLOG" => {
                self.logger.reset_all()?;
                self.save()?;
                writeln!(out, "OK")?;
            }
            _ => writeln!(out, "Bad command!")?,
        }
        Ok(())
    }

    fn dump(&self, kind: LogKind) -> Result<String, SimError> {
        let mut writer = ReportWriter::new(String::new());
        self.logger.fetch(kind, &mut writer)?;
        Ok(writer.finish()?)
    }
}

fn load_image(path: &Path) -> Result<Nv, SimError> {
    match std::fs::read(path) {
        Ok(bytes) => {
            let len = bytes.len();
            let image: [u8; NVRAM_SIZE] = bytes
                .try_into()
                .map_err(|_| SimError::ImageSize {
                    found: len,
                    expected: NVRAM_SIZE,
                })?;
            info!("Loaded NVRAM image from {}", path.display());
            Ok(Nv::from_image(image))
        }
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            info!("No NVRAM image at {}, starting erased", path.display());
            Ok(Nv::erased())
        }
        Err(err) => Err(err.into()),
    }
}

/// Parse `setrad <x> [uSv|mSv|Sv]` into uSv/h.
fn parse_radiation(args: &str) -> Option<f64> {
    let mut parts = args.split_whitespace();
    let value: f64 = parts.next()?.parse().ok()?;
    let factor = match parts.next() {
        None | Some("uSv") => 1.0,
        Some("mSv") => 1e3,
        Some("Sv") => 1e6,
        Some(_) => return None,
    };
    Some(value * factor)
}

// ---------------------------------------------------------------------------
// Main loop
// ---------------------------------------------------------------------------

fn run(config: SimulatorConfig) -> Result<(), SimError> {
    info!(
        "Image {}, radiation {} uSv/h, battery {} mV",
        config.image_path.display(),
        config.radiation_usv_h,
        config.battery_mv
    );
    let mut device = Device::power_on(&config)?;

    let stdin = io::stdin();
    let mut out = io::stdout().lock();
    for line in stdin.lock().lines() {
        let line = line?;
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        if line.starts_with(|c: char| c.is_ascii_uppercase()) {
            device.command(line, &mut out)?;
            out.flush()?;
            continue;
        }

        let (word, args) = line.split_once(' ').unwrap_or((line, ""));
        match word {
            "addsamples" => match args.trim().parse() {
                Ok(n) => device.add_samples(n)?,
                Err(_) => writeln!(out, "Usage: addsamples <count>")?,
            },
            "setrad" => match parse_radiation(args) {
                Some(usv_h) => {
                    device.generator.radiation_usv_h = usv_h;
                    writeln!(out, "Radiation set to {:.8} Sv/h", usv_h / 1e6)?;
                }
                None => writeln!(out, "Usage: setrad <radiation> [uSv|mSv|Sv]")?,
            },
            "reboot" => {
                device.reboot()?;
                info!("Rebooted");
            }
            "help" => writeln!(out, "{}", USAGE)?,
            "exit" => break,
            _ => writeln!(out, "Bad command!")?,
        }
        out.flush()?;
    }

    device.save()?;
    info!("Simulator exiting, image saved to {}", config.image_path.display());
    Ok(())
}

fn main() {
    env_logger::init();
    info!("Starting geiger-rs simulator");

    let config = SimulatorConfig::parse();

    if let Err(err) = run(config) {
        error!("{}", err);
        std::process::exit(1);
    }
}
