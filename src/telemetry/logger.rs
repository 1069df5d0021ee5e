//! # Append-Only Telemetry Logs
//!
//! Two plain-text files, both opened in append mode:
//!
//! - raw log: `HH:MM:SS: [01, 3F, ...]` for every chunk read from the radio
//! - parsed log: `HH:MM:SS: PositionData {"altitude":...}` for every decoded record
//!
//! Each process start writes a `RUN START <timestamp>` marker to both files,
//! which is what [`super::replay`] splits runs on.

use std::fs::{self, File, OpenOptions};
use std::io::{LineWriter, Write};
use std::path::Path;

use chrono::{DateTime, Local};
use tracing::{debug, info};

use crate::error::Result;
use crate::fcb::protocol::Record;

/// Marker written once per process start
pub const RUN_START_MARKER: &str = "RUN START";

/// Raw and parsed record logs
#[derive(Debug, Default)]
pub struct TelemetryLogger {
    raw: Option<LineWriter<File>>,
    parsed: Option<LineWriter<File>>,
}

impl TelemetryLogger {
    /// Open (creating if needed) both logs inside `dir` and write the run marker
    ///
    /// # Errors
    ///
    /// Returns error if the directory or either file cannot be created
    pub fn open<P: AsRef<Path>>(dir: P, raw_file: &str, parsed_file: &str) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let mut logger = Self {
            raw: Some(open_append(&dir.join(raw_file))?),
            parsed: Some(open_append(&dir.join(parsed_file))?),
        };
        logger.write_run_start(Local::now())?;

        info!("Telemetry logs opened in {}", dir.display());
        Ok(logger)
    }

    /// A logger that writes nothing
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self) -> bool {
        self.raw.is_some() || self.parsed.is_some()
    }

    fn write_run_start(&mut self, now: DateTime<Local>) -> Result<()> {
        let line = format!("{} {}\n", RUN_START_MARKER, now.format("%Y-%m-%d %H:%M:%S"));
        for file in [self.raw.as_mut(), self.parsed.as_mut()].into_iter().flatten() {
            file.write_all(line.as_bytes())?;
        }
        Ok(())
    }

    /// Append a raw chunk
    pub fn log_raw(&mut self, bytes: &[u8]) -> Result<()> {
        self.log_raw_at(Local::now(), bytes)
    }

    fn log_raw_at(&mut self, now: DateTime<Local>, bytes: &[u8]) -> Result<()> {
        if let Some(file) = self.raw.as_mut() {
            writeln!(file, "{}: {:02X?}", now.format("%H:%M:%S"), bytes)?;
        }
        Ok(())
    }

    /// Append a decoded record
    pub fn log_record(&mut self, record: &Record) -> Result<()> {
        self.log_record_at(Local::now(), record)
    }

    fn log_record_at(&mut self, now: DateTime<Local>, record: &Record) -> Result<()> {
        if let Some(file) = self.parsed.as_mut() {
            let fields = serde_json::to_string(&record.store_fields())
                .map_err(std::io::Error::from)?;
            writeln!(file, "{}: {} {}", now.format("%H:%M:%S"), record.kind, fields)?;
            debug!("Logged {} record", record.kind);
        }
        Ok(())
    }
}

fn open_append(path: &Path) -> Result<LineWriter<File>> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    Ok(LineWriter::new(file))
}
