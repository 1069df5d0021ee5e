//! # Parsed Log Replay
//!
//! Offline reader for the parsed telemetry log. Splits the file into runs on
//! `RUN START` markers and replays each record with the seconds elapsed since the
//! first record of its run, so per-field histories can be rebuilt for plotting.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use chrono::NaiveTime;
use tracing::warn;

use super::logger::RUN_START_MARKER;
use crate::error::Result;
use crate::fcb::protocol::{FieldMap, MessageKind, Value};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// One replayed record
#[derive(Debug, Clone, PartialEq)]
pub struct ReplayEntry {
    /// Seconds since the first record of the run
    pub elapsed_s: f64,
    pub kind: MessageKind,
    pub fields: FieldMap,
}

/// Records belonging to one process run
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Run {
    /// Timestamp text following the `RUN START` marker, `None` for records
    /// that precede any marker
    pub started: Option<String>,
    pub entries: Vec<ReplayEntry>,
}

impl Run {
    /// `(elapsed_s, value)` for every record of the run carrying `field`
    pub fn history(&self, field: &str) -> Vec<(f64, Value)> {
        self.entries
            .iter()
            .filter_map(|e| e.fields.get(field).map(|v| (e.elapsed_s, v.clone())))
            .collect()
    }
}

/// Read and split a parsed log file
pub fn load<P: AsRef<Path>>(path: P) -> Result<Vec<Run>> {
    let file = File::open(path)?;
    parse(BufReader::new(file))
}

/// Split a parsed log into runs
///
/// Lines that do not parse are skipped with a warning.
pub fn parse<R: BufRead>(reader: R) -> Result<Vec<Run>> {
    let mut runs: Vec<Run> = Vec::new();
    let mut clock = RunClock::default();

    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        let line = line.trim_end();
        if line.is_empty() {
            continue;
        }

        if let Some(started) = line.strip_prefix(RUN_START_MARKER) {
            runs.push(Run {
                started: Some(started.trim().to_string()),
                entries: Vec::new(),
            });
            clock = RunClock::default();
            continue;
        }

        let Some((time, kind, fields)) = parse_record_line(line) else {
            warn!("Skipping malformed log line {}", number + 1);
            continue;
        };

        if runs.is_empty() {
            runs.push(Run::default());
        }
        let elapsed_s = clock.elapsed(time);
        if let Some(run) = runs.last_mut() {
            run.entries.push(ReplayEntry { elapsed_s, kind, fields });
        }
    }

    Ok(runs)
}

/// `HH:MM:SS: Kind {json}`
fn parse_record_line(line: &str) -> Option<(NaiveTime, MessageKind, FieldMap)> {
    let (time, rest) = line.split_once(": ")?;
    let time = NaiveTime::parse_from_str(time, "%H:%M:%S").ok()?;
    let (kind, json) = rest.split_once(' ')?;
    let fields: FieldMap = serde_json::from_str(json).ok()?;
    Some((time, MessageKind::from_name(kind), fields))
}

/// Wall-clock-of-day to elapsed seconds, tolerating midnight rollover
#[derive(Debug, Default)]
struct RunClock {
    first: Option<NaiveTime>,
    previous: Option<NaiveTime>,
    days: f64,
}

impl RunClock {
    fn elapsed(&mut self, time: NaiveTime) -> f64 {
        let first = *self.first.get_or_insert(time);
        if let Some(previous) = self.previous {
            if time < previous {
                self.days += 1.0;
            }
        }
        self.previous = Some(time);

        let delta = (time - first).num_milliseconds() as f64 / 1000.0;
        delta + self.days * SECONDS_PER_DAY
    }
}
