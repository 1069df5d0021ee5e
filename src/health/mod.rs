//! # Health Module
//!
//! Derives the operator-facing annunciator panel from link state, data freshness
//! and per-record CRC flags.
//!
//! ## Slots
//!
//! | # | Label | OK | Warning | Fault |
//! |---|-------|----|---------|-------|
//! | 1 | GS Link | connected | | not connected |
//! | 2 | FCB Data | receiving | | no data |
//! | 3 | Data Quality | fresh and CRC good | last CRC bad | no good data in window |
//! | 4 | FCB GPS | fix | no fix | |
//! | 5 | GS GPS (optional) | fix | no fix | |
//!
//! The overall status is the worst severity across the slots.

use std::collections::BTreeMap;
use std::fmt;
use std::time::Duration;

use crate::fcb::protocol::Value;
use crate::link::LinkState;

/// Good data older than this faults the data-quality slot
pub const DEFAULT_GOOD_DATA_WINDOW: Duration = Duration::from_secs(5);

/// Annunciator severity, ordered from best to worst
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Severity {
    Ok,
    Unknown,
    Warning,
    Fault,
}

impl Severity {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Ok => "OK",
            Self::Unknown => "UNKNOWN",
            Self::Warning => "WARNING",
            Self::Fault => "FAULT",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One named status line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Annunciator {
    pub label: &'static str,
    pub severity: Severity,
    pub tooltip: String,
}

impl Annunciator {
    fn new(label: &'static str, severity: Severity, tooltip: impl Into<String>) -> Self {
        Self {
            label,
            severity,
            tooltip: tooltip.into(),
        }
    }

    fn to_value(&self) -> Value {
        let mut map = BTreeMap::new();
        map.insert("label".to_string(), Value::from(self.label));
        map.insert("severity".to_string(), Value::from(self.severity.as_str()));
        map.insert("tooltip".to_string(), Value::from(self.tooltip.as_str()));
        Value::Map(map)
    }
}

/// Everything the monitor looks at
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HealthInputs {
    pub link_state: LinkState,
    pub has_data: bool,
    /// Age of the last CRC-good vehicle record, `None` if there never was one
    pub last_good_data_age: Option<Duration>,
    /// CRC flag of the most recent vehicle record
    pub last_crc_ok: bool,
    pub vehicle_fix: bool,
    /// `None` when no ground-station GPS is in use
    pub ground_station_fix: Option<bool>,
}

/// Annunciator panel plus its summary
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HealthReport {
    pub annunciators: Vec<Annunciator>,
    pub overall: Severity,
}

impl HealthReport {
    /// Annunciators as a store value (array of `label`/`severity`/`tooltip` maps)
    pub fn annunciators_value(&self) -> Value {
        Value::Array(self.annunciators.iter().map(Annunciator::to_value).collect())
    }

    /// Severity of the slot with the given label
    pub fn severity_of(&self, label: &str) -> Option<Severity> {
        self.annunciators
            .iter()
            .find(|a| a.label == label)
            .map(|a| a.severity)
    }
}

pub const LABEL_GS_LINK: &str = "GS Link";
pub const LABEL_FCB_DATA: &str = "FCB Data";
pub const LABEL_DATA_QUALITY: &str = "Data Quality";
pub const LABEL_FCB_GPS: &str = "FCB GPS";
pub const LABEL_GS_GPS: &str = "GS GPS";

/// Compute the annunciator panel
pub fn evaluate(inputs: &HealthInputs, good_data_window: Duration) -> HealthReport {
    let connected = inputs.link_state == LinkState::Connected;

    let mut annunciators = vec![
        if connected {
            Annunciator::new(LABEL_GS_LINK, Severity::Ok, "Ground station connected")
        } else {
            Annunciator::new(
                LABEL_GS_LINK,
                Severity::Fault,
                format!("Ground station {}", inputs.link_state),
            )
        },
        if inputs.has_data {
            Annunciator::new(LABEL_FCB_DATA, Severity::Ok, "Receiving FCB data")
        } else {
            Annunciator::new(LABEL_FCB_DATA, Severity::Fault, "No FCB data")
        },
        data_quality(inputs, connected, good_data_window),
        if inputs.vehicle_fix {
            Annunciator::new(LABEL_FCB_GPS, Severity::Ok, "FCB GPS fix")
        } else {
            Annunciator::new(LABEL_FCB_GPS, Severity::Warning, "FCB GPS has no fix")
        },
    ];

    if let Some(fix) = inputs.ground_station_fix {
        annunciators.push(if fix {
            Annunciator::new(LABEL_GS_GPS, Severity::Ok, "Ground station GPS fix")
        } else {
            Annunciator::new(LABEL_GS_GPS, Severity::Warning, "Ground station GPS has no fix")
        });
    }

    let overall = annunciators
        .iter()
        .map(|a| a.severity)
        .max()
        .unwrap_or(Severity::Unknown);

    HealthReport { annunciators, overall }
}

fn data_quality(inputs: &HealthInputs, connected: bool, window: Duration) -> Annunciator {
    match inputs.last_good_data_age {
        Some(age) if age <= window => {
            if connected && !inputs.last_crc_ok {
                Annunciator::new(LABEL_DATA_QUALITY, Severity::Warning, "Last record failed CRC")
            } else {
                Annunciator::new(LABEL_DATA_QUALITY, Severity::Ok, "Data good")
            }
        }
        Some(age) => Annunciator::new(
            LABEL_DATA_QUALITY,
            Severity::Fault,
            format!("No good data for {:.1}s", age.as_secs_f64()),
        ),
        None => Annunciator::new(LABEL_DATA_QUALITY, Severity::Fault, "No good data received"),
    }
}
