//! # FCB Groundlink Library
//!
//! Ground-station telemetry link for a remote flight-controller board (FCB).
//!
//! This library decodes the binary records relayed by the ground-station radio,
//! keeps a shared last-write-wins telemetry snapshot, smooths GPS fixes and
//! derives operator-facing health annunciators from link freshness.

pub mod config;
pub mod error;
pub mod fcb;
pub mod gps;
pub mod health;
pub mod link;
pub mod serial;
pub mod telemetry;
