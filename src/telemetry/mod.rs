//! # Telemetry Module
//!
//! Shared telemetry snapshot and its on-disk trail.
//!
//! This module handles:
//! - The last-write-wins store consumers read snapshots from
//! - Append-only raw and parsed record logs
//! - Replaying the parsed log offline into per-run field histories

pub mod logger;
pub mod replay;
pub mod store;

pub use logger::TelemetryLogger;
pub use store::TelemetryStore;
