//! # FCB Protocol Module
//!
//! Binary record protocol spoken by the flight-controller board and relayed by
//! the ground-station radio.
//!
//! This module handles:
//! - Record decoding (Orientation, PositionData, AltitudeInfo, CliData, ground-station GPS)
//! - Command encoding (CLI text, radio band switch)
//! - Field value types shared with the telemetry store

pub mod protocol;
pub mod encoder;
pub mod decoder;
