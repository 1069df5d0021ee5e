//! # GPS Module
//!
//! Coordinate outlier rejection and smoothing for the vehicle and
//! ground-station position sources.

pub mod filter;

pub use filter::{GpsFilter, GpsSource};
