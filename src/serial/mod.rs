//! # Serial Communication Module
//!
//! Handles the serial connection to the ground-station radio.
//!
//! This module handles:
//! - Opening the relay device (8N1, no flow control)
//! - Trying a list of candidate device paths in order
//! - Exposing the port behind [`SerialPortIO`] so the link manager can be tested

pub mod port_trait;

pub use port_trait::{PortOpener, SerialPortIO, TokioSerialPort};

use crate::error::{GroundLinkError, Result};
use tokio_serial::SerialPortBuilderExt;
use tracing::{debug, info, warn};

/// Default ground-station baud rate
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Default device paths to try (in order of preference)
pub const DEFAULT_DEVICE_PATHS: &[&str] = &[
    "/dev/ttyACM0", // USB CDC ground station
    "/dev/ttyUSB0", // USB-to-serial adapters
];

/// Opens the ground-station device from a list of candidate paths
#[derive(Debug, Clone)]
pub struct GroundStationSerial {
    paths: Vec<String>,
    baud_rate: u32,
}

impl Default for GroundStationSerial {
    fn default() -> Self {
        Self::new(DEFAULT_DEVICE_PATHS.iter().map(|p| p.to_string()).collect(), DEFAULT_BAUD_RATE)
    }
}

impl GroundStationSerial {
    /// Create an opener for the given paths and baud rate
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use fcb_groundlink::serial::{GroundStationSerial, PortOpener};
    ///
    /// # async fn run() -> anyhow::Result<()> {
    /// let mut opener = GroundStationSerial::new(vec!["/dev/ttyACM0".to_string()], 115_200);
    /// let port = opener.open()?;
    /// println!("Connected to: {}", port.device_path());
    /// # Ok(())
    /// # }
    /// ```
    pub fn new(paths: Vec<String>, baud_rate: u32) -> Self {
        Self { paths, baud_rate }
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    /// Try each path in turn, returning the first that opens
    ///
    /// # Errors
    ///
    /// Returns `SerialPortNotFound` listing every path tried if none opens
    pub fn open_first(&self) -> Result<TokioSerialPort> {
        for path in &self.paths {
            debug!("Trying to open serial port: {}", path);

            match open_port(path, self.baud_rate) {
                Ok(port) => {
                    info!("Opened ground station at {} ({} baud)", path, self.baud_rate);
                    return Ok(TokioSerialPort::new(port, path.clone()));
                }
                Err(e) => {
                    warn!("Failed to open {}: {}", path, e);
                    continue;
                }
            }
        }

        Err(GroundLinkError::SerialPortNotFound(self.paths.join(", ")))
    }
}

impl PortOpener for GroundStationSerial {
    fn open(&mut self) -> Result<Box<dyn SerialPortIO>> {
        Ok(Box::new(self.open_first()?))
    }
}

/// Open a specific serial port with 8N1 settings
fn open_port(path: &str, baud_rate: u32) -> Result<tokio_serial::SerialStream> {
    let port = tokio_serial::new(path, baud_rate)
        .data_bits(tokio_serial::DataBits::Eight)
        .parity(tokio_serial::Parity::None)
        .stop_bits(tokio_serial::StopBits::One)
        .flow_control(tokio_serial::FlowControl::None)
        .open_native_async()
        .map_err(|e| GroundLinkError::LinkIo(format!("Failed to open {}: {}", path, e)))?;

    Ok(port)
}
