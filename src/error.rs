//! # Error Types
//!
//! Custom error types for FCB Groundlink using `thiserror`.

use std::time::Duration;

use thiserror::Error;

use crate::fcb::decoder::DecodeError;
use crate::fcb::encoder::EncodeError;

/// Main error type for FCB Groundlink
#[derive(Debug, Error)]
pub enum GroundLinkError {
    /// Malformed, short or unknown record (record dropped, link stays up)
    #[error("Decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Command that cannot be put on the wire (never queued)
    #[error("Encode error: {0}")]
    Encode(#[from] EncodeError),

    /// Serial read/write/open failure (link goes to Disconnected)
    #[error("Link I/O error: {0}")]
    LinkIo(String),

    /// None of the candidate device paths could be opened
    #[error("Serial port not found (tried: {0})")]
    SerialPortNotFound(String),

    /// No bytes received within the data timeout
    #[error("No data received for {0:?}")]
    Timeout(Duration),

    /// Record arrived on a radio other than the selected one
    #[error("Record from radio {received} ignored (selected radio {selected})")]
    RadioMismatch { received: u8, selected: u8 },

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(#[from] toml::de::Error),

    /// I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for FCB Groundlink
pub type Result<T> = std::result::Result<T, GroundLinkError>;
