//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;
use std::time::Duration;

use crate::error::{GroundLinkError, Result};

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub serial: SerialConfig,
    #[serde(default)]
    pub radio: RadioConfig,
    #[serde(default)]
    pub gps: GpsConfig,
    #[serde(default)]
    pub health: HealthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Serial port and link timing configuration
#[derive(Debug, Deserialize, Clone)]
pub struct SerialConfig {
    #[serde(default = "default_serial_port")]
    pub port: String,

    #[serde(default = "default_baud_rate")]
    pub baud_rate: u32,

    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Limit on writing (and flushing) one queued command
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,

    #[serde(default = "default_reconnect_interval_ms")]
    pub reconnect_interval_ms: u64,

    #[serde(default = "default_data_timeout_ms")]
    pub data_timeout_ms: u64,

    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
}

/// Radio selection configuration
#[derive(Debug, Deserialize, Clone, Default)]
pub struct RadioConfig {
    /// Only records from this radio are merged (all radios when unset)
    #[serde(default)]
    pub active_radio: Option<u8>,
}

/// GPS filter configuration
#[derive(Debug, Deserialize, Clone)]
pub struct GpsConfig {
    #[serde(default = "default_history_len")]
    pub history_len: usize,

    /// Show the ground-station GPS annunciator
    #[serde(default = "default_track_ground_station")]
    pub track_ground_station: bool,
}

/// Health monitor configuration
#[derive(Debug, Deserialize, Clone)]
pub struct HealthConfig {
    #[serde(default = "default_good_data_window_ms")]
    pub good_data_window_ms: u64,
}

/// Telemetry log and console configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_raw_file")]
    pub raw_file: String,

    #[serde(default = "default_parsed_file")]
    pub parsed_file: String,

    #[serde(default = "default_console_repeat_window_ms")]
    pub console_repeat_window_ms: u64,
}

// Default value functions
fn default_serial_port() -> String { "/dev/ttyACM0".to_string() }
fn default_baud_rate() -> u32 { 115200 }
fn default_read_timeout_ms() -> u64 { 10 }
fn default_write_timeout_ms() -> u64 { 100 }
fn default_reconnect_interval_ms() -> u64 { 1000 }
fn default_data_timeout_ms() -> u64 { 5000 }
fn default_poll_interval_ms() -> u64 { 10 }

fn default_history_len() -> usize { 10 }
fn default_track_ground_station() -> bool { true }

fn default_good_data_window_ms() -> u64 { 5000 }

fn default_logging_enabled() -> bool { true }
fn default_log_dir() -> String { "./logs".to_string() }
fn default_raw_file() -> String { "raw_log.txt".to_string() }
fn default_parsed_file() -> String { "parsed_log.txt".to_string() }
fn default_console_repeat_window_ms() -> u64 { 5000 }

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud_rate: default_baud_rate(),
            read_timeout_ms: default_read_timeout_ms(),
            write_timeout_ms: default_write_timeout_ms(),
            reconnect_interval_ms: default_reconnect_interval_ms(),
            data_timeout_ms: default_data_timeout_ms(),
            poll_interval_ms: default_poll_interval_ms(),
        }
    }
}

impl Default for GpsConfig {
    fn default() -> Self {
        Self {
            history_len: default_history_len(),
            track_ground_station: default_track_ground_station(),
        }
    }
}

impl Default for HealthConfig {
    fn default() -> Self {
        Self {
            good_data_window_ms: default_good_data_window_ms(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            log_dir: default_log_dir(),
            raw_file: default_raw_file(),
            parsed_file: default_parsed_file(),
            console_repeat_window_ms: default_console_repeat_window_ms(),
        }
    }
}

impl SerialConfig {
    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    pub fn reconnect_interval(&self) -> Duration {
        Duration::from_millis(self.reconnect_interval_ms)
    }

    pub fn data_timeout(&self) -> Duration {
        Duration::from_millis(self.data_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

fn invalid(msg: &str) -> GroundLinkError {
    GroundLinkError::Config(toml::de::Error::custom(msg))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use fcb_groundlink::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        if self.serial.port.is_empty() {
            return Err(invalid("serial port cannot be empty"));
        }

        if ![9600, 19200, 38400, 57600, 115200, 230400, 460800, 921600].contains(&self.serial.baud_rate) {
            return Err(invalid(
                "baud_rate must be one of: 9600, 19200, 38400, 57600, 115200, 230400, 460800, 921600",
            ));
        }

        if self.serial.read_timeout_ms == 0 || self.serial.read_timeout_ms > 1000 {
            return Err(invalid("read_timeout_ms must be between 1 and 1000"));
        }

        if self.serial.write_timeout_ms == 0 || self.serial.write_timeout_ms > 10000 {
            return Err(invalid("write_timeout_ms must be between 1 and 10000"));
        }

        if self.serial.reconnect_interval_ms == 0 || self.serial.reconnect_interval_ms > 60000 {
            return Err(invalid("reconnect_interval_ms must be between 1 and 60000"));
        }

        if self.serial.data_timeout_ms == 0 || self.serial.data_timeout_ms > 60000 {
            return Err(invalid("data_timeout_ms must be between 1 and 60000"));
        }

        if self.serial.data_timeout_ms <= self.serial.read_timeout_ms {
            return Err(invalid("data_timeout_ms must be greater than read_timeout_ms"));
        }

        if self.serial.poll_interval_ms == 0 || self.serial.poll_interval_ms > 1000 {
            return Err(invalid("poll_interval_ms must be between 1 and 1000"));
        }

        if self.gps.history_len == 0 || self.gps.history_len > 1000 {
            return Err(invalid("gps history_len must be between 1 and 1000"));
        }

        if self.health.good_data_window_ms == 0 || self.health.good_data_window_ms > 60000 {
            return Err(invalid("good_data_window_ms must be between 1 and 60000"));
        }

        if self.logging.enabled {
            if self.logging.log_dir.is_empty() {
                return Err(invalid("log_dir cannot be empty when logging is enabled"));
            }
            if self.logging.raw_file.is_empty() || self.logging.parsed_file.is_empty() {
                return Err(invalid("raw_file and parsed_file cannot be empty when logging is enabled"));
            }
            if self.logging.raw_file == self.logging.parsed_file {
                return Err(invalid("raw_file and parsed_file must differ"));
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let toml_content = r#"
[serial]
port = "/dev/ttyUSB0"
reconnect_interval_ms = 5000

[radio]
active_radio = 2
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.serial.port, "/dev/ttyUSB0");
        assert_eq!(config.serial.reconnect_interval(), Duration::from_secs(5));
        assert_eq!(config.serial.data_timeout(), Duration::from_secs(5));
        assert_eq!(config.radio.active_radio, Some(2));
        assert_eq!(config.gps.history_len, 10);
    }

    #[test]
    fn test_load_empty_file_uses_defaults() {
        use tempfile::NamedTempFile;

        let temp_file = NamedTempFile::new().unwrap();
        let config = Config::load(temp_file.path()).unwrap();
        assert_eq!(config.serial.read_timeout(), Duration::from_millis(10));
        assert_eq!(config.radio.active_radio, None);
    }

    #[test]
    fn test_load_invalid_toml() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(b"[serial\nport = 1").unwrap();
        assert!(matches!(Config::load(temp_file.path()), Err(GroundLinkError::Config(_))));
    }

    #[test]
    fn test_load_missing_file() {
        assert!(matches!(
            Config::load("/nonexistent/groundlink.toml"),
            Err(GroundLinkError::Io(_))
        ));
    }

    #[test]
    fn test_empty_serial_port() {
        let mut config = Config::default();
        config.serial.port = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_baud_rate() {
        let mut config = Config::default();
        config.serial.baud_rate = 420000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_valid_baud_rates() {
        for &baud in &[9600, 57600, 115200, 921600] {
            let mut config = Config::default();
            config.serial.baud_rate = baud;
            assert!(config.validate().is_ok(), "Baud rate {} should be valid", baud);
        }
    }

    #[test]
    fn test_read_timeout_bounds() {
        let mut config = Config::default();
        config.serial.read_timeout_ms = 0;
        assert!(config.validate().is_err());
        config.serial.read_timeout_ms = 1001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_write_timeout_bounds() {
        let mut config = Config::default();
        config.serial.write_timeout_ms = 0;
        assert!(config.validate().is_err());
        config.serial.write_timeout_ms = 10001;
        assert!(config.validate().is_err());
        config.serial.write_timeout_ms = 250;
        assert!(config.validate().is_ok());
        assert_eq!(config.serial.write_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn test_reconnect_interval_bounds() {
        let mut config = Config::default();
        config.serial.reconnect_interval_ms = 0;
        assert!(config.validate().is_err());
        config.serial.reconnect_interval_ms = 60001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_data_timeout_must_exceed_read_timeout() {
        let mut config = Config::default();
        config.serial.read_timeout_ms = 100;
        config.serial.data_timeout_ms = 100;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_poll_interval_zero() {
        let mut config = Config::default();
        config.serial.poll_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_history_len_zero() {
        let mut config = Config::default();
        config.gps.history_len = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_good_data_window_zero() {
        let mut config = Config::default();
        config.health.good_data_window_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_log_dir_when_enabled() {
        let mut config = Config::default();
        config.logging.log_dir = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_log_dir_when_disabled() {
        let mut config = Config::default();
        config.logging.enabled = false;
        config.logging.log_dir = String::new();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_same_log_file_names() {
        let mut config = Config::default();
        config.logging.parsed_file = config.logging.raw_file.clone();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_default_functions() {
        assert_eq!(default_serial_port(), "/dev/ttyACM0");
        assert_eq!(default_baud_rate(), 115200);
        assert_eq!(default_read_timeout_ms(), 10);
        assert_eq!(default_write_timeout_ms(), 100);
        assert_eq!(default_reconnect_interval_ms(), 1000);
        assert_eq!(default_data_timeout_ms(), 5000);
        assert_eq!(default_poll_interval_ms(), 10);
        assert_eq!(default_history_len(), 10);
        assert!(default_track_ground_station());
        assert_eq!(default_good_data_window_ms(), 5000);
        assert!(default_logging_enabled());
        assert_eq!(default_log_dir(), "./logs");
        assert_eq!(default_raw_file(), "raw_log.txt");
        assert_eq!(default_parsed_file(), "parsed_log.txt");
        assert_eq!(default_console_repeat_window_ms(), 5000);
    }
}
