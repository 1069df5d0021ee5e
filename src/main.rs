//! # FCB Groundlink
//!
//! Headless ground-station acquisition: keeps the radio link up, decodes FCB
//! telemetry into the shared store and prints a status line every second.

use std::fs;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::time::interval;
use tracing::{info, warn, Level};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use fcb_groundlink::config::{Config, LoggingConfig};
use fcb_groundlink::link::{Console, LinkConfig, LinkManager};
use fcb_groundlink::serial::GroundStationSerial;
use fcb_groundlink::telemetry::{TelemetryLogger, TelemetryStore};

/// Period of the status line
const STATUS_INTERVAL: Duration = Duration::from_secs(1);

/// Prefix of the rolling diagnostics file
const DIAGNOSTICS_FILE_PREFIX: &str = "fcb-groundlink";

/// Main entry point
///
/// # Control Flow
///
/// 1. Load configuration from the optional first argument (defaults otherwise)
/// 2. Set up stdout and rolling-file logging
/// 3. Open the raw and parsed telemetry logs
/// 4. Spawn the link manager and print store status until Ctrl+C
/// 5. Raise the stop flag and wait for the manager to close the device
///
/// # Examples
///
/// ```bash
/// cargo run --release -- groundlink.toml
/// ```
#[tokio::main]
async fn main() -> Result<()> {
    let config = match std::env::args().nth(1) {
        Some(path) => Config::load(&path).with_context(|| format!("loading config {}", path))?,
        None => Config::default(),
    };

    let _guard = init_tracing(&config.logging)?;
    info!("FCB Groundlink v{} starting...", env!("CARGO_PKG_VERSION"));

    let logger = open_telemetry_logs(&config.logging);
    let opener = GroundStationSerial::new(vec![config.serial.port.clone()], config.serial.baud_rate);
    let console = Console::new(
        None,
        Duration::from_millis(config.logging.console_repeat_window_ms),
    );

    let (manager, handle) = LinkManager::new(
        Box::new(opener),
        LinkConfig::from(&config),
        logger,
        console,
    );
    let link_task = tokio::spawn(manager.run());

    info!("Listening on {} ({} baud)", config.serial.port, config.serial.baud_rate);
    info!("Press Ctrl+C to exit");

    let mut status_interval = interval(STATUS_INTERVAL);
    loop {
        tokio::select! {
            _ = status_interval.tick() => {
                info!("{}", status_line(handle.store()));
            }

            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
                break;
            }
        }
    }

    handle.stop();
    link_task.await.context("link manager task panicked")?;
    info!("{}", status_line(handle.store()));

    Ok(())
}

/// Stdout logging plus, when logging is enabled, a daily-rolling diagnostics file
fn init_tracing(logging: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::from_default_env().add_directive(Level::INFO.into());

    let (file_layer, guard) = if logging.enabled {
        fs::create_dir_all(&logging.log_dir)
            .with_context(|| format!("creating log directory {}", logging.log_dir))?;
        let appender = RollingFileAppender::builder()
            .rotation(Rotation::DAILY)
            .filename_prefix(DIAGNOSTICS_FILE_PREFIX)
            .filename_suffix("log")
            .build(&logging.log_dir)
            .context("creating diagnostics log")?;
        let (writer, guard) = tracing_appender::non_blocking(appender);
        (Some(fmt::layer().with_writer(writer).with_ansi(false)), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer())
        .with(file_layer)
        .init();

    Ok(guard)
}

/// Telemetry logs, or a disabled logger if they cannot be opened
fn open_telemetry_logs(logging: &LoggingConfig) -> TelemetryLogger {
    if !logging.enabled {
        return TelemetryLogger::disabled();
    }
    match TelemetryLogger::open(&logging.log_dir, &logging.raw_file, &logging.parsed_file) {
        Ok(logger) => logger,
        Err(e) => {
            warn!("Telemetry logging disabled: {}", e);
            TelemetryLogger::disabled()
        }
    }
}

/// One-line summary of the current snapshot
fn status_line(store: &Arc<TelemetryStore>) -> String {
    format!(
        "link={} data={} status={} state={} alt={:.1}m lat={:.6} lon={:.6} rssi={} records={} errors={}",
        store.get_str_or("link_state", "disconnected"),
        if store.get_bool_or("has_data", false) { "yes" } else { "no" },
        store.get_str_or("overall_status", "UNKNOWN"),
        store.get_str_or("state", "-"),
        store.get_f64_or("altitude", 0.0),
        store.get_f64_or("latitude", 0.0),
        store.get_f64_or("longitude", 0.0),
        store.get_f64_or("rssi", -128.0) as i64,
        store.get_f64_or("stats_records_merged", 0.0) as u64,
        store.get_f64_or("stats_decode_errors", 0.0) as u64,
    )
}
