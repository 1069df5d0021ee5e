//! # Link Manager
//!
//! Owns the ground-station serial connection end to end: reconnect attempts,
//! the read/dispatch loop, the outgoing command queue and data-timeout
//! detection. Decoded records are GPS-filtered and merged into the shared
//! [`TelemetryStore`]; derived health is recomputed on every tick.
//!
//! ## Loop
//!
//! Every [`LinkManager::tick`]:
//!
//! 1. Drain consumer requests (radio selection applies immediately, commands queue up)
//! 2. Disconnected: try to open the device once per reconnect interval
//! 3. Connected/TimedOut: read with a short timeout and dispatch any bytes,
//!    write at most one queued command (bounded by the write timeout), check
//!    the data timeout
//! 4. Recompute health and publish changed link status keys into the store
//!
//! All timing uses the tokio clock, so thresholds are wall-clock based and
//! independent of how often the loop runs.

use std::collections::VecDeque;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::Instant;
use tracing::{debug, info, warn, Level};

use super::command::{LinkHandle, LinkRequest, OutgoingCommand};
use super::console::Console;
use super::state::LinkState;
use crate::config::Config;
use crate::error::GroundLinkError;
use crate::fcb::decoder::decode_all;
use crate::fcb::protocol::{FieldMap, MessageKind, Record, Value};
use crate::gps::{GpsFilter, GpsSource};
use crate::health::{self, HealthInputs, HealthReport};
use crate::serial::{PortOpener, SerialPortIO};
use crate::telemetry::{TelemetryLogger, TelemetryStore};

/// Read buffer size; one poll returns at most one radio packet
const READ_BUFFER_SIZE: usize = 1024;

/// Timing and filtering parameters of the link
#[derive(Debug, Clone, PartialEq)]
pub struct LinkConfig {
    pub read_timeout: Duration,
    /// Limit on writing and flushing one queued command
    pub write_timeout: Duration,
    pub reconnect_interval: Duration,
    pub data_timeout: Duration,
    /// Sleep between iterations while no device is open
    pub poll_interval: Duration,
    pub good_data_window: Duration,
    pub active_radio: Option<u8>,
    pub gps_history_len: usize,
    pub track_ground_station_gps: bool,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self::from(&Config::default())
    }
}

impl From<&Config> for LinkConfig {
    fn from(config: &Config) -> Self {
        Self {
            read_timeout: config.serial.read_timeout(),
            write_timeout: config.serial.write_timeout(),
            reconnect_interval: config.serial.reconnect_interval(),
            data_timeout: config.serial.data_timeout(),
            poll_interval: config.serial.poll_interval(),
            good_data_window: Duration::from_millis(config.health.good_data_window_ms),
            active_radio: config.radio.active_radio,
            gps_history_len: config.gps.history_len,
            track_ground_station_gps: config.gps.track_ground_station,
        }
    }
}

/// Counters published as `stats_*` store keys
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LinkStats {
    pub bytes_received: u64,
    pub records_merged: u64,
    pub decode_errors: u64,
    pub radio_mismatches: u64,
    pub commands_written: u64,
    pub connects: u64,
}

/// Serial link lifecycle owner
pub struct LinkManager {
    opener: Box<dyn PortOpener>,
    port: Option<Box<dyn SerialPortIO>>,
    state: LinkState,
    config: LinkConfig,

    store: Arc<TelemetryStore>,
    requests: mpsc::UnboundedReceiver<LinkRequest>,
    pending: VecDeque<OutgoingCommand>,
    stop: Arc<AtomicBool>,

    logger: TelemetryLogger,
    console: Console,

    vehicle_gps: GpsFilter,
    ground_gps: GpsFilter,
    active_radio: Option<u8>,

    last_attempt: Option<Instant>,
    last_byte: Option<Instant>,
    last_fcb_data: Option<Instant>,
    last_good_data: Option<Instant>,
    last_crc_ok: bool,
    has_data: bool,

    stats: LinkStats,
}

impl std::fmt::Debug for LinkManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LinkManager")
            .field("state", &self.state)
            .field("device", &self.port.as_ref().map(|p| p.device_path().to_string()))
            .field("active_radio", &self.active_radio)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl LinkManager {
    /// Create a manager and the handle consumers use to talk to it
    pub fn new(
        opener: Box<dyn PortOpener>,
        config: LinkConfig,
        logger: TelemetryLogger,
        console: Console,
    ) -> (Self, LinkHandle) {
        let (tx, rx) = mpsc::unbounded_channel();
        let store = Arc::new(TelemetryStore::new());
        let stop = Arc::new(AtomicBool::new(false));
        let handle = LinkHandle::new(tx, Arc::clone(&store), Arc::clone(&stop));

        let manager = Self {
            opener,
            port: None,
            state: LinkState::Disconnected,
            vehicle_gps: GpsFilter::new(config.gps_history_len),
            ground_gps: GpsFilter::new(config.gps_history_len),
            active_radio: config.active_radio,
            config,
            store,
            requests: rx,
            pending: VecDeque::new(),
            stop,
            logger,
            console,
            last_attempt: None,
            last_byte: None,
            last_fcb_data: None,
            last_good_data: None,
            last_crc_ok: true,
            has_data: false,
            stats: LinkStats::default(),
        };

        (manager, handle)
    }

    pub fn state(&self) -> LinkState {
        self.state
    }

    pub fn stats(&self) -> LinkStats {
        self.stats
    }

    pub fn active_radio(&self) -> Option<u8> {
        self.active_radio
    }

    pub fn gps_filter(&self, source: GpsSource) -> &GpsFilter {
        match source {
            GpsSource::Vehicle => &self.vehicle_gps,
            GpsSource::GroundStation => &self.ground_gps,
        }
    }

    /// Run until the stop flag is raised, then close the device
    pub async fn run(mut self) {
        info!("Link manager started");

        while !self.stop.load(Ordering::Relaxed) {
            self.tick().await;
            if self.port.is_none() {
                tokio::time::sleep(self.config.poll_interval).await;
            } else {
                tokio::task::yield_now().await;
            }
        }

        if let Some(port) = self.port.take() {
            info!("Closing {}", port.device_path());
        }
        self.state = LinkState::Disconnected;
        self.publish_status(Instant::now());
        info!("Link manager stopped ({} records merged)", self.stats.records_merged);
    }

    /// One loop iteration
    pub async fn tick(&mut self) {
        self.drain_requests();

        if self.state.has_port() {
            self.poll_read().await;
        }
        if self.state.has_port() {
            self.write_pending().await;
        }
        if self.state.has_port() {
            self.check_data_timeout(Instant::now());
        } else {
            self.try_connect(Instant::now());
        }

        self.publish_status(Instant::now());
    }

    fn drain_requests(&mut self) {
        while let Ok(request) = self.requests.try_recv() {
            match request {
                LinkRequest::Send(cmd) => self.pending.push_back(cmd),
                LinkRequest::SelectRadio(radio) => {
                    if radio != self.active_radio {
                        info!("Active radio changed: {:?} -> {:?}", self.active_radio, radio);
                        self.active_radio = radio;
                    }
                }
            }
        }
    }

    fn try_connect(&mut self, now: Instant) {
        if let Some(last) = self.last_attempt {
            if now.duration_since(last) < self.config.reconnect_interval {
                return;
            }
        }
        self.last_attempt = Some(now);
        self.state = LinkState::Connecting;
        self.console.log_limited(Level::INFO, "Connecting to ground station");

        match self.opener.open() {
            Ok(port) => {
                let msg = format!("Connected to ground station at {}", port.device_path());
                self.console.log(Level::INFO, &msg);
                self.port = Some(port);
                self.state = LinkState::Connected;
                self.last_byte = Some(now);
                self.stats.connects += 1;
            }
            Err(e) => {
                self.state = LinkState::Disconnected;
                self.console
                    .log_limited(Level::WARN, &format!("Ground station connect failed: {}", e));
            }
        }
    }

    fn disconnect(&mut self, error: GroundLinkError) {
        self.port = None;
        self.state = LinkState::Disconnected;
        self.last_attempt = Some(Instant::now());
        self.has_data = false;
        self.console
            .log_limited(Level::ERROR, &format!("Ground station disconnected: {}", error));
    }

    async fn poll_read(&mut self) {
        let Some(port) = self.port.as_mut() else {
            return;
        };

        let mut buf = [0u8; READ_BUFFER_SIZE];
        let result = tokio::time::timeout(self.config.read_timeout, port.read(&mut buf)).await;

        match result {
            // Nothing arrived within the read timeout
            Err(_) | Ok(Ok(0)) => {}
            Ok(Err(e)) if matches!(e.kind(), io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock) => {}
            Ok(Err(e)) => self.disconnect(GroundLinkError::LinkIo(format!("read failed: {}", e))),
            Ok(Ok(n)) => {
                let now = Instant::now();
                self.last_byte = Some(now);
                if self.state == LinkState::TimedOut {
                    self.state = LinkState::Connected;
                    self.console.log(Level::INFO, "Ground station data resumed");
                }
                self.handle_chunk(&buf[..n], now);
            }
        }
    }

    /// Log, decode and dispatch one chunk of received bytes
    pub fn handle_chunk(&mut self, chunk: &[u8], now: Instant) {
        self.stats.bytes_received += chunk.len() as u64;
        if let Err(e) = self.logger.log_raw(chunk) {
            warn!("Failed to write raw log: {}", e);
        }

        let decoded = decode_all(chunk);
        let dropped = decoded.dropped(chunk.len());
        for record in decoded.records {
            self.dispatch(record, now);
        }

        if let Some(e) = decoded.error {
            self.stats.decode_errors += 1;
            let error = GroundLinkError::from(e);
            self.console
                .log_limited(Level::WARN, &format!("Dropped {} bytes: {}", dropped, error));
        }
    }

    fn dispatch(&mut self, mut record: Record, now: Instant) {
        // Cross-talk from another radio on the same link is dropped without a
        // console line; it is only counted and traced.
        if let (Some(selected), Some(radio)) = (self.active_radio, record.radio) {
            if radio.radio_id != selected {
                self.stats.radio_mismatches += 1;
                debug!(
                    "{}",
                    GroundLinkError::RadioMismatch { received: radio.radio_id, selected }
                );
                return;
            }
        }

        if let Some((lat, lon)) = record.position() {
            let filter = if record.kind.is_ground_station() {
                &mut self.ground_gps
            } else {
                &mut self.vehicle_gps
            };
            filter.update(lat, lon);
            let (lat, lon) = filter.filtered();
            record.set_position(lat, lon);
        }

        if let Err(e) = self.logger.log_record(&record) {
            warn!("Failed to write parsed log: {}", e);
        }

        if !record.kind.is_ground_station() {
            self.last_fcb_data = Some(now);
            self.last_crc_ok = record.crc_ok;
            self.has_data = true;
            if record.crc_ok {
                self.last_good_data = Some(now);
            }
        }

        if record.kind == MessageKind::CliData {
            if let Some(text) = record.fields.get("cli_text").and_then(Value::as_str) {
                debug!("FCB CLI: {}", text.trim_end());
            }
        }

        self.store.merge(&record.store_fields());
        self.stats.records_merged += 1;
    }

    async fn write_pending(&mut self) {
        let Some(port) = self.port.as_mut() else {
            return;
        };
        let Some(cmd) = self.pending.pop_front() else {
            return;
        };

        let limit = self.config.write_timeout;
        let write = async {
            port.write_all(&cmd.bytes).await?;
            port.flush().await
        };
        let result = match tokio::time::timeout(limit, write).await {
            Ok(result) => result.map_err(|e| format!("write failed: {}", e)),
            Err(_) => Err(format!("write timed out after {:?}", limit)),
        };

        match result {
            Ok(()) => {
                self.stats.commands_written += 1;
                debug!("Sent {} byte command to radio {}", cmd.bytes.len(), cmd.destination);
            }
            Err(reason) => {
                // Retry after reconnecting
                self.pending.push_front(cmd);
                self.disconnect(GroundLinkError::LinkIo(reason));
            }
        }
    }

    fn check_data_timeout(&mut self, now: Instant) {
        if let Some(last) = self.last_fcb_data {
            if now.duration_since(last) > self.config.data_timeout {
                self.has_data = false;
            }
        }

        if self.state != LinkState::Connected {
            return;
        }
        let Some(last) = self.last_byte else {
            return;
        };
        let silent = now.duration_since(last);
        if silent > self.config.data_timeout {
            self.state = LinkState::TimedOut;
            self.has_data = false;
            let error = GroundLinkError::Timeout(self.config.data_timeout);
            self.console.log_limited(Level::WARN, &error.to_string());
        }
    }

    /// Health inputs as of `now`
    pub fn health_inputs(&self, now: Instant) -> HealthInputs {
        HealthInputs {
            link_state: self.state,
            has_data: self.has_data,
            last_good_data_age: self.last_good_data.map(|t| now.duration_since(t)),
            last_crc_ok: self.last_crc_ok,
            vehicle_fix: self.vehicle_gps.has_fix(),
            ground_station_fix: self
                .config
                .track_ground_station_gps
                .then(|| self.ground_gps.has_fix()),
        }
    }

    /// Current annunciator panel
    pub fn health(&self, now: Instant) -> HealthReport {
        health::evaluate(&self.health_inputs(now), self.config.good_data_window)
    }

    fn publish_status(&self, now: Instant) {
        let report = self.health(now);
        let mut status = FieldMap::new();
        status.insert("link_state".into(), self.state.as_str().into());
        status.insert("has_data".into(), self.has_data.into());
        if let Some(last) = self.last_good_data {
            status.insert(
                "last_good_data_age_s".into(),
                now.duration_since(last).as_secs_f64().into(),
            );
        }
        status.insert("annunciators".into(), report.annunciators_value());
        status.insert("overall_status".into(), report.overall.as_str().into());
        status.insert(
            "active_radio".into(),
            self.active_radio.map_or(Value::Int(-1), |r| r.into()),
        );
        for (key, value) in [
            ("stats_bytes_received", self.stats.bytes_received),
            ("stats_records_merged", self.stats.records_merged),
            ("stats_decode_errors", self.stats.decode_errors),
            ("stats_radio_mismatches", self.stats.radio_mismatches),
            ("stats_commands_written", self.stats.commands_written),
            ("stats_connects", self.stats.connects),
        ] {
            status.insert(key.into(), Value::Int(value as i64));
        }
        self.store.merge_changed(&status);
    }
}
