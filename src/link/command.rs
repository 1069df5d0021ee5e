//! Consumer-facing handle: command queue, radio selection, store access and shutdown.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::mpsc;

use crate::error::{GroundLinkError, Result};
use crate::fcb::encoder::{encode, Command};
use crate::fcb::protocol::FieldMap;
use crate::telemetry::TelemetryStore;

/// Encoded command waiting to be written to the radio
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingCommand {
    pub destination: u8,
    pub bytes: Bytes,
}

impl OutgoingCommand {
    pub fn new(destination: u8, command: &Command) -> Result<Self> {
        Ok(Self {
            destination,
            bytes: encode(destination, command)?,
        })
    }
}

/// Requests consumers place on the manager's queue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkRequest {
    Send(OutgoingCommand),
    /// `None` accepts records from every radio
    SelectRadio(Option<u8>),
}

/// Cloneable handle given to consumers
///
/// Consumers never call into the manager; they read store snapshots and push
/// requests here.
#[derive(Debug, Clone)]
pub struct LinkHandle {
    requests: mpsc::UnboundedSender<LinkRequest>,
    store: Arc<TelemetryStore>,
    stop: Arc<AtomicBool>,
}

impl LinkHandle {
    pub(crate) fn new(
        requests: mpsc::UnboundedSender<LinkRequest>,
        store: Arc<TelemetryStore>,
        stop: Arc<AtomicBool>,
    ) -> Self {
        Self { requests, store, stop }
    }

    fn request(&self, request: LinkRequest) -> Result<()> {
        self.requests
            .send(request)
            .map_err(|_| GroundLinkError::LinkIo("link manager has stopped".to_string()))
    }

    /// Queue a command for `destination`
    ///
    /// Commands that cannot be encoded are rejected here and never reach the link.
    pub fn enqueue(&self, destination: u8, command: Command) -> Result<()> {
        self.request(LinkRequest::Send(OutgoingCommand::new(destination, &command)?))
    }

    /// Queue a line of CLI text
    pub fn send_cli(&self, destination: u8, text: impl Into<String>) -> Result<()> {
        self.enqueue(destination, Command::CliText(text.into()))
    }

    /// Ask `target_radio` to switch band
    pub fn switch_band(&self, destination: u8, target_radio: u8, band: i8) -> Result<()> {
        self.enqueue(destination, Command::RadioBandSwitch { target_radio, band })
    }

    /// Only accept records from `radio` (`None` for all radios)
    pub fn select_radio(&self, radio: Option<u8>) -> Result<()> {
        self.request(LinkRequest::SelectRadio(radio))
    }

    pub fn store(&self) -> &Arc<TelemetryStore> {
        &self.store
    }

    pub fn snapshot(&self) -> FieldMap {
        self.store.snapshot()
    }

    /// Ask the manager to close the port and exit at its next loop iteration
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.stop.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn handle() -> (LinkHandle, mpsc::UnboundedReceiver<LinkRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = LinkHandle::new(tx, Arc::new(TelemetryStore::new()), Arc::new(AtomicBool::new(false)));
        (handle, rx)
    }

    #[test]
    fn test_send_cli_queues_encoded_bytes() {
        let (handle, mut rx) = handle();
        handle.send_cli(5, "ping").unwrap();

        let Ok(LinkRequest::Send(cmd)) = rx.try_recv() else {
            panic!("expected a queued command");
        };
        assert_eq!(cmd.destination, 5);
        assert_eq!(&cmd.bytes[..], &[5, 5, 0, b'p', b'i', b'n', b'g', b'\n']);
    }

    #[test]
    fn test_requests_are_fifo() {
        let (handle, mut rx) = handle();
        handle.switch_band(1, 2, 3).unwrap();
        handle.select_radio(Some(2)).unwrap();
        handle.send_cli(1, "a").unwrap();

        assert!(matches!(rx.try_recv(), Ok(LinkRequest::Send(_))));
        assert_eq!(rx.try_recv(), Ok(LinkRequest::SelectRadio(Some(2))));
        assert!(matches!(rx.try_recv(), Ok(LinkRequest::Send(_))));
    }

    #[test]
    fn test_overlong_cli_text_is_rejected_before_queueing() {
        let (handle, mut rx) = handle();
        let text = "x".repeat(crate::fcb::encoder::MAX_CLI_TEXT_LEN + 1);

        assert!(matches!(handle.send_cli(5, text), Err(GroundLinkError::Encode(_))));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_enqueue_after_manager_dropped_fails() {
        let (handle, rx) = handle();
        drop(rx);
        assert!(matches!(handle.send_cli(1, "x"), Err(GroundLinkError::LinkIo(_))));
    }

    #[test]
    fn test_stop_flag_shared_between_clones() {
        let (handle, _rx) = handle();
        let other = handle.clone();
        assert!(!other.is_stopped());
        handle.stop();
        assert!(other.is_stopped());
    }
}
