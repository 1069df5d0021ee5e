//! Trait abstraction for serial port operations to enable testing

use async_trait::async_trait;
use std::io;

use crate::error::Result;

/// Trait for serial port I/O operations
#[async_trait]
pub trait SerialPortIO: Send {
    /// Read whatever bytes are available into `buf`
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;

    /// Write all data to the port
    async fn write_all(&mut self, data: &[u8]) -> io::Result<()>;

    /// Flush the output buffer
    async fn flush(&mut self) -> io::Result<()>;

    /// Device the port was opened on
    fn device_path(&self) -> &str;
}

/// Something able to (re)open the ground-station serial device
#[cfg_attr(test, mockall::automock)]
pub trait PortOpener: Send {
    /// Try to open the device once; must not block indefinitely
    fn open(&mut self) -> Result<Box<dyn SerialPortIO>>;
}

/// Wrapper around tokio_serial::SerialStream that implements SerialPortIO
pub struct TokioSerialPort {
    port: tokio_serial::SerialStream,
    device_path: String,
}

impl TokioSerialPort {
    pub fn new(port: tokio_serial::SerialStream, device_path: impl Into<String>) -> Self {
        Self {
            port,
            device_path: device_path.into(),
        }
    }
}

#[async_trait]
impl SerialPortIO for TokioSerialPort {
    async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        use tokio::io::AsyncReadExt;
        self.port.read(buf).await
    }

    async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
        use tokio::io::AsyncWriteExt;
        self.port.write_all(data).await
    }

    async fn flush(&mut self) -> io::Result<()> {
        use tokio::io::AsyncWriteExt;
        self.port.flush().await
    }

    fn device_path(&self) -> &str {
        &self.device_path
    }
}

#[cfg(test)]
pub mod mocks {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    /// Mock serial port for testing
    ///
    /// Reads pop scripted chunks; an empty script behaves like a read timeout.
    /// Reads or writes can be made to hang to imitate a wedged device.
    /// Clones share all state; [`MockSerialPort::open_handle`] hands out clones
    /// that count as open until dropped.
    pub struct MockSerialPort {
        pub read_script: Arc<Mutex<VecDeque<io::Result<Vec<u8>>>>>,
        pub written_data: Arc<Mutex<Vec<Vec<u8>>>>,
        pub write_error: Arc<Mutex<Option<io::ErrorKind>>>,
        stall_reads: Arc<AtomicBool>,
        stall_writes: Arc<AtomicBool>,
        open_handles: Arc<AtomicUsize>,
        is_handle: bool,
    }

    impl Clone for MockSerialPort {
        fn clone(&self) -> Self {
            Self {
                read_script: Arc::clone(&self.read_script),
                written_data: Arc::clone(&self.written_data),
                write_error: Arc::clone(&self.write_error),
                stall_reads: Arc::clone(&self.stall_reads),
                stall_writes: Arc::clone(&self.stall_writes),
                open_handles: Arc::clone(&self.open_handles),
                is_handle: false,
            }
        }
    }

    impl Drop for MockSerialPort {
        fn drop(&mut self) {
            if self.is_handle {
                self.open_handles.fetch_sub(1, Ordering::SeqCst);
            }
        }
    }

    impl MockSerialPort {
        pub fn new() -> Self {
            Self {
                read_script: Arc::new(Mutex::new(VecDeque::new())),
                written_data: Arc::new(Mutex::new(Vec::new())),
                write_error: Arc::new(Mutex::new(None)),
                stall_reads: Arc::new(AtomicBool::new(false)),
                stall_writes: Arc::new(AtomicBool::new(false)),
                open_handles: Arc::new(AtomicUsize::new(0)),
                is_handle: false,
            }
        }

        /// Clone handed to the code under test, counted until dropped
        pub fn open_handle(&self) -> Self {
            self.open_handles.fetch_add(1, Ordering::SeqCst);
            let mut handle = self.clone();
            handle.is_handle = true;
            handle
        }

        /// Handles from [`MockSerialPort::open_handle`] not yet dropped
        pub fn open_handles(&self) -> usize {
            self.open_handles.load(Ordering::SeqCst)
        }

        pub fn push_read(&self, chunk: Vec<u8>) {
            self.read_script.lock().unwrap().push_back(Ok(chunk));
        }

        pub fn push_read_error(&self, error: io::ErrorKind) {
            self.read_script
                .lock()
                .unwrap()
                .push_back(Err(io::Error::new(error, "Mock read error")));
        }

        pub fn get_written_data(&self) -> Vec<Vec<u8>> {
            self.written_data.lock().unwrap().clone()
        }

        pub fn set_write_error(&self, error: io::ErrorKind) {
            *self.write_error.lock().unwrap() = Some(error);
        }

        /// Reads never complete
        pub fn stall_reads(&self) {
            self.stall_reads.store(true, Ordering::SeqCst);
        }

        /// Writes never complete
        pub fn stall_writes(&self) {
            self.stall_writes.store(true, Ordering::SeqCst);
        }
    }

    #[async_trait]
    impl SerialPortIO for MockSerialPort {
        async fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
            if self.stall_reads.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            let next = self.read_script.lock().unwrap().pop_front();
            match next {
                Some(Ok(chunk)) => {
                    let n = chunk.len().min(buf.len());
                    buf[..n].copy_from_slice(&chunk[..n]);
                    Ok(n)
                }
                Some(Err(e)) => Err(e),
                None => Err(io::Error::new(io::ErrorKind::TimedOut, "Mock read timeout")),
            }
        }

        async fn write_all(&mut self, data: &[u8]) -> io::Result<()> {
            if self.stall_writes.load(Ordering::SeqCst) {
                std::future::pending::<()>().await;
            }
            if let Some(error) = *self.write_error.lock().unwrap() {
                return Err(io::Error::new(error, "Mock write error"));
            }
            self.written_data.lock().unwrap().push(data.to_vec());
            Ok(())
        }

        async fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }

        fn device_path(&self) -> &str {
            "/dev/mock0"
        }
    }
}
