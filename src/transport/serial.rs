//! Serial transport for RS-232/USB-serial connections.
//!
//! Wraps the `serialport` crate and provides async I/O by running the
//! blocking reads and writes on Tokio's blocking executor. The DeepSee talks
//! at 115200 baud with `\n` line termination in both directions; those are
//! the builder defaults.

use crate::error::{DeepSeeError, DriverResult};
use crate::transport::Transport;
use async_trait::async_trait;
use serialport::SerialPort;
use std::io::{Read, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

/// Builder for [`SerialTransport`] with the DeepSee's protocol defaults.
///
/// # Example
/// ```no_run
/// use std::time::Duration;
/// use deepsee::transport::SerialTransportBuilder;
///
/// let transport = SerialTransportBuilder::new("/dev/ttyUSB0")
///     .with_timeout(Duration::from_secs(5))
///     .open()?;
/// # Ok::<(), deepsee::DeepSeeError>(())
/// ```
pub struct SerialTransportBuilder {
    port_name: String,
    baud_rate: u32,
    timeout: Duration,
    line_terminator: String,
    response_delimiter: char,
}

impl SerialTransportBuilder {
    /// Create a builder for `port_name`.
    ///
    /// Defaults: 115200 baud, 2 s read timeout, `\n` line terminator and
    /// response delimiter.
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            baud_rate: 115_200,
            timeout: Duration::from_secs(2),
            line_terminator: "\n".to_string(),
            response_delimiter: '\n',
        }
    }

    /// Override the baud rate.
    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    /// Override the overall read timeout for queries.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Override the terminator appended to outgoing commands.
    pub fn with_line_terminator(mut self, terminator: impl Into<String>) -> Self {
        self.line_terminator = terminator.into();
        self
    }

    /// Override the character that ends an incoming reply.
    pub fn with_response_delimiter(mut self, delimiter: char) -> Self {
        self.response_delimiter = delimiter;
        self
    }

    /// Open the port and build the transport.
    pub fn open(self) -> DriverResult<SerialTransport> {
        // Short internal timeout; the overall deadline is enforced by the
        // read loop in `query`.
        let port = serialport::new(&self.port_name, self.baud_rate)
            .timeout(Duration::from_millis(100))
            .open()
            .map_err(|e| {
                DeepSeeError::Transport(format!(
                    "Failed to open serial port '{}' at {} baud: {e}",
                    self.port_name, self.baud_rate
                ))
            })?;

        debug!(
            "Serial port '{}' opened at {} baud",
            self.port_name, self.baud_rate
        );

        Ok(SerialTransport {
            port_name: self.port_name,
            timeout: self.timeout,
            line_terminator: self.line_terminator,
            response_delimiter: self.response_delimiter,
            port: Arc::new(Mutex::new(Some(port))),
        })
    }
}

/// Serial connection to the laser.
///
/// The port handle sits behind an async mutex, so concurrent callers are
/// serialized and the instrument never sees interleaved commands.
#[derive(Clone)]
pub struct SerialTransport {
    port_name: String,
    timeout: Duration,
    line_terminator: String,
    response_delimiter: char,
    port: Arc<Mutex<Option<Box<dyn SerialPort>>>>,
}

impl std::fmt::Debug for SerialTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialTransport")
            .field("port_name", &self.port_name)
            .field("timeout", &self.timeout)
            .field("line_terminator", &self.line_terminator)
            .field("response_delimiter", &self.response_delimiter)
            .finish_non_exhaustive()
    }
}

impl SerialTransport {
    /// Open `port_name` with the protocol defaults.
    pub fn open(port_name: impl Into<String>) -> DriverResult<Self> {
        SerialTransportBuilder::new(port_name).open()
    }

    fn write_blocking(
        port: &mut Box<dyn SerialPort>,
        command: &str,
        line_terminator: &str,
    ) -> DriverResult<()> {
        let framed = format!("{command}{line_terminator}");
        port.write_all(framed.as_bytes())
            .map_err(|e| DeepSeeError::Transport(format!("Failed to write to serial port: {e}")))?;
        port.flush()
            .map_err(|e| DeepSeeError::Transport(format!("Failed to flush serial port: {e}")))?;
        debug!("Sent serial command: {}", command.trim());
        Ok(())
    }

    fn read_reply_blocking(
        port: &mut Box<dyn SerialPort>,
        delimiter: char,
        timeout: Duration,
    ) -> DriverResult<String> {
        let mut response = String::new();
        let mut buffer = [0u8; 1];
        let start = Instant::now();

        loop {
            if start.elapsed() > timeout {
                return Err(DeepSeeError::Transport(format!(
                    "Serial read timeout after {timeout:?}"
                )));
            }

            match port.read(&mut buffer) {
                Ok(1) => {
                    let ch = buffer[0] as char;
                    if ch == delimiter {
                        break;
                    }
                    response.push(ch);
                }
                Ok(0) => {
                    return Err(DeepSeeError::Transport(
                        "Unexpected EOF from serial port".to_string(),
                    ));
                }
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                    // Port timeout is shorter than the overall deadline.
                    continue;
                }
                Err(e) => {
                    return Err(DeepSeeError::Transport(format!("Serial read error: {e}")));
                }
                Ok(_) => {
                    return Err(DeepSeeError::Transport(
                        "Read into single-byte buffer returned more than one byte".to_string(),
                    ));
                }
            }
        }

        let response = response.trim().to_string();
        debug!("Received serial response: {}", response);
        Ok(response)
    }
}

#[async_trait]
impl Transport for SerialTransport {
    async fn query(&self, command: &str) -> DriverResult<String> {
        let port = self.port.clone();
        let command = command.to_string();
        let line_terminator = self.line_terminator.clone();
        let delimiter = self.response_delimiter;
        let timeout = self.timeout;

        tokio::task::spawn_blocking(move || {
            let mut guard = port.blocking_lock();
            let port = guard.as_mut().ok_or(DeepSeeError::NotConnected)?;
            Self::write_blocking(port, &command, &line_terminator)?;
            Self::read_reply_blocking(port, delimiter, timeout)
        })
        .await
        .map_err(|e| DeepSeeError::Transport(format!("Serial I/O task panicked: {e}")))?
    }

    async fn write(&self, command: &str) -> DriverResult<()> {
        let port = self.port.clone();
        let command = command.to_string();
        let line_terminator = self.line_terminator.clone();

        tokio::task::spawn_blocking(move || {
            let mut guard = port.blocking_lock();
            let port = guard.as_mut().ok_or(DeepSeeError::NotConnected)?;
            Self::write_blocking(port, &command, &line_terminator)
        })
        .await
        .map_err(|e| DeepSeeError::Transport(format!("Serial I/O task panicked: {e}")))?
    }

    async fn close(&self) -> DriverResult<()> {
        let mut guard = self.port.lock().await;
        if guard.take().is_some() {
            debug!("Serial port '{}' closed", self.port_name);
        }
        Ok(())
    }

    fn resource(&self) -> &str {
        &self.port_name
    }
}
