//! VISA transport for resource-manager connections.
//!
//! Wraps the `visa-rs` crate so the laser can be reached through a VISA
//! resource string (the instrument ships configured as a serial resource,
//! e.g. `ASRL4::INSTR`, but GPIB/USB/TCPIP resources work the same way).
//! Blocking VISA calls run on Tokio's blocking executor.

use crate::error::{DeepSeeError, DriverResult};
use crate::transport::Transport;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;
use visa_rs::{DefaultRM, Instrument, VISA};

/// VISA connection to the laser.
pub struct VisaTransport {
    resource_string: String,
    timeout: Duration,
    line_terminator: String,
    instrument: Arc<Mutex<Option<Box<dyn Instrument>>>>,
}

impl VisaTransport {
    /// Open `resource_string` through the default resource manager.
    ///
    /// Defaults: 2 s timeout, `\n` line terminator (the laser's protocol
    /// setting in both directions).
    pub async fn open(resource_string: impl Into<String>) -> DriverResult<Self> {
        Self::open_with_timeout(resource_string, Duration::from_secs(2)).await
    }

    /// Open `resource_string` with an explicit I/O timeout.
    pub async fn open_with_timeout(
        resource_string: impl Into<String>,
        timeout: Duration,
    ) -> DriverResult<Self> {
        let resource_string = resource_string.into();
        let resource_for_open = resource_string.clone();
        let timeout_ms = timeout.as_millis() as u32;

        let instrument = tokio::task::spawn_blocking(move || {
            let rm = DefaultRM::new().map_err(|e| {
                DeepSeeError::Transport(format!("Failed to create VISA resource manager: {e}"))
            })?;
            let instr = rm.open(&resource_for_open, timeout_ms, 0).map_err(|e| {
                DeepSeeError::Transport(format!(
                    "Failed to open VISA resource '{resource_for_open}': {e}"
                ))
            })?;
            Ok::<Box<dyn Instrument>, DeepSeeError>(instr)
        })
        .await
        .map_err(|e| DeepSeeError::Transport(format!("VISA open task panicked: {e}")))??;

        debug!(
            "VISA resource '{}' opened with {}ms timeout",
            resource_string, timeout_ms
        );

        Ok(Self {
            resource_string,
            timeout,
            line_terminator: "\n".to_string(),
            instrument: Arc::new(Mutex::new(Some(instrument))),
        })
    }
}

#[async_trait]
impl Transport for VisaTransport {
    async fn query(&self, command: &str) -> DriverResult<String> {
        let instrument = self.instrument.clone();
        let framed = format!("{command}{}", self.line_terminator);
        let command = command.to_string();
        let timeout_ms = self.timeout.as_millis() as u32;

        tokio::task::spawn_blocking(move || {
            let mut guard = instrument.blocking_lock();
            let instr = guard.as_mut().ok_or(DeepSeeError::NotConnected)?;
            instr.set_timeout(timeout_ms).map_err(|e| {
                DeepSeeError::Transport(format!("Failed to set VISA timeout: {e}"))
            })?;
            let response = instr
                .query(&framed)
                .map_err(|e| DeepSeeError::Transport(format!("VISA query '{command}' failed: {e}")))?;
            let response = response.trim().to_string();
            debug!("VISA query '{}' -> '{}'", command, response);
            Ok(response)
        })
        .await
        .map_err(|e| DeepSeeError::Transport(format!("VISA I/O task panicked: {e}")))?
    }

    async fn write(&self, command: &str) -> DriverResult<()> {
        let instrument = self.instrument.clone();
        let framed = format!("{command}{}", self.line_terminator);
        let command = command.to_string();
        let timeout_ms = self.timeout.as_millis() as u32;

        tokio::task::spawn_blocking(move || {
            let mut guard = instrument.blocking_lock();
            let instr = guard.as_mut().ok_or(DeepSeeError::NotConnected)?;
            instr.set_timeout(timeout_ms).map_err(|e| {
                DeepSeeError::Transport(format!("Failed to set VISA timeout: {e}"))
            })?;
            instr
                .write(&framed)
                .map_err(|e| DeepSeeError::Transport(format!("VISA write '{command}' failed: {e}")))?;
            debug!("VISA command sent: {}", command);
            Ok(())
        })
        .await
        .map_err(|e| DeepSeeError::Transport(format!("VISA I/O task panicked: {e}")))?
    }

    async fn close(&self) -> DriverResult<()> {
        let mut guard = self.instrument.lock().await;
        if guard.take().is_some() {
            debug!("VISA resource '{}' closed", self.resource_string);
        }
        Ok(())
    }

    fn resource(&self) -> &str {
        &self.resource_string
    }
}
