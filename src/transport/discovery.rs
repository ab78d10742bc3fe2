//! Serial-port discovery.
//!
//! Enumerates the machine's serial ports and keeps the ones that actually
//! open. This is diagnostic tooling: a port that fails to open (missing
//! permissions, already claimed, phantom device) is logged and skipped, the
//! only place in the crate where a transport failure is swallowed.

use crate::error::{DeepSeeError, DriverResult};
use std::time::Duration;
use tracing::debug;

/// Probe every enumerated serial port and return the names of those that
/// open successfully.
///
/// Fails only if enumeration itself fails; individual unreachable ports are
/// skipped.
pub fn probe_ports() -> DriverResult<Vec<String>> {
    let ports = serialport::available_ports()
        .map_err(|e| DeepSeeError::Transport(format!("Failed to enumerate serial ports: {e}")))?;

    let mut reachable = Vec::new();
    for info in ports {
        match serialport::new(&info.port_name, 115_200)
            .timeout(Duration::from_millis(200))
            .open()
        {
            Ok(port) => {
                drop(port);
                reachable.push(info.port_name);
            }
            Err(e) => {
                debug!("Skipping port '{}': {}", info.port_name, e);
            }
        }
    }
    Ok(reachable)
}
