//! Transports carrying the laser's line-oriented ASCII protocol.
//!
//! Commands and queries are single lines terminated by `\n` in both
//! directions (115200 baud on the serial link). The [`Transport`] trait is
//! the seam between the facade and the physical connection: the facade is
//! handed a boxed transport at construction time, so tests and the GUI fake
//! mode inject [`MockTransport`] while production code opens a serial port or
//! a VISA resource.

#[cfg(feature = "instrument_serial")]
pub mod discovery;
mod mock;
#[cfg(feature = "instrument_serial")]
mod serial;
#[cfg(feature = "instrument_visa")]
mod visa;

pub use mock::MockTransport;
#[cfg(feature = "instrument_serial")]
pub use serial::{SerialTransport, SerialTransportBuilder};
#[cfg(feature = "instrument_visa")]
pub use visa::VisaTransport;

use crate::error::DriverResult;
use async_trait::async_trait;

/// Line-oriented connection to one instrument.
///
/// Implementations guard the underlying handle behind a single async mutex,
/// so traffic reaching the device is strictly serialized even when several
/// tasks share the transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send `command` and read back a single newline-terminated reply,
    /// returned with surrounding whitespace trimmed.
    async fn query(&self, command: &str) -> DriverResult<String>;

    /// Send `command`; the instrument produces no reply.
    async fn write(&self, command: &str) -> DriverResult<()>;

    /// Release the underlying connection. Safe to call more than once.
    async fn close(&self) -> DriverResult<()>;

    /// Connection identifier (port path or resource string), for logging.
    fn resource(&self) -> &str;
}
