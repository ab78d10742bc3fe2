//! Custom error types for the driver.
//!
//! This module defines the primary error type, `DeepSeeError`, for the whole
//! crate. Using the `thiserror` crate, it gives every failure mode a distinct
//! variant so callers can tell a refused operation (wrong machine state, value
//! out of range) apart from a broken link to the instrument.
//!
//! Propagation policy: errors surface immediately to the caller with the
//! expected and actual values in the message. Nothing is retried. The one
//! place a failure is caught and discarded is port discovery, where an
//! unreachable port is simply skipped.

use thiserror::Error;

/// Convenience alias for results using the driver error type.
pub type DriverResult<T> = std::result::Result<T, DeepSeeError>;

/// Errors produced by the status decoder and the device facade.
#[derive(Error, Debug)]
pub enum DeepSeeError {
    /// The laser reported a machine state that does not allow the requested
    /// transition.
    #[error("Laser is not ready for this operation: require state {expected}, found state {actual}")]
    Precondition {
        /// Machine-state number the operation requires.
        expected: u8,
        /// Machine-state number the laser reported.
        actual: u8,
    },

    /// A target value fell outside the range the laser advertises.
    #[error("Require {min} <= wavelength <= {max}. Found {value}.")]
    OutOfRange {
        /// Offending value.
        value: i64,
        /// Lower bound cached from `wav:min?`.
        min: i64,
        /// Upper bound cached from `wav:max?`.
        max: i64,
    },

    /// A machine-state number outside the 7-bit range. The bit mask makes
    /// this unreachable from a real status word; the check is defensive.
    #[error("Invalid state code {0}: machine state must be in 0-127")]
    InvalidState(u8),

    /// The connection to the instrument failed.
    #[error("Transport error: {0}")]
    Transport(String),

    /// I/O error from the underlying port.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The instrument replied, but the reply did not parse as the expected
    /// type.
    #[error("Failed to parse reply to '{command}': '{reply}'")]
    Parse {
        /// Query that produced the reply.
        command: String,
        /// Verbatim reply text.
        reply: String,
    },

    /// Operation attempted after the connection was released.
    #[error("Not connected to the laser")]
    NotConnected,

    /// The laser did not reach the running state before the wait bound.
    #[error("Laser did not reach the running state within {waited:?} (last state {last_state})")]
    Timeout {
        /// How long the caller waited.
        waited: std::time::Duration,
        /// Machine-state number from the final poll.
        last_state: u8,
    },

    /// The close sequence ran to the end but one or more steps failed.
    #[error("Close sequence completed with {} failed step(s)", .0.len())]
    CloseFailed(Vec<DeepSeeError>),
}
