//! Control driver for the Spectra-Physics DeepSee tunable pump laser.
//!
//! The crate has two cooperating pieces: a pure status-word decoder
//! ([`status`]) and a device facade ([`laser::DeepSee`]) that turns
//! high-level intents into the laser's line-oriented text commands over an
//! injected [`transport::Transport`]. Binaries for CLI control, an egui
//! control panel, and serial-port discovery sit on top.

pub mod config;
pub mod error;
#[cfg(feature = "gui")]
pub mod gui;
pub mod laser;
pub mod registry;
pub mod status;
pub mod transport;

pub use error::{DeepSeeError, DriverResult};
pub use laser::{DeepSee, WatchdogPolicy};
pub use status::{MachinePhase, StatusWord};
