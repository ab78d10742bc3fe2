//! Blocking bridge between the egui event loop and the async facade.
//!
//! egui paints on a plain thread, so the client owns a private Tokio
//! runtime and exposes blocking wrappers around the facade calls. Serial
//! traffic is short (single lines at 115200 baud), so blocking the paint
//! thread for one command is acceptable for a bench control panel.

use crate::config::Settings;
use crate::error::DriverResult;
use crate::laser::{DeepSee, WatchdogPolicy};
use crate::status::StatusWord;
use crate::transport::{MockTransport, Transport};
use anyhow::Context;

/// Everything the panel shows, gathered in one refresh pass.
#[derive(Debug, Clone, Copy)]
pub struct StatusSnapshot {
    /// Raw status word from `*stb?`.
    pub word: StatusWord,
    /// Current wavelength in nm.
    pub wavelength_nm: i64,
    /// Current output power in watts.
    pub power_watts: f64,
}

/// Synchronous handle to one laser for GUI use.
pub struct LaserClient {
    runtime: tokio::runtime::Runtime,
    laser: DeepSee,
}

impl LaserClient {
    /// Connect using `settings`; with `fake` the client drives a simulated
    /// laser instead of hardware.
    pub fn connect(settings: &Settings, fake: bool) -> anyhow::Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("Failed to build Tokio runtime")?;

        let transport = build_transport(settings, fake)?;
        let policy = if fake {
            WatchdogPolicy::Disable
        } else {
            settings.watchdog.policy()
        };
        let laser = runtime
            .block_on(DeepSee::connect(transport, policy))
            .context("Failed to connect to the laser")?;

        Ok(Self { runtime, laser })
    }

    /// Wavelength bounds cached at connect time.
    pub fn wavelength_bounds(&self) -> (i64, i64) {
        self.laser.wavelength_bounds()
    }

    /// Connection identifier, for the window title bar.
    pub fn resource(&self) -> &str {
        self.laser.resource()
    }

    /// Gather status word, wavelength and power in one pass.
    pub fn snapshot(&self) -> DriverResult<StatusSnapshot> {
        self.runtime.block_on(async {
            Ok(StatusSnapshot {
                word: self.laser.read_status_word().await?,
                wavelength_nm: self.laser.get_wavelength().await?,
                power_watts: self.laser.get_power().await?,
            })
        })
    }

    /// Set the pump wavelength.
    pub fn set_wavelength(&self, nm: i64) -> DriverResult<()> {
        self.runtime.block_on(self.laser.set_wavelength(nm))
    }

    /// Issue the power-on command (requires the ready state).
    pub fn power_on(&self) -> DriverResult<()> {
        self.runtime.block_on(self.laser.power_on())
    }

    /// Turn the diodes off.
    pub fn power_off(&self) -> DriverResult<()> {
        self.runtime.block_on(self.laser.power_off())
    }

    /// Open or close the pump shutter.
    pub fn set_pump_shutter(&self, open: bool) -> DriverResult<()> {
        self.runtime.block_on(async {
            if open {
                self.laser.open_pump_shutter().await
            } else {
                self.laser.close_pump_shutter().await
            }
        })
    }

    /// Open or close the stokes shutter.
    pub fn set_stokes_shutter(&self, open: bool) -> DriverResult<()> {
        self.runtime.block_on(async {
            if open {
                self.laser.open_stokes_shutter().await
            } else {
                self.laser.close_stokes_shutter().await
            }
        })
    }

    /// Run the safe close sequence.
    pub fn close(&self) -> DriverResult<()> {
        self.runtime.block_on(self.laser.close())
    }
}

fn build_transport(settings: &Settings, fake: bool) -> anyhow::Result<Box<dyn Transport>> {
    if fake {
        return Ok(Box::new(MockTransport::new()));
    }

    #[cfg(feature = "instrument_serial")]
    {
        let transport =
            crate::transport::SerialTransportBuilder::new(&settings.connection.port)
                .with_baud_rate(settings.connection.baud)
                .with_timeout(settings.connection.timeout)
                .open()?;
        Ok(Box::new(transport))
    }

    #[cfg(not(feature = "instrument_serial"))]
    {
        let _ = settings;
        anyhow::bail!("Serial support not enabled. Rebuild with --features instrument_serial")
    }
}
