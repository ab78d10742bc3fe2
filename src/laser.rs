//! DeepSee tunable pump laser facade.
//!
//! Translates imperative laser-control intents (power on, set wavelength,
//! open a shutter) into the instrument's line-oriented text commands and
//! parses the single-line replies. The facade owns exactly one [`Transport`]
//! and caches the wavelength bounds it reads at connect time; everything
//! else is re-queried from the laser on demand.
//!
//! The transport is injected, never selected internally: production code
//! passes a serial or VISA transport, tests and fake mode pass a
//! [`MockTransport`](crate::transport::MockTransport).

use crate::error::{DeepSeeError, DriverResult};
use crate::status::{MachinePhase, StatusWord, PUMP_SHUTTER_BIT, STOKES_SHUTTER_BIT};
use crate::transport::Transport;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Machine-state number the laser must report before `on` is accepted.
pub const READY_STATE: u8 = 25;

/// Machine-state number reported once the laser is fully running.
pub const RUNNING_STATE: u8 = 50;

/// Watchdog interval, in seconds, re-armed by the close sequence.
const CLOSE_WATCHDOG_SECONDS: f64 = 3.0;

/// What to do about an armed watchdog timer at connect time.
///
/// The watchdog powers the laser off if it hears nothing from the host for
/// the configured interval, which kills long-running unattended control
/// sessions. An armed watchdog is therefore never left in place silently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WatchdogPolicy {
    /// Write `tim:watc 0` to disarm it (recommended for programmatic
    /// control).
    #[default]
    Disable,
    /// Leave it armed and log a warning naming the interval.
    Leave,
}

/// Position of a beam shutter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutterState {
    /// Beam passes.
    Open,
    /// Beam blocked.
    Closed,
}

/// One progress sample from [`DeepSee::wait_until_running_with`].
#[derive(Debug, Clone, Copy)]
pub struct PowerOnTick {
    /// Time since the wait began.
    pub elapsed: Duration,
    /// Machine-state number from this poll.
    pub state: u8,
    /// Phase resolved from `state`.
    pub phase: MachinePhase,
}

/// Handle to one DeepSee laser.
pub struct DeepSee {
    transport: Box<dyn Transport>,
    min_wavelength: i64,
    max_wavelength: i64,
}

impl DeepSee {
    /// Connect to the laser behind `transport`.
    ///
    /// Caches the wavelength bounds (`wav:min?` / `wav:max?`), then checks
    /// the watchdog timer: if it is armed, either disarms it or warns,
    /// according to `watchdog`.
    pub async fn connect(
        transport: Box<dyn Transport>,
        watchdog: WatchdogPolicy,
    ) -> DriverResult<Self> {
        let mut laser = Self {
            transport,
            min_wavelength: 0,
            max_wavelength: 0,
        };
        laser.min_wavelength = laser.query_parsed("wav:min?").await?;
        laser.max_wavelength = laser.query_parsed("wav:max?").await?;

        let wdt = laser.get_watchdog_time().await?;
        if wdt > 0.0 {
            match watchdog {
                WatchdogPolicy::Disable => {
                    laser.set_watchdog_time(0.0).await?;
                    info!("Disabled watchdog timer (was {:.1} s)", wdt);
                }
                WatchdogPolicy::Leave => {
                    warn!(
                        "Watchdog timer armed at {:.1} s: the laser powers off if it \
                         receives no communication for that long",
                        wdt
                    );
                }
            }
        }

        info!(
            "Connected to DeepSee on '{}' ({}-{} nm)",
            laser.transport.resource(),
            laser.min_wavelength,
            laser.max_wavelength
        );
        Ok(laser)
    }

    /// Wavelength bounds cached at connect time, in nm.
    pub fn wavelength_bounds(&self) -> (i64, i64) {
        (self.min_wavelength, self.max_wavelength)
    }

    /// Connection identifier of the underlying transport.
    pub fn resource(&self) -> &str {
        self.transport.resource()
    }

    async fn query_parsed<T: FromStr>(&self, command: &str) -> DriverResult<T> {
        let reply = self.transport.query(command).await?;
        reply.trim().parse().map_err(|_| DeepSeeError::Parse {
            command: command.to_string(),
            reply,
        })
    }

    /// Read the raw 32-bit status word (`*stb?`).
    pub async fn read_status_word(&self) -> DriverResult<StatusWord> {
        let raw: u32 = self.query_parsed("*stb?").await?;
        Ok(StatusWord(raw))
    }

    /// Machine-state number from the status word. See Appendix B of the
    /// user manual for the meaning of each number.
    pub async fn get_status(&self) -> DriverResult<u8> {
        Ok(self.read_status_word().await?.state_number())
    }

    /// Operating phase resolved from the machine-state number.
    pub async fn get_phase(&self) -> DriverResult<MachinePhase> {
        Ok(self.read_status_word().await?.phase())
    }

    /// Start the diodes.
    ///
    /// Refuses with a precondition error, without issuing the `on` write,
    /// unless the laser reports the ready state (25). Powering up takes a
    /// few minutes; follow with [`wait_until_running`](Self::wait_until_running)
    /// to block until the laser reports running.
    pub async fn power_on(&self) -> DriverResult<()> {
        let actual = self.get_status().await?;
        if actual != READY_STATE {
            return Err(DeepSeeError::Precondition {
                expected: READY_STATE,
                actual,
            });
        }
        self.transport.write("on").await
    }

    /// Poll the machine state once per second until the laser reports
    /// running (50), for at most `timeout`.
    ///
    /// Returns the final state number. The wait is cooperative: dropping
    /// the future (for example from a `tokio::select!` arm) cancels it
    /// between polls.
    pub async fn wait_until_running(&self, timeout: Duration) -> DriverResult<u8> {
        self.wait_until_running_with(timeout, Duration::from_secs(1), |_| {})
            .await
    }

    /// [`wait_until_running`](Self::wait_until_running) with an explicit
    /// poll interval and a per-poll progress callback.
    pub async fn wait_until_running_with<F>(
        &self,
        timeout: Duration,
        poll_interval: Duration,
        mut on_tick: F,
    ) -> DriverResult<u8>
    where
        F: FnMut(PowerOnTick),
    {
        let started = tokio::time::Instant::now();
        let deadline = started + timeout;

        loop {
            tokio::time::sleep(poll_interval).await;

            let state = self.get_status().await?;
            on_tick(PowerOnTick {
                elapsed: started.elapsed(),
                state,
                phase: StatusWord(u32::from(state) << 16).phase(),
            });

            if state == RUNNING_STATE {
                debug!("Laser running after {:?}", started.elapsed());
                return Ok(state);
            }
            if tokio::time::Instant::now() >= deadline {
                return Err(DeepSeeError::Timeout {
                    waited: started.elapsed(),
                    last_state: state,
                });
            }
        }
    }

    /// [`power_on`](Self::power_on) followed by
    /// [`wait_until_running`](Self::wait_until_running).
    pub async fn power_on_and_wait(&self, timeout: Duration) -> DriverResult<u8> {
        self.power_on().await?;
        self.wait_until_running(timeout).await
    }

    /// Turn off the diodes but leave the ovens warm for a quick restart.
    /// For a full power-down see [`shutdown`](Self::shutdown).
    pub async fn power_off(&self) -> DriverResult<()> {
        self.transport.write("off").await
    }

    /// Fully power down the laser in preparation for cutting mains power.
    pub async fn shutdown(&self) -> DriverResult<()> {
        self.transport.write("shutdown").await
    }

    /// Set the pump wavelength in nm.
    ///
    /// Fails with an out-of-range error naming the cached bounds unless
    /// `min <= nm <= max`; the bounds themselves are accepted.
    pub async fn set_wavelength(&self, nm: i64) -> DriverResult<()> {
        if nm < self.min_wavelength || nm > self.max_wavelength {
            return Err(DeepSeeError::OutOfRange {
                value: nm,
                min: self.min_wavelength,
                max: self.max_wavelength,
            });
        }
        self.transport.write(&format!("wav {nm}")).await
    }

    /// Current pump wavelength in nm.
    pub async fn get_wavelength(&self) -> DriverResult<i64> {
        self.query_parsed("read:wav?").await
    }

    /// Current output power in watts.
    pub async fn get_power(&self) -> DriverResult<f64> {
        self.query_parsed("read:pow?").await
    }

    /// Raw operating-mode string.
    pub async fn get_mode(&self) -> DriverResult<String> {
        self.transport.query("MODE?").await
    }

    /// Current DeepSee motor position.
    pub async fn get_motor_position(&self) -> DriverResult<f64> {
        self.query_parsed("control:dsmpos?").await
    }

    /// Move the DeepSee motor to `position`.
    pub async fn set_motor_position(&self, position: f64) -> DriverResult<()> {
        self.transport
            .write(&format!("control:mtrmov {position}"))
            .await
    }

    /// Warmup progress in percent.
    pub async fn get_pct_warmup(&self) -> DriverResult<u8> {
        self.query_parsed("read:pctwarmedup?").await
    }

    /// Open the pump beam shutter.
    pub async fn open_pump_shutter(&self) -> DriverResult<()> {
        self.transport.write("shut 1").await
    }

    /// Close the pump beam shutter.
    pub async fn close_pump_shutter(&self) -> DriverResult<()> {
        self.transport.write("shut 0").await
    }

    /// Open the stokes/IR/fixed beam shutter.
    pub async fn open_stokes_shutter(&self) -> DriverResult<()> {
        self.transport.write("irshut 1").await
    }

    /// Close the stokes/IR/fixed beam shutter.
    pub async fn close_stokes_shutter(&self) -> DriverResult<()> {
        self.transport.write("irshut 0").await
    }

    /// Whether the pump shutter is open, from status-word bit 2.
    pub async fn pump_shutter_state(&self) -> DriverResult<bool> {
        Ok(self.read_status_word().await?.flag(PUMP_SHUTTER_BIT))
    }

    /// Whether the stokes shutter is open, from status-word bit 3.
    pub async fn stokes_shutter_state(&self) -> DriverResult<bool> {
        Ok(self.read_status_word().await?.flag(STOKES_SHUTTER_BIT))
    }

    /// Both shutter positions as reported by the dedicated `shut?` /
    /// `irshut?` queries, as a `(pump, stokes)` pair.
    pub async fn get_shutter_states(&self) -> DriverResult<(ShutterState, ShutterState)> {
        let pump: u8 = self.query_parsed("shut?").await?;
        let stokes: u8 = self.query_parsed("irshut?").await?;
        Ok((shutter_from_reply(pump), shutter_from_reply(stokes)))
    }

    /// Current watchdog interval in seconds (0 means disarmed).
    pub async fn get_watchdog_time(&self) -> DriverResult<f64> {
        self.query_parsed("tim:watc?").await
    }

    /// Set the watchdog interval in seconds. 0 disarms the watchdog
    /// (recommended for programmatic control).
    pub async fn set_watchdog_time(&self, seconds: f64) -> DriverResult<()> {
        self.transport.write(&format!("tim:watc {seconds}")).await
    }

    /// Safe teardown: re-arm the watchdog at 3 s, close both shutters,
    /// power off, release the transport.
    ///
    /// Every step runs even when an earlier one fails; failures are
    /// collected and reported together as
    /// [`DeepSeeError::CloseFailed`].
    pub async fn close(&self) -> DriverResult<()> {
        let mut failures = Vec::new();

        if let Err(e) = self.set_watchdog_time(CLOSE_WATCHDOG_SECONDS).await {
            failures.push(e);
        }
        if let Err(e) = self.close_pump_shutter().await {
            failures.push(e);
        }
        if let Err(e) = self.close_stokes_shutter().await {
            failures.push(e);
        }
        if let Err(e) = self.power_off().await {
            failures.push(e);
        }
        if let Err(e) = self.transport.close().await {
            failures.push(e);
        }

        if failures.is_empty() {
            info!("DeepSee on '{}' closed", self.transport.resource());
            Ok(())
        } else {
            for failure in &failures {
                warn!("Close step failed: {failure}");
            }
            Err(DeepSeeError::CloseFailed(failures))
        }
    }
}

fn shutter_from_reply(value: u8) -> ShutterState {
    if value == 0 {
        ShutterState::Closed
    } else {
        ShutterState::Open
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transport::MockTransport;

    async fn connected_laser() -> (DeepSee, MockTransport) {
        let mock = MockTransport::new();
        let laser = DeepSee::connect(Box::new(mock.clone()), WatchdogPolicy::Disable)
            .await
            .unwrap();
        mock.clear_log();
        (laser, mock)
    }

    #[tokio::test]
    async fn test_connect_caches_bounds() {
        let (laser, _mock) = connected_laser().await;
        assert_eq!(laser.wavelength_bounds(), (690, 1040));
    }

    #[tokio::test]
    async fn test_set_wavelength_writes_exact_command() {
        let (laser, mock) = connected_laser().await;
        laser.set_wavelength(803).await.unwrap();
        assert_eq!(mock.call_log(), vec!["write: wav 803"]);
    }

    #[tokio::test]
    async fn test_shutter_commands() {
        let (laser, mock) = connected_laser().await;
        laser.open_pump_shutter().await.unwrap();
        laser.open_stokes_shutter().await.unwrap();
        laser.close_pump_shutter().await.unwrap();
        laser.close_stokes_shutter().await.unwrap();
        assert_eq!(
            mock.call_log(),
            vec![
                "write: shut 1",
                "write: irshut 1",
                "write: shut 0",
                "write: irshut 0",
            ]
        );
    }

    #[tokio::test]
    async fn test_parse_failure_names_command_and_reply() {
        let (laser, _mock) = connected_laser().await;
        // MODE? replies "RUN", which is not an integer.
        let err = laser.query_parsed::<i64>("MODE?").await.unwrap_err();
        match err {
            DeepSeeError::Parse { command, reply } => {
                assert_eq!(command, "MODE?");
                assert_eq!(reply, "RUN");
            }
            other => panic!("expected parse error, got {other:?}"),
        }
    }
}
