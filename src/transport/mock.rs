//! Simulated DeepSee transport.
//!
//! Answers the laser's full command vocabulary from an in-memory device
//! model, so tests, the CLI `--fake` flag, and the GUI fake mode all run
//! without hardware. Test hooks: an ordered call log for verifying command
//! sequences, one-shot failure injection, and setters for the simulated
//! machine state.

use crate::error::{DeepSeeError, DriverResult};
use crate::status::{PUMP_SHUTTER_BIT, STOKES_SHUTTER_BIT};
use crate::transport::Transport;
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// How far the simulated machine state advances per `*stb?` poll while a
/// power-up ramp is active.
const RAMP_STEP: u8 = 5;

/// Simulated device state behind the transport.
#[derive(Debug, Clone)]
struct DeviceModel {
    state_number: u8,
    ramp_target: Option<u8>,
    wavelength_nm: i64,
    min_wavelength: i64,
    max_wavelength: i64,
    pump_shutter_open: bool,
    stokes_shutter_open: bool,
    watchdog_seconds: f64,
    motor_position: f64,
    pct_warmup: i64,
    power_watts: f64,
    mode: String,
    closed: bool,
}

impl Default for DeviceModel {
    fn default() -> Self {
        Self {
            state_number: 25,
            ramp_target: None,
            wavelength_nm: 800,
            min_wavelength: 690,
            max_wavelength: 1040,
            pump_shutter_open: false,
            stokes_shutter_open: false,
            watchdog_seconds: 0.0,
            motor_position: 0.0,
            pct_warmup: 100,
            power_watts: 1.35,
            mode: "RUN".to_string(),
            closed: false,
        }
    }
}

impl DeviceModel {
    fn status_word(&self) -> u32 {
        let mut word = u32::from(self.state_number) << 16;
        if self.state_number > 25 {
            word |= 1; // Emission
        }
        if self.state_number == 50 || self.state_number == 60 {
            word |= 1 << 1; // Pulsing
        }
        if self.pump_shutter_open {
            word |= 1 << PUMP_SHUTTER_BIT;
        }
        if self.stokes_shutter_open {
            word |= 1 << STOKES_SHUTTER_BIT;
        }
        word
    }

    fn advance_ramp(&mut self) {
        if let Some(target) = self.ramp_target {
            self.state_number = self.state_number.saturating_add(RAMP_STEP).min(target);
            if self.state_number >= target {
                self.ramp_target = None;
            }
        }
    }
}

/// In-memory stand-in for a DeepSee on a serial port.
///
/// Cloning shares the same device model and call log, so a test can hand
/// one clone to the facade and keep another for assertions.
#[derive(Clone, Default)]
pub struct MockTransport {
    model: Arc<Mutex<DeviceModel>>,
    call_log: Arc<Mutex<Vec<String>>>,
    fail_next: Arc<AtomicBool>,
}

impl MockTransport {
    /// Create a simulated laser in the ready state (25) with the watchdog
    /// disarmed and wavelength bounds 690-1040 nm.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the simulated machine-state number.
    pub fn with_state(self, state_number: u8) -> Self {
        self.lock_model().state_number = state_number;
        self
    }

    /// Arm the simulated watchdog timer.
    pub fn with_watchdog(self, seconds: f64) -> Self {
        self.lock_model().watchdog_seconds = seconds;
        self
    }

    /// Override the advertised wavelength bounds.
    pub fn with_wavelength_bounds(self, min: i64, max: i64) -> Self {
        {
            let mut model = self.lock_model();
            model.min_wavelength = min;
            model.max_wavelength = max;
        }
        self
    }

    /// Make the next transport call fail with a transport error. The
    /// injection is consumed by that one call.
    pub fn inject_next_failure(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Ordered record of every call: `query: …`, `write: …`, and `close`
    /// entries.
    pub fn call_log(&self) -> Vec<String> {
        self.lock_log().clone()
    }

    /// Discard the recorded calls.
    pub fn clear_log(&self) {
        self.lock_log().clear();
    }

    /// Current simulated machine-state number.
    pub fn state_number(&self) -> u8 {
        self.lock_model().state_number
    }

    /// Current simulated watchdog setting in seconds.
    pub fn watchdog_seconds(&self) -> f64 {
        self.lock_model().watchdog_seconds
    }

    fn lock_model(&self) -> std::sync::MutexGuard<'_, DeviceModel> {
        self.model.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn lock_log(&self) -> std::sync::MutexGuard<'_, Vec<String>> {
        self.call_log.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    fn check_failure(&self) -> DriverResult<()> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(DeepSeeError::Transport("Injected failure".to_string()));
        }
        Ok(())
    }

    fn answer(&self, command: &str) -> DriverResult<String> {
        let mut model = self.lock_model();
        if model.closed {
            return Err(DeepSeeError::NotConnected);
        }
        let reply = match command {
            "wav:min?" => model.min_wavelength.to_string(),
            "wav:max?" => model.max_wavelength.to_string(),
            "*stb?" => {
                model.advance_ramp();
                model.status_word().to_string()
            }
            "read:wav?" => model.wavelength_nm.to_string(),
            "read:pow?" => format!("{:.3}", model.power_watts),
            "MODE?" => model.mode.clone(),
            "control:dsmpos?" => format!("{:.3}", model.motor_position),
            "read:pctwarmedup?" => model.pct_warmup.to_string(),
            "tim:watc?" => format!("{:.1}", model.watchdog_seconds),
            "shut?" => i32::from(model.pump_shutter_open).to_string(),
            "irshut?" => i32::from(model.stokes_shutter_open).to_string(),
            _ => {
                return Err(DeepSeeError::Transport(format!(
                    "Mock laser does not recognize query '{command}'"
                )))
            }
        };
        Ok(reply)
    }

    fn apply(&self, command: &str) -> DriverResult<()> {
        let mut model = self.lock_model();
        if model.closed {
            return Err(DeepSeeError::NotConnected);
        }
        match command {
            "on" => {
                // The real laser ignores `on` unless it reports ready.
                if model.state_number == 25 {
                    model.ramp_target = Some(50);
                }
            }
            "off" => {
                model.ramp_target = None;
                model.state_number = 25;
            }
            "shutdown" => {
                model.ramp_target = None;
                model.state_number = 0;
            }
            "shut 1" => model.pump_shutter_open = true,
            "shut 0" => model.pump_shutter_open = false,
            "irshut 1" => model.stokes_shutter_open = true,
            "irshut 0" => model.stokes_shutter_open = false,
            _ => {
                if let Some(value) = command.strip_prefix("wav ") {
                    model.wavelength_nm = parse_argument(command, value)?;
                } else if let Some(value) = command.strip_prefix("control:mtrmov ") {
                    model.motor_position = parse_argument(command, value)?;
                } else if let Some(value) = command.strip_prefix("tim:watc ") {
                    model.watchdog_seconds = parse_argument(command, value)?;
                } else {
                    return Err(DeepSeeError::Transport(format!(
                        "Mock laser does not recognize command '{command}'"
                    )));
                }
            }
        }
        Ok(())
    }
}

fn parse_argument<T: std::str::FromStr>(command: &str, value: &str) -> DriverResult<T> {
    value.trim().parse().map_err(|_| {
        DeepSeeError::Transport(format!("Mock laser got malformed command '{command}'"))
    })
}

#[async_trait]
impl Transport for MockTransport {
    async fn query(&self, command: &str) -> DriverResult<String> {
        self.lock_log().push(format!("query: {command}"));
        self.check_failure()?;
        self.answer(command)
    }

    async fn write(&self, command: &str) -> DriverResult<()> {
        self.lock_log().push(format!("write: {command}"));
        self.check_failure()?;
        self.apply(command)
    }

    async fn close(&self) -> DriverResult<()> {
        self.lock_log().push("close".to_string());
        self.check_failure()?;
        self.lock_model().closed = true;
        Ok(())
    }

    fn resource(&self) -> &str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_reports_bounds_and_ready_state() {
        let mock = MockTransport::new();
        assert_eq!(mock.query("wav:min?").await.unwrap(), "690");
        assert_eq!(mock.query("wav:max?").await.unwrap(), "1040");
        let word: u32 = mock.query("*stb?").await.unwrap().parse().unwrap();
        assert_eq!((word & 0x007F_0000) >> 16, 25);
    }

    #[tokio::test]
    async fn test_shutter_writes_flip_status_bits() {
        let mock = MockTransport::new();
        mock.write("shut 1").await.unwrap();
        mock.write("irshut 1").await.unwrap();
        let word: u32 = mock.query("*stb?").await.unwrap().parse().unwrap();
        assert_eq!(word & 0b1100, 0b1100);

        mock.write("shut 0").await.unwrap();
        let word: u32 = mock.query("*stb?").await.unwrap().parse().unwrap();
        assert_eq!(word & 0b0100, 0);
    }

    #[tokio::test]
    async fn test_power_up_ramp_reaches_running() {
        let mock = MockTransport::new();
        mock.write("on").await.unwrap();
        let mut last = 0u8;
        for _ in 0..10 {
            let word: u32 = mock.query("*stb?").await.unwrap().parse().unwrap();
            last = ((word & 0x007F_0000) >> 16) as u8;
            if last == 50 {
                break;
            }
        }
        assert_eq!(last, 50);
        // Stays at 50 once there.
        let word: u32 = mock.query("*stb?").await.unwrap().parse().unwrap();
        assert_eq!((word & 0x007F_0000) >> 16, 50);
    }

    #[tokio::test]
    async fn test_on_is_ignored_when_not_ready() {
        let mock = MockTransport::new().with_state(10);
        mock.write("on").await.unwrap();
        mock.query("*stb?").await.unwrap();
        assert_eq!(mock.state_number(), 10);
    }

    #[tokio::test]
    async fn test_failure_injection_is_one_shot() {
        let mock = MockTransport::new();
        mock.inject_next_failure();
        assert!(mock.query("*stb?").await.is_err());
        assert!(mock.query("*stb?").await.is_ok());
    }

    #[tokio::test]
    async fn test_unknown_command_is_rejected() {
        let mock = MockTransport::new();
        assert!(mock.query("bogus?").await.is_err());
        assert!(mock.write("bogus 1").await.is_err());
    }

    #[tokio::test]
    async fn test_call_log_keeps_order() {
        let mock = MockTransport::new();
        mock.query("wav:min?").await.unwrap();
        mock.write("wav 800").await.unwrap();
        mock.close().await.unwrap();
        assert_eq!(
            mock.call_log(),
            vec!["query: wav:min?", "write: wav 800", "close"]
        );
    }

    #[tokio::test]
    async fn test_closed_transport_rejects_traffic() {
        let mock = MockTransport::new();
        mock.close().await.unwrap();
        assert!(matches!(
            mock.query("*stb?").await,
            Err(DeepSeeError::NotConnected)
        ));
    }
}
