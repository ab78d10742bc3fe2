//! Driver configuration using Figment.
//!
//! Settings load from a TOML file (default `deepsee.toml`) merged with
//! environment variables prefixed `DEEPSEE_`:
//!
//! ```text
//! DEEPSEE_CONNECTION_PORT=/dev/ttyUSB2
//! DEEPSEE_CONNECTION_BAUD=115200
//! DEEPSEE_WATCHDOG_DISABLE=false
//! ```
//!
//! Every field has a default, so a missing file yields a usable
//! configuration for the common single-laser bench setup.

use crate::laser::WatchdogPolicy;
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Environment variable prefix for overrides.
pub const ENV_PREFIX: &str = "DEEPSEE_";

/// Configuration error types.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// File or environment parsing failed.
    #[error("Configuration load error: {0}")]
    Load(#[from] figment::Error),
    /// Values parsed but are not usable.
    #[error("Configuration validation error: {0}")]
    Validation(String),
}

/// Top-level driver settings.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Settings {
    /// Connection to the laser.
    #[serde(default)]
    pub connection: ConnectionSettings,
    /// Watchdog handling at connect time.
    #[serde(default)]
    pub watchdog: WatchdogSettings,
    /// Power-on wait behavior.
    #[serde(default)]
    pub wait: WaitSettings,
}

/// Serial connection parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// Serial port path or VISA resource string.
    #[serde(default = "default_port")]
    pub port: String,
    /// Baud rate; the laser's protocol fixes this at 115200.
    #[serde(default = "default_baud")]
    pub baud: u32,
    /// Read timeout for replies.
    #[serde(with = "humantime_serde", default = "default_read_timeout")]
    pub timeout: Duration,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            port: default_port(),
            baud: default_baud(),
            timeout: default_read_timeout(),
        }
    }
}

/// Watchdog handling at connect time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchdogSettings {
    /// Disarm an armed watchdog on connect (the alternative is a logged
    /// warning).
    #[serde(default = "default_true")]
    pub disable: bool,
}

impl Default for WatchdogSettings {
    fn default() -> Self {
        Self {
            disable: default_true(),
        }
    }
}

impl WatchdogSettings {
    /// Policy value for [`DeepSee::connect`](crate::laser::DeepSee::connect).
    pub fn policy(&self) -> WatchdogPolicy {
        if self.disable {
            WatchdogPolicy::Disable
        } else {
            WatchdogPolicy::Leave
        }
    }
}

/// Power-on wait behavior.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WaitSettings {
    /// Upper bound on how long to wait for the running state. Power-up
    /// typically takes a few minutes.
    #[serde(with = "humantime_serde", default = "default_wait_timeout")]
    pub timeout: Duration,
    /// Interval between status polls.
    #[serde(with = "humantime_serde", default = "default_poll_interval")]
    pub interval: Duration,
}

impl Default for WaitSettings {
    fn default() -> Self {
        Self {
            timeout: default_wait_timeout(),
            interval: default_poll_interval(),
        }
    }
}

fn default_port() -> String {
    "/dev/ttyUSB0".to_string()
}

fn default_baud() -> u32 {
    115_200
}

fn default_read_timeout() -> Duration {
    Duration::from_secs(2)
}

fn default_wait_timeout() -> Duration {
    Duration::from_secs(15 * 60)
}

fn default_poll_interval() -> Duration {
    Duration::from_secs(1)
}

fn default_true() -> bool {
    true
}

impl Settings {
    /// Load from `deepsee.toml` (if present) and `DEEPSEE_` environment
    /// variables.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from("deepsee.toml")
    }

    /// Load from an explicit TOML path plus `DEEPSEE_` environment
    /// variables.
    pub fn load_from(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let settings: Settings = Figment::new()
            .merge(Toml::file(path.as_ref()))
            .merge(Env::prefixed(ENV_PREFIX).split("_"))
            .extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Semantic checks beyond what parsing enforces.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.connection.port.trim().is_empty() {
            return Err(ConfigError::Validation(
                "connection.port must not be empty".to_string(),
            ));
        }
        if self.connection.baud == 0 {
            return Err(ConfigError::Validation(
                "connection.baud must be positive".to_string(),
            ));
        }
        if self.wait.interval.is_zero() {
            return Err(ConfigError::Validation(
                "wait.interval must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load_in_jail(path: &str) -> Result<Settings, figment::Error> {
        Settings::load_from(path).map_err(|e| figment::Error::from(e.to_string()))
    }

    #[test]
    fn test_defaults_without_file() {
        figment::Jail::expect_with(|_jail| {
            let settings = load_in_jail("missing.toml")?;
            assert_eq!(settings.connection.port, "/dev/ttyUSB0");
            assert_eq!(settings.connection.baud, 115_200);
            assert!(settings.watchdog.disable);
            assert_eq!(settings.wait.interval, Duration::from_secs(1));
            Ok(())
        });
    }

    #[test]
    fn test_load_from_toml() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "deepsee.toml",
                r#"
[connection]
port = "/dev/ttyUSB7"
timeout = "5s"

[watchdog]
disable = false

[wait]
timeout = "20m"
interval = "2s"
"#,
            )?;

            let settings = load_in_jail("deepsee.toml")?;
            assert_eq!(settings.connection.port, "/dev/ttyUSB7");
            assert_eq!(settings.connection.baud, 115_200);
            assert_eq!(settings.connection.timeout, Duration::from_secs(5));
            assert!(!settings.watchdog.disable);
            assert_eq!(settings.watchdog.policy(), WatchdogPolicy::Leave);
            assert_eq!(settings.wait.timeout, Duration::from_secs(20 * 60));
            assert_eq!(settings.wait.interval, Duration::from_secs(2));
            Ok(())
        });
    }

    #[test]
    fn test_env_overrides_file() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "deepsee.toml",
                r#"
[connection]
port = "/dev/ttyUSB1"
"#,
            )?;
            jail.set_env("DEEPSEE_CONNECTION_PORT", "/dev/ttyACM3");

            let settings = load_in_jail("deepsee.toml")?;
            assert_eq!(settings.connection.port, "/dev/ttyACM3");
            Ok(())
        });
    }

    #[test]
    fn test_validation_rejects_empty_port() {
        let mut settings = Settings::default();
        settings.connection.port = " ".to_string();
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::Validation(_))
        ));
    }
}
