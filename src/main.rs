//! Command-line control for the DeepSee laser.

use anyhow::Context;
use clap::{Parser, Subcommand, ValueEnum};
use deepsee::config::Settings;
use deepsee::laser::DeepSee;
use deepsee::transport::{MockTransport, Transport};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "deepsee",
    about = "Control a Spectra-Physics DeepSee tunable pump laser",
    version
)]
struct Cli {
    /// Serial port or VISA resource; overrides the configuration file.
    #[arg(long)]
    port: Option<String>,

    /// Configuration file path.
    #[arg(long, default_value = "deepsee.toml")]
    config: PathBuf,

    /// Talk to a simulated laser instead of hardware.
    #[arg(long)]
    fake: bool,

    /// Leave an armed watchdog timer in place (a warning is logged).
    #[arg(long)]
    keep_watchdog: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Show the machine-state number and operating phase.
    Status,
    /// Show the full decoded status report (all sixteen flags).
    Render,
    /// Power on the diodes; requires the laser to report ready.
    On {
        /// Block until the laser reports running, printing progress.
        #[arg(long)]
        wait: bool,
    },
    /// Turn off the diodes (ovens stay warm).
    Off,
    /// Fully power down the laser.
    Shutdown,
    /// Get the wavelength, or set it when a value is given.
    Wavelength {
        /// Target wavelength in nm.
        nm: Option<i64>,
    },
    /// Read the output power.
    Power,
    /// Read the operating mode.
    Mode,
    /// Read the warmup percentage.
    Warmup,
    /// Get the motor position, or move when a target is given.
    Motor {
        /// Target motor position.
        position: Option<f64>,
    },
    /// Open or close a beam shutter.
    Shutter {
        /// Which beam.
        beam: Beam,
        /// What to do with it.
        action: ShutterAction,
    },
    /// Show both shutter positions.
    Shutters,
    /// Get the watchdog interval, or set it when a value is given
    /// (0 disarms).
    Watchdog {
        /// Interval in seconds.
        seconds: Option<f64>,
    },
    /// Safe teardown: re-arm the watchdog, close both shutters, power off.
    Close,
    /// List serial ports that open successfully.
    Discover,
}

#[derive(Clone, Copy, ValueEnum)]
enum Beam {
    Pump,
    Stokes,
}

#[derive(Clone, Copy, ValueEnum)]
enum ShutterAction {
    Open,
    Close,
}

fn build_transport(settings: &Settings, fake: bool) -> anyhow::Result<Box<dyn Transport>> {
    if fake {
        return Ok(Box::new(MockTransport::new()));
    }

    #[cfg(feature = "instrument_serial")]
    {
        let transport = deepsee::transport::SerialTransportBuilder::new(&settings.connection.port)
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

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();

    if let Command::Discover = cli.command {
        return discover();
    }

    let mut settings = Settings::load_from(&cli.config).context("Failed to load configuration")?;
    if let Some(port) = cli.port {
        settings.connection.port = port;
    }
    let policy = if cli.keep_watchdog {
        deepsee::WatchdogPolicy::Leave
    } else {
        settings.watchdog.policy()
    };

    let transport = build_transport(&settings, cli.fake)?;
    let laser = DeepSee::connect(transport, policy)
        .await
        .context("Failed to connect to the laser")?;

    run_command(&laser, &settings, cli.command).await
}

async fn run_command(laser: &DeepSee, settings: &Settings, command: Command) -> anyhow::Result<()> {
    match command {
        Command::Status => {
            let word = laser.read_status_word().await?;
            println!("Status code {:3} -- {}", word.state_number(), word.phase());
        }
        Command::Render => {
            let word = laser.read_status_word().await?;
            print!("{}", word.render());
        }
        Command::On { wait } => {
            laser.power_on().await?;
            println!("Power-on issued.");
            if wait {
                let state = laser
                    .wait_until_running_with(settings.wait.timeout, settings.wait.interval, |tick| {
                        println!("{:4} s - status {:03}", tick.elapsed.as_secs(), tick.state);
                    })
                    .await?;
                println!("Laser running (state {state}).");
            }
        }
        Command::Off => {
            laser.power_off().await?;
            println!("Diodes off; ovens stay warm.");
        }
        Command::Shutdown => {
            laser.shutdown().await?;
            println!("Laser powering down.");
        }
        Command::Wavelength { nm: Some(nm) } => {
            laser.set_wavelength(nm).await?;
            println!("Wavelength set to {nm} nm.");
        }
        Command::Wavelength { nm: None } => {
            println!("{} nm", laser.get_wavelength().await?);
        }
        Command::Power => {
            println!("{} W", laser.get_power().await?);
        }
        Command::Mode => {
            println!("{}", laser.get_mode().await?);
        }
        Command::Warmup => {
            println!("{} %", laser.get_pct_warmup().await?);
        }
        Command::Motor {
            position: Some(position),
        } => {
            laser.set_motor_position(position).await?;
            println!("Motor target set to {position}.");
        }
        Command::Motor { position: None } => {
            println!("{}", laser.get_motor_position().await?);
        }
        Command::Shutter { beam, action } => {
            match (beam, action) {
                (Beam::Pump, ShutterAction::Open) => laser.open_pump_shutter().await?,
                (Beam::Pump, ShutterAction::Close) => laser.close_pump_shutter().await?,
                (Beam::Stokes, ShutterAction::Open) => laser.open_stokes_shutter().await?,
                (Beam::Stokes, ShutterAction::Close) => laser.close_stokes_shutter().await?,
            }
            println!("Done.");
        }
        Command::Shutters => {
            let (pump, stokes) = laser.get_shutter_states().await?;
            println!("Pump shutter is {pump:?} -- Stokes shutter is {stokes:?}");
        }
        Command::Watchdog {
            seconds: Some(seconds),
        } => {
            laser.set_watchdog_time(seconds).await?;
            if seconds == 0.0 {
                println!("Watchdog disarmed.");
            } else {
                println!("Watchdog set to {seconds} s.");
            }
        }
        Command::Watchdog { seconds: None } => {
            println!("{} s", laser.get_watchdog_time().await?);
        }
        Command::Close => {
            laser.close().await?;
            println!("Laser closed safely.");
        }
        Command::Discover => unreachable!("handled before connecting"),
    }
    Ok(())
}

fn discover() -> anyhow::Result<()> {
    #[cfg(feature = "instrument_serial")]
    {
        let ports = deepsee::transport::discovery::probe_ports()?;
        if ports.is_empty() {
            println!("No reachable serial ports found.");
        } else {
            for port in ports {
                println!("{port}");
            }
        }
        Ok(())
    }

    #[cfg(not(feature = "instrument_serial"))]
    {
        anyhow::bail!("Serial support not enabled. Rebuild with --features instrument_serial")
    }
}
