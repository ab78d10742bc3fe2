//! DeepSee control panel - egui desktop application.

use clap::Parser;
use deepsee::config::Settings;
use deepsee::gui::client::LaserClient;
use deepsee::gui::DeepSeeApp;
use eframe::egui;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "deepsee_gui", about = "DeepSee laser control panel", version)]
struct Cli {
    /// Serial port or VISA resource; overrides the configuration file.
    #[arg(long)]
    port: Option<String>,

    /// Configuration file path.
    #[arg(long, default_value = "deepsee.toml")]
    config: PathBuf,

    /// Drive a simulated laser instead of hardware.
    #[arg(long)]
    fake: bool,
}

fn main() -> eframe::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let mut settings = match Settings::load_from(&cli.config) {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        }
    };
    if let Some(port) = cli.port {
        settings.connection.port = port;
    }

    let client = match LaserClient::connect(&settings, cli.fake) {
        Ok(client) => client,
        Err(e) => {
            eprintln!("Failed to connect to the laser: {e:#}");
            std::process::exit(1);
        }
    };

    tracing::info!("Starting DeepSee control panel for '{}'", client.resource());

    let title = format!("DeepSee Control ({})", client.resource());
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([420.0, 360.0])
            .with_min_inner_size([360.0, 300.0])
            .with_title(title),
        ..Default::default()
    };

    eframe::run_native(
        "DeepSee Control",
        options,
        Box::new(|_cc| Ok(Box::new(DeepSeeApp::new(client)))),
    )
}
