//! Serial-port discovery tool for finding the DeepSee.
//!
//! Lists ports that open, and with `--probe` sends `*stb?` to each one to
//! see which answers like the laser. Probing keeps going past ports that
//! fail; this is diagnostic tooling, not production control.

use clap::Parser;
use deepsee::status::state_number;
use deepsee::transport::discovery::probe_ports;
use deepsee::transport::{SerialTransportBuilder, Transport};
use std::time::Duration;

#[derive(Parser)]
#[command(name = "discovery", about = "Find serial ports and probe for a DeepSee")]
struct Cli {
    /// Send `*stb?` to each reachable port and report which ones answer.
    #[arg(long)]
    probe: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();

    let ports = probe_ports()?;
    if ports.is_empty() {
        println!("No reachable serial ports found.");
        return Ok(());
    }

    println!("Reachable serial ports:");
    for port in &ports {
        println!("  {port}");
    }

    if !cli.probe {
        return Ok(());
    }

    println!();
    let mut found = 0;
    for port in &ports {
        print!("Probing {port}... ");
        match query_status(port).await {
            Ok(word) => {
                found += 1;
                println!("status word {word} (state {})", state_number(word));
            }
            Err(e) => println!("no laser ({e})"),
        }
    }
    println!();
    println!("Ports answering *stb?: {found}/{}", ports.len());
    Ok(())
}

async fn query_status(port: &str) -> anyhow::Result<u32> {
    let transport = SerialTransportBuilder::new(port)
        .with_timeout(Duration::from_millis(500))
        .open()?;
    let reply = transport.query("*stb?").await?;
    let word = reply.trim().parse()?;
    transport.close().await?;
    Ok(word)
}
