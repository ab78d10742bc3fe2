//! Native egui/eframe control panel for the DeepSee laser.
//!
//! Intentionally minimal: shutter buttons, wavelength entry, power on/off
//! and a live status readout. The panel polls the laser every couple of
//! seconds through the blocking [`client::LaserClient`]; command failures go
//! to a status line instead of dialogs.

pub mod client;
pub mod control_panel;

use client::{LaserClient, StatusSnapshot};
use control_panel::DeepSeeControlPanel;
use std::time::{Duration, Instant};
use tracing::{error, info};

/// How often the panel re-reads status, wavelength and power.
const REFRESH_INTERVAL: Duration = Duration::from_secs(2);

/// Top-level eframe application.
pub struct DeepSeeApp {
    client: LaserClient,
    panel: DeepSeeControlPanel,
    snapshot: Option<StatusSnapshot>,
    status_line: String,
    last_refresh: Option<Instant>,
}

impl DeepSeeApp {
    /// Build the application around a connected client.
    pub fn new(client: LaserClient) -> Self {
        let panel = DeepSeeControlPanel::new(client.wavelength_bounds());
        Self {
            client,
            panel,
            snapshot: None,
            status_line: String::from("Connected."),
            last_refresh: None,
        }
    }

    fn refresh_if_due(&mut self) {
        let due = self
            .last_refresh
            .map_or(true, |t| t.elapsed() >= REFRESH_INTERVAL);
        if !due {
            return;
        }
        self.last_refresh = Some(Instant::now());
        match self.client.snapshot() {
            Ok(snapshot) => self.snapshot = Some(snapshot),
            Err(e) => {
                error!("Status refresh failed: {e}");
                self.status_line = e.to_string();
            }
        }
    }
}

impl eframe::App for DeepSeeApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.refresh_if_due();

        egui::TopBottomPanel::bottom("status_line").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.label(&self.status_line);
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            self.panel.ui(
                ui,
                &self.client,
                self.snapshot.as_ref(),
                &mut self.status_line,
            );
        });

        ctx.request_repaint_after(REFRESH_INTERVAL);
    }

    fn on_exit(&mut self, _gl: Option<&eframe::glow::Context>) {
        info!("Window closing; running the laser close sequence");
        if let Err(e) = self.client.close() {
            error!("Close sequence reported failures: {e}");
        }
    }
}
