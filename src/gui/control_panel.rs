//! Interactive DeepSee control panel.
//!
//! A stateful panel holding the UI-side targets (wavelength entry) and
//! rendering controls against the latest status snapshot. User interactions
//! call straight through the blocking [`LaserClient`]; failures land in the
//! shared status line and the log.

use crate::gui::client::{LaserClient, StatusSnapshot};
use crate::status::{PUMP_SHUTTER_BIT, STOKES_SHUTTER_BIT};
use egui::{Color32, RichText, Ui};
use tracing::error;

/// DeepSee laser control panel.
pub struct DeepSeeControlPanel {
    /// Wavelength the user is dialing in, in nm.
    pub target_wavelength: i64,
}

impl DeepSeeControlPanel {
    /// Create a panel with the target preset to the middle of `bounds`.
    pub fn new(bounds: (i64, i64)) -> Self {
        Self {
            target_wavelength: (bounds.0 + bounds.1) / 2,
        }
    }

    /// Render the panel.
    pub fn ui(
        &mut self,
        ui: &mut Ui,
        client: &LaserClient,
        snapshot: Option<&StatusSnapshot>,
        status_line: &mut String,
    ) {
        ui.heading("DeepSee Laser Control");
        ui.separator();

        let (min, max) = client.wavelength_bounds();

        // Wavelength control
        ui.horizontal(|ui| {
            ui.label("Set Wavelength (nm):");
            ui.add(
                egui::DragValue::new(&mut self.target_wavelength)
                    .speed(1.0)
                    .range(min..=max),
            );
            if ui.button("Set").clicked() {
                match client.set_wavelength(self.target_wavelength) {
                    Ok(()) => {
                        *status_line = format!("Wavelength set to {} nm", self.target_wavelength);
                    }
                    Err(e) => {
                        error!("Failed to set wavelength: {e}");
                        *status_line = e.to_string();
                    }
                }
            }
        });

        ui.add_space(10.0);

        let Some(snapshot) = snapshot else {
            ui.label("Waiting for first status read...");
            return;
        };

        // Live readings
        ui.horizontal(|ui| {
            ui.label("Actual Wavelength:");
            ui.colored_label(Color32::GREEN, format!("{} nm", snapshot.wavelength_nm));
        });
        ui.horizontal(|ui| {
            ui.label("Output Power:");
            ui.colored_label(Color32::YELLOW, format!("{:.3} W", snapshot.power_watts));
        });

        ui.add_space(15.0);

        // Shutter buttons
        let pump_open = snapshot.word.flag(PUMP_SHUTTER_BIT);
        let stokes_open = snapshot.word.flag(STOKES_SHUTTER_BIT);
        ui.horizontal(|ui| {
            self.shutter_button(ui, "Pump Shutter", pump_open, status_line, |open| {
                client.set_pump_shutter(open)
            });
            ui.add_space(10.0);
            self.shutter_button(ui, "Stokes Shutter", stokes_open, status_line, |open| {
                client.set_stokes_shutter(open)
            });
        });

        ui.add_space(15.0);

        // Power buttons
        ui.horizontal(|ui| {
            if ui
                .button(RichText::new("Power On").color(Color32::LIGHT_GREEN).size(16.0))
                .clicked()
            {
                match client.power_on() {
                    Ok(()) => *status_line = "Power-on issued; warming up".to_string(),
                    Err(e) => {
                        error!("Failed to power on: {e}");
                        *status_line = e.to_string();
                    }
                }
            }
            if ui
                .button(RichText::new("Power Off").color(Color32::RED).size(16.0))
                .clicked()
            {
                match client.power_off() {
                    Ok(()) => *status_line = "Diodes off".to_string(),
                    Err(e) => {
                        error!("Failed to power off: {e}");
                        *status_line = e.to_string();
                    }
                }
            }
        });

        ui.add_space(10.0);
        ui.separator();

        // System status
        let state = snapshot.word.state_number();
        let phase = snapshot.word.phase();
        let color = match state {
            50 => Color32::RED,
            25 => Color32::LIGHT_GREEN,
            _ => Color32::GRAY,
        };
        ui.colored_label(color, format!("Status code {state:3} -- {phase}"));
    }

    fn shutter_button<F>(
        &self,
        ui: &mut Ui,
        name: &str,
        open: bool,
        status_line: &mut String,
        toggle: F,
    ) where
        F: FnOnce(bool) -> crate::error::DriverResult<()>,
    {
        let text = if open {
            format!("{name} -- OPEN")
        } else {
            format!("{name} -- CLOSED")
        };
        let color = if open { Color32::GREEN } else { Color32::GRAY };
        if ui.button(RichText::new(text).color(color)).clicked() {
            match toggle(!open) {
                Ok(()) => {
                    *status_line = format!(
                        "{name} {}",
                        if open { "closing" } else { "opening" }
                    );
                }
                Err(e) => {
                    error!("Failed to toggle {name}: {e}");
                    *status_line = e.to_string();
                }
            }
        }
    }
}
