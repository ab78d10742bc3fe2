//! DeepSee status-word decoding.
//!
//! The laser answers `*stb?` with a decimal integer representing a 32-bit
//! status word. Bits 0-15 are independent condition flags (shutters,
//! interlocks, warnings); bits 16-22 carry a 7-bit machine-state number that
//! encodes the operating phase (Appendix B of the user manual). The remaining
//! bits are unused.
//!
//! Everything here is pure: decoding and rendering never touch the
//! instrument, so the same functions serve the facade, the CLI, and tests.

use crate::error::{DeepSeeError, DriverResult};
use std::fmt;
use std::fmt::Write as _;

/// Mask selecting the 7-bit machine-state field (bits 16-22).
pub const STATE_MASK: u32 = 0x007F_0000;

/// Largest machine-state number representable in the 7-bit field.
pub const MAX_STATE: u8 = 127;

/// Number of condition-flag bits in the low word.
pub const FLAG_COUNT: usize = 16;

/// Bit index of the main (pump) shutter flag.
pub const PUMP_SHUTTER_BIT: usize = 2;

/// Bit index of the IR (stokes) shutter flag.
pub const STOKES_SHUTTER_BIT: usize = 3;

/// Flag names, indexed by bit. Reserved slots keep their place so the report
/// always has sixteen rows in bit order.
pub const FLAG_NAMES: [&str; FLAG_COUNT] = [
    "Emission",
    "Pulsing",
    "Main Shutter",
    "IR Shutter",
    "Reserved",
    "Servo On",
    "Reserved",
    "Reserved",
    "Reserved",
    "User Interlock",
    "Keyswitch",
    "Power Supply",
    "Internal",
    "Reserved",
    "Warning",
    "Fault",
];

/// Per-flag description pair: text for the clear state, text for the set
/// state. Reserved slots carry empty strings for both.
pub const FLAG_DESCRIPTIONS: [[&str; 2]; FLAG_COUNT] = [
    ["Diodes are not energized", "Diodes are energized"],
    ["Laser is not running", "Laser is in RUN/ALIGN mode"],
    ["Main shutter is closed", "Main shutter is open"],
    ["IR shutter is closed", "IR shutter is open"],
    ["", ""],
    ["Servo is off", "Servo is on"],
    ["", ""],
    ["", ""],
    ["", ""],
    ["Interlock closed", "Interlock open - laser is forced off"],
    ["Interlock closed", "Interlock open - laser is forced off"],
    ["Interlock closed", "Interlock open - laser is forced off"],
    ["Interlock closed", "Interlock open - laser is forced off"],
    ["", ""],
    ["No warnings", "Warning detected - check the warning history"],
    [
        "No faults",
        "Fault detected. Laser will not run. Check the fault history",
    ],
];

/// Extract the machine-state number from a raw status word.
///
/// Always in `0..=127` thanks to the 7-bit mask.
pub fn state_number(word: u32) -> u8 {
    ((word & STATE_MASK) >> 16) as u8
}

/// Operating phase encoded by the machine-state number.
///
/// The mapping uses half-open ranges except for the exact matches at 25, 50
/// and 60: `<25` initializing, `25` ready, `26..=49` optimizing, `50`
/// running, `51..=59` moving to align, `60` align, `61..=69` exiting align,
/// `>=70` reserved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MachinePhase {
    /// Warming up; not yet ready to turn on.
    Initializing,
    /// Ready to turn on (state 25).
    Ready,
    /// Turning on and optimizing output.
    Optimizing,
    /// Lasing at full operation (state 50).
    Running,
    /// Transitioning into align mode.
    MovingToAlign,
    /// Align mode (state 60).
    Align,
    /// Transitioning out of align mode.
    ExitingAlign,
    /// Reserved by the vendor; no documented meaning.
    Reserved,
}

impl MachinePhase {
    /// Map a machine-state number to its phase.
    ///
    /// Fails with [`DeepSeeError::InvalidState`] if `state` is outside the
    /// 7-bit range. Numbers decoded through [`state_number`] cannot trip
    /// this; the check guards values arriving from elsewhere.
    pub fn from_state(state: u8) -> DriverResult<Self> {
        if state > MAX_STATE {
            return Err(DeepSeeError::InvalidState(state));
        }
        Ok(Self::of_masked(state))
    }

    /// Total mapping over the masked range.
    fn of_masked(state: u8) -> Self {
        match state {
            0..=24 => MachinePhase::Initializing,
            25 => MachinePhase::Ready,
            26..=49 => MachinePhase::Optimizing,
            50 => MachinePhase::Running,
            51..=59 => MachinePhase::MovingToAlign,
            60 => MachinePhase::Align,
            61..=69 => MachinePhase::ExitingAlign,
            _ => MachinePhase::Reserved,
        }
    }
}

impl fmt::Display for MachinePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            MachinePhase::Initializing => "Initializing",
            MachinePhase::Ready => "Ready",
            MachinePhase::Optimizing => "Optimizing",
            MachinePhase::Running => "Running",
            MachinePhase::MovingToAlign => "Moving to align mode",
            MachinePhase::Align => "Align mode",
            MachinePhase::ExitingAlign => "Exiting align mode",
            MachinePhase::Reserved => "Reserved state",
        };
        f.write_str(text)
    }
}

/// One decoded row of the flag report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlagRow {
    /// Bit index in the low word (0-15).
    pub bit: usize,
    /// Fixed flag name for this bit.
    pub name: &'static str,
    /// Whether the bit is set.
    pub set: bool,
    /// Description matching the bit value; empty for reserved slots.
    pub description: &'static str,
}

/// A raw 32-bit status word as returned by `*stb?`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusWord(
    /// Raw word as read from the instrument.
    pub u32,
);

impl StatusWord {
    /// Machine-state number (bits 16-22).
    pub fn state_number(self) -> u8 {
        state_number(self.0)
    }

    /// Operating phase for the embedded machine-state number.
    pub fn phase(self) -> MachinePhase {
        MachinePhase::of_masked(self.state_number())
    }

    /// Value of condition-flag bit `bit`.
    ///
    /// `bit` must be below [`FLAG_COUNT`].
    pub fn flag(self, bit: usize) -> bool {
        debug_assert!(bit < FLAG_COUNT);
        (self.0 >> bit) & 1 == 1
    }

    /// All sixteen flag rows in bit order. Reserved slots are included with
    /// empty description text rather than omitted.
    pub fn flags(self) -> [FlagRow; FLAG_COUNT] {
        std::array::from_fn(|bit| {
            let set = self.flag(bit);
            FlagRow {
                bit,
                name: FLAG_NAMES[bit],
                set,
                description: FLAG_DESCRIPTIONS[bit][usize::from(set)],
            }
        })
    }

    /// Render the full human-readable status report: one row per flag bit,
    /// then the resolved phase name and state number.
    pub fn render(self) -> String {
        let mut out = String::new();
        let _ = writeln!(out, "BIT Interpretation  Description");
        for row in self.flags() {
            let _ = writeln!(out, "{:3} {:15} {}", row.bit, row.name, row.description);
        }
        let state = self.state_number();
        let _ = writeln!(out);
        let _ = writeln!(out, "Status code {:3} -- {}", state, self.phase());
        out
    }
}

impl fmt::Display for StatusWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (state {})", self.0, self.state_number())
    }
}
