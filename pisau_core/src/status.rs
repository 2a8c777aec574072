//! Snapshot handed to the display on every status tick.

use crate::coordinator::{Advisory, MachineState};
use crate::governor::MotorTelemetry;

#[derive(Debug, Clone, PartialEq)]
pub struct StatusSnapshot {
    pub machine: MachineState,
    pub latched: bool,
    pub motor: MotorTelemetry,
    pub warning_active: bool,
    pub status_text: &'static str,
    /// Overrun alert phase.
    pub alert_visible: bool,
    /// Advisories raised since the previous snapshot.
    pub advisories: Vec<Advisory>,
}

impl StatusSnapshot {
    pub fn machine_label(&self) -> &'static str {
        self.machine.label()
    }
}
