//! Safety state machine: switch, intrusion and overrun inputs in, motor
//! commands out, with a sticky emergency latch.

use crate::config::{LatchPolicy, OverrunCfg};
use crate::error::Result;
use crate::governor::SharedGovernor;
use crate::overrun::{Metric, OverrunAccumulator};
use crate::pipeline::{IntrusionEvent, IntrusionKind};
use crate::scheduler::TaskHandle;
use crate::util::millis;
use crate::zone::DirtyFlag;
use pisau_traits::MotorDriver;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MachineState {
    Disabled,
    Enabled,
    EmergencyLatched,
}

impl MachineState {
    /// Status-bar wording.
    pub fn label(self) -> &'static str {
        match self {
            Self::Disabled => "Ready",
            Self::Enabled => "Running",
            Self::EmergencyLatched => "EMERGENCY STOP",
        }
    }
}

/// Operator-facing overrun notices, raised once per crossing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Advisory {
    TemperatureHigh,
    TemperatureThrottled,
    RpmHigh,
    RpmThrottled,
}

impl std::fmt::Display for Advisory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Self::TemperatureHigh => "motor temperature high for 10 s; reduce load",
            Self::TemperatureThrottled => "motor temperature high for 30 s; speed limited to 50%",
            Self::RpmHigh => "motor speed above 2700 RPM for 10 s",
            Self::RpmThrottled => "motor speed above 2700 RPM for 30 s; speed limited to 50%",
        })
    }
}

impl Advisory {
    fn high(metric: Metric) -> Self {
        match metric {
            Metric::Temperature => Self::TemperatureHigh,
            Metric::Rpm => Self::RpmHigh,
        }
    }
    fn throttled(metric: Metric) -> Self {
        match metric {
            Metric::Temperature => Self::TemperatureThrottled,
            Metric::Rpm => Self::RpmThrottled,
        }
    }
}

pub struct SafetyCoordinator<D: MotorDriver> {
    governor: SharedGovernor<D>,
    overlay_dirty: DirtyFlag,
    policy: LatchPolicy,
    overrun: OverrunCfg,
    settle: Duration,
    state: MachineState,
    switch_on: bool,
    temperature: OverrunAccumulator,
    rpm: OverrunAccumulator,
    alert_visible: bool,
    advisories: Vec<Advisory>,
    tasks: Vec<TaskHandle>,
    reset_at: Option<Instant>,
}

impl<D: MotorDriver> SafetyCoordinator<D> {
    pub fn new(
        governor: SharedGovernor<D>,
        overlay_dirty: DirtyFlag,
        policy: LatchPolicy,
        overrun: OverrunCfg,
        settle: Duration,
    ) -> Self {
        Self {
            governor,
            overlay_dirty,
            policy,
            temperature: OverrunAccumulator::temperature(&overrun),
            rpm: OverrunAccumulator::rpm(&overrun),
            overrun,
            settle,
            state: MachineState::Disabled,
            switch_on: false,
            alert_visible: false,
            advisories: Vec::new(),
            tasks: Vec::new(),
            reset_at: None,
        }
    }

    /// Periodic work to suspend while latched.
    pub fn attach_task(&mut self, handle: TaskHandle) {
        self.tasks.push(handle);
    }

    pub fn state(&self) -> MachineState {
        self.state
    }

    pub fn is_latched(&self) -> bool {
        self.state == MachineState::EmergencyLatched
    }

    pub fn switch_on(&self) -> bool {
        self.switch_on
    }

    pub fn governor(&self) -> &SharedGovernor<D> {
        &self.governor
    }

    /// Feed the run-switch level. Repeating the current level does nothing.
    pub fn on_switch(&mut self, on: bool) -> Result<()> {
        self.switch_on = on;
        match (self.state, on) {
            (MachineState::EmergencyLatched, _) => {}
            (MachineState::Disabled, true) => {
                self.governor.borrow_mut().enable()?;
                self.state = MachineState::Enabled;
                tracing::info!("run switch on; machine enabled");
            }
            (MachineState::Enabled, false) => {
                self.governor.borrow_mut().disable()?;
                self.state = MachineState::Disabled;
                tracing::info!("run switch off; machine disabled");
            }
            _ => {}
        }
        Ok(())
    }

    /// Latch the emergency stop. Returns `false` when already latched.
    pub fn trigger_emergency(&mut self, reason: &str) -> Result<bool> {
        if self.is_latched() {
            tracing::debug!(reason, "emergency already latched");
            return Ok(false);
        }
        self.state = MachineState::EmergencyLatched;
        self.reset_at = None;
        self.alert_visible = false;
        for t in &self.tasks {
            t.cancel();
        }
        tracing::warn!(reason, "EMERGENCY STOP latched");
        self.governor.borrow_mut().disable()?;
        Ok(true)
    }

    /// Route an intrusion event through the latch policy.
    pub fn on_intrusion(&mut self, event: &IntrusionEvent) -> Result<()> {
        let latch = match event.kind {
            IntrusionKind::Hand => self.policy.on_hand,
            IntrusionKind::MotionInner => self.policy.on_motion_inner,
            IntrusionKind::MotionOuter => false,
        };
        if latch {
            self.trigger_emergency(event.kind.reason())?;
        }
        Ok(())
    }

    /// Operator reset. Only valid while latched; the latch clears after the
    /// settle delay (see [`Self::reset_due`]).
    pub fn request_reset(&mut self, now: Instant) -> bool {
        if !self.is_latched() {
            tracing::debug!(state = ?self.state, "reset ignored; not latched");
            return false;
        }
        if self.reset_at.is_none() {
            self.reset_at = Some(now + self.settle);
            tracing::info!(settle_ms = millis(self.settle), "emergency reset requested");
        }
        true
    }

    pub fn reset_pending(&self) -> bool {
        self.reset_at.is_some()
    }

    pub fn reset_due(&self, now: Instant) -> bool {
        self.reset_at.is_some_and(|at| now >= at)
    }

    /// Clear the latch and the timers/caches tied to it, then follow the
    /// switch. Does nothing unless latched.
    pub fn reset(&mut self, switch_on: bool) -> Result<MachineState> {
        if !self.is_latched() {
            return Ok(self.state);
        }
        self.reset_at = None;
        self.temperature.reset();
        self.rpm.reset();
        self.alert_visible = false;
        self.overlay_dirty.mark();
        for t in &self.tasks {
            t.resume();
        }
        self.state = MachineState::Disabled;
        tracing::info!(switch_on, "emergency latch cleared");
        self.on_switch(switch_on)?;
        Ok(self.state)
    }

    /// Manual or preset speed change from the operator.
    pub fn set_speed(&mut self, percent: u8) -> Result<()> {
        self.governor.borrow_mut().set_speed(percent)
    }

    /// Motor tick: advance the model, then evaluate overrun unless latched.
    pub fn on_motor_tick(&mut self, dt: Duration) -> Result<()> {
        let state = {
            let mut g = self.governor.borrow_mut();
            g.tick(dt);
            g.state()
        };
        if self.is_latched() {
            return Ok(());
        }
        self.evaluate(Metric::Temperature, state.temperature_c, dt)?;
        self.evaluate(Metric::Rpm, state.current_rpm, dt)?;
        if self.temperature.alerting() || self.rpm.alerting() {
            self.alert_visible = !self.alert_visible;
        } else {
            self.alert_visible = false;
        }
        Ok(())
    }

    fn evaluate(&mut self, metric: Metric, value: f64, dt: Duration) -> Result<()> {
        let acc = match metric {
            Metric::Temperature => &mut self.temperature,
            Metric::Rpm => &mut self.rpm,
        };
        let crossing = acc.update(value, dt, &self.overrun);
        if crossing.advisory {
            tracing::warn!(?metric, value, "overrun advisory");
            self.advisories.push(Advisory::high(metric));
        }
        if crossing.throttle {
            let target = self.overrun.throttle_percent;
            let mut g = self.governor.borrow_mut();
            if g.set_speed_percent() != target {
                g.set_speed(target)?;
                tracing::warn!(?metric, value, percent = target, "overrun; speed forced down");
            }
            self.advisories.push(Advisory::throttled(metric));
        }
        if crossing.cleared {
            tracing::info!(?metric, value, "overrun cleared");
        }
        Ok(())
    }

    /// Drain advisories raised since the last call.
    pub fn take_advisories(&mut self) -> Vec<Advisory> {
        std::mem::take(&mut self.advisories)
    }

    /// Current phase of the overrun visual alert.
    pub fn alert_visible(&self) -> bool {
        self.alert_visible
    }

    pub fn overrun_elapsed(&self, metric: Metric) -> Duration {
        match metric {
            Metric::Temperature => self.temperature.elapsed(),
            Metric::Rpm => self.rpm.elapsed(),
        }
    }
}
