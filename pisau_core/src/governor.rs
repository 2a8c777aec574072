//! Motor set-point, simulated RPM/temperature, and the enable/duty contract.
//!
//! The governor is the only writer of the motor driver. It is shared between
//! the coordinator and the display layer through [`SharedGovernor`].

use crate::config::GovernorCfg;
use crate::error::Result;
use crate::hw_error::report;
use crate::util::millis;
use eyre::WrapErr;
use pisau_traits::MotorDriver;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::cell::RefCell;
use std::rc::Rc;
use std::time::Duration;

/// Full-scale motor speed.
pub const MAX_RPM: f64 = 3000.0;

/// Remaining RPM gap that the ramp closes outright.
pub const RPM_SNAP: f64 = 0.5;

/// Single motor instance shared by the coordinator and the display layer.
pub type SharedGovernor<D> = Rc<RefCell<MotorGovernor<D>>>;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotorState {
    pub enabled: bool,
    /// Requested speed, always in `0..=100`.
    pub set_speed_percent: u8,
    pub current_rpm: f64,
    pub temperature_c: f64,
}

impl Default for MotorState {
    fn default() -> Self {
        Self {
            enabled: false,
            set_speed_percent: 0,
            current_rpm: 0.0,
            temperature_c: 27.0,
        }
    }
}

/// Per-tick view for the display.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MotorTelemetry {
    pub enabled: bool,
    pub set_speed_percent: u8,
    pub set_rpm: f64,
    pub current_rpm: f64,
    pub temperature_c: f64,
}

pub struct MotorGovernor<D: MotorDriver> {
    driver: D,
    cfg: GovernorCfg,
    state: MotorState,
    rng: StdRng,
}

impl<D: MotorDriver> std::fmt::Debug for MotorGovernor<D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MotorGovernor")
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl<D: MotorDriver> MotorGovernor<D> {
    pub fn new(driver: D, cfg: GovernorCfg) -> Self {
        let state = MotorState {
            temperature_c: cfg.baseline_c,
            ..MotorState::default()
        };
        Self::with_state(driver, cfg, state)
    }

    /// Start from an arbitrary state (tests, warm restarts). Nothing is
    /// written to the driver until the next command.
    pub fn with_state(driver: D, cfg: GovernorCfg, mut state: MotorState) -> Self {
        state.set_speed_percent = state.set_speed_percent.min(100);
        state.temperature_c = state.temperature_c.clamp(0.0, cfg.max_temp_c);
        let rng = match cfg.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        Self {
            driver,
            cfg,
            state,
            rng,
        }
    }

    pub fn into_shared(self) -> SharedGovernor<D> {
        Rc::new(RefCell::new(self))
    }

    pub fn state(&self) -> MotorState {
        self.state
    }

    pub fn is_enabled(&self) -> bool {
        self.state.enabled
    }

    pub fn set_speed_percent(&self) -> u8 {
        self.state.set_speed_percent
    }

    pub fn set_rpm(&self) -> f64 {
        f64::from(self.state.set_speed_percent) * self.cfg.max_rpm / 100.0
    }

    pub fn telemetry(&self) -> MotorTelemetry {
        MotorTelemetry {
            enabled: self.state.enabled,
            set_speed_percent: self.state.set_speed_percent,
            set_rpm: self.set_rpm(),
            current_rpm: self.state.current_rpm,
            temperature_c: self.state.temperature_c,
        }
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// Store a new set-point; applied to the driver now only if enabled.
    pub fn set_speed(&mut self, percent: u8) -> Result<()> {
        let percent = if percent > 100 {
            tracing::warn!(percent, "speed above 100%; clamping");
            100
        } else {
            percent
        };
        self.state.set_speed_percent = percent;
        if self.state.enabled {
            self.write_duty(f32::from(percent))?;
        }
        tracing::debug!(percent, enabled = self.state.enabled, "speed set-point");
        Ok(())
    }

    /// Raise the enable line and apply the stored set-point. No-op when
    /// already enabled.
    pub fn enable(&mut self) -> Result<()> {
        if self.state.enabled {
            return Ok(());
        }
        // duty first so the output never starts at a stale value
        self.write_duty(f32::from(self.state.set_speed_percent))?;
        self.driver
            .set_enabled(true)
            .map_err(report)
            .wrap_err("motor enable")?;
        self.state.enabled = true;
        tracing::info!(percent = self.state.set_speed_percent, "motor enabled");
        Ok(())
    }

    /// Zero the duty cycle and drop the enable line. Safe to repeat.
    pub fn disable(&mut self) -> Result<()> {
        let was_enabled = self.state.enabled;
        self.state.enabled = false;
        self.write_duty(0.0)?;
        self.driver
            .set_enabled(false)
            .map_err(report)
            .wrap_err("motor disable")?;
        if was_enabled {
            tracing::info!("motor disabled");
        }
        Ok(())
    }

    fn write_duty(&mut self, percent: f32) -> Result<()> {
        self.driver
            .set_duty_cycle(percent)
            .map_err(report)
            .wrap_err("set duty cycle")
    }

    /// Advance the motor model by one tick.
    ///
    /// A disabled motor spins down toward zero; the set-point is kept. The
    /// RPM step is `min(ramp_fraction * |delta|, max_rpm_step)`, and a gap
    /// below [`RPM_SNAP`] closes in one step.
    // rpm and temperature land exactly on 0 and baseline via snap and clamps
    #[allow(clippy::float_cmp)]
    pub fn tick(&mut self, dt: Duration) {
        let cfg = &self.cfg;
        let target = if self.state.enabled {
            self.set_rpm()
        } else {
            0.0
        };
        let delta = target - self.state.current_rpm;
        self.state.current_rpm = if delta.abs() < RPM_SNAP {
            target
        } else {
            let step = (cfg.ramp_fraction * delta.abs()).min(cfg.max_rpm_step);
            (self.state.current_rpm + step.copysign(delta)).clamp(0.0, cfg.max_rpm)
        };

        let rpm = self.state.current_rpm;
        let base = cfg.baseline_c;
        let mut temp = self.state.temperature_c;
        if rpm > cfg.cutting_rpm {
            temp += cfg.heat_per_tick_c * rpm / cfg.max_rpm;
        } else if rpm == 0.0 && temp == base {
            temp = base + self.rng.gen_range(-cfg.noise_c..=cfg.noise_c);
        } else if temp > base {
            temp = (temp - cfg.cool_per_tick_c).max(base);
        } else if temp < base {
            temp = (temp + cfg.warm_per_tick_c).min(base);
        }
        self.state.temperature_c = temp.clamp(0.0, cfg.max_temp_c);
        tracing::trace!(
            dt_ms = millis(dt),
            rpm = self.state.current_rpm,
            temp = self.state.temperature_c,
            "motor tick"
        );
    }
}
