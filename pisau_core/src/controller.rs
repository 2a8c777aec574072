//! Wires zones, pipeline, governor and coordinator into three cooperative
//! periodic tasks: motor tick, status poll, vision.
//!
//! Everything runs on the calling thread. Display-layer commands arrive
//! through [`CommandSender`] and are applied at the start of each poll.

use crate::command::{Command, CommandQueue, CommandSender};
use crate::config::{DetectionCfg, GovernorCfg, LatchPolicy, OverrunCfg, TaskPeriods, ZoneCfg};
use crate::coordinator::{MachineState, SafetyCoordinator};
use crate::error::{GuardError, Result};
use crate::governor::{MotorGovernor, SharedGovernor};
use crate::hw_error::report;
use crate::pipeline::{FrameReport, IntrusionPipeline, TEXT_CLEAR};
use crate::scheduler::{Scheduler, TaskKind};
use crate::status::StatusSnapshot;
use crate::util::millis;
use crate::zone::ZoneDetector;
use eyre::WrapErr;
use pisau_traits::{Camera, Clock, MotorDriver, Switches};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

/// Devices the controller drives.
pub struct Hardware<C, S, D> {
    pub camera: C,
    pub switches: S,
    pub driver: D,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Shutdown,
}

/// Loop counters for the end-of-run summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LoopStats {
    pub frames: u64,
    pub skipped_frames: u64,
    pub events: u64,
    pub motor_ticks: u64,
    pub status_polls: u64,
}

pub struct Controller<C: Camera, S: Switches, D: MotorDriver, K: Clock> {
    camera: C,
    switches: S,
    clock: K,
    governor: SharedGovernor<D>,
    coordinator: SafetyCoordinator<D>,
    pipeline: IntrusionPipeline,
    zones: ZoneDetector,
    scheduler: Scheduler,
    commands: CommandQueue,
    config: pisau_config::Config,
    last_frame: Option<FrameReport>,
    last_snapshot: Option<StatusSnapshot>,
    last_motor_tick: Instant,
    shutdown_requested: bool,
    stats: LoopStats,
}

impl<C: Camera, S: Switches, D: MotorDriver, K: Clock> Controller<C, S, D, K> {
    pub fn new(
        config: &pisau_config::Config,
        hw: Hardware<C, S, D>,
        clock: K,
        governor_cfg: GovernorCfg,
    ) -> Result<Self> {
        config
            .validate()
            .map_err(|e| eyre::Report::new(GuardError::Config(e.to_string())))?;
        let periods = TaskPeriods::from(&config.timing);
        let zones = ZoneDetector::new(ZoneCfg::from(config));
        let governor = MotorGovernor::new(hw.driver, governor_cfg).into_shared();
        let mut coordinator = SafetyCoordinator::new(
            governor.clone(),
            zones.dirty_flag(),
            LatchPolicy::from(&config.detection),
            OverrunCfg::default(),
            periods.reset_settle,
        );

        let now = clock.now();
        let mut scheduler = Scheduler::new();
        scheduler.add(TaskKind::Motor, periods.motor, now + periods.motor);
        let status = scheduler.add(TaskKind::Status, periods.status, now);
        let vision = scheduler.add(TaskKind::Vision, periods.vision, now);
        coordinator.attach_task(status);
        coordinator.attach_task(vision);

        tracing::info!(
            vision_ms = millis(periods.vision),
            status_ms = millis(periods.status),
            motor_ms = millis(periods.motor),
            "controller ready"
        );
        Ok(Self {
            camera: hw.camera,
            switches: hw.switches,
            clock,
            governor,
            coordinator,
            pipeline: IntrusionPipeline::new(DetectionCfg::from(config)),
            zones,
            scheduler,
            commands: CommandQueue::new(),
            config: config.clone(),
            last_frame: None,
            last_snapshot: None,
            last_motor_tick: now,
            shutdown_requested: false,
            stats: LoopStats::default(),
        })
    }

    /// Shared motor handle for the display layer.
    pub fn governor(&self) -> SharedGovernor<D> {
        self.governor.clone()
    }

    pub fn command_sender(&self) -> CommandSender {
        self.commands.sender()
    }

    pub fn coordinator(&self) -> &SafetyCoordinator<D> {
        &self.coordinator
    }

    pub fn zones(&self) -> &ZoneDetector {
        &self.zones
    }

    pub fn config(&self) -> &pisau_config::Config {
        &self.config
    }

    pub fn clock(&self) -> &K {
        &self.clock
    }

    pub fn stats(&self) -> LoopStats {
        self.stats
    }

    /// Most recent processed frame; kept across camera dropouts.
    pub fn last_frame(&self) -> Option<&FrameReport> {
        self.last_frame.as_ref()
    }

    pub fn last_snapshot(&self) -> Option<&StatusSnapshot> {
        self.last_snapshot.as_ref()
    }

    /// One scheduling pass: apply queued commands, finish a pending reset,
    /// then run every due task (motor, status, vision).
    pub fn poll(&mut self) -> Result<Flow> {
        let now = self.clock.now();
        for cmd in self.commands.drain() {
            self.apply(cmd, now)?;
        }
        if self.coordinator.reset_due(now) {
            let switches = self.read_switches()?;
            self.coordinator.reset(switches.run)?;
            self.pipeline.reset();
        }
        for kind in self.scheduler.due(now) {
            if self.scheduler.is_cancelled(kind) {
                continue;
            }
            match kind {
                TaskKind::Motor => self.motor_tick(now)?,
                TaskKind::Status => self.status_tick(now)?,
                TaskKind::Vision => self.vision_tick(now)?,
            }
        }
        if self.shutdown_requested {
            self.governor.borrow_mut().disable()?;
            tracing::info!("shutdown requested; motor disabled");
            return Ok(Flow::Shutdown);
        }
        Ok(Flow::Continue)
    }

    /// Poll until shutdown, `stop` is raised, or `limit` elapses. The motor is
    /// disabled on every exit path.
    pub fn run(&mut self, stop: &AtomicBool, limit: Option<Duration>) -> Result<LoopStats> {
        let start = self.clock.now();
        let outcome = self.run_inner(stop, limit, start);
        if let Err(e) = self.governor.borrow_mut().disable() {
            tracing::warn!(error = %e, "best-effort motor disable failed");
        }
        outcome?;
        tracing::info!(
            frames = self.stats.frames,
            skipped = self.stats.skipped_frames,
            events = self.stats.events,
            deadline_misses = self.scheduler.deadline_misses(),
            "controller stopped"
        );
        Ok(self.stats)
    }

    fn run_inner(&mut self, stop: &AtomicBool, limit: Option<Duration>, start: Instant) -> Result<()> {
        loop {
            if stop.load(Ordering::Relaxed) {
                tracing::info!("stop signal received");
                return Ok(());
            }
            if limit.is_some_and(|l| self.clock.now().saturating_duration_since(start) >= l) {
                tracing::info!("run time limit reached");
                return Ok(());
            }
            if self.poll()? == Flow::Shutdown {
                return Ok(());
            }
            // the motor task is never cancelled, so a deadline always exists
            let now = self.clock.now();
            let next = self
                .scheduler
                .next_deadline()
                .unwrap_or(now + Duration::from_millis(10));
            self.clock.sleep(next.saturating_duration_since(now));
        }
    }

    fn apply(&mut self, cmd: Command, now: Instant) -> Result<()> {
        tracing::debug!(?cmd, "command");
        match cmd {
            Command::TriggerEmergency => {
                self.coordinator.trigger_emergency("operator")?;
            }
            Command::ResetEmergency => {
                self.coordinator.request_reset(now);
            }
            Command::SetSpeed(p) => self.coordinator.set_speed(p)?,
            Command::Preset(p) => self.coordinator.set_speed(p.percent())?,
            Command::ApplyConfig(cfg) => self.apply_config(*cfg),
            Command::Shutdown => self.shutdown_requested = true,
        }
        Ok(())
    }

    fn apply_config(&mut self, cfg: pisau_config::Config) {
        if let Err(e) = cfg.validate() {
            tracing::warn!(error = %e, "config change rejected");
            return;
        }
        if cfg.timing != self.config.timing || cfg.pins != self.config.pins {
            tracing::info!("timing and pin changes take effect on restart");
        }
        self.zones.set_config(ZoneCfg::from(&cfg));
        self.pipeline.set_config(DetectionCfg::from(&cfg));
        self.config = cfg;
        tracing::info!("config applied");
    }

    fn read_switches(&mut self) -> Result<pisau_traits::SwitchState> {
        self.switches
            .read()
            .map_err(report)
            .wrap_err("read switches")
    }

    fn motor_tick(&mut self, now: Instant) -> Result<()> {
        let dt = now.saturating_duration_since(self.last_motor_tick);
        self.last_motor_tick = now;
        self.coordinator.on_motor_tick(dt)?;
        self.stats.motor_ticks += 1;
        // status polling is suspended while latched; the shutdown switch is not
        if self.coordinator.is_latched() {
            let switches = self.read_switches()?;
            self.coordinator.on_switch(switches.run)?;
            if switches.shutdown {
                tracing::info!("shutdown switch pressed while latched");
                self.shutdown_requested = true;
            }
        }
        Ok(())
    }

    fn status_tick(&mut self, now: Instant) -> Result<()> {
        let switches = self.read_switches()?;
        self.stats.status_polls += 1;
        if switches.shutdown {
            tracing::info!("shutdown switch pressed");
            self.shutdown_requested = true;
            return Ok(());
        }
        self.coordinator.on_switch(switches.run)?;

        let advisories = self.coordinator.take_advisories();
        for a in &advisories {
            tracing::warn!(advisory = %a, "overrun advisory");
        }
        let warning_active = !self.coordinator.is_latched() && self.pipeline.warning_active(now);
        let status_text = match (&self.last_frame, warning_active) {
            (Some(f), true) => f.status_text,
            _ => TEXT_CLEAR,
        };
        let snapshot = StatusSnapshot {
            machine: self.coordinator.state(),
            latched: self.coordinator.is_latched(),
            motor: self.governor.borrow().telemetry(),
            warning_active,
            status_text,
            alert_visible: self.coordinator.alert_visible(),
            advisories,
        };
        tracing::debug!(
            machine = snapshot.machine_label(),
            rpm = snapshot.motor.current_rpm,
            temp = snapshot.motor.temperature_c,
            set_percent = snapshot.motor.set_speed_percent,
            warning = snapshot.warning_active,
            "status"
        );
        self.last_snapshot = Some(snapshot);
        Ok(())
    }

    fn vision_tick(&mut self, now: Instant) -> Result<()> {
        let frame = match self.camera.read_frame() {
            Ok(f) => f,
            Err(e) => {
                self.stats.skipped_frames += 1;
                tracing::warn!(error = %e, "camera read failed; frame skipped");
                return Ok(());
            }
        };
        let report = self.pipeline.process(frame, &mut self.zones, now);
        self.stats.frames += 1;
        if let Some(ev) = &report.event {
            self.stats.events += 1;
            self.coordinator.on_intrusion(ev)?;
        }
        self.last_frame = Some(report);
        Ok(())
    }

    /// Current machine state (shortcut for the display).
    pub fn machine_state(&self) -> MachineState {
        self.coordinator.state()
    }
}
