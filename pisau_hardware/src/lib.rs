pub mod camera;
pub mod error;
#[cfg(all(feature = "hardware", target_os = "linux"))]
pub mod pi;

pub use camera::{Blob, ImageDirCamera, SceneHandle, SimulatedCamera};

use pisau_traits::{MotorDriver, SwitchState, Switches};
use std::cell::{Cell, RefCell};
use std::rc::Rc;

/// Everything the simulated driver has been told, shared with test/CLI probes.
#[derive(Debug, Default, Clone)]
pub struct DriverLog {
    /// Every duty cycle written, in order.
    pub duty_history: Vec<f32>,
    pub duty: f32,
    pub enabled: bool,
    /// Next write fails with a GPIO error (fault injection).
    pub fail_next: bool,
}

/// Simulated motor driver; writes land in a shared [`DriverLog`].
#[derive(Debug, Default)]
pub struct SimulatedMotorDriver {
    log: Rc<RefCell<DriverLog>>,
}

impl SimulatedMotorDriver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Shared view of the driver state.
    pub fn probe(&self) -> Rc<RefCell<DriverLog>> {
        self.log.clone()
    }

    fn check_fault(&self) -> error::Result<()> {
        let mut log = self.log.borrow_mut();
        if log.fail_next {
            log.fail_next = false;
            return Err(error::HwError::Gpio("injected driver fault".into()));
        }
        Ok(())
    }
}

impl MotorDriver for SimulatedMotorDriver {
    fn set_duty_cycle(
        &mut self,
        percent: f32,
    ) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.check_fault()?;
        let mut log = self.log.borrow_mut();
        log.duty = percent.clamp(0.0, 100.0);
        let duty = log.duty;
        log.duty_history.push(duty);
        tracing::trace!(duty, "duty cycle (simulated)");
        Ok(())
    }

    fn set_enabled(&mut self, on: bool) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        self.check_fault()?;
        self.log.borrow_mut().enabled = on;
        tracing::debug!(on, "enable line (simulated)");
        Ok(())
    }
}

/// Handle for flipping the simulated switches from a test or the CLI.
#[derive(Debug, Clone, Default)]
pub struct SwitchPanel {
    run: Rc<Cell<bool>>,
    shutdown: Rc<Cell<bool>>,
}

impl SwitchPanel {
    pub fn set_run(&self, on: bool) {
        self.run.set(on);
    }
    pub fn press_shutdown(&self) {
        self.shutdown.set(true);
    }
    pub fn release_shutdown(&self) {
        self.shutdown.set(false);
    }
}

/// Simulated run/shutdown switches.
#[derive(Debug, Default)]
pub struct SimulatedSwitches {
    panel: SwitchPanel,
}

impl SimulatedSwitches {
    pub fn new(run_on: bool) -> Self {
        let s = Self::default();
        s.panel.set_run(run_on);
        s
    }

    pub fn panel(&self) -> SwitchPanel {
        self.panel.clone()
    }
}

impl Switches for SimulatedSwitches {
    fn read(&mut self) -> Result<SwitchState, Box<dyn std::error::Error + Send + Sync>> {
        Ok(SwitchState {
            run: self.panel.run.get(),
            shutdown: self.panel.shutdown.get(),
        })
    }
}
