use std::error::Error;
use std::time::Duration;

use pisau_core::error::GuardError;
use pisau_core::mocks::{FixedSwitches, NullCamera};
use pisau_core::{
    Controller, DirtyFlag, GovernorCfg, Hardware, LatchPolicy, MotorGovernor, OverrunCfg,
    SafetyCoordinator,
};
use pisau_hardware::SimulatedMotorDriver;
use pisau_traits::{ManualClock, MotorDriver, SwitchState, Switches};

/// Motor driver whose enable line is stuck.
struct StuckDriver;
impl MotorDriver for StuckDriver {
    fn set_duty_cycle(&mut self, _percent: f32) -> Result<(), Box<dyn Error + Send + Sync>> {
        Ok(())
    }
    fn set_enabled(&mut self, _on: bool) -> Result<(), Box<dyn Error + Send + Sync>> {
        Err("enable line stuck".into())
    }
}

/// Switch bank that reads once, then fails.
struct FlakySwitches {
    ok_sent: bool,
}
impl Switches for FlakySwitches {
    fn read(&mut self) -> Result<SwitchState, Box<dyn Error + Send + Sync>> {
        if self.ok_sent {
            Err("i2c expander not responding".into())
        } else {
            self.ok_sent = true;
            Ok(SwitchState::default())
        }
    }
}

#[test]
fn driver_errors_map_to_guarderror_hardware() {
    let mut g = MotorGovernor::new(StuckDriver, GovernorCfg::default());
    let err = g.enable().expect_err("expected hardware error");
    match err.downcast_ref::<GuardError>() {
        Some(GuardError::Hardware(msg)) => assert!(msg.contains("stuck")),
        other => panic!("unexpected error: {other:?}"),
    }
    assert!(format!("{err:#}").contains("motor enable"));
}

#[test]
fn emergency_latches_even_when_disable_fails() {
    let gov = MotorGovernor::new(StuckDriver, GovernorCfg::default()).into_shared();
    let mut c = SafetyCoordinator::new(
        gov,
        DirtyFlag::default(),
        LatchPolicy::default(),
        OverrunCfg::default(),
        Duration::from_millis(500),
    );
    assert!(c.trigger_emergency("operator").is_err());
    assert!(c.is_latched());
}

#[test]
fn switch_read_failure_propagates_from_poll() {
    let clock = ManualClock::new();
    let mut ctl = Controller::new(
        &pisau_config::Config::default(),
        Hardware {
            camera: NullCamera,
            switches: FlakySwitches { ok_sent: false },
            driver: SimulatedMotorDriver::new(),
        },
        clock.clone(),
        GovernorCfg::default(),
    )
    .unwrap();
    ctl.poll().unwrap();
    clock.advance(Duration::from_secs(1));
    let err = ctl.poll().expect_err("switch failure");
    assert!(format!("{err:#}").contains("read switches"));
    assert!(matches!(err.downcast_ref::<GuardError>(), Some(GuardError::Hardware(_))));
}

#[test]
fn null_camera_never_stalls_the_loop() {
    let clock = ManualClock::new();
    let mut ctl = Controller::new(
        &pisau_config::Config::default(),
        Hardware {
            camera: NullCamera,
            switches: FixedSwitches(SwitchState { run: true, shutdown: false }),
            driver: SimulatedMotorDriver::new(),
        },
        clock.clone(),
        GovernorCfg::default(),
    )
    .unwrap();
    let stop = std::sync::atomic::AtomicBool::new(false);
    let stats = ctl.run(&stop, Some(Duration::from_secs(1))).unwrap();
    assert_eq!(stats.frames, 0);
    assert!(stats.skipped_frames >= 14);
    assert!(ctl.last_frame().is_none());
}
