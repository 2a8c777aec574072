use std::cell::RefCell;
use std::rc::Rc;
use std::sync::atomic::AtomicBool;
use std::time::Duration;

use pisau_core::{
    Command, Controller, Flow, GovernorCfg, GuardError, Hardware, MachineState, SpeedPreset,
};
use pisau_hardware::{
    Blob, DriverLog, SceneHandle, SimulatedCamera, SimulatedMotorDriver, SimulatedSwitches,
    SwitchPanel,
};
use pisau_traits::ManualClock;

type Ctl = Controller<SimulatedCamera, SimulatedSwitches, SimulatedMotorDriver, ManualClock>;

struct Rig {
    ctl: Ctl,
    clock: ManualClock,
    scene: SceneHandle,
    panel: SwitchPanel,
    probe: Rc<RefCell<DriverLog>>,
}

fn rig(cfg: &pisau_config::Config, run_on: bool) -> Rig {
    let camera = SimulatedCamera::new(640, 480);
    let switches = SimulatedSwitches::new(run_on);
    let driver = SimulatedMotorDriver::new();
    let (scene, panel, probe) = (camera.scene(), switches.panel(), driver.probe());
    let clock = ManualClock::new();
    let ctl = Controller::new(
        cfg,
        Hardware {
            camera,
            switches,
            driver,
        },
        clock.clone(),
        GovernorCfg {
            seed: Some(9),
            ..GovernorCfg::default()
        },
    )
    .expect("controller");
    Rig {
        ctl,
        clock,
        scene,
        panel,
        probe,
    }
}

fn hand() -> Vec<Blob> {
    vec![Blob::centered(320, 240, 80, 50, [220, 170, 140])]
}

const FRAME: Duration = Duration::from_micros(66_666);

#[test]
fn rejects_invalid_config() {
    let cfg = pisau_config::Config {
        outer_width: 20,
        ..Default::default()
    };
    let camera = SimulatedCamera::new(64, 48);
    let err = Controller::new(
        &cfg,
        Hardware {
            camera,
            switches: SimulatedSwitches::new(false),
            driver: SimulatedMotorDriver::new(),
        },
        ManualClock::new(),
        GovernorCfg::default(),
    )
    .err()
    .expect("invalid config");
    assert!(matches!(err.downcast_ref::<GuardError>(), Some(GuardError::Config(_))));
}

#[test]
fn first_poll_enables_motor_and_processes_a_frame() {
    let mut r = rig(&pisau_config::Config::default(), true);
    assert_eq!(r.ctl.poll().unwrap(), Flow::Continue);
    assert_eq!(r.ctl.machine_state(), MachineState::Enabled);
    assert!(r.probe.borrow().enabled);
    assert_eq!(r.ctl.stats().frames, 1);
    let snap = r.ctl.last_snapshot().expect("snapshot");
    assert_eq!(snap.machine, MachineState::Enabled);
    assert!(snap.motor.enabled);
    assert!(!snap.latched);
}

#[test]
fn camera_failure_skips_frame_and_keeps_last_report() {
    let mut r = rig(&pisau_config::Config::default(), false);
    r.ctl.poll().unwrap();
    assert!(r.ctl.last_frame().is_some());
    r.scene.fail_next_read();
    r.clock.advance(FRAME);
    r.ctl.poll().unwrap();
    let stats = r.ctl.stats();
    assert_eq!((stats.frames, stats.skipped_frames), (1, 1));
    assert!(r.ctl.last_frame().is_some());
}

#[test]
fn hand_latches_and_operator_reset_recovers() {
    let mut r = rig(&pisau_config::Config::default(), true);
    r.scene.set_blobs(hand());
    r.ctl.poll().unwrap();
    assert_eq!(r.ctl.machine_state(), MachineState::EmergencyLatched);
    assert!(!r.probe.borrow().enabled);

    // vision is suspended while latched
    r.clock.advance(FRAME);
    r.ctl.poll().unwrap();
    assert_eq!(r.ctl.stats().frames, 1);

    r.scene.clear();
    r.ctl.command_sender().reset_emergency();
    r.ctl.poll().unwrap();
    assert!(r.ctl.coordinator().is_latched());
    r.clock.advance(Duration::from_millis(500));
    r.ctl.poll().unwrap();
    assert_eq!(r.ctl.machine_state(), MachineState::Enabled);
    assert!(r.probe.borrow().enabled);
    assert!(r.ctl.stats().frames >= 2);
}

#[test]
fn operator_emergency_is_applied_at_next_poll() {
    let mut r = rig(&pisau_config::Config::default(), true);
    r.ctl.poll().unwrap();
    let tx = r.ctl.command_sender();
    tx.trigger_emergency();
    tx.trigger_emergency();
    assert_eq!(r.ctl.machine_state(), MachineState::Enabled);
    r.ctl.poll().unwrap();
    assert_eq!(r.ctl.machine_state(), MachineState::EmergencyLatched);
}

#[test]
fn presets_and_manual_speed_reach_the_driver() {
    let mut r = rig(&pisau_config::Config::default(), true);
    let tx = r.ctl.command_sender();
    tx.send(Command::Preset(SpeedPreset::Medium));
    r.ctl.poll().unwrap();
    assert_eq!(r.probe.borrow().duty, 60.0);
    tx.send(Command::SetSpeed(45));
    r.ctl.poll().unwrap();
    assert_eq!(r.probe.borrow().duty, 45.0);
    assert_eq!(r.ctl.governor().borrow().set_speed_percent(), 45);
}

#[test]
fn config_change_regenerates_overlay_once() {
    let mut r = rig(&pisau_config::Config::default(), false);
    r.ctl.poll().unwrap();
    assert_eq!(r.ctl.zones().regenerations(), 1);
    let tx = r.ctl.command_sender();
    tx.send(Command::ApplyConfig(Box::new(pisau_config::Config {
        hatch_spacing: 40,
        ..Default::default()
    })));
    // rejected: out of slider range
    tx.send(Command::ApplyConfig(Box::new(pisau_config::Config {
        outer_width: 5,
        ..Default::default()
    })));
    r.clock.advance(FRAME);
    r.ctl.poll().unwrap();
    r.clock.advance(FRAME);
    r.ctl.poll().unwrap();
    assert_eq!(r.ctl.zones().regenerations(), 2);
    assert_eq!(r.ctl.config().hatch_spacing, 40);
    assert_eq!(r.ctl.zones().config().hatch_spacing, 40);
}

#[test]
fn shutdown_switch_ends_run_with_motor_off() {
    let mut r = rig(&pisau_config::Config::default(), true);
    r.panel.press_shutdown();
    let stop = AtomicBool::new(false);
    r.ctl.run(&stop, Some(Duration::from_secs(10))).unwrap();
    assert!(!r.probe.borrow().enabled);
    assert!(r.clock.elapsed() < Duration::from_secs(1));
}

#[test]
fn run_keeps_task_periods_on_manual_clock() {
    let mut r = rig(&pisau_config::Config::default(), true);
    r.ctl.command_sender().send(Command::Preset(SpeedPreset::High));
    let stop = AtomicBool::new(false);
    let stats = r.ctl.run(&stop, Some(Duration::from_secs(2))).unwrap();
    assert_eq!(stats.motor_ticks, 3);
    assert_eq!(stats.status_polls, 2);
    assert!(stats.frames >= 29, "frames {}", stats.frames);
    assert_eq!(r.ctl.governor().borrow().state().current_rpm, 150.0);
    // run always leaves the motor disabled
    assert!(!r.probe.borrow().enabled);
}

#[test]
fn stop_flag_is_honoured_before_polling() {
    let mut r = rig(&pisau_config::Config::default(), true);
    let stop = AtomicBool::new(true);
    let stats = r.ctl.run(&stop, None).unwrap();
    assert_eq!(stats.status_polls, 0);
}
